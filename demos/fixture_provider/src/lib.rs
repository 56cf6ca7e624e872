//! Canned chart library used by the test suites.
//!
//! Speaks the real provider ABI but computes nothing: every chart has the
//! same twelve palaces and every horoscope rotates the scope roles by the
//! queried date. Cargo features switch on the broken variants.

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr;
use ziwei_provider_abi::*;

const ROLES: [&str; 12] = [
    "命宫", "兄弟", "夫妻", "子女", "财帛", "疾厄", "迁移", "仆役", "官禄", "田宅", "福德", "父母",
];

const BRANCHES: [&str; 12] = [
    "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥", "子", "丑",
];

const MAJOR_STARS: [&str; 12] = [
    "紫微", "天机", "太阳", "武曲", "天同", "廉贞", "天府", "太阴", "贪狼", "巨门", "天相", "天梁",
];

/// Years before this are refused, so hosts can exercise the failure path
const FIRST_SUPPORTED_YEAR: i64 = 1900;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
    static LAST_REQUEST: RefCell<Option<CString>> = RefCell::new(None);
    static LIVE_CHARTS: Cell<usize> = Cell::new(0);
}

fn set_error(message: &str) {
    LAST_ERROR.with(|e| *e.borrow_mut() = CString::new(message).ok());
}

struct FixtureChart {
    calendar: &'static str,
    request: Value,
}

#[no_mangle]
pub unsafe extern "C" fn ziwei_provider_manifest() -> ProviderManifest {
    let abi_version = if cfg!(feature = "abi-mismatch") {
        ABI_VERSION + 1
    } else {
        ABI_VERSION
    };
    ProviderManifest {
        abi_version,
        name: "ziwei fixture\0".as_ptr() as *const c_char,
        version: "0.1.0\0".as_ptr() as *const c_char,
    }
}

type HoroscopeJsonFn = unsafe extern "C" fn(*const c_void, *const c_char) -> *mut c_char;

static VTABLE: ProviderVTable = ProviderVTable {
    chart_by_solar: fixture_by_solar,
    chart_by_lunar: fixture_by_lunar,
    chart_json: fixture_chart_json,
    horoscope_json: if cfg!(feature = "no-horoscope") {
        None
    } else {
        Some(fixture_horoscope_json as HoroscopeJsonFn)
    },
    last_error: fixture_last_error,
    chart_free: fixture_chart_free,
    string_free: fixture_string_free,
};

#[no_mangle]
pub unsafe extern "C" fn ziwei_provider_get_vtable() -> *const ProviderVTable {
    if cfg!(feature = "null-vtable") {
        ptr::null()
    } else {
        &VTABLE as *const _
    }
}

/// Charts cast on this thread and not yet freed
#[no_mangle]
pub extern "C" fn ziwei_fixture_live_charts() -> usize {
    LIVE_CHARTS.with(Cell::get)
}

/// Raw request JSON of the last cast on this thread, or null
#[no_mangle]
pub extern "C" fn ziwei_fixture_last_request() -> *const c_char {
    LAST_REQUEST.with(|r| r.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

unsafe fn cast(calendar: &'static str, request: *const c_char) -> *mut c_void {
    let text = CStr::from_ptr(request).to_string_lossy().into_owned();
    LAST_REQUEST.with(|r| *r.borrow_mut() = CString::new(text.clone()).ok());

    let request: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            set_error(&format!("request is not JSON: {}", e));
            return ptr::null_mut();
        }
    };
    let date = request["date"].as_str().unwrap_or_default();
    let year = date
        .split('-')
        .next()
        .and_then(|y| y.parse::<i64>().ok())
        .unwrap_or(0);
    if year < FIRST_SUPPORTED_YEAR {
        set_error(&format!("date {} is outside the supported range", date));
        return ptr::null_mut();
    }

    LIVE_CHARTS.with(|n| n.set(n.get() + 1));
    Box::into_raw(Box::new(FixtureChart { calendar, request })) as *mut c_void
}

unsafe extern "C" fn fixture_by_solar(request: *const c_char) -> *mut c_void {
    cast("solar", request)
}

unsafe extern "C" fn fixture_by_lunar(request: *const c_char) -> *mut c_void {
    cast("lunar", request)
}

fn into_c_string(value: Value) -> *mut c_char {
    match CString::new(value.to_string()) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            set_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

unsafe extern "C" fn fixture_chart_json(chart: *const c_void) -> *mut c_char {
    let chart = &*(chart as *const FixtureChart);
    let request = &chart.request;
    let date = request["date"].as_str().unwrap_or_default();
    let leap = request["isLeapMonth"].as_bool().unwrap_or(false);
    let (solar_date, lunar_date) = if chart.calendar == "solar" {
        (date.to_string(), format!("农历{}", date))
    } else {
        (format!("公历{}", date), format!("{}{}", if leap { "闰" } else { "" }, date))
    };

    // Reverse order: hosts must sort by index
    let palaces: Vec<Value> = (0..12)
        .rev()
        .map(|i| {
            json!({
                "index": i,
                "name": ROLES[i],
                "isBodyPalace": i == 4,
                "isOriginalPalace": i == 9,
                "heavenlyStem": "甲",
                "earthlyBranch": BRANCHES[i],
                "majorStars": [{
                    "name": MAJOR_STARS[i],
                    "type": "major",
                    "scope": "origin",
                    "brightness": "",
                    "mutagen": if MAJOR_STARS[i] == "廉贞" { "禄" } else { "" }
                }],
                "minorStars": [],
                "adjectiveStars": [],
                "changsheng12": "长生",
                "boshi12": "博士",
                "jiangqian12": "将星",
                "suiqian12": "岁建",
                "decadal": {
                    "range": [2 + 10 * i, 11 + 10 * i],
                    "heavenlyStem": "丙",
                    "earthlyBranch": BRANCHES[i]
                },
                "ages": [1 + i, 13 + i]
            })
        })
        .collect();

    into_c_string(json!({
        "gender": if request["gender"] == "male" { "男" } else { "女" },
        "solarDate": solar_date,
        "lunarDate": lunar_date,
        "chineseDate": "甲戌 壬申 丙午 甲午",
        "time": format!("time slot {}", request["timeIndex"]),
        "timeRange": "",
        "sign": "狮子座",
        "zodiac": "狗",
        "earthlyBranchOfSoulPalace": "寅",
        "earthlyBranchOfBodyPalace": "午",
        "soul": "禄存",
        "body": "天相",
        "fiveElementsClass": "水二局",
        "palaces": palaces
    }))
}

fn scope_item(key: &str, label: &str, offset: usize, mutagen: [&str; 4], with_stars: bool) -> Value {
    let palace_names: Vec<&str> = (0..12).map(|i| ROLES[(i + 12 - offset) % 12]).collect();
    let mut item = json!({
        "index": offset,
        "name": label,
        "heavenlyStem": "庚",
        "earthlyBranch": BRANCHES[offset],
        "palaceNames": palace_names,
        "mutagen": mutagen
    });
    if with_stars {
        let stars: Vec<Value> = (0..12)
            .map(|i| json!([{ "name": format!("{}-{}", key, i), "type": "flower", "scope": key }]))
            .collect();
        item["stars"] = json!(stars);
    }
    item
}

unsafe extern "C" fn fixture_horoscope_json(chart: *const c_void, instant: *const c_char) -> *mut c_char {
    let chart = &*(chart as *const FixtureChart);
    let instant = CStr::from_ptr(instant).to_string_lossy().into_owned();
    let parts: Vec<usize> = instant
        .get(..10)
        .unwrap_or_default()
        .split('-')
        .filter_map(|p| p.parse().ok())
        .collect();
    let [year, month, day] = parts[..] else {
        set_error(&format!("cannot read instant {:?}", instant));
        return ptr::null_mut();
    };
    let birth_year = chart.request["date"]
        .as_str()
        .and_then(|d| d.split('-').next())
        .and_then(|y| y.parse::<usize>().ok())
        .unwrap_or(year);

    let natal = ["太阳", "武曲", "天同", "廉贞"];
    let mut age = scope_item("age", "小限", 5, ["天机", "天梁", "紫微", "太阴"], false);
    age["nominalAge"] = json!(year.saturating_sub(birth_year) + 1);
    let mut yearly = scope_item("yearly", "流年", year % 12, ["廉贞", "破军", "武曲", "太阳"], true);
    yearly["yearlyDecStar"] = json!({
        "jiangqian12": (0..12).map(|i| format!("将前{}", i)).collect::<Vec<_>>(),
        "suiqian12": (0..12).map(|i| format!("岁前{}", i)).collect::<Vec<_>>()
    });

    into_c_string(json!({
        "solarDate": format!("{}-{}-{}", year, month, day),
        "lunarDate": format!("农历@{}", instant),
        "decadal": scope_item("decadal", "大限", 2, natal, true),
        "age": age,
        "yearly": yearly,
        "monthly": scope_item("monthly", "流月", month % 12, natal, true),
        "daily": scope_item("daily", "流日", day % 12, natal, true),
        "hourly": scope_item("hourly", "流时", 6, natal, true)
    }))
}

unsafe extern "C" fn fixture_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

unsafe extern "C" fn fixture_chart_free(chart: *mut c_void) {
    if !chart.is_null() {
        drop(Box::from_raw(chart as *mut FixtureChart));
        LIVE_CHARTS.with(|n| n.set(n.get().saturating_sub(1)));
    }
}

unsafe extern "C" fn fixture_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
