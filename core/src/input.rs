//! Loading and validating the request document.
//!
//! The document is checked field by field on a raw `serde_json::Value`
//! rather than through derived deserialization, so that each failure names
//! the exact field and so that `confirmed` only passes as the literal `true`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

use crate::calendar::{self, CalendarDate, CalendarKind};
use crate::error::ZiweiError;

pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
pub const DEFAULT_LANGUAGE: &str = "zh-CN";

/// Locales the chart library can render
pub const SUPPORTED_LANGUAGES: &[&str] = &["zh-CN", "zh-TW", "en-US", "ja-JP", "ko-KR", "vi-VN"];

/// Highest time-slot index; 0 and 12 are the early and late rat hours
pub const MAX_TIME_INDEX: u64 = 12;

const TODAY_TOKEN: &str = "today";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBirth {
    pub calendar: CalendarKind,
    pub date: CalendarDate,
    pub time_index: u8,
    pub gender: Gender,
    pub birthplace: String,
    pub is_leap_month: bool,
    pub fix_leap: bool,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseDateSource {
    /// Resolved from the current instant in the query timezone
    Today,
    Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub timezone: Tz,
    pub base_date: CalendarDate,
    pub base_date_source: BaseDateSource,
    pub future_dates: Vec<CalendarDate>,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub birth: NormalizedBirth,
    pub query: NormalizedQuery,
}

/// Fallbacks for fields the document leaves out
#[derive(Debug, Clone, Default)]
pub struct InputDefaults {
    pub timezone: Option<String>,
    pub language: Option<String>,
}

/// Read and parse the input file. Nothing is validated yet.
pub fn load_input(path: &Path) -> Result<Value, ZiweiError> {
    let text = std::fs::read_to_string(path).map_err(|source| ZiweiError::InputRead {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| ZiweiError::InputJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Validate the whole document. `now` anchors "today".
pub fn normalize_input(
    raw: &Value,
    defaults: &InputDefaults,
    now: DateTime<Utc>,
) -> Result<NormalizedRequest, ZiweiError> {
    let root = raw
        .as_object()
        .ok_or_else(|| ZiweiError::validation("input", "must be a JSON object"))?;
    let birth = match root.get("birth") {
        Some(Value::Object(obj)) => normalize_birth(obj, defaults)?,
        Some(_) => return Err(ZiweiError::validation("birth", "must be an object")),
        None => return Err(ZiweiError::validation("birth", "is required")),
    };
    let empty = Map::new();
    let query = match root.get("query") {
        Some(Value::Object(obj)) => obj,
        None | Some(Value::Null) => &empty,
        Some(_) => return Err(ZiweiError::validation("query", "must be an object")),
    };
    let query = normalize_query(query, defaults, now)?;
    Ok(NormalizedRequest { birth, query })
}

fn normalize_birth(
    obj: &Map<String, Value>,
    defaults: &InputDefaults,
) -> Result<NormalizedBirth, ZiweiError> {
    let calendar_text = required_str(obj, "birth", "calendar")?;
    let calendar = CalendarKind::parse(calendar_text).ok_or_else(|| {
        ZiweiError::validation(
            "birth.calendar",
            format!("must be \"solar\" or \"lunar\", got {:?}", calendar_text),
        )
    })?;

    // Deliberate gate: only a literal boolean true passes.
    if obj.get("confirmed") != Some(&Value::Bool(true)) {
        return Err(ZiweiError::validation(
            "birth.confirmed",
            "the birth record must be explicitly confirmed (confirmed: true)",
        ));
    }

    let date_text = required_str(obj, "birth", "date")?;
    let date = calendar::parse_calendar_date(date_text, calendar)
        .map_err(|m| ZiweiError::validation("birth.date", m))?;

    let time_index = match obj.get("timeIndex") {
        Some(v) => v
            .as_u64()
            .filter(|i| *i <= MAX_TIME_INDEX)
            .ok_or_else(|| {
                ZiweiError::validation(
                    "birth.timeIndex",
                    format!("must be an integer from 0 to {}, got {}", MAX_TIME_INDEX, v),
                )
            })? as u8,
        None => return Err(ZiweiError::validation("birth.timeIndex", "is required")),
    };

    let gender_text = required_str(obj, "birth", "gender")?.trim().to_lowercase();
    let gender = match gender_text.as_str() {
        "male" => Gender::Male,
        "female" => Gender::Female,
        other => {
            return Err(ZiweiError::validation(
                "birth.gender",
                format!("must be \"male\" or \"female\", got {:?}", other),
            ))
        }
    };

    let birthplace = required_str(obj, "birth", "birthplace")?.trim().to_string();
    if birthplace.is_empty() {
        return Err(ZiweiError::validation("birth.birthplace", "must not be empty"));
    }

    let mut is_leap_month = optional_bool(obj, "birth", "isLeapMonth")?.unwrap_or(false);
    if is_leap_month && calendar == CalendarKind::Solar {
        log::warn!("birth.isLeapMonth only applies to lunar dates; ignoring it");
        is_leap_month = false;
    }
    let fix_leap = optional_bool(obj, "birth", "fixLeap")?.unwrap_or(true);

    let language = match optional_str(obj, "birth", "language")? {
        Some(l) => l.trim().to_string(),
        None => defaults
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    };
    if !SUPPORTED_LANGUAGES.contains(&language.as_str()) {
        return Err(ZiweiError::validation(
            "birth.language",
            format!("unsupported language {:?}, expected one of {:?}", language, SUPPORTED_LANGUAGES),
        ));
    }

    Ok(NormalizedBirth {
        calendar,
        date,
        time_index,
        gender,
        birthplace,
        is_leap_month,
        fix_leap,
        language,
    })
}

fn normalize_query(
    obj: &Map<String, Value>,
    defaults: &InputDefaults,
    now: DateTime<Utc>,
) -> Result<NormalizedQuery, ZiweiError> {
    let tz_name = match optional_str(obj, "query", "timezone")? {
        Some(name) => name.to_string(),
        None => defaults
            .timezone
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
    };
    let timezone =
        calendar::parse_timezone(&tz_name).map_err(|m| ZiweiError::validation("query.timezone", m))?;

    let (base_date, base_date_source) = match optional_str(obj, "query", "date")? {
        None => (calendar::today_in(timezone, now), BaseDateSource::Today),
        Some(text) if text.trim().eq_ignore_ascii_case(TODAY_TOKEN) => {
            (calendar::today_in(timezone, now), BaseDateSource::Today)
        }
        Some(text) => {
            let date = calendar::parse_calendar_date(text, CalendarKind::Solar)
                .map_err(|m| ZiweiError::validation("query.date", m))?;
            (date, BaseDateSource::Literal)
        }
    };

    let future_dates = match obj.get("futureDates") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let field = format!("query.futureDates[{}]", i);
                let text = item
                    .as_str()
                    .ok_or_else(|| ZiweiError::validation(field.clone(), "must be a date string"))?;
                calendar::parse_calendar_date(text, CalendarKind::Solar)
                    .map_err(|m| ZiweiError::validation(field, m))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ZiweiError::validation(
                "query.futureDates",
                "must be an array of date strings",
            ))
        }
    };

    let debug = optional_bool(obj, "query", "debug")?.unwrap_or(false);

    Ok(NormalizedQuery {
        timezone,
        base_date,
        base_date_source,
        future_dates,
        debug,
    })
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    section: &str,
    key: &str,
) -> Result<&'a str, ZiweiError> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(ZiweiError::validation(
            format!("{}.{}", section, key),
            format!("must be a string, got {}", other),
        )),
        None => Err(ZiweiError::validation(format!("{}.{}", section, key), "is required")),
    }
}

fn optional_str<'a>(
    obj: &'a Map<String, Value>,
    section: &str,
    key: &str,
) -> Result<Option<&'a str>, ZiweiError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ZiweiError::validation(
            format!("{}.{}", section, key),
            format!("must be a string, got {}", other),
        )),
    }
}

fn optional_bool(
    obj: &Map<String, Value>,
    section: &str,
    key: &str,
) -> Result<Option<bool>, ZiweiError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ZiweiError::validation(
            format!("{}.{}", section, key),
            format!("must be a boolean, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 3, 0, 0).unwrap()
    }

    fn birth() -> Value {
        json!({
            "calendar": "solar",
            "date": "1994-8-15",
            "timeIndex": 7,
            "gender": "Female",
            "birthplace": "  杭州 ",
            "confirmed": true
        })
    }

    fn normalize(birth: Value, query: Value) -> Result<NormalizedRequest, ZiweiError> {
        normalize_input(&json!({ "birth": birth, "query": query }), &InputDefaults::default(), now())
    }

    fn failing_field(birth: Value) -> String {
        normalize(birth, json!({}))
            .unwrap_err()
            .field()
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_normalizes_birth() {
        let req = normalize(birth(), json!({})).unwrap();
        assert_eq!(req.birth.gender, Gender::Female);
        assert_eq!(req.birth.birthplace, "杭州");
        assert_eq!(req.birth.language, DEFAULT_LANGUAGE);
        assert!(req.birth.fix_leap);
        assert!(!req.birth.is_leap_month);
        assert_eq!(req.query.timezone.name(), DEFAULT_TIMEZONE);
        assert_eq!(req.query.base_date_source, BaseDateSource::Today);
        assert_eq!(req.query.base_date.to_string(), "2025-6-1");
    }

    #[test]
    fn test_confirmed_must_be_literal_true() {
        for value in [json!(false), json!("true"), json!(1), Value::Null] {
            let mut b = birth();
            b["confirmed"] = value;
            assert_eq!(failing_field(b), "birth.confirmed");
        }
        let mut b = birth();
        b.as_object_mut().unwrap().remove("confirmed");
        assert_eq!(failing_field(b), "birth.confirmed");
    }

    #[test]
    fn test_time_index_bounds() {
        for value in [json!(13), json!(-1), json!(7.5), json!("7")] {
            let mut b = birth();
            b["timeIndex"] = value;
            assert_eq!(failing_field(b), "birth.timeIndex");
        }
        let mut b = birth();
        b["timeIndex"] = json!(12);
        assert_eq!(normalize(b, json!({})).unwrap().birth.time_index, 12);
    }

    #[test]
    fn test_rejects_bad_fields() {
        let cases = [
            ("calendar", json!("julian"), "birth.calendar"),
            ("gender", json!("other"), "birth.gender"),
            ("birthplace", json!("   "), "birth.birthplace"),
            ("date", json!("1994-2-30"), "birth.date"),
            ("language", json!("fr-FR"), "birth.language"),
        ];
        for (key, value, field) in cases {
            let mut b = birth();
            b[key] = value;
            assert_eq!(failing_field(b), field);
        }
    }

    #[test]
    fn test_lunar_day_30_and_leap_month() {
        let mut b = birth();
        b["calendar"] = json!("lunar");
        b["date"] = json!("1994-2-30");
        b["isLeapMonth"] = json!(true);
        let req = normalize(b, json!({})).unwrap();
        assert_eq!(req.birth.date.day, 30);
        assert!(req.birth.is_leap_month);
    }

    #[test]
    fn test_leap_month_dropped_for_solar() {
        let mut b = birth();
        b["isLeapMonth"] = json!(true);
        assert!(!normalize(b, json!({})).unwrap().birth.is_leap_month);
    }

    #[test]
    fn test_query_literal_date_and_future_dates() {
        let req = normalize(
            birth(),
            json!({
                "timezone": "America/New_York",
                "date": "2025-01-05",
                "futureDates": ["2025-2-1", "2026-12-31"],
                "debug": true
            }),
        )
        .unwrap();
        assert_eq!(req.query.base_date.to_string(), "2025-1-5");
        assert_eq!(req.query.base_date_source, BaseDateSource::Literal);
        let future: Vec<String> = req.query.future_dates.iter().map(|d| d.to_string()).collect();
        assert_eq!(future, vec!["2025-2-1", "2026-12-31"]);
        assert!(req.query.debug);
    }

    #[test]
    fn test_bad_future_date_is_fatal() {
        let err = normalize(birth(), json!({ "futureDates": ["2025-1-1", "2025-2-30"] })).unwrap_err();
        assert_eq!(err.field(), Some("query.futureDates[1]"));
    }

    #[test]
    fn test_today_token_and_zone() {
        // 03:00 UTC on June 1st is still May 31st in Los Angeles
        let req = normalize(
            birth(),
            json!({ "timezone": "America/Los_Angeles", "date": "today" }),
        )
        .unwrap();
        assert_eq!(req.query.base_date.to_string(), "2025-5-31");
    }

    #[test]
    fn test_unknown_timezone() {
        let err = normalize(birth(), json!({ "timezone": "Nowhere/Land" })).unwrap_err();
        assert_eq!(err.field(), Some("query.timezone"));
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let defaults = InputDefaults {
            timezone: Some("Asia/Taipei".to_string()),
            language: Some("zh-TW".to_string()),
        };
        let req = normalize_input(&json!({ "birth": birth() }), &defaults, now()).unwrap();
        assert_eq!(req.query.timezone.name(), "Asia/Taipei");
        assert_eq!(req.birth.language, "zh-TW");
    }

    #[test]
    fn test_missing_birth() {
        let err = normalize_input(&json!({}), &InputDefaults::default(), now()).unwrap_err();
        assert_eq!(err.field(), Some("birth"));
    }

    #[test]
    fn test_load_input_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_input(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ZiweiError::InputRead { .. }));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load_input(&bad).unwrap_err(), ZiweiError::InputJson { .. }));
    }
}
