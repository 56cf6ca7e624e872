#![allow(dead_code)]

use chrono::{DateTime, Datelike, FixedOffset};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::Command;
use ziwei_core::chart::{DecadalRange, YearlyDecStar};
use ziwei_provider_abi::PROVIDER_FILE_NAME;
use ziwei_core::{
    Astrolabe, ChartProvider, ChartRequest, Horoscope, HoroscopeItem, NatalChart, Palace,
    ProviderError, Scope, Star,
};

pub const ROLE_NAMES: [&str; 12] = [
    "命宫", "兄弟", "夫妻", "子女", "财帛", "疾厄", "迁移", "仆役", "官禄", "田宅", "福德", "父母",
];

pub const MAJOR_STARS: [&str; 12] = [
    "紫微", "天机", "太阳", "武曲", "天同", "廉贞", "天府", "太阴", "贪狼", "巨门", "天相", "天梁",
];

pub const BODY_PALACE_INDEX: usize = 4;

fn star(name: &str, star_type: &str, scope: &str, mutagen: Option<&str>) -> Star {
    Star {
        name: name.to_string(),
        star_type: star_type.to_string(),
        scope: scope.to_string(),
        brightness: Some("庙".to_string()),
        mutagen: mutagen.map(str::to_string),
    }
}

/// Role names of a scope whose 命宫 sits at `offset`
pub fn rotated_roles(offset: usize) -> Vec<String> {
    (0..12)
        .map(|i| ROLE_NAMES[(i + 12 - offset) % 12].to_string())
        .collect()
}

pub fn flow_star_name(scope: Scope, position: usize) -> String {
    format!("{}-{}", scope.key(), position)
}

/// Where each scope puts its 命宫 for a given date
pub fn scope_offset(scope: Scope, year: i32, month: u32, day: u32) -> usize {
    match scope {
        Scope::Decadal => 2,
        Scope::Age => 5,
        Scope::Yearly => year.rem_euclid(12) as usize,
        Scope::Monthly => (month as usize) % 12,
        Scope::Daily => (day as usize) % 12,
        Scope::Hourly => 6,
    }
}

/// Natal chart; `labels` spells 禄, 科 and 忌 the way the requested locale does
pub fn astrolabe(natal_mutagens: bool, labels: [&str; 3]) -> Astrolabe {
    let [lu, ke, ji] = labels;
    let palaces = (0..12)
        .map(|i| {
            let mutagen = match (natal_mutagens, MAJOR_STARS[i]) {
                (true, "廉贞") => Some(lu),
                (true, "太阳") => Some(ji),
                _ => None,
            };
            Palace {
                index: i,
                name: ROLE_NAMES[i].to_string(),
                is_body_palace: i == BODY_PALACE_INDEX,
                is_original_palace: i == 9,
                heavenly_stem: "甲".to_string(),
                earthly_branch: "寅".to_string(),
                major_stars: vec![star(MAJOR_STARS[i], "major", "origin", mutagen)],
                minor_stars: if i == 1 {
                    vec![star("文昌", "soft", "origin", natal_mutagens.then_some(ke))]
                } else {
                    vec![]
                },
                adjective_stars: vec![star("天哭", "adjective", "origin", None)],
                changsheng12: "长生".to_string(),
                boshi12: "博士".to_string(),
                jiangqian12: "将星".to_string(),
                suiqian12: "岁建".to_string(),
                decadal: Some(DecadalRange {
                    range: [4 + 10 * i as u32, 13 + 10 * i as u32],
                    heavenly_stem: "丙".to_string(),
                    earthly_branch: "寅".to_string(),
                }),
                ages: vec![1 + i as u32, 13 + i as u32],
            }
        })
        .collect();
    Astrolabe {
        gender: "女".to_string(),
        solar_date: "1994-8-15".to_string(),
        lunar_date: "一九九四年七月初九".to_string(),
        chinese_date: "甲戌 壬申 丙午 甲午".to_string(),
        time: "午时".to_string(),
        time_range: "11:00~13:00".to_string(),
        sign: "狮子座".to_string(),
        zodiac: "狗".to_string(),
        earthly_branch_of_soul_palace: "寅".to_string(),
        earthly_branch_of_body_palace: "午".to_string(),
        soul: "禄存".to_string(),
        body: "天相".to_string(),
        five_elements_class: "水二局".to_string(),
        palaces,
    }
}

fn mutagen_for(scope: Scope) -> Vec<Option<String>> {
    let names: [Option<&str>; 4] = match scope {
        Scope::Decadal => [Some("太阳"), Some("武曲"), Some("天同"), Some("廉贞")],
        Scope::Age => [Some("天机"), Some("天梁"), Some("紫微"), Some("太阴")],
        Scope::Yearly => [Some("廉贞"), Some("破军"), Some("武曲"), Some("太阳")],
        // Library leaves a slot empty now and then
        Scope::Monthly => [Some("天同"), None, Some("文昌"), Some("廉贞")],
        Scope::Daily => [Some("贪狼"), Some("太阴"), Some("右弼"), Some("天机")],
        Scope::Hourly => [Some("太阴"), Some("天同"), Some("天机"), Some("巨门")],
    };
    names.iter().map(|n| n.map(str::to_string)).collect()
}

pub fn horoscope_for(year: i32, month: u32, day: u32) -> Horoscope {
    let item = |scope: Scope| {
        let offset = scope_offset(scope, year, month, day);
        let stars = if scope == Scope::Age {
            None
        } else {
            Some(
                (0..12)
                    .map(|i| vec![star(&flow_star_name(scope, i), "flower", scope.key(), None)])
                    .collect(),
            )
        };
        HoroscopeItem {
            index: offset,
            name: scope.tag_label().to_string(),
            heavenly_stem: "庚".to_string(),
            earthly_branch: "辰".to_string(),
            palace_names: rotated_roles(offset),
            mutagen: mutagen_for(scope),
            stars,
            nominal_age: (scope == Scope::Age).then_some(32),
            yearly_dec_star: (scope == Scope::Yearly).then(|| YearlyDecStar {
                jiangqian12: (0..12).map(|i| format!("将前{}", i)).collect(),
                suiqian12: (0..12).map(|i| format!("岁前{}", i)).collect(),
            }),
        }
    };
    Horoscope {
        solar_date: format!("{}-{}-{}", year, month, day),
        lunar_date: format!("农历{}年{}月{}日", year, month, day),
        decadal: item(Scope::Decadal),
        age: item(Scope::Age),
        yearly: item(Scope::Yearly),
        monthly: item(Scope::Monthly),
        daily: item(Scope::Daily),
        hourly: item(Scope::Hourly),
    }
}

/// In-memory chart library recording how it was called
#[derive(Default)]
pub struct MockProvider {
    pub natal_mutagens: bool,
    pub english_labels: bool,
    pub without_horoscope: bool,
    pub misaligned: bool,
    pub entry_points: RefCell<Vec<(&'static str, ChartRequest)>>,
    pub instants: RefCell<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            natal_mutagens: true,
            ..Default::default()
        }
    }

    fn cast(&self, entry: &'static str, request: &ChartRequest) -> Box<dyn NatalChart + '_> {
        self.entry_points.borrow_mut().push((entry, request.clone()));
        let labels = if self.english_labels {
            ["Lu", "Ke", "Ji"]
        } else {
            ["禄", "科", "忌"]
        };
        Box::new(MockChart {
            provider: self,
            astrolabe: astrolabe(self.natal_mutagens, labels),
        })
    }
}

impl ChartProvider for MockProvider {
    fn describe(&self) -> String {
        "mock v0".to_string()
    }

    fn by_solar(&self, request: &ChartRequest) -> Result<Box<dyn NatalChart + '_>, ProviderError> {
        Ok(self.cast("solar", request))
    }

    fn by_lunar(&self, request: &ChartRequest) -> Result<Box<dyn NatalChart + '_>, ProviderError> {
        Ok(self.cast("lunar", request))
    }
}

struct MockChart<'p> {
    provider: &'p MockProvider,
    astrolabe: Astrolabe,
}

impl NatalChart for MockChart<'_> {
    fn astrolabe(&self) -> &Astrolabe {
        &self.astrolabe
    }

    fn horoscope(&self, instant: &DateTime<FixedOffset>) -> Result<Horoscope, ProviderError> {
        if self.provider.without_horoscope {
            return Err(ProviderError::NoHoroscope);
        }
        self.provider.instants.borrow_mut().push(instant.to_rfc3339());
        let mut horoscope = horoscope_for(instant.year(), instant.month(), instant.day());
        if self.provider.misaligned {
            horoscope.monthly.palace_names.pop();
        }
        Ok(horoscope)
    }
}

/// Build the canned chart library in `demos/fixture_provider` with the given
/// features and return the path of the shared object.
pub fn fixture_library(features: &[&str]) -> PathBuf {
    let workspace = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("core lives inside the workspace");
    let variant = if features.is_empty() {
        "default".to_string()
    } else {
        features.join("+")
    };
    let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(format!("fixture-{}", variant));

    let mut cargo = Command::new(env!("CARGO"));
    cargo
        .args(["build", "--quiet", "--manifest-path"])
        .arg(workspace.join("demos/fixture_provider/Cargo.toml"))
        .arg("--target-dir")
        .arg(&target_dir);
    if !features.is_empty() {
        cargo.arg("--features").arg(features.join(","));
    }
    let status = cargo.status().expect("failed to run cargo");
    assert!(status.success(), "building the fixture chart library failed");
    target_dir.join("debug").join(PROVIDER_FILE_NAME)
}
