//! Typed view of what the chart library returns.
//!
//! The library speaks JSON with camelCase keys. Decoding goes through these
//! records so that only known fields ever reach the report, and so that the
//! positional invariants (12 palaces, 12-slot scope arrays) are checked once
//! at the boundary.

use serde::{Deserialize, Deserializer, Serialize};

use crate::provider::ProviderError;

/// Number of palaces in every chart, and slots in every per-position array
pub const PALACE_COUNT: usize = 12;

/// Slots in a mutagen quadruple
pub const MUTAGEN_SLOTS: usize = 4;

/// Library encodes "no value" as an empty string; treat it as absent.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Star {
    pub name: String,
    #[serde(rename = "type", default)]
    pub star_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub brightness: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub mutagen: Option<String>,
}

/// Ten-year period a palace governs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecadalRange {
    pub range: [u32; 2],
    pub heavenly_stem: String,
    pub earthly_branch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palace {
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub is_body_palace: bool,
    #[serde(default)]
    pub is_original_palace: bool,
    pub heavenly_stem: String,
    pub earthly_branch: String,
    #[serde(default)]
    pub major_stars: Vec<Star>,
    #[serde(default)]
    pub minor_stars: Vec<Star>,
    #[serde(default)]
    pub adjective_stars: Vec<Star>,
    #[serde(default)]
    pub changsheng12: String,
    #[serde(default)]
    pub boshi12: String,
    #[serde(default)]
    pub jiangqian12: String,
    #[serde(default)]
    pub suiqian12: String,
    #[serde(default)]
    pub decadal: Option<DecadalRange>,
    #[serde(default)]
    pub ages: Vec<u32>,
}

/// Natal chart as cast by the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Astrolabe {
    #[serde(default)]
    pub gender: String,
    pub solar_date: String,
    pub lunar_date: String,
    pub chinese_date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub time_range: String,
    #[serde(default)]
    pub sign: String,
    pub zodiac: String,
    pub earthly_branch_of_soul_palace: String,
    pub earthly_branch_of_body_palace: String,
    pub soul: String,
    pub body: String,
    pub five_elements_class: String,
    pub palaces: Vec<Palace>,
}

impl Astrolabe {
    /// Decode and check the palace layout. Palaces come back ordered by
    /// position.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let mut chart: Astrolabe =
            serde_json::from_str(json).map_err(|e| ProviderError::Malformed {
                what: "chart",
                message: e.to_string(),
            })?;
        chart.palaces.sort_by_key(|p| p.index);
        let positions_ok = chart.palaces.len() == PALACE_COUNT
            && chart.palaces.iter().enumerate().all(|(i, p)| p.index == i);
        if !positions_ok {
            return Err(ProviderError::Malformed {
                what: "chart",
                message: format!(
                    "expected palaces at positions 0..{}, got {:?}",
                    PALACE_COUNT - 1,
                    chart.palaces.iter().map(|p| p.index).collect::<Vec<_>>()
                ),
            });
        }
        Ok(chart)
    }
}

/// Horoscope layers, outermost first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Decadal,
    Age,
    Yearly,
    Monthly,
    Daily,
    Hourly,
}

impl Scope {
    pub const ALL: [Scope; 6] = [
        Scope::Decadal,
        Scope::Age,
        Scope::Yearly,
        Scope::Monthly,
        Scope::Daily,
        Scope::Hourly,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Scope::Decadal => "decadal",
            Scope::Age => "age",
            Scope::Yearly => "yearly",
            Scope::Monthly => "monthly",
            Scope::Daily => "daily",
            Scope::Hourly => "hourly",
        }
    }

    /// Prefix used in mutagen tags
    pub fn tag_label(&self) -> &'static str {
        match self {
            Scope::Decadal => "大限",
            Scope::Age => "小限",
            Scope::Yearly => "流年",
            Scope::Monthly => "流月",
            Scope::Daily => "流日",
            Scope::Hourly => "流时",
        }
    }
}

/// The yearly twelve-position cycles: general-before and year-before
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyDecStar {
    pub jiangqian12: Vec<String>,
    pub suiqian12: Vec<String>,
}

/// One layer of a horoscope snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoroscopeItem {
    pub index: usize,
    pub name: String,
    pub heavenly_stem: String,
    pub earthly_branch: String,
    /// Role name of each position under this scope
    pub palace_names: Vec<String>,
    #[serde(default)]
    pub mutagen: Vec<Option<String>>,
    /// Flow stars per position; some layers carry none
    #[serde(default)]
    pub stars: Option<Vec<Vec<Star>>>,
    #[serde(default)]
    pub nominal_age: Option<u32>,
    #[serde(default)]
    pub yearly_dec_star: Option<YearlyDecStar>,
}

impl HoroscopeItem {
    /// Mutagen quadruple padded or cut to exactly four slots
    pub fn mutagen_slots(&self) -> [Option<&str>; MUTAGEN_SLOTS] {
        let mut slots = [None; MUTAGEN_SLOTS];
        for (slot, name) in slots.iter_mut().zip(self.mutagen.iter()) {
            *slot = name.as_deref().filter(|n| !n.trim().is_empty());
        }
        slots
    }

    /// Flow stars at a fixed position, empty when the layer has none
    pub fn stars_at(&self, position: usize) -> &[Star] {
        self.stars
            .as_ref()
            .and_then(|s| s.get(position))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn check_alignment(&self, scope: Scope) -> Result<(), ProviderError> {
        let misaligned = |field: &str, len: usize| ProviderError::Malformed {
            what: "horoscope",
            message: format!(
                "{}.{} has {} entries, expected {}",
                scope.key(),
                field,
                len,
                PALACE_COUNT
            ),
        };
        if self.palace_names.len() != PALACE_COUNT {
            return Err(misaligned("palaceNames", self.palace_names.len()));
        }
        if let Some(stars) = &self.stars {
            if stars.len() != PALACE_COUNT {
                return Err(misaligned("stars", stars.len()));
            }
        }
        if let Some(dec) = &self.yearly_dec_star {
            if dec.jiangqian12.len() != PALACE_COUNT {
                return Err(misaligned("yearlyDecStar.jiangqian12", dec.jiangqian12.len()));
            }
            if dec.suiqian12.len() != PALACE_COUNT {
                return Err(misaligned("yearlyDecStar.suiqian12", dec.suiqian12.len()));
            }
        }
        Ok(())
    }
}

/// Horoscope snapshot for one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Horoscope {
    pub solar_date: String,
    pub lunar_date: String,
    pub decadal: HoroscopeItem,
    pub age: HoroscopeItem,
    pub yearly: HoroscopeItem,
    pub monthly: HoroscopeItem,
    pub daily: HoroscopeItem,
    pub hourly: HoroscopeItem,
}

impl Horoscope {
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let horoscope: Horoscope =
            serde_json::from_str(json).map_err(|e| ProviderError::Malformed {
                what: "horoscope",
                message: e.to_string(),
            })?;
        horoscope.check_alignment()?;
        Ok(horoscope)
    }

    /// Verify every layer's per-position arrays line up with the palaces
    pub fn check_alignment(&self) -> Result<(), ProviderError> {
        for scope in Scope::ALL {
            self.item(scope).check_alignment(scope)?;
        }
        Ok(())
    }

    pub fn item(&self, scope: Scope) -> &HoroscopeItem {
        match scope {
            Scope::Decadal => &self.decadal,
            Scope::Age => &self.age,
            Scope::Yearly => &self.yearly,
            Scope::Monthly => &self.monthly,
            Scope::Daily => &self.daily,
            Scope::Hourly => &self.hourly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_json(names: usize) -> serde_json::Value {
        let palace_names = vec!["命宫"; names];
        json!({
            "index": 0,
            "name": "大限",
            "heavenlyStem": "甲",
            "earthlyBranch": "子",
            "palaceNames": palace_names,
            "mutagen": ["廉贞", null]
        })
    }

    #[test]
    fn test_empty_brightness_is_none() {
        let star: Star = serde_json::from_value(json!({
            "name": "紫微", "type": "major", "scope": "origin", "brightness": "", "mutagen": ""
        }))
        .unwrap();
        assert!(star.brightness.is_none());
        assert!(star.mutagen.is_none());
    }

    #[test]
    fn test_mutagen_slots_pad_to_four() {
        let item: HoroscopeItem = serde_json::from_value(item_json(12)).unwrap();
        let slots = item.mutagen_slots();
        assert_eq!(slots, [Some("廉贞"), None, None, None]);
    }

    #[test]
    fn test_stars_at_missing_layer_is_empty() {
        let item: HoroscopeItem = serde_json::from_value(item_json(12)).unwrap();
        assert!(item.stars_at(3).is_empty());
    }

    #[test]
    fn test_misaligned_palace_names_rejected() {
        let item: HoroscopeItem = serde_json::from_value(item_json(11)).unwrap();
        let err = item.check_alignment(Scope::Yearly).unwrap_err();
        assert!(err.to_string().contains("yearly.palaceNames"));
    }

    #[test]
    fn test_chart_without_palaces_rejected() {
        let err = Astrolabe::from_json(r#"{"solarDate":"2000-1-1"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { what: "chart", .. }));
    }
}
