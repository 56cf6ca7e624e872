//! Merge a natal chart and one horoscope snapshot into a per-palace report.
//!
//! Each horoscope scope renames the twelve positions with its own roles (its
//! "命宫" may sit on any natal position). The default view addresses a scope's
//! flow stars by role: a natal palace named "财帛" receives the stars found on
//! whichever position that scope calls "财帛". Debug mode adds the plain
//! positional view next to it so the two can be compared.

use serde::Serialize;
use std::collections::HashMap;

use crate::chart::{Astrolabe, DecadalRange, Horoscope, HoroscopeItem, Palace, Scope, Star, MUTAGEN_SLOTS};

/// Mutagen labels by quadruple slot
pub const MUTAGEN_LABELS: [&str; MUTAGEN_SLOTS] = ["禄", "权", "科", "忌"];

/// Spellings of each slot's label across the library's locales
const MUTAGEN_SPELLINGS: [&[&str]; MUTAGEN_SLOTS] = [
    &["禄", "祿", "lu", "록", "lộc"],
    &["权", "權", "権", "quan", "권", "quyền"],
    &["科", "ke", "과", "khoa"],
    &["忌", "ji", "기", "kỵ", "kị"],
];

/// Tag prefix for mutagens fixed at birth
pub const NATAL_TAG_LABEL: &str = "生年";

/// Classical palace names and the names shown in their place
const PALACE_ALIASES: &[(&str, &str)] = &[("仆役", "交友"), ("官禄", "事业")];

const BODY_PALACE_SUFFIX: &str = "（身宫）";

/// One value per horoscope scope, serialized with fixed keys
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerScope<T> {
    pub decadal: T,
    pub age: T,
    pub yearly: T,
    pub monthly: T,
    pub daily: T,
    pub hourly: T,
}

impl<T> PerScope<T> {
    pub fn build(mut f: impl FnMut(Scope) -> T) -> Self {
        Self {
            decadal: f(Scope::Decadal),
            age: f(Scope::Age),
            yearly: f(Scope::Yearly),
            monthly: f(Scope::Monthly),
            daily: f(Scope::Daily),
            hourly: f(Scope::Hourly),
        }
    }

    pub fn get(&self, scope: Scope) -> &T {
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

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedStar {
    pub name: String,
    #[serde(rename = "type")]
    pub star_type: String,
    pub scope: String,
    pub brightness: Option<String>,
    pub mutagen: Option<String>,
    /// Every mutagen tag, across natal and all scopes, naming this star
    pub tags: Vec<String>,
}

/// Yearly general-before / year-before labels for one palace
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecStarPair {
    pub jiangqian12: Option<String>,
    pub suiqian12: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PalaceReport {
    pub index: usize,
    pub name: String,
    pub display_name: String,
    pub heavenly_stem: String,
    pub earthly_branch: String,
    pub is_body_palace: bool,
    pub is_original_palace: bool,
    pub major_stars: Vec<TaggedStar>,
    pub minor_stars: Vec<TaggedStar>,
    pub adjective_stars: Vec<TaggedStar>,
    pub changsheng12: String,
    pub boshi12: String,
    pub jiangqian12: String,
    pub suiqian12: String,
    pub decadal: Option<DecadalRange>,
    pub ages: Vec<u32>,
    /// Flow stars per scope, addressed by this palace's role name
    pub flow_stars: PerScope<Vec<TaggedStar>>,
    pub yearly_dec_star: DecStarPair,
    /// Debug only: flow stars at this palace's position
    pub flow_stars_by_index: Option<PerScope<Vec<TaggedStar>>>,
    /// Debug only: each scope's role name for this position
    pub flow_role_at_index: Option<PerScope<Option<String>>>,
    /// Debug only: yearly cycle labels at this palace's position
    pub yearly_dec_star_by_index: Option<DecStarPair>,
}

/// Scope layer header, without the per-position arrays
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSummary {
    pub index: usize,
    pub name: String,
    pub heavenly_stem: String,
    pub earthly_branch: String,
    pub mutagen: [Option<String>; MUTAGEN_SLOTS],
    pub nominal_age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReport {
    /// Queried date, solar, as requested
    pub date: String,
    pub solar_date: String,
    pub lunar_date: String,
    pub scopes: PerScope<ScopeSummary>,
    pub palaces: Vec<PalaceReport>,
}

/// Star name to mutagen tags, built from the natal chart and every scope
#[derive(Debug, Default)]
pub struct TagIndex {
    tags: HashMap<String, Vec<String>>,
}

impl TagIndex {
    pub fn build(chart: &Astrolabe, horoscope: &Horoscope) -> Self {
        let mut index = TagIndex::default();
        for palace in &chart.palaces {
            for star in palace.major_stars.iter().chain(&palace.minor_stars) {
                let Some(mutagen) = &star.mutagen else { continue };
                match mutagen_slot(mutagen) {
                    Some(slot) => index.add(
                        &star.name,
                        format!("{}{}", NATAL_TAG_LABEL, MUTAGEN_LABELS[slot]),
                    ),
                    None => log::warn!("Unknown mutagen label {:?} on {}", mutagen, star.name),
                }
            }
        }
        for scope in Scope::ALL {
            let slots = horoscope.item(scope).mutagen_slots();
            for (slot, name) in slots.iter().enumerate() {
                if let Some(name) = name {
                    index.add(name, format!("{}{}", scope.tag_label(), MUTAGEN_LABELS[slot]));
                }
            }
        }
        index
    }

    fn add(&mut self, star: &str, tag: String) {
        let entry = self.tags.entry(star.to_string()).or_default();
        if !entry.contains(&tag) {
            entry.push(tag);
        }
    }

    pub fn tags_for(&self, star: &str) -> &[String] {
        self.tags.get(star).map(Vec::as_slice).unwrap_or(&[])
    }

    fn tag(&self, star: &Star) -> TaggedStar {
        TaggedStar {
            name: star.name.clone(),
            star_type: star.star_type.clone(),
            scope: star.scope.clone(),
            brightness: star.brightness.clone(),
            mutagen: star.mutagen.clone(),
            tags: self.tags_for(&star.name).to_vec(),
        }
    }

    fn tag_all(&self, stars: &[Star]) -> Vec<TaggedStar> {
        stars.iter().map(|s| self.tag(s)).collect()
    }
}

/// Role name to position for one scope
struct RoleTable<'a> {
    item: &'a HoroscopeItem,
    positions: HashMap<&'a str, usize>,
}

impl<'a> RoleTable<'a> {
    fn new(item: &'a HoroscopeItem) -> Self {
        let mut positions = HashMap::new();
        for (i, role) in item.palace_names.iter().enumerate() {
            // First occurrence wins if a library ever repeats a role
            positions.entry(role.as_str()).or_insert(i);
        }
        Self { item, positions }
    }

    fn position_of(&self, role: &str) -> Option<usize> {
        self.positions.get(role).copied()
    }

    fn stars_for_role(&self, role: &str) -> &'a [Star] {
        match self.position_of(role) {
            Some(i) => self.item.stars_at(i),
            None => &[],
        }
    }

    fn role_at(&self, position: usize) -> Option<String> {
        self.item.palace_names.get(position).cloned()
    }
}

/// Quadruple slot named by a natal mutagen label, in any supported locale.
/// A leading 化/화 is ignored.
pub fn mutagen_slot(label: &str) -> Option<usize> {
    let label = label
        .trim()
        .trim_start_matches(|c: char| c == '化' || c == '화')
        .to_lowercase();
    MUTAGEN_SPELLINGS
        .iter()
        .position(|forms| forms.contains(&label.as_str()))
}

/// Name shown for a palace: modern alias first, body marker appended
pub fn display_name(palace: &Palace) -> String {
    let base = PALACE_ALIASES
        .iter()
        .find(|(classical, _)| *classical == palace.name)
        .map(|(_, alias)| *alias)
        .unwrap_or(palace.name.as_str());
    if palace.is_body_palace {
        format!("{}{}", base, BODY_PALACE_SUFFIX)
    } else {
        base.to_string()
    }
}

fn dec_star_at(horoscope: &Horoscope, position: Option<usize>) -> DecStarPair {
    let label = |seq: Option<&Vec<String>>| {
        seq.zip(position)
            .and_then(|(s, i)| s.get(i).cloned())
            .filter(|s| !s.is_empty())
    };
    let dec = horoscope.yearly.yearly_dec_star.as_ref();
    DecStarPair {
        jiangqian12: label(dec.map(|d| &d.jiangqian12)),
        suiqian12: label(dec.map(|d| &d.suiqian12)),
    }
}

/// Reshape one snapshot. Pure: depends only on its arguments.
pub fn reshape_snapshot(
    chart: &Astrolabe,
    horoscope: &Horoscope,
    date: &str,
    debug: bool,
) -> SnapshotReport {
    let tags = TagIndex::build(chart, horoscope);
    let roles = PerScope::build(|scope| RoleTable::new(horoscope.item(scope)));
    let yearly_roles = roles.get(Scope::Yearly);

    let palaces = chart
        .palaces
        .iter()
        .map(|palace| {
            let flow_stars =
                PerScope::build(|scope| tags.tag_all(roles.get(scope).stars_for_role(&palace.name)));
            let yearly_dec_star = dec_star_at(horoscope, yearly_roles.position_of(&palace.name));

            let (flow_stars_by_index, flow_role_at_index, yearly_dec_star_by_index) = if debug {
                (
                    Some(PerScope::build(|scope| {
                        tags.tag_all(horoscope.item(scope).stars_at(palace.index))
                    })),
                    Some(PerScope::build(|scope| roles.get(scope).role_at(palace.index))),
                    Some(dec_star_at(horoscope, Some(palace.index))),
                )
            } else {
                (None, None, None)
            };

            PalaceReport {
                index: palace.index,
                name: palace.name.clone(),
                display_name: display_name(palace),
                heavenly_stem: palace.heavenly_stem.clone(),
                earthly_branch: palace.earthly_branch.clone(),
                is_body_palace: palace.is_body_palace,
                is_original_palace: palace.is_original_palace,
                major_stars: tags.tag_all(&palace.major_stars),
                minor_stars: tags.tag_all(&palace.minor_stars),
                adjective_stars: tags.tag_all(&palace.adjective_stars),
                changsheng12: palace.changsheng12.clone(),
                boshi12: palace.boshi12.clone(),
                jiangqian12: palace.jiangqian12.clone(),
                suiqian12: palace.suiqian12.clone(),
                decadal: palace.decadal.clone(),
                ages: palace.ages.clone(),
                flow_stars,
                yearly_dec_star,
                flow_stars_by_index,
                flow_role_at_index,
                yearly_dec_star_by_index,
            }
        })
        .collect();

    let scopes = PerScope::build(|scope| {
        let item = horoscope.item(scope);
        ScopeSummary {
            index: item.index,
            name: item.name.clone(),
            heavenly_stem: item.heavenly_stem.clone(),
            earthly_branch: item.earthly_branch.clone(),
            mutagen: item.mutagen_slots().map(|m| m.map(str::to_string)),
            nominal_age: item.nominal_age,
        }
    });

    SnapshotReport {
        date: date.to_string(),
        solar_date: horoscope.solar_date.clone(),
        lunar_date: horoscope.lunar_date.clone(),
        scopes,
        palaces,
    }
}
