//! Final document assembly.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::calendar::{self, CalendarDate, CalendarKind};
use crate::chart::Astrolabe;
use crate::error::ZiweiError;
use crate::input::{BaseDateSource, Gender, NormalizedRequest};
use crate::provider::{self, ChartProvider, NatalChart, ProviderError};
use crate::reshape::{reshape_snapshot, SnapshotReport};

pub const DETAIL_LEVEL: &str = "full";

pub const DISCLAIMER: &str = "本结果由紫微斗数排盘程序自动生成，仅供传统文化研究与娱乐参考，不构成医疗、法律、投资或任何其他决策建议。";

pub const MODE_ROLE_KEYED: &str = "roleKeyed";
pub const MODE_INDEX_KEYED: &str = "indexKeyed";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedInputView {
    pub calendar: CalendarKind,
    pub birth_date: CalendarDate,
    pub time_index: u8,
    pub gender: Gender,
    pub birthplace: String,
    pub birth_confirmed: bool,
    pub is_leap_month: bool,
    pub fix_leap: bool,
    pub language: String,
    pub timezone: String,
    pub base_date_source: BaseDateSource,
    pub base_date_solar: CalendarDate,
    pub base_date_lunar: String,
    pub future_dates: Vec<CalendarDate>,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPolicy {
    pub detail_level: &'static str,
    pub disclaimer: &'static str,
    pub mapping_modes: Vec<&'static str>,
}

impl OutputPolicy {
    pub fn new(debug: bool) -> Self {
        let mut mapping_modes = vec![MODE_ROLE_KEYED];
        if debug {
            mapping_modes.push(MODE_INDEX_KEYED);
        }
        Self {
            detail_level: DETAIL_LEVEL,
            disclaimer: DISCLAIMER,
            mapping_modes,
        }
    }
}

/// Chart-level metadata, no palaces
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NatalSummary {
    pub gender: String,
    pub solar_date: String,
    pub lunar_date: String,
    pub chinese_date: String,
    pub time: String,
    pub time_range: String,
    pub sign: String,
    pub zodiac: String,
    pub soul: String,
    pub body: String,
    pub earthly_branch_of_soul_palace: String,
    pub earthly_branch_of_body_palace: String,
    pub five_elements_class: String,
}

impl From<&Astrolabe> for NatalSummary {
    fn from(chart: &Astrolabe) -> Self {
        Self {
            gender: chart.gender.clone(),
            solar_date: chart.solar_date.clone(),
            lunar_date: chart.lunar_date.clone(),
            chinese_date: chart.chinese_date.clone(),
            time: chart.time.clone(),
            time_range: chart.time_range.clone(),
            sign: chart.sign.clone(),
            zodiac: chart.zodiac.clone(),
            soul: chart.soul.clone(),
            body: chart.body.clone(),
            earthly_branch_of_soul_palace: chart.earthly_branch_of_soul_palace.clone(),
            earthly_branch_of_body_palace: chart.earthly_branch_of_body_palace.clone(),
            five_elements_class: chart.five_elements_class.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub generated_at: String,
    pub normalized_input: NormalizedInputView,
    pub output_policy: OutputPolicy,
    pub natal_summary: NatalSummary,
    pub current_detailed: SnapshotReport,
    pub future_detailed: Vec<SnapshotReport>,
}

fn snapshot_for(
    chart: &dyn NatalChart,
    request: &NormalizedRequest,
    date: CalendarDate,
) -> Result<SnapshotReport, ZiweiError> {
    let instant = calendar::noon_instant(date, request.query.timezone).map_err(|m| {
        ProviderError::Malformed {
            what: "query date",
            message: m,
        }
    })?;
    log::debug!("Horoscope snapshot for {} at {}", date, instant.to_rfc3339());
    let horoscope = chart.horoscope(&instant)?;
    horoscope.check_alignment()?;
    Ok(reshape_snapshot(
        chart.astrolabe(),
        &horoscope,
        &date.to_string(),
        request.query.debug,
    ))
}

/// Cast the chart and assemble the full document.
pub fn build_report(
    provider: &dyn ChartProvider,
    request: &NormalizedRequest,
    now: DateTime<Utc>,
) -> Result<Report, ZiweiError> {
    log::info!("Using chart library {}", provider.describe());
    let chart = provider::cast_chart(provider, &request.birth)?;

    let current_detailed = snapshot_for(chart.as_ref(), request, request.query.base_date)?;
    let future_detailed = request
        .query
        .future_dates
        .iter()
        .map(|date| snapshot_for(chart.as_ref(), request, *date))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!(
        "Reshaped {} snapshot(s) for {}",
        1 + future_detailed.len(),
        request.birth.date
    );

    let birth = &request.birth;
    let query = &request.query;
    let normalized_input = NormalizedInputView {
        calendar: birth.calendar,
        birth_date: birth.date,
        time_index: birth.time_index,
        gender: birth.gender,
        birthplace: birth.birthplace.clone(),
        birth_confirmed: true,
        is_leap_month: birth.is_leap_month,
        fix_leap: birth.fix_leap,
        language: birth.language.clone(),
        timezone: query.timezone.name().to_string(),
        base_date_source: query.base_date_source,
        base_date_solar: query.base_date,
        base_date_lunar: current_detailed.lunar_date.clone(),
        future_dates: query.future_dates.clone(),
        debug: query.debug,
    };

    Ok(Report {
        generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        normalized_input,
        output_policy: OutputPolicy::new(query.debug),
        natal_summary: NatalSummary::from(chart.astrolabe()),
        current_detailed,
        future_detailed,
    })
}
