//! The chart library seam.
//!
//! Chart casting is delegated entirely to an external library. It is reached
//! through [`ChartProvider`] so the shared-object binding in
//! [`crate::provider_loader`] can be swapped for a fake in tests.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use thiserror::Error;

use crate::calendar::CalendarKind;
use crate::chart::{Astrolabe, Horoscope};
use crate::input::{Gender, NormalizedBirth};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("chart library not found: {0}")]
    Missing(String),
    #[error("chart library is incompatible: {0}")]
    Incompatible(String),
    #[error("chart library failed to cast chart: {0}")]
    Chart(String),
    #[error("chart library returned a chart without a horoscope accessor")]
    NoHoroscope,
    #[error("malformed {what} from chart library: {message}")]
    Malformed { what: &'static str, message: String },
}

impl ProviderError {
    /// True for load-time failures (library absent or wrong shape), as
    /// opposed to failures while computing a chart.
    pub fn is_dependency(&self) -> bool {
        matches!(self, ProviderError::Missing(_) | ProviderError::Incompatible(_))
    }
}

/// Birth parameters in the form the library's two entry points take
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    pub date: String,
    pub time_index: u8,
    pub gender: Gender,
    /// Only read by the lunar entry point
    pub is_leap_month: bool,
    pub fix_leap: bool,
    pub language: String,
}

impl ChartRequest {
    pub fn from_birth(birth: &NormalizedBirth) -> Self {
        Self {
            date: birth.date.to_string(),
            time_index: birth.time_index,
            gender: birth.gender,
            is_leap_month: birth.is_leap_month,
            fix_leap: birth.fix_leap,
            language: birth.language.clone(),
        }
    }
}

/// A cast natal chart
pub trait NatalChart {
    fn astrolabe(&self) -> &Astrolabe;

    /// Horoscope snapshot at an absolute instant
    fn horoscope(&self, instant: &DateTime<FixedOffset>) -> Result<Horoscope, ProviderError>;
}

pub trait ChartProvider {
    /// Library name and version, for logs
    fn describe(&self) -> String;

    fn by_solar(&self, request: &ChartRequest) -> Result<Box<dyn NatalChart + '_>, ProviderError>;

    fn by_lunar(&self, request: &ChartRequest) -> Result<Box<dyn NatalChart + '_>, ProviderError>;
}

/// Cast the natal chart through the entry point matching the birth calendar.
pub fn cast_chart<'p>(
    provider: &'p dyn ChartProvider,
    birth: &NormalizedBirth,
) -> Result<Box<dyn NatalChart + 'p>, ProviderError> {
    let request = ChartRequest::from_birth(birth);
    log::debug!(
        "Casting {} chart for {} (time index {})",
        birth.calendar.as_str(),
        request.date,
        request.time_index
    );
    match birth.calendar {
        CalendarKind::Solar => provider.by_solar(&request),
        CalendarKind::Lunar => provider.by_lunar(&request),
    }
}
