use chrono::{DateTime, Utc};
use serde_json::Value;

pub mod calendar;
pub use calendar::{CalendarDate, CalendarKind};

pub mod chart;
pub use chart::{Astrolabe, Horoscope, HoroscopeItem, Palace, Scope, Star};

pub mod error;
pub use error::ZiweiError;

pub mod input;
pub use input::{InputDefaults, NormalizedRequest};

pub mod provider;
pub use provider::{ChartProvider, ChartRequest, NatalChart, ProviderError};

pub mod provider_loader;
pub use provider_loader::{locate_provider, DynamicProvider};

pub mod reshape;
pub use reshape::{reshape_snapshot, PalaceReport, SnapshotReport};

pub mod report;
pub use report::{build_report, Report};

/// Validate a raw request document and build its report.
pub fn generate_report(
    raw: &Value,
    defaults: &InputDefaults,
    provider: &dyn ChartProvider,
    now: DateTime<Utc>,
) -> Result<Report, ZiweiError> {
    let request = input::normalize_input(raw, defaults, now)?;
    build_report(provider, &request, now)
}
