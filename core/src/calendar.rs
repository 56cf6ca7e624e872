//! Calendar date parsing and timezone handling.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use std::fmt;

lazy_static::lazy_static! {
    static ref DATE_PATTERN: Regex =
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("Invalid date regex");
}

/// Longest lunar month. Month lengths vary by year and are not checked.
const MAX_LUNAR_DAY: u32 = 30;
const MAX_SOLAR_DAY: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    Solar,
    Lunar,
}

impl CalendarKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "solar" => Some(CalendarKind::Solar),
            "lunar" => Some(CalendarKind::Lunar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarKind::Solar => "solar",
            CalendarKind::Lunar => "lunar",
        }
    }
}

/// A year-month-day triple in either calendar.
///
/// Displays as `Y-M-D` without zero padding, which is the form the chart
/// library expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(d: NaiveDate) -> Self {
        Self {
            year: d.year(),
            month: d.month(),
            day: d.day(),
        }
    }
}

impl CalendarDate {
    /// Gregorian date, only meaningful for solar dates
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Parse `YYYY-M-D` and check the day against the calendar's rules.
pub fn parse_calendar_date(text: &str, kind: CalendarKind) -> Result<CalendarDate, String> {
    let text = text.trim();
    let caps = DATE_PATTERN
        .captures(text)
        .ok_or_else(|| format!("expected YYYY-M-D, got {:?}", text))?;
    let num = |i: usize| caps[i].parse::<u32>().map_err(|e| e.to_string());
    let year = num(1)? as i32;
    let month = num(2)?;
    let day = num(3)?;

    if !(1..=12).contains(&month) {
        return Err(format!("month {} is out of range 1-12", month));
    }
    let max_day = match kind {
        CalendarKind::Lunar => MAX_LUNAR_DAY,
        CalendarKind::Solar => MAX_SOLAR_DAY,
    };
    if !(1..=max_day).contains(&day) {
        return Err(format!("day {} is out of range 1-{}", day, max_day));
    }

    let date = CalendarDate { year, month, day };
    if kind == CalendarKind::Solar {
        // Round-trip through the Gregorian calendar to catch Feb 30, Apr 31, ...
        let rebuilt = date.to_naive().map(CalendarDate::from);
        if rebuilt != Some(date) {
            return Err(format!("{} is not a valid solar date", date));
        }
    }
    Ok(date)
}

pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("unknown IANA timezone {:?}", name))
}

/// Calendar date of `now` as seen in `tz`, using the zone's own rules.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> CalendarDate {
    now.with_timezone(&tz).date_naive().into()
}

/// Local noon of a solar date in `tz`, as an absolute instant.
///
/// Noon sits far from midnight, so converting back and forth between
/// zones never moves the instant onto a neighbouring day.
pub fn noon_instant(date: CalendarDate, tz: Tz) -> Result<DateTime<FixedOffset>, String> {
    let naive = date
        .to_naive()
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .ok_or_else(|| format!("{} is not a valid solar date", date))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("{} 12:00 does not exist in {}", date, tz.name()))
}
