//! Decoding of CF-convention time axes.
//!
//! Model output stores time as a number of units since a reference instant,
//! e.g. `"days since 1850-01-01 00:00:00"`, interpreted in one of the CF
//! calendars. Decoded timestamps are truncated to the calendar day.
//!
//! Dates that exist in a model calendar but not in the Gregorian calendar
//! (30 February in a `360_day` calendar, 29 February of a non-leap year in an
//! `all_leap` calendar) are clamped to the last valid day of that month. Only
//! the year and month of model timestamps matter downstream.

use crate::errors::{ScoreError, ScoreResult};
use crate::timeseries::Time;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: f64 = 86_400.0;
const NOLEAP_MONTH_DAYS: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const ALL_LEAP_MONTH_DAYS: [i64; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// CF calendar of a model time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Calendar {
    /// Mixed or proleptic Gregorian calendar
    #[default]
    #[serde(rename = "standard", alias = "gregorian", alias = "proleptic_gregorian")]
    Standard,
    /// Every year has 365 days
    #[serde(rename = "noleap", alias = "365_day")]
    NoLeap,
    /// Every year has 366 days
    #[serde(rename = "all_leap", alias = "366_day")]
    AllLeap,
    /// Twelve months of 30 days
    #[serde(rename = "360_day")]
    Day360,
}

impl FromStr for Calendar {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Standard),
            "noleap" | "no_leap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "allleap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            other => Err(ScoreError::TimeUnits {
                units: other.to_string(),
                reason: "unsupported calendar".to_string(),
            }),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Standard => write!(f, "standard"),
            Calendar::NoLeap => write!(f, "noleap"),
            Calendar::AllLeap => write!(f, "all_leap"),
            Calendar::Day360 => write!(f, "360_day"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Days => SECONDS_PER_DAY,
        }
    }
}

/// A parsed `"<unit> since <reference>"` string
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    unit: TimeUnit,
    origin: NaiveDateTime,
    text: String,
}

impl TimeUnits {
    pub fn parse(units: &str) -> ScoreResult<Self> {
        let invalid = |reason: &str| ScoreError::TimeUnits {
            units: units.to_string(),
            reason: reason.to_string(),
        };

        let lowered = units.trim().to_lowercase();
        let (unit, reference) = lowered
            .split_once(" since ")
            .ok_or_else(|| invalid("expected '<unit> since <date>'"))?;

        let unit = match unit.trim() {
            "second" | "seconds" | "sec" | "secs" | "s" => TimeUnit::Seconds,
            "minute" | "minutes" | "min" | "mins" => TimeUnit::Minutes,
            "hour" | "hours" | "hr" | "hrs" | "h" => TimeUnit::Hours,
            "day" | "days" | "d" => TimeUnit::Days,
            _ => return Err(invalid("unknown time unit")),
        };

        let reference = reference.trim();
        let (date, rest) = reference
            .split_once(|c: char| c == ' ' || c == 't')
            .unwrap_or((reference, ""));
        let date = parse_date(date).ok_or_else(|| invalid("malformed reference date"))?;
        let time = match rest.split_whitespace().next().map(|s| s.trim_end_matches('z')) {
            None | Some("utc") | Some("") => NaiveTime::MIN,
            Some(s) => parse_time(s).ok_or_else(|| invalid("malformed reference time"))?,
        };

        Ok(Self {
            unit,
            origin: NaiveDateTime::new(date, time),
            text: units.trim().to_string(),
        })
    }

    pub fn origin(&self) -> NaiveDateTime {
        self.origin
    }

    /// Decode a single offset into a calendar date
    pub fn decode(&self, value: f64, calendar: Calendar) -> ScoreResult<Time> {
        if !value.is_finite() {
            return Err(ScoreError::TimeUnits {
                units: self.text.clone(),
                reason: format!("non-finite time value {value}"),
            });
        }
        let seconds =
            value * self.unit.seconds() + self.origin.time().num_seconds_from_midnight() as f64;
        let days = (seconds / SECONDS_PER_DAY).floor() as i64;
        let origin = self.origin.date();

        let decoded = match calendar {
            Calendar::Standard => {
                TimeDelta::try_days(days).and_then(|delta| origin.checked_add_signed(delta))
            }
            Calendar::NoLeap => add_days_fixed_year(origin, days, &NOLEAP_MONTH_DAYS),
            Calendar::AllLeap => add_days_fixed_year(origin, days, &ALL_LEAP_MONTH_DAYS),
            Calendar::Day360 => add_days_360(origin, days),
        };

        decoded.ok_or_else(|| ScoreError::TimeUnits {
            units: self.text.clone(),
            reason: format!("time value {value} is out of the representable range"),
        })
    }
}

/// Decode a whole time axis
pub fn decode_times(values: &[f64], units: &str, calendar: Calendar) -> ScoreResult<Vec<Time>> {
    let units = TimeUnits::parse(units)?;
    values.iter().map(|v| units.decode(*v, calendar)).collect()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let mut fields = s.splitn(3, '-');
    let year = fields.next()?.parse::<i32>().ok()?;
    let month = fields.next()?.parse::<u32>().ok()?;
    let day = fields.next()?.parse::<u32>().ok()?;
    clamped_date(year, month, day)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let mut fields = s.splitn(3, ':');
    let hour = fields.next()?.parse::<u32>().ok()?;
    let minute = fields.next().map_or(Some(0), |f| f.parse::<u32>().ok())?;
    let second = fields.next().map_or(Some(0.0), |f| f.parse::<f64>().ok())?;
    NaiveTime::from_hms_opt(hour, minute, second.floor() as u32)
}

/// Gregorian date for a model-calendar date, moving days past month end back
/// onto the last valid day of the month.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) || day == 0 {
        return None;
    }
    (1..=day.min(31))
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

fn add_days_fixed_year(origin: NaiveDate, days: i64, month_days: &[i64; 12]) -> Option<NaiveDate> {
    let year_length: i64 = month_days.iter().sum();
    let origin_day_of_year = month_days[..origin.month0() as usize].iter().sum::<i64>()
        + origin.day0() as i64;

    let total = origin_day_of_year.checked_add(days)?;
    let year = origin.year() as i64 + total.div_euclid(year_length);
    let mut remainder = total.rem_euclid(year_length);

    let mut month = 0;
    while remainder >= month_days[month] {
        remainder -= month_days[month];
        month += 1;
    }
    clamped_date(i32::try_from(year).ok()?, month as u32 + 1, remainder as u32 + 1)
}

fn add_days_360(origin: NaiveDate, days: i64) -> Option<NaiveDate> {
    let origin_day_of_year = origin.month0() as i64 * 30 + (origin.day0() as i64).min(29);
    let total = origin_day_of_year.checked_add(days)?;
    let year = origin.year() as i64 + total.div_euclid(360);
    let remainder = total.rem_euclid(360);
    clamped_date(
        i32::try_from(year).ok()?,
        (remainder / 30) as u32 + 1,
        (remainder % 30) as u32 + 1,
    )
}
