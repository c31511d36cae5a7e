//! Alignment of model timeseries onto the observational time index.
//!
//! Model output is first reduced to calendar-year means labelled on 31 December.
//! Observational annual values are labelled mid-year (1 July), so each
//! observation timestamp takes the first annual label on or after it. The
//! result is the model mean of the same calendar year, within about six months
//! of the observation label.

use crate::errors::ScoreResult;
use crate::timeseries::{nan_mean, FloatValue, Time, Timeseries};
use chrono::{Datelike, NaiveDate};
use log::debug;
use ndarray::Array1;

/// Largest distance (days) between an observation and the annual label that covers it
pub const DEFAULT_MAX_BACKFILL_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalAligner {
    max_backfill_days: i64,
}

impl Default for TemporalAligner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKFILL_DAYS)
    }
}

impl TemporalAligner {
    pub fn new(max_backfill_days: i64) -> Self {
        Self { max_backfill_days }
    }

    /// Annual means of `raw` reindexed onto `index`
    pub fn align(&self, raw: &Timeseries, index: &[Time]) -> ScoreResult<Timeseries> {
        let annual = annual_means(raw)?;
        let aligned = self.backfill(&annual, index)?;
        debug!(
            "Aligned {} raw values to {} annual means, {} of {} observation times covered",
            raw.len(),
            annual.len(),
            aligned.valid_count(),
            index.len()
        );
        Ok(aligned)
    }

    /// Take, for every time in `index`, the value at the first label of `series`
    /// on or after it. Times with no such label within the backfill limit are
    /// missing.
    pub fn backfill(&self, series: &Timeseries, index: &[Time]) -> ScoreResult<Timeseries> {
        let labels = series.times();
        let values = index
            .iter()
            .map(|time| {
                let next = labels.partition_point(|label| label < time);
                match labels.get(next) {
                    Some(label) if (*label - *time).num_days() <= self.max_backfill_days => {
                        series.values()[next]
                    }
                    _ => FloatValue::NAN,
                }
            })
            .collect::<Array1<_>>();
        Timeseries::new(index.to_vec(), values)
    }
}

/// Calendar-year means labelled on 31 December.
///
/// Every year between the first and the last timestamp gets a label. Years
/// without any defined value are missing.
pub fn annual_means(raw: &Timeseries) -> ScoreResult<Timeseries> {
    let (first, last) = match (raw.times().first(), raw.times().last()) {
        (Some(first), Some(last)) => (first.year(), last.year()),
        _ => return Timeseries::new(vec![], Array1::zeros(0)),
    };

    let pairs = (first..=last).filter_map(|year| {
        let label = NaiveDate::from_ymd_opt(year, 12, 31)?;
        let mean = nan_mean(raw.iter().filter(|(t, _)| t.year() == year).map(|(_, v)| v));
        Some((label, mean.unwrap_or(FloatValue::NAN)))
    });
    Timeseries::from_pairs(pairs)
}
