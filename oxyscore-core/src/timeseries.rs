//! Dated scalar timeseries with missing values.
//!
//! Missing values are stored as `NaN`. Timestamps are calendar dates and must be
//! strictly increasing, so two series can only be combined after checking that
//! their indices are identical (see [`Timeseries::has_same_index`]).

use crate::errors::{ScoreError, ScoreResult};
use chrono::{Datelike, NaiveDate};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
pub type Time = NaiveDate;

/// An ordered sequence of `(timestamp, value)` pairs.
///
/// Deserialisation goes through [`Timeseries::new`], so a serialised series
/// with unsorted timestamps is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeseries")]
pub struct Timeseries {
    times: Vec<Time>,
    values: Array1<FloatValue>,
}

#[derive(Deserialize)]
struct RawTimeseries {
    times: Vec<Time>,
    values: Array1<FloatValue>,
}

impl TryFrom<RawTimeseries> for Timeseries {
    type Error = ScoreError;

    fn try_from(raw: RawTimeseries) -> ScoreResult<Self> {
        Timeseries::new(raw.times, raw.values)
    }
}

impl Timeseries {
    /// Create a timeseries, validating that `times` is strictly increasing and
    /// has the same length as `values`.
    pub fn new(times: Vec<Time>, values: Array1<FloatValue>) -> ScoreResult<Self> {
        if times.len() != values.len() {
            return Err(ScoreError::InvalidData(format!(
                "timeseries has {} timestamps but {} values",
                times.len(),
                values.len()
            )));
        }
        if let Some(pair) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ScoreError::InvalidData(format!(
                "timestamps must be strictly increasing ({} is followed by {})",
                pair[0], pair[1]
            )));
        }
        Ok(Self { times, values })
    }

    /// Build from an index that is already known to be valid, such as one taken
    /// from another timeseries.
    pub(crate) fn from_validated(times: Vec<Time>, values: Array1<FloatValue>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self { times, values }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Time, FloatValue)>) -> ScoreResult<Self> {
        let (times, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self::new(times, Array1::from(values))
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn values(&self) -> &Array1<FloatValue> {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Time, FloatValue)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Value stored at exactly `time`, if that timestamp is in the index
    pub fn value_at(&self, time: Time) -> Option<FloatValue> {
        self.times
            .binary_search(&time)
            .ok()
            .map(|index| self.values[index])
    }

    /// Number of defined (non-NaN) values
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Whether both series share exactly the same timestamps
    pub fn has_same_index(&self, other: &Timeseries) -> bool {
        self.times == other.times
    }

    /// Sub-series with timestamps inside `window`
    pub fn within(&self, window: DateWindow) -> Timeseries {
        let (times, values): (Vec<_>, Vec<_>) =
            self.iter().filter(|(t, _)| window.contains(*t)).unzip();
        Timeseries {
            times,
            values: Array1::from(values),
        }
    }

    /// Mean of the defined values, `None` if every value is missing
    pub fn mean(&self) -> Option<FloatValue> {
        nan_mean(self.values.iter().copied())
    }
}

/// Closed calendar-date interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Time,
    pub end: Time,
}

impl DateWindow {
    pub fn new(start: Time, end: Time) -> ScoreResult<Self> {
        if start > end {
            return Err(ScoreError::InvalidData(format!(
                "window start {start} is after its end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: Time) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Closed range of calendar years `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: Time) -> bool {
        (self.start..=self.end).contains(&time.year())
    }
}

/// Mean of the non-NaN items, `None` when there are none.
pub(crate) fn nan_mean(values: impl Iterator<Item = FloatValue>) -> Option<FloatValue> {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as FloatValue)
    }
}
