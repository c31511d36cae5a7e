//! Observed and modelled series sharing one time index.
//!
//! A [`ComparisonTable`] starts from the observational series and grows one
//! model column at a time. Adding a column consumes the table and returns a new
//! one, so a batch of models is combined with a plain fold and no table is ever
//! mutated in place.

use crate::errors::{ScoreError, ScoreResult};
use crate::timeseries::{FloatValue, Time, Timeseries};
use ndarray::Array1;
use std::collections::BTreeMap;

/// Identifier of a model, e.g. `"MPI-ESM1-2-LR"`
pub type ModelId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    index: Vec<Time>,
    observed: Array1<FloatValue>,
    models: BTreeMap<ModelId, Array1<FloatValue>>,
}

impl ComparisonTable {
    pub fn new(observed: &Timeseries) -> Self {
        Self {
            index: observed.times().to_vec(),
            observed: observed.values().clone(),
            models: BTreeMap::new(),
        }
    }

    /// Add a model column. The series must use exactly the table index.
    pub fn with_column(mut self, model: &str, series: &Timeseries) -> ScoreResult<Self> {
        if series.times() != self.index.as_slice() {
            return Err(ScoreError::IndexMismatch {
                left: self.index.len(),
                right: series.len(),
            });
        }
        self.models
            .insert(model.to_string(), series.values().clone());
        Ok(self)
    }

    pub fn index(&self) -> &[Time] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &ModelId> {
        self.models.keys()
    }

    pub fn observed(&self) -> Timeseries {
        self.to_series(&self.observed)
    }

    pub fn model(&self, model: &str) -> Option<Timeseries> {
        self.models.get(model).map(|values| self.to_series(values))
    }

    /// Keep only the rows where the observation and every model are defined
    pub fn complete_rows(&self) -> ComparisonTable {
        let keep: Vec<usize> = (0..self.index.len())
            .filter(|row| {
                !self.observed[*row].is_nan() && self.models.values().all(|c| !c[*row].is_nan())
            })
            .collect();
        let select = |values: &Array1<FloatValue>| -> Array1<FloatValue> {
            keep.iter().map(|row| values[*row]).collect()
        };

        ComparisonTable {
            index: keep.iter().map(|row| self.index[*row]).collect(),
            observed: select(&self.observed),
            models: self
                .models
                .iter()
                .map(|(id, values)| (id.clone(), select(values)))
                .collect(),
        }
    }

    /// Subtract each column's mean from that column
    pub fn anomalies(&self) -> ComparisonTable {
        ComparisonTable {
            index: self.index.clone(),
            observed: remove_mean(&self.observed),
            models: self
                .models
                .iter()
                .map(|(id, values)| (id.clone(), remove_mean(values)))
                .collect(),
        }
    }

    fn to_series(&self, values: &Array1<FloatValue>) -> Timeseries {
        Timeseries::from_validated(self.index.clone(), values.clone())
    }
}

fn remove_mean(values: &Array1<FloatValue>) -> Array1<FloatValue> {
    match values.mean() {
        Some(mean) => values - mean,
        None => values.clone(),
    }
}
