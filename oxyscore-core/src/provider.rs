//! Source of gridded model output.
//!
//! Fetching data (from disk, a catalogue or a remote server) happens outside
//! this crate. A [`DataProvider`] hands over one freshly loaded field per call
//! and the pipeline drops it as soon as the derived series exist.

use crate::config::ModelConfig;
use crate::errors::{ScoreError, ScoreResult};
use crate::grid::{ConcentrationField, FluxField};
use crate::table::ModelId;
use std::collections::HashMap;

/// Supplies the oxygen fields of each model.
///
/// Implementations are shared between the worker threads of a batch.
pub trait DataProvider: Send + Sync {
    /// Dissolved oxygen on `(time, depth, lat, lon)` (mol m-3)
    fn fetch_concentration(&self, model: &ModelConfig) -> ScoreResult<ConcentrationField>;

    /// Air-sea oxygen flux on `(time, lat, lon)` (mol m-2 s-1)
    fn fetch_flux(&self, model: &ModelConfig) -> ScoreResult<FluxField>;
}

/// Provider backed by fields already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    concentration: HashMap<ModelId, ConcentrationField>,
    flux: HashMap<ModelId, FluxField>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_concentration(&mut self, model: &str, field: ConcentrationField) {
        self.concentration.insert(model.to_string(), field);
    }

    pub fn insert_flux(&mut self, model: &str, field: FluxField) {
        self.flux.insert(model.to_string(), field);
    }

    pub fn with_model(mut self, model: &str, concentration: ConcentrationField, flux: FluxField) -> Self {
        self.insert_concentration(model, concentration);
        self.insert_flux(model, flux);
        self
    }

    /// Models with at least one field
    pub fn model_ids(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self
            .concentration
            .keys()
            .chain(self.flux.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn unavailable(model: &ModelConfig, variable: &str) -> ScoreError {
    ScoreError::DataUnavailable {
        model: model.id.clone(),
        reason: format!("no {variable} field loaded"),
    }
}

impl DataProvider for InMemoryProvider {
    fn fetch_concentration(&self, model: &ModelConfig) -> ScoreResult<ConcentrationField> {
        self.concentration
            .get(&model.id)
            .cloned()
            .ok_or_else(|| unavailable(model, "concentration"))
    }

    fn fetch_flux(&self, model: &ModelConfig) -> ScoreResult<FluxField> {
        self.flux
            .get(&model.id)
            .cloned()
            .ok_or_else(|| unavailable(model, "flux"))
    }
}
