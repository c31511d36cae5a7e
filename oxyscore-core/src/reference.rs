//! Observational reference data.
//!
//! The reference is loaded once per run and shared read-only between the model
//! workers. On disk it is a TOML document:
//!
//! ```toml
//! [[upper_layer]]
//! time = "1990-07-01"
//! value = 5012.3
//!
//! [[lower_layer]]
//! time = "1990-07-01"
//! value = nan
//!
//! [[profile]]
//! depth = 100.0
//! value = 301.2
//!
//! [gas_exchange]
//! observed_mean = 17.4
//! literature_mean = 20.1
//! literature_std = 5.2
//! ```

use crate::errors::{ScoreError, ScoreResult};
use crate::profile::DepthProfile;
use crate::score::GasExchangeReference;
use crate::timeseries::{FloatValue, Time, Timeseries};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Spread of published Labrador Sea annual oxygen uptake estimates
pub const DEFAULT_LITERATURE_STD: FloatValue = 5.2;

fn default_literature_std() -> FloatValue {
    DEFAULT_LITERATURE_STD
}

/// Annual air-sea oxygen flux at the site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasExchangeObservations {
    /// Mean of the observational flux product, reported alongside the scores
    #[serde(default)]
    pub observed_mean: Option<FloatValue>,
    /// Literature value the model flux is scored against
    pub literature_mean: FloatValue,
    #[serde(default = "default_literature_std")]
    pub literature_std: FloatValue,
}

impl GasExchangeObservations {
    pub fn reference(&self) -> GasExchangeReference {
        GasExchangeReference {
            mean: self.literature_mean,
            std: self.literature_std,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SeriesEntry {
    time: Time,
    value: FloatValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ProfileEntry {
    depth: FloatValue,
    value: FloatValue,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReferenceFile {
    upper_layer: Vec<SeriesEntry>,
    lower_layer: Vec<SeriesEntry>,
    profile: Vec<ProfileEntry>,
    gas_exchange: GasExchangeObservations,
}

/// Observations every model is compared against
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDataset {
    upper_layer: Timeseries,
    lower_layer: Timeseries,
    profile: DepthProfile,
    gas_exchange: GasExchangeObservations,
}

impl ReferenceDataset {
    pub fn new(
        upper_layer: Timeseries,
        lower_layer: Timeseries,
        profile: DepthProfile,
        gas_exchange: GasExchangeObservations,
    ) -> ScoreResult<Self> {
        for (name, series) in [("upper layer", &upper_layer), ("lower layer", &lower_layer)] {
            if series.valid_count() < 2 {
                return Err(ScoreError::InvalidData(format!(
                    "the {name} observations need at least two defined values"
                )));
            }
        }
        if profile.is_empty() {
            return Err(ScoreError::InvalidData(
                "the observed profile has no depths".to_string(),
            ));
        }
        if !(gas_exchange.literature_std > 0.0) || gas_exchange.literature_mean.is_nan() {
            return Err(ScoreError::InvalidData(format!(
                "literature flux must have a defined mean and a positive standard deviation, got {} +/- {}",
                gas_exchange.literature_mean, gas_exchange.literature_std
            )));
        }
        Ok(Self {
            upper_layer,
            lower_layer,
            profile,
            gas_exchange,
        })
    }

    pub fn from_toml_str(text: &str) -> ScoreResult<Self> {
        let file: ReferenceFile = toml::from_str(text)?;
        let series = |entries: &[SeriesEntry]| {
            Timeseries::from_pairs(entries.iter().map(|e| (e.time, e.value)))
        };
        let dataset = Self::new(
            series(&file.upper_layer)?,
            series(&file.lower_layer)?,
            DepthProfile::from_pairs(file.profile.iter().map(|e| (e.depth, e.value)))?,
            file.gas_exchange,
        )?;
        info!(
            "Loaded reference data: {} upper-layer and {} lower-layer values, {} profile depths",
            dataset.upper_layer.len(),
            dataset.lower_layer.len(),
            dataset.profile.len()
        );
        Ok(dataset)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ScoreResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Annual Labrador Sea Water oxygen inventory
    pub fn upper_layer(&self) -> &Timeseries {
        &self.upper_layer
    }

    /// Annual deep-water oxygen inventory
    pub fn lower_layer(&self) -> &Timeseries {
        &self.lower_layer
    }

    pub fn profile(&self) -> &DepthProfile {
        &self.profile
    }

    pub fn gas_exchange(&self) -> &GasExchangeObservations {
        &self.gas_exchange
    }
}
