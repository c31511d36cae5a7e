//! Batch scoring of models against the reference data.
//!
//! Scoring happens in two passes:
//!
//! 1. Extraction, one model at a time and in parallel. Each model's fields are
//!    fetched, reduced to a handful of series at the site and dropped.
//! 2. Comparison. The aligned layer series of all extracted models are folded
//!    into one table per layer. Rows where the observations or any model are
//!    missing are removed from the whole table before anomalies are taken, so
//!    every model is compared over the same years.
//!
//! A failure while extracting a model removes only that model. A failure while
//! scoring removes only the affected components.
//!
//! # Examples
//!
//! Scoring signals that reproduce the observations:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use ndarray::array;
//! use oxyscore_core::config::ScoringConfig;
//! use oxyscore_core::pipeline::{ModelSignals, ScoringPipeline};
//! use oxyscore_core::profile::DepthProfile;
//! use oxyscore_core::reference::{GasExchangeObservations, ReferenceDataset};
//! use oxyscore_core::timeseries::Timeseries;
//! use std::collections::BTreeMap;
//!
//! let annual = |f: fn(f64) -> f64| {
//!     Timeseries::from_pairs((1990..2010).map(|year| {
//!         let date = NaiveDate::from_ymd_opt(year, 7, 1).unwrap();
//!         (date, f(year as f64))
//!     }))
//!     .unwrap()
//! };
//! let reference = ReferenceDataset::new(
//!     annual(|y| 5000.0 + 50.0 * (y * 0.7).sin()),
//!     annual(|y| 7000.0 + 20.0 * (y * 1.3).cos()),
//!     DepthProfile::new(array![500.0, 2500.0], array![290.0, 280.0]).unwrap(),
//!     GasExchangeObservations {
//!         observed_mean: None,
//!         literature_mean: 20.0,
//!         literature_std: 5.2,
//!     },
//! )
//! .unwrap();
//!
//! let signals = ModelSignals {
//!     upper: reference.upper_layer().clone(),
//!     lower: reference.lower_layer().clone(),
//!     profile: Ok(reference.profile().clone()),
//!     mean_flux: Ok(20.0),
//! };
//! let pipeline = ScoringPipeline::new(ScoringConfig::default(), reference).unwrap();
//! let report = pipeline.score_signals(BTreeMap::from([("perfect".to_string(), signals)]));
//!
//! assert_eq!(report.total("perfect"), Some(100.0));
//! assert!(report.failures.is_empty());
//! ```

use crate::align::TemporalAligner;
use crate::config::{ModelConfig, ScoringConfig};
use crate::errors::{ScoreError, ScoreResult};
use crate::layers::{mean_annual_flux, mean_profile, LayerAggregator};
use crate::profile::DepthProfile;
use crate::provider::DataProvider;
use crate::reference::ReferenceDataset;
use crate::sampler::GridSampler;
use crate::score::{
    correlation_score, extremum_score, gas_exchange_score, profile_score, variability_score,
    ModelScore, ScoreComponent,
};
use crate::table::{ComparisonTable, ModelId};
use crate::timeseries::{FloatValue, Timeseries};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Everything the scores need from one model
#[derive(Debug)]
pub struct ModelSignals {
    /// Upper-layer inventory on the observational upper-layer index
    pub upper: Timeseries,
    /// Lower-layer inventory on the observational lower-layer index
    pub lower: Timeseries,
    /// Mean profile on the observed depths
    pub profile: ScoreResult<DepthProfile>,
    /// Annual air-sea flux
    pub mean_flux: ScoreResult<FloatValue>,
}

/// Why a model has no score at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub kind: String,
    pub message: String,
}

impl From<&ScoreError> for ModelFailure {
    fn from(error: &ScoreError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Scores of every model that could be extracted plus the failures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub scores: BTreeMap<ModelId, ModelScore>,
    pub failures: BTreeMap<ModelId, ModelFailure>,
    /// Annual flux of each model at the site
    pub mean_flux: BTreeMap<ModelId, FloatValue>,
    /// Mean of the observational flux product, when known
    pub observed_mean_flux: Option<FloatValue>,
}

impl ScoreReport {
    pub fn total(&self, model: &str) -> Option<FloatValue> {
        self.scores.get(model).map(ModelScore::total)
    }

    /// Model ids ordered from best to worst total
    pub fn ranking(&self) -> Vec<(ModelId, FloatValue)> {
        let mut ranking: Vec<(ModelId, FloatValue)> = self
            .scores
            .iter()
            .map(|(id, score)| (id.clone(), score.total()))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranking
    }
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .scores
            .keys()
            .chain(self.failures.keys())
            .map(|id| id.len())
            .max()
            .unwrap_or(0)
            .max("model".len());

        write!(f, "{:<width$}", "model")?;
        for component in ScoreComponent::ALL {
            write!(f, " {:>18}", component.to_string())?;
        }
        writeln!(f, " {:>8}", "total")?;

        for (id, score) in &self.scores {
            write!(f, "{id:<width$}")?;
            for component in ScoreComponent::ALL {
                match score.get(component) {
                    Some(value) => write!(f, " {value:>18.1}")?,
                    None => write!(f, " {:>18}", "-")?,
                }
            }
            writeln!(f, " {:>8.1}", score.total())?;
        }
        for (id, failure) in &self.failures {
            writeln!(f, "{id:<width$} failed ({}): {}", failure.kind, failure.message)?;
        }
        Ok(())
    }
}

/// Scores models against one reference dataset
#[derive(Debug, Clone)]
pub struct ScoringPipeline {
    config: ScoringConfig,
    reference: ReferenceDataset,
}

impl ScoringPipeline {
    pub fn new(config: ScoringConfig, reference: ReferenceDataset) -> ScoreResult<Self> {
        config.validate()?;
        Ok(Self { config, reference })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceDataset {
        &self.reference
    }

    fn layers(&self) -> LayerAggregator {
        LayerAggregator::new(self.config.layer_threshold)
            .with_inventory_factor(self.config.inventory_factor)
    }

    /// Reduce one model's fields to the series used for scoring
    pub fn extract(
        &self,
        provider: &dyn DataProvider,
        model: &ModelConfig,
    ) -> ScoreResult<ModelSignals> {
        let sampler = GridSampler::new(self.config.site).with_convention(model.longitude_convention);
        let units_override = model.time_units_override.as_deref();
        let window = self.config.reference_window;

        let (inventories, profile) = {
            let field = provider.fetch_concentration(model)?;
            let times = field.time.decode(units_override)?;
            let column = sampler.sample_column(&field)?;
            debug!(
                "{}: sampled {} times x {} levels of {}",
                model.id,
                times.len(),
                field.depth.len(),
                field.units
            );
            let inventories = self.layers().integrate(&times, &column, &field.depth)?;
            let profile = mean_profile(
                &times,
                &column,
                &field.depth,
                window,
                self.config.profile_unit_factor,
                self.reference.profile().depths(),
            );
            (inventories, profile)
        };

        let mean_flux = {
            let field = provider.fetch_flux(model)?;
            let times = field.time.decode(units_override)?;
            let flux = sampler.sample_point(&field)?;
            mean_annual_flux(&times, &flux, window, self.config.seconds_per_year)
        };

        let aligner = TemporalAligner::new(self.config.max_backfill_days);
        Ok(ModelSignals {
            upper: aligner.align(&inventories.upper, self.reference.upper_layer().times())?,
            lower: aligner.align(&inventories.lower, self.reference.lower_layer().times())?,
            profile,
            mean_flux,
        })
    }

    /// Extract and score a batch of models
    pub fn compute_scores(
        &self,
        provider: &dyn DataProvider,
        models: &[ModelConfig],
    ) -> ScoreReport {
        info!("Scoring {} models", models.len());

        let extracted: Vec<(ModelId, ScoreResult<ModelSignals>)> = models
            .par_iter()
            .map(|model| (model.id.clone(), self.extract(provider, model)))
            .collect();

        let mut signals = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for (id, result) in extracted {
            match result {
                Ok(s) => {
                    if signals.insert(id.clone(), s).is_some() {
                        warn!("Model {id} was requested more than once, keeping the last result");
                    }
                }
                Err(e) => {
                    warn!("Model {id} could not be extracted: {e}");
                    failures.insert(id, ModelFailure::from(&e));
                }
            }
        }

        let mut report = self.score_signals(signals);
        report.failures.extend(failures);
        report
    }

    /// Score already extracted models against each other and the observations
    pub fn score_signals(&self, signals: BTreeMap<ModelId, ModelSignals>) -> ScoreReport {
        let upper = joint_anomalies(
            self.reference.upper_layer(),
            signals.iter().map(|(id, s)| (id, &s.upper)),
        );
        let lower = joint_anomalies(
            self.reference.lower_layer(),
            signals.iter().map(|(id, s)| (id, &s.lower)),
        );
        for (name, table) in [("upper", &upper), ("lower", &lower)] {
            match table {
                Ok(table) => debug!("{name} layer compared over {} common years", table.len()),
                Err(e) => warn!("{name} layer cannot be compared: {e}"),
            }
        }

        let mut report = ScoreReport {
            observed_mean_flux: self.reference.gas_exchange().observed_mean,
            ..ScoreReport::default()
        };
        for (id, s) in signals {
            if let Ok(flux) = &s.mean_flux {
                report.mean_flux.insert(id.clone(), *flux);
            }
            let score = self.score_model(&id, s, &upper, &lower);
            info!(
                "{id}: total {:.1}{}",
                score.total(),
                if score.is_complete() { "" } else { " (incomplete)" }
            );
            report.scores.insert(id, score);
        }
        report
    }

    fn score_model(
        &self,
        id: &str,
        signals: ModelSignals,
        upper: &ScoreResult<ComparisonTable>,
        lower: &ScoreResult<ComparisonTable>,
    ) -> ModelScore {
        let config = &self.config;
        let mut score = ModelScore::default();

        score.record(
            ScoreComponent::Correlation,
            anomaly_pair(upper, id).and_then(|(m, o)| correlation_score(&m, &o)),
        );
        score.record(
            ScoreComponent::ExtremumRatio,
            anomaly_pair(upper, id).and_then(|(m, o)| {
                extremum_score(&m, &o, config.extremum_windows, config.extremum_clamp)
            }),
        );
        score.record(
            ScoreComponent::VariabilityRatio,
            anomaly_pair(lower, id)
                .and_then(|(m, o)| variability_score(&m, &o, config.variability_clamp)),
        );
        score.record_profile(
            signals
                .profile
                .and_then(|p| profile_score(&p, self.reference.profile(), &self.layers())),
        );
        score.record(
            ScoreComponent::GasExchange,
            signals
                .mean_flux
                .and_then(|f| gas_exchange_score(f, self.reference.gas_exchange().reference())),
        );

        for (component, reason) in &score.undefined {
            warn!("{id}: {component} score undefined: {reason}");
        }
        score
    }
}

/// Fewest joint rows the anomaly statistics are defined on
const MIN_OVERLAP: usize = 2;

/// Number of rows where both series are defined
fn overlap(observed: &Timeseries, model: &Timeseries) -> usize {
    observed
        .values()
        .iter()
        .zip(model.values().iter())
        .filter(|(o, m)| !o.is_nan() && !m.is_nan())
        .count()
}

/// Mean-removed table of the rows every overlapping model has in common with
/// the observations.
///
/// A model sharing fewer than [`MIN_OVERLAP`] rows with the observations is
/// left out, so it cannot shrink the comparison of the others below that
/// minimum. Its anomalies are then missing from the table.
fn joint_anomalies<'a>(
    observed: &Timeseries,
    columns: impl Iterator<Item = (&'a ModelId, &'a Timeseries)>,
) -> ScoreResult<ComparisonTable> {
    let table = columns
        .filter(|(id, series)| {
            let common = overlap(observed, series);
            if common < MIN_OVERLAP {
                warn!("Model {id} has only {common} observation times with data");
            }
            common >= MIN_OVERLAP
        })
        .try_fold(ComparisonTable::new(observed), |table, (id, series)| {
            table.with_column(id, series)
        })?;

    let complete = table.complete_rows();
    if complete.len() < MIN_OVERLAP {
        return Err(ScoreError::InsufficientOverlap(format!(
            "{} of {} observation times are defined for every model",
            complete.len(),
            table.len()
        )));
    }
    Ok(complete.anomalies())
}

/// Model and observed anomalies of one model
fn anomaly_pair(
    table: &ScoreResult<ComparisonTable>,
    id: &str,
) -> ScoreResult<(Timeseries, Timeseries)> {
    let table = table
        .as_ref()
        .map_err(|e| ScoreError::InsufficientOverlap(e.to_string()))?;
    let model = table.model(id).ok_or_else(|| {
        ScoreError::InsufficientOverlap(format!(
            "model {id} has fewer than {MIN_OVERLAP} observation times with data"
        ))
    })?;
    Ok((model, table.observed()))
}
