//! Python bindings.
//!
//! ```python
//! from oxyscore._lib.core import FieldStore, ReferenceDataset, ScoringConfig, compute_scores
//!
//! store = FieldStore()
//! store.add_concentration("CanESM5", o2, time, "days since 1850-01-01", depth, depth_bnds, lat, lon)
//! store.add_flux("CanESM5", fgo2, time, "days since 1850-01-01", lat, lon)
//!
//! report = compute_scores(store, ScoringConfig(), ReferenceDataset.from_file("reference.toml"))
//! report["scores"]["CanESM5"]["components"]
//! ```

mod fields;

use crate::config::{ModelConfig, ScoringConfig};
use crate::errors::ScoreError;
use crate::pipeline::ScoringPipeline;
use crate::profile::DepthProfile;
use crate::reference::{GasExchangeObservations, ReferenceDataset, DEFAULT_LITERATURE_STD};
use crate::timeseries::{FloatValue, Time, Timeseries};
use numpy::PyReadonlyArray1;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pythonize::{depythonize, pythonize};
use std::str::FromStr;

pub use fields::PyFieldStore;

impl From<ScoreError> for PyErr {
    fn from(error: ScoreError) -> Self {
        match error {
            ScoreError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// Scoring constants
///
/// Parameters
/// ----------
/// parameters : dict, optional
///     Overrides of the default constants, using the same keys as the TOML
///     configuration.
#[pyclass]
#[pyo3(name = "ScoringConfig")]
#[derive(Debug, Clone)]
pub struct PyScoringConfig(pub ScoringConfig);

#[pymethods]
impl PyScoringConfig {
    #[new]
    #[pyo3(signature = (parameters=None))]
    fn new(parameters: Option<Bound<'_, PyAny>>) -> PyResult<Self> {
        let config = match parameters {
            Some(parameters) => depythonize::<ScoringConfig>(&parameters)?,
            None => ScoringConfig::default(),
        };
        config.validate()?;
        Ok(Self(config))
    }

    #[staticmethod]
    fn from_toml(text: &str) -> PyResult<Self> {
        Ok(Self(ScoringConfig::from_toml_str(text)?))
    }

    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        Ok(Self(ScoringConfig::from_path(path)?))
    }

    #[getter]
    fn layer_threshold(&self) -> FloatValue {
        self.0.layer_threshold
    }

    #[getter]
    fn max_backfill_days(&self) -> i64 {
        self.0.max_backfill_days
    }

    /// All constants as a dict
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        Ok(pythonize(py, &self.0)?)
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.0)
    }
}

fn parse_dates(values: &[String]) -> PyResult<Vec<Time>> {
    values
        .iter()
        .map(|value| {
            Time::from_str(value)
                .map_err(|e| PyValueError::new_err(format!("invalid date '{value}': {e}")))
        })
        .collect()
}

/// Observations the models are scored against
#[pyclass]
#[pyo3(name = "ReferenceDataset")]
#[derive(Debug, Clone)]
pub struct PyReferenceDataset(pub ReferenceDataset);

#[pymethods]
impl PyReferenceDataset {
    /// Build from arrays. Dates are ISO strings (``"1990-07-01"``).
    #[new]
    #[pyo3(signature = (
        upper_times, upper_values, lower_times, lower_values, profile_depths, profile_values,
        literature_mean, literature_std=DEFAULT_LITERATURE_STD, observed_mean=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        upper_times: Vec<String>,
        upper_values: PyReadonlyArray1<'_, FloatValue>,
        lower_times: Vec<String>,
        lower_values: PyReadonlyArray1<'_, FloatValue>,
        profile_depths: PyReadonlyArray1<'_, FloatValue>,
        profile_values: PyReadonlyArray1<'_, FloatValue>,
        literature_mean: FloatValue,
        literature_std: FloatValue,
        observed_mean: Option<FloatValue>,
    ) -> PyResult<Self> {
        let upper = Timeseries::new(parse_dates(&upper_times)?, upper_values.as_array().to_owned())?;
        let lower = Timeseries::new(parse_dates(&lower_times)?, lower_values.as_array().to_owned())?;
        let profile = DepthProfile::new(
            profile_depths.as_array().to_owned(),
            profile_values.as_array().to_owned(),
        )?;
        let dataset = ReferenceDataset::new(
            upper,
            lower,
            profile,
            GasExchangeObservations {
                observed_mean,
                literature_mean,
                literature_std,
            },
        )?;
        Ok(Self(dataset))
    }

    #[staticmethod]
    fn from_toml(text: &str) -> PyResult<Self> {
        Ok(Self(ReferenceDataset::from_toml_str(text)?))
    }

    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        Ok(Self(ReferenceDataset::from_path(path)?))
    }

    #[getter]
    fn literature_mean(&self) -> FloatValue {
        self.0.gas_exchange().literature_mean
    }

    #[getter]
    fn literature_std(&self) -> FloatValue {
        self.0.gas_exchange().literature_std
    }
}

/// Score every model in ``store`` (or only ``models``, a list of dicts with an
/// ``id`` and optional ``time_units_override`` and ``longitude_convention``).
///
/// Returns a dict with the per-model ``scores`` and the ``failures``.
#[pyfunction]
#[pyo3(signature = (store, config, reference, models=None))]
fn compute_scores<'py>(
    py: Python<'py>,
    store: &PyFieldStore,
    config: &PyScoringConfig,
    reference: &PyReferenceDataset,
    models: Option<Bound<'py, PyAny>>,
) -> PyResult<Bound<'py, PyAny>> {
    let models: Vec<ModelConfig> = match models {
        Some(models) => depythonize(&models)?,
        None => store
            .0
            .model_ids()
            .iter()
            .map(|id| ModelConfig::new(id))
            .collect(),
    };
    let pipeline = ScoringPipeline::new(config.0.clone(), reference.0.clone())?;
    let report = py.allow_threads(|| pipeline.compute_scores(&store.0, &models));
    Ok(pythonize(py, &report)?)
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyScoringConfig>()?;
    m.add_class::<PyReferenceDataset>()?;
    m.add_class::<PyFieldStore>()?;
    m.add_function(wrap_pyfunction!(compute_scores, m)?)?;
    Ok(())
}
