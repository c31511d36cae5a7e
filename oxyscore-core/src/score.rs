//! Scoring of a model against observations.
//!
//! Five sub-scores, each worth at most 20 points:
//!
//! | component | compares | formula |
//! |-----------|----------|---------|
//! | correlation | upper-layer anomalies | $20 r^2 / 0.81$ |
//! | extremum ratio | upper-layer anomaly range | $20 \min(m/o, o/m)$ |
//! | variability ratio | lower-layer anomaly std | $20 \min(m/o, o/m)$ |
//! | profile bias | mean profile per layer | $\sum_{layer} 10 - \lvert \overline{bias} \rvert / 2$ |
//! | gas exchange | annual air-sea flux | $20 - 20 (\lvert F_{ref} - F_m \rvert - \sigma/2) / 4\sigma$ |
//!
//! Scores are rounded half-to-even and clamped, so the total lies in `[0, 100]`.
//!
//! # Examples
//!
//! ```rust
//! use chrono::NaiveDate;
//! use oxyscore_core::score::{
//!     correlation_score, gas_exchange_score, variability_score, ClampPolicy,
//!     GasExchangeReference,
//! };
//! use oxyscore_core::timeseries::Timeseries;
//!
//! let observed = Timeseries::from_pairs((1990..2010).map(|year| {
//!     let date = NaiveDate::from_ymd_opt(year, 7, 1).unwrap();
//!     (date, (year as f64 * 0.7).sin())
//! }))
//! .unwrap();
//! // Twice the observed anomalies
//! let model = Timeseries::new(observed.times().to_vec(), observed.values() * 2.0).unwrap();
//!
//! // The shape is right, the spread is not
//! assert_eq!(correlation_score(&model, &observed).unwrap(), 20.0);
//! assert_eq!(variability_score(&model, &observed, ClampPolicy::Symmetric).unwrap(), 10.0);
//!
//! // 10 units away from a literature value known to within 5.2
//! let reference = GasExchangeReference { mean: 20.0, std: 5.2 };
//! assert_eq!(gas_exchange_score(30.0, reference).unwrap(), 13.0);
//! ```

use crate::errors::{ScoreError, ScoreResult};
use crate::layers::{Layer, LayerAggregator};
use crate::profile::DepthProfile;
use crate::timeseries::{FloatValue, Timeseries, YearRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Points available per component
pub const MAX_COMPONENT_SCORE: FloatValue = 20.0;
/// Points available per layer of the profile component
pub const MAX_LAYER_SCORE: FloatValue = 10.0;
/// Squared correlation that earns full marks
pub const FULL_MARKS_R_SQUARED: FloatValue = 0.81;

/// The five parts of a model score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Correlation,
    ExtremumRatio,
    VariabilityRatio,
    ProfileBias,
    GasExchange,
}

impl ScoreComponent {
    pub const ALL: [ScoreComponent; 5] = [
        ScoreComponent::Correlation,
        ScoreComponent::ExtremumRatio,
        ScoreComponent::VariabilityRatio,
        ScoreComponent::ProfileBias,
        ScoreComponent::GasExchange,
    ];
}

impl fmt::Display for ScoreComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreComponent::Correlation => "correlation",
            ScoreComponent::ExtremumRatio => "extremum_ratio",
            ScoreComponent::VariabilityRatio => "variability_ratio",
            ScoreComponent::ProfileBias => "profile_bias",
            ScoreComponent::GasExchange => "gas_exchange",
        };
        write!(f, "{name}")
    }
}

/// How a ratio score is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampPolicy {
    /// `[0, 20]`
    #[default]
    Symmetric,
    /// `[0, inf)`
    LowerOnly,
}

impl ClampPolicy {
    pub fn apply(&self, score: FloatValue) -> FloatValue {
        match self {
            ClampPolicy::Symmetric => score.clamp(0.0, MAX_COMPONENT_SCORE),
            ClampPolicy::LowerOnly => score.max(0.0),
        }
    }
}

/// Pair of year ranges used by the extremum score: the anomaly maximum is taken
/// over `peak`, the minimum over `trough`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtremumWindows {
    pub peak: YearRange,
    pub trough: YearRange,
}

impl ExtremumWindows {
    /// 1990-1995 peak, 2004-2009 trough
    pub const LATE_TROUGH: ExtremumWindows = ExtremumWindows {
        peak: YearRange::new(1990, 1995),
        trough: YearRange::new(2004, 2009),
    };
    /// 1990-1995 peak, 2002-2007 trough
    pub const EARLY_TROUGH: ExtremumWindows = ExtremumWindows {
        peak: YearRange::new(1990, 1995),
        trough: YearRange::new(2002, 2007),
    };
}

impl Default for ExtremumWindows {
    fn default() -> Self {
        Self::LATE_TROUGH
    }
}

/// Literature constants for the air-sea flux
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasExchangeReference {
    /// Reference annual flux
    pub mean: FloatValue,
    /// Spread of the literature estimates
    pub std: FloatValue,
}

/// Python-style rounding (half to even)
fn round_score(value: FloatValue) -> FloatValue {
    value.round_ties_even()
}

/// Pearson correlation coefficient of two equally long samples.
///
/// Identical samples correlate perfectly even when constant; otherwise a
/// constant sample has no correlation.
pub fn pearson(a: &[FloatValue], b: &[FloatValue]) -> ScoreResult<FloatValue> {
    if a.len() != b.len() {
        return Err(ScoreError::InvalidData(format!(
            "cannot correlate samples of length {} and {}",
            a.len(),
            b.len()
        )));
    }
    if a.len() < 2 {
        return Err(ScoreError::InsufficientOverlap(format!(
            "correlation needs at least 2 common points, got {}",
            a.len()
        )));
    }
    if a == b {
        return Ok(1.0);
    }

    let n = a.len() as FloatValue;
    let mean_a = a.iter().sum::<FloatValue>() / n;
    let mean_b = b.iter().sum::<FloatValue>() / n;
    let (cov, var_a, var_b) = a.iter().zip(b.iter()).fold(
        (0.0, 0.0, 0.0),
        |(cov, var_a, var_b), (x, y)| {
            let dx = x - mean_a;
            let dy = y - mean_b;
            (cov + dx * dy, var_a + dx * dx, var_b + dy * dy)
        },
    );
    if var_a == 0.0 || var_b == 0.0 {
        return Ok(0.0);
    }
    Ok((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Sample standard deviation (`n - 1` denominator)
pub fn sample_std(values: &[FloatValue]) -> ScoreResult<FloatValue> {
    if values.len() < 2 {
        return Err(ScoreError::InsufficientOverlap(format!(
            "standard deviation needs at least 2 points, got {}",
            values.len()
        )));
    }
    let n = values.len() as FloatValue;
    let mean = values.iter().sum::<FloatValue>() / n;
    let ss = values.iter().map(|v| (v - mean).powi(2)).sum::<FloatValue>();
    Ok((ss / (n - 1.0)).sqrt())
}

/// Ratio of the smaller to the larger of two statistics, as points.
///
/// `model / observed` when the model is not larger, otherwise
/// `observed / model`. Equal statistics give full marks.
pub fn ratio_score(
    model: FloatValue,
    observed: FloatValue,
    clamp: ClampPolicy,
) -> ScoreResult<FloatValue> {
    if model.is_nan() || observed.is_nan() {
        return Err(ScoreError::InsufficientOverlap(
            "ratio of undefined statistics".to_string(),
        ));
    }
    let ratio = if model == observed {
        1.0
    } else if model <= observed {
        model / observed
    } else {
        observed / model
    };
    let score = round_score(MAX_COMPONENT_SCORE * ratio);
    if score.is_nan() {
        return Ok(0.0);
    }
    Ok(clamp.apply(score))
}

/// Correlation score of two anomaly series on the same index
pub fn correlation_score(model: &Timeseries, observed: &Timeseries) -> ScoreResult<FloatValue> {
    check_same_index(model, observed)?;
    let r = pearson(&model.values().to_vec(), &observed.values().to_vec())?;
    let score = round_score(MAX_COMPONENT_SCORE * r * r / FULL_MARKS_R_SQUARED);
    Ok(score.clamp(0.0, MAX_COMPONENT_SCORE))
}

/// `max(anomaly over peak) - min(anomaly over trough)`
pub fn extremum_range(anomaly: &Timeseries, windows: ExtremumWindows) -> ScoreResult<FloatValue> {
    let within = |range: YearRange| {
        anomaly
            .iter()
            .filter(move |(t, v)| range.contains(*t) && !v.is_nan())
            .map(|(_, v)| v)
    };
    let peak = within(windows.peak).reduce(FloatValue::max);
    let trough = within(windows.trough).reduce(FloatValue::min);
    match (peak, trough) {
        (Some(peak), Some(trough)) => Ok(peak - trough),
        _ => Err(ScoreError::InsufficientOverlap(format!(
            "no common data in {}-{} or {}-{}",
            windows.peak.start, windows.peak.end, windows.trough.start, windows.trough.end
        ))),
    }
}

/// Extremum-anomaly-ratio score of upper-layer anomalies
///
/// # Arguments
///
/// * `model`, `observed` - Anomalies on the same index
/// * `windows` - Years searched for the peak and the trough
/// * `clamp` - Bounds applied to the rounded score
///
/// # Errors
///
/// [`ScoreError::InsufficientOverlap`] when either series has no defined value
/// in one of the windows, [`ScoreError::IndexMismatch`] when the indices differ.
pub fn extremum_score(
    model: &Timeseries,
    observed: &Timeseries,
    windows: ExtremumWindows,
    clamp: ClampPolicy,
) -> ScoreResult<FloatValue> {
    check_same_index(model, observed)?;
    ratio_score(
        extremum_range(model, windows)?,
        extremum_range(observed, windows)?,
        clamp,
    )
}

/// Variability-ratio score of lower-layer anomalies
pub fn variability_score(
    model: &Timeseries,
    observed: &Timeseries,
    clamp: ClampPolicy,
) -> ScoreResult<FloatValue> {
    check_same_index(model, observed)?;
    ratio_score(
        sample_std(&model.values().to_vec())?,
        sample_std(&observed.values().to_vec())?,
        clamp,
    )
}

/// Profile score split by layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileScore {
    pub upper: FloatValue,
    pub lower: FloatValue,
}

impl ProfileScore {
    pub fn total(&self) -> FloatValue {
        self.upper + self.lower
    }
}

/// Profile-bias score.
///
/// Each layer scores `10 - |mean bias| / 2` independently, so biases of
/// opposite sign in the two layers do not cancel.
pub fn profile_score(
    model: &DepthProfile,
    observed: &DepthProfile,
    layers: &LayerAggregator,
) -> ScoreResult<ProfileScore> {
    if model.depths() != observed.depths() {
        return Err(ScoreError::InvalidData(
            "model profile must be interpolated onto the observed depths".to_string(),
        ));
    }

    let layer_score = |layer: Layer| -> ScoreResult<FloatValue> {
        let biases: Vec<FloatValue> = observed
            .depths()
            .iter()
            .zip(model.values().iter().zip(observed.values().iter()))
            .filter(|(depth, _)| layers.layer_of(**depth) == layer)
            .map(|(_, (m, o))| m - o)
            .filter(|bias| !bias.is_nan())
            .collect();
        if biases.is_empty() {
            return Err(ScoreError::InsufficientOverlap(format!(
                "no profile depths with both model and observed values in the {layer:?} layer"
            )));
        }
        let mean_bias = biases.iter().sum::<FloatValue>() / biases.len() as FloatValue;
        Ok((MAX_LAYER_SCORE - mean_bias.abs() / 2.0).clamp(0.0, MAX_LAYER_SCORE))
    };

    Ok(ProfileScore {
        upper: layer_score(Layer::Upper)?,
        lower: layer_score(Layer::Lower)?,
    })
}

/// Gas-exchange score of a model's annual flux against the literature value
pub fn gas_exchange_score(
    model_flux: FloatValue,
    reference: GasExchangeReference,
) -> ScoreResult<FloatValue> {
    if model_flux.is_nan() {
        return Err(ScoreError::DataGap("model flux is undefined".to_string()));
    }
    if !(reference.std > 0.0) {
        return Err(ScoreError::InvalidData(format!(
            "literature flux standard deviation must be positive, got {}",
            reference.std
        )));
    }
    let excess = (reference.mean - model_flux).abs() - reference.std / 2.0;
    let score = round_score(
        MAX_COMPONENT_SCORE - excess / (4.0 * reference.std) * MAX_COMPONENT_SCORE,
    );
    Ok(score.clamp(0.0, MAX_COMPONENT_SCORE))
}

fn check_same_index(model: &Timeseries, observed: &Timeseries) -> ScoreResult<()> {
    if !model.has_same_index(observed) {
        return Err(ScoreError::IndexMismatch {
            left: model.len(),
            right: observed.len(),
        });
    }
    Ok(())
}

/// Score of one model, with the reason for every component that could not be
/// computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub components: BTreeMap<ScoreComponent, FloatValue>,
    pub profile_layers: Option<ProfileScore>,
    pub undefined: BTreeMap<ScoreComponent, String>,
}

impl ModelScore {
    pub fn record(&mut self, component: ScoreComponent, result: ScoreResult<FloatValue>) {
        match result {
            Ok(value) => {
                self.undefined.remove(&component);
                self.components.insert(component, value);
            }
            Err(e) => {
                self.components.remove(&component);
                self.undefined.insert(component, e.to_string());
            }
        }
    }

    pub fn record_profile(&mut self, result: ScoreResult<ProfileScore>) {
        self.profile_layers = result.as_ref().ok().copied();
        self.record(ScoreComponent::ProfileBias, result.map(|p| p.total()));
    }

    pub fn get(&self, component: ScoreComponent) -> Option<FloatValue> {
        self.components.get(&component).copied()
    }

    /// Sum of the defined components
    pub fn total(&self) -> FloatValue {
        self.components.values().sum()
    }

    /// Whether all five components were computed
    pub fn is_complete(&self) -> bool {
        ScoreComponent::ALL
            .iter()
            .all(|c| self.components.contains_key(c))
    }
}
