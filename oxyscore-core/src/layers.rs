//! Depth integration of a single model column.
//!
//! The water column is split at a fixed depth into an upper band (the Labrador
//! Sea Water layer) and a lower band. Each band is reduced to an inventory
//! timeseries by summing `concentration * thickness` over its levels.
//!
//! The two bands treat missing levels differently:
//!
//! - upper: any missing level makes that time step missing
//! - lower: missing levels contribute zero
//!
//! Missing cells near the seafloor are common while the upper column should
//! always be fully defined.

use crate::errors::{ScoreError, ScoreResult};
use crate::grid::DepthAxis;
use crate::profile::DepthProfile;
use crate::timeseries::{nan_mean, DateWindow, FloatValue, Time, Timeseries};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Depth separating the upper and lower layer (m)
pub const DEFAULT_LAYER_THRESHOLD: FloatValue = 2200.0;

/// Band of the water column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// `[0, threshold)`
    Upper,
    /// `[threshold, bottom]`
    Lower,
}

/// Inventories of both layers on the native model time axis
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInventories {
    pub upper: Timeseries,
    pub lower: Timeseries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerAggregator {
    threshold: FloatValue,
    inventory_factor: FloatValue,
}

impl Default for LayerAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_LAYER_THRESHOLD)
    }
}

impl LayerAggregator {
    pub fn new(threshold: FloatValue) -> Self {
        Self {
            threshold,
            inventory_factor: 1.0,
        }
    }

    /// Multiply every inventory by `factor` (e.g. for a unit change)
    pub fn with_inventory_factor(mut self, factor: FloatValue) -> Self {
        self.inventory_factor = factor;
        self
    }

    pub fn threshold(&self) -> FloatValue {
        self.threshold
    }

    /// Layer containing a depth
    pub fn layer_of(&self, depth: FloatValue) -> Layer {
        if depth < self.threshold {
            Layer::Upper
        } else {
            Layer::Lower
        }
    }

    /// Integrate a `(time, depth)` column over each layer
    pub fn integrate(
        &self,
        times: &[Time],
        column: &Array2<FloatValue>,
        depth: &DepthAxis,
    ) -> ScoreResult<LayerInventories> {
        let (nt, nz) = column.dim();
        if nt != times.len() || nz != depth.len() {
            return Err(ScoreError::InvalidData(format!(
                "column has shape ({nt}, {nz}) but the axes have {} times and {} levels",
                times.len(),
                depth.len()
            )));
        }

        let thickness = depth.thicknesses();
        let layers: Vec<Layer> = depth.centres.iter().map(|d| self.layer_of(*d)).collect();
        for layer in [Layer::Upper, Layer::Lower] {
            if !layers.contains(&layer) {
                return Err(ScoreError::InvalidData(format!(
                    "no model level falls in the {layer:?} layer (threshold {})",
                    self.threshold
                )));
            }
        }

        let mut upper = Array1::<FloatValue>::zeros(nt);
        let mut lower = Array1::<FloatValue>::zeros(nt);
        for (t, row) in column.axis_iter(Axis(0)).enumerate() {
            for ((value, dz), layer) in row.iter().zip(thickness.iter()).zip(layers.iter()) {
                match layer {
                    Layer::Upper => upper[t] += value * dz,
                    Layer::Lower if !value.is_nan() => lower[t] += value * dz,
                    Layer::Lower => {}
                }
            }
        }

        Ok(LayerInventories {
            upper: Timeseries::new(times.to_vec(), upper * self.inventory_factor)?,
            lower: Timeseries::new(times.to_vec(), lower * self.inventory_factor)?,
        })
    }
}

/// Time-mean profile over `window`, scaled by `unit_factor` and interpolated
/// onto `target_depths`.
pub fn mean_profile(
    times: &[Time],
    column: &Array2<FloatValue>,
    depth: &DepthAxis,
    window: DateWindow,
    unit_factor: FloatValue,
    target_depths: &Array1<FloatValue>,
) -> ScoreResult<DepthProfile> {
    let in_window: Vec<usize> = times
        .iter()
        .enumerate()
        .filter(|(_, t)| window.contains(**t))
        .map(|(index, _)| index)
        .collect();
    if in_window.is_empty() {
        return Err(ScoreError::DataGap(format!(
            "no model timestamps between {} and {}",
            window.start, window.end
        )));
    }

    let mut levels: Vec<(FloatValue, FloatValue)> = depth
        .centres
        .iter()
        .enumerate()
        .map(|(level, centre)| {
            let mean = nan_mean(in_window.iter().map(|t| column[[*t, level]]));
            (*centre, mean.map_or(FloatValue::NAN, |m| m * unit_factor))
        })
        .collect();
    levels.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(DepthProfile::from_pairs(levels)?.interpolate(target_depths))
}

/// Time-mean of a flux rate over `window`, converted to an annual total
pub fn mean_annual_flux(
    times: &[Time],
    flux: &Array1<FloatValue>,
    window: DateWindow,
    seconds_per_year: FloatValue,
) -> ScoreResult<FloatValue> {
    let series = Timeseries::new(times.to_vec(), flux.clone())?;
    series.within(window).mean().map(|m| m * seconds_per_year).ok_or_else(|| {
        ScoreError::DataGap(format!(
            "no defined flux values between {} and {}",
            window.start, window.end
        ))
    })
}
