//! Rectilinear gridded model fields.
//!
//! Two field shapes are supported:
//!
//! - [`ConcentrationField`]: `(time, depth, lat, lon)` oxygen concentration
//! - [`FluxField`]: `(time, lat, lon)` air-sea oxygen flux
//!
//! Both carry their raw CF time axis. The time axis is decoded by the pipeline so
//! that a per-model units override can be applied first.
//!
//! Only regular latitude/longitude grids with one-dimensional coordinate axes are
//! supported.

use crate::calendar::{decode_times, Calendar};
use crate::errors::{ScoreError, ScoreResult};
use crate::timeseries::{FloatValue, Time};
use ndarray::{s, Array1, Array2, Array3, Array4};
use serde::{Deserialize, Serialize};

/// Magnitude at or above which a value is treated as a fill value
pub const FILL_VALUE_THRESHOLD: FloatValue = 1.0e30;

/// One-dimensional coordinate axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateAxis {
    pub name: String,
    pub units: String,
    pub values: Array1<FloatValue>,
}

impl CoordinateAxis {
    pub fn new(name: &str, units: &str, values: Array1<FloatValue>) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest coordinate value, ignoring NaN
    pub fn max(&self) -> Option<FloatValue> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(FloatValue::max)
    }
}

/// Raw CF time axis as stored in the model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    pub values: Array1<FloatValue>,
    /// e.g. `"days since 1850-01-01"`
    pub units: String,
    pub calendar: Calendar,
}

impl TimeAxis {
    pub fn new(values: Array1<FloatValue>, units: &str, calendar: Calendar) -> Self {
        Self {
            values,
            units: units.to_string(),
            calendar,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode the axis, replacing the stored units with `units_override` if given
    pub fn decode(&self, units_override: Option<&str>) -> ScoreResult<Vec<Time>> {
        let units = units_override.unwrap_or(&self.units);
        decode_times(&self.values.to_vec(), units, self.calendar)
    }
}

/// Vertical coordinate with cell bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthAxis {
    pub units: String,
    /// Level centres, positive downward
    pub centres: Array1<FloatValue>,
    /// `(levels, 2)` array of the upper and lower bound of each level
    pub bounds: Array2<FloatValue>,
}

impl DepthAxis {
    pub fn new(
        units: &str,
        centres: Array1<FloatValue>,
        bounds: Array2<FloatValue>,
    ) -> ScoreResult<Self> {
        if bounds.dim() != (centres.len(), 2) {
            return Err(ScoreError::InvalidData(format!(
                "depth bounds have shape {:?}, expected ({}, 2)",
                bounds.dim(),
                centres.len()
            )));
        }
        if centres.iter().any(|c| c.is_nan()) {
            return Err(ScoreError::InvalidData(
                "depth level centres must be defined".to_string(),
            ));
        }
        Ok(Self {
            units: units.to_string(),
            centres,
            bounds,
        })
    }

    /// Build an axis from contiguous level edges (`levels + 1` values)
    pub fn from_edges(units: &str, edges: &[FloatValue]) -> ScoreResult<Self> {
        if edges.len() < 2 {
            return Err(ScoreError::InvalidData(
                "at least two depth edges are required".to_string(),
            ));
        }
        let levels = edges.len() - 1;
        let centres = Array1::from_iter(edges.windows(2).map(|w| 0.5 * (w[0] + w[1])));
        let mut bounds = Array2::zeros((levels, 2));
        for (level, w) in edges.windows(2).enumerate() {
            bounds[[level, 0]] = w[0];
            bounds[[level, 1]] = w[1];
        }
        Self::new(units, centres, bounds)
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    /// Thickness of every level
    pub fn thicknesses(&self) -> Array1<FloatValue> {
        Array1::from_iter(
            self.bounds
                .rows()
                .into_iter()
                .map(|row| (row[1] - row[0]).abs()),
        )
    }
}

/// Horizontal latitude/longitude grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizontalGrid {
    pub lat: CoordinateAxis,
    pub lon: CoordinateAxis,
}

impl HorizontalGrid {
    pub fn new(lat: Array1<FloatValue>, lon: Array1<FloatValue>) -> Self {
        Self {
            lat: CoordinateAxis::new("lat", "degrees_north", lat),
            lon: CoordinateAxis::new("lon", "degrees_east", lon),
        }
    }
}

/// Index of a single horizontal grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub lat: usize,
    pub lon: usize,
}

fn mask_fill_values(value: FloatValue, fill_value: Option<FloatValue>) -> FloatValue {
    let is_fill = fill_value.is_some_and(|fill| value == fill);
    if is_fill || !value.is_finite() || value.abs() >= FILL_VALUE_THRESHOLD {
        FloatValue::NAN
    } else {
        value
    }
}

fn check_axis(name: &str, expected: usize, actual: usize) -> ScoreResult<()> {
    if expected != actual {
        return Err(ScoreError::InvalidData(format!(
            "{name} axis has {actual} entries but the data has {expected}"
        )));
    }
    Ok(())
}

/// Oxygen concentration on a `(time, depth, lat, lon)` grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationField {
    pub units: String,
    pub time: TimeAxis,
    pub depth: DepthAxis,
    pub grid: HorizontalGrid,
    data: Array4<FloatValue>,
}

impl ConcentrationField {
    /// Create a field, validating axis lengths against the data shape.
    ///
    /// Values equal to `fill_value`, non-finite values and values with a
    /// magnitude of at least [`FILL_VALUE_THRESHOLD`] become missing.
    pub fn new(
        units: &str,
        time: TimeAxis,
        depth: DepthAxis,
        grid: HorizontalGrid,
        data: Array4<FloatValue>,
        fill_value: Option<FloatValue>,
    ) -> ScoreResult<Self> {
        let (nt, nz, ny, nx) = data.dim();
        check_axis("time", nt, time.len())?;
        check_axis("depth", nz, depth.len())?;
        check_axis("lat", ny, grid.lat.len())?;
        check_axis("lon", nx, grid.lon.len())?;

        Ok(Self {
            units: units.to_string(),
            time,
            depth,
            grid,
            data: data.mapv_into(|v| mask_fill_values(v, fill_value)),
        })
    }

    pub fn data(&self) -> &Array4<FloatValue> {
        &self.data
    }

    /// `(time, depth)` values of a single horizontal cell
    pub fn column(&self, cell: CellIndex) -> Array2<FloatValue> {
        self.data.slice(s![.., .., cell.lat, cell.lon]).to_owned()
    }
}

/// Air-sea flux on a `(time, lat, lon)` grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxField {
    pub units: String,
    pub time: TimeAxis,
    pub grid: HorizontalGrid,
    data: Array3<FloatValue>,
}

impl FluxField {
    pub fn new(
        units: &str,
        time: TimeAxis,
        grid: HorizontalGrid,
        data: Array3<FloatValue>,
        fill_value: Option<FloatValue>,
    ) -> ScoreResult<Self> {
        let (nt, ny, nx) = data.dim();
        check_axis("time", nt, time.len())?;
        check_axis("lat", ny, grid.lat.len())?;
        check_axis("lon", nx, grid.lon.len())?;

        Ok(Self {
            units: units.to_string(),
            time,
            grid,
            data: data.mapv_into(|v| mask_fill_values(v, fill_value)),
        })
    }

    pub fn data(&self) -> &Array3<FloatValue> {
        &self.data
    }

    /// Values of a single horizontal cell over time
    pub fn point(&self, cell: CellIndex) -> Array1<FloatValue> {
        self.data.slice(s![.., cell.lat, cell.lon]).to_owned()
    }
}
