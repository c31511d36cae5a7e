//! Nearest-grid-point extraction at a fixed site.

use crate::errors::{ScoreError, ScoreResult};
use crate::grid::{CellIndex, ConcentrationField, CoordinateAxis, FluxField, HorizontalGrid};
use crate::timeseries::FloatValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Longitudes with a maximum below this value are taken to be in `[-180, 180)`
const SIGNED_LONGITUDE_LIMIT: FloatValue = 200.0;
const BOUNDS_TOLERANCE: FloatValue = 1e-9;
/// Cell width in degrees assumed for an axis with a single coordinate
pub const SINGLE_CELL_WIDTH: FloatValue = 1.0;

/// Longitude range used by a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongitudeConvention {
    /// `[-180, 180)`
    Signed,
    /// `[0, 360)`
    Positive,
}

impl LongitudeConvention {
    /// Infer the convention from the range of a longitude axis
    pub fn detect(lon: &CoordinateAxis) -> Self {
        match lon.max() {
            Some(max) if max >= SIGNED_LONGITUDE_LIMIT => LongitudeConvention::Positive,
            _ => LongitudeConvention::Signed,
        }
    }

    /// Express `lon` in this convention
    pub fn normalise(&self, lon: FloatValue) -> FloatValue {
        match self {
            LongitudeConvention::Signed => (lon + 180.0).rem_euclid(360.0) - 180.0,
            LongitudeConvention::Positive => lon.rem_euclid(360.0),
        }
    }
}

/// Geographic target of the extraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub lat: FloatValue,
    pub lon: FloatValue,
}

impl Default for Site {
    /// Central Labrador Sea
    fn default() -> Self {
        Self {
            lat: 56.823,
            lon: -52.22,
        }
    }
}

/// Selects the grid cell nearest to a site
#[derive(Debug, Clone, PartialEq)]
pub struct GridSampler {
    site: Site,
    convention: Option<LongitudeConvention>,
    single_cell_width: FloatValue,
}

impl GridSampler {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            convention: None,
            single_cell_width: SINGLE_CELL_WIDTH,
        }
    }

    /// Use a fixed longitude convention instead of inferring it from the grid
    pub fn with_convention(mut self, convention: Option<LongitudeConvention>) -> Self {
        self.convention = convention;
        self
    }

    /// Cell width used when an axis holds a single coordinate, such as a field
    /// already cut down to the site
    pub fn with_single_cell_width(mut self, width: FloatValue) -> Self {
        self.single_cell_width = width;
        self
    }

    pub fn site(&self) -> Site {
        self.site
    }

    /// Find the cell whose centre is nearest to the site.
    ///
    /// On a rectilinear grid the Euclidean distance is minimised by taking the
    /// nearest latitude and the nearest longitude independently. Ties resolve to
    /// the lowest index.
    ///
    /// A site is accepted within half a cell of the outer centres. The spacing
    /// of an axis with one coordinate is unknown, so its cell is taken to be
    /// [`SINGLE_CELL_WIDTH`] wide unless [`GridSampler::with_single_cell_width`]
    /// says otherwise.
    pub fn locate(&self, grid: &HorizontalGrid) -> ScoreResult<CellIndex> {
        let convention = self
            .convention
            .unwrap_or_else(|| LongitudeConvention::detect(&grid.lon));
        let lon = convention.normalise(self.site.lon);

        let lat_index = self.nearest_within_bounds(&grid.lat, self.site.lat)?;
        let lon_index = self.nearest_within_bounds(&grid.lon, lon)?;

        Ok(CellIndex {
            lat: lat_index,
            lon: lon_index,
        })
    }

    /// `(time, depth)` concentration at the site
    pub fn sample_column(&self, field: &ConcentrationField) -> ScoreResult<Array2<FloatValue>> {
        let cell = self.locate(&field.grid)?;
        Ok(field.column(cell))
    }

    /// Flux at the site over time
    pub fn sample_point(&self, field: &FluxField) -> ScoreResult<Array1<FloatValue>> {
        let cell = self.locate(&field.grid)?;
        Ok(field.point(cell))
    }

    fn nearest_within_bounds(&self, axis: &CoordinateAxis, target: FloatValue) -> ScoreResult<usize> {
        let outside = |reason: String| ScoreError::Grid {
            lat: self.site.lat,
            lon: self.site.lon,
            reason,
        };

        let (lower, upper) = axis_extent(axis, self.single_cell_width)
            .ok_or_else(|| outside(format!("{} axis has no defined coordinates", axis.name)))?;
        if target < lower - BOUNDS_TOLERANCE || target > upper + BOUNDS_TOLERANCE {
            return Err(outside(format!(
                "{} {target} is outside [{lower}, {upper}]",
                axis.name
            )));
        }

        axis.values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .fold(None, |best: Option<(usize, FloatValue)>, (index, v)| {
                let distance = (v - target).abs();
                match best {
                    Some((_, best_distance)) if best_distance <= distance => best,
                    _ => Some((index, distance)),
                }
            })
            .map(|(index, _)| index)
            .ok_or_else(|| outside(format!("{} axis is empty", axis.name)))
    }
}

/// Outer cell edges of an axis: the outermost centres widened by half of the
/// neighbouring spacing, or by half of `single_width` for a lone coordinate.
fn axis_extent(axis: &CoordinateAxis, single_width: FloatValue) -> Option<(FloatValue, FloatValue)> {
    let mut sorted: Vec<FloatValue> = axis.values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    match sorted.as_slice() {
        [] => None,
        [only] => Some((only - 0.5 * single_width, only + 0.5 * single_width)),
        values => {
            let n = values.len();
            Some((
                values[0] - 0.5 * (values[1] - values[0]),
                values[n - 1] + 0.5 * (values[n - 1] - values[n - 2]),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::Array1;

    fn one_degree_grid(first_lon: FloatValue) -> HorizontalGrid {
        HorizontalGrid::new(
            Array1::range(50.5, 65.0, 1.0),
            Array1::range(first_lon, first_lon + 30.0, 1.0),
        )
    }

    #[test]
    fn detects_convention() {
        let positive = one_degree_grid(280.5);
        let signed = one_degree_grid(-79.5);
        assert_eq!(
            LongitudeConvention::detect(&positive.lon),
            LongitudeConvention::Positive
        );
        assert_eq!(
            LongitudeConvention::detect(&signed.lon),
            LongitudeConvention::Signed
        );
    }

    #[test]
    fn normalises_longitudes() {
        assert!(is_close!(LongitudeConvention::Positive.normalise(-52.22), 307.78));
        assert!(is_close!(LongitudeConvention::Signed.normalise(307.78), -52.22));
        assert!(is_close!(LongitudeConvention::Signed.normalise(180.0), -180.0));
    }

    #[test]
    fn same_physical_cell_in_both_conventions() {
        let sampler = GridSampler::new(Site {
            lat: 56.823,
            lon: -52.22,
        });
        let positive = one_degree_grid(280.5);
        let signed = one_degree_grid(-79.5);

        let a = sampler.locate(&positive).unwrap();
        let b = sampler.locate(&signed).unwrap();

        assert_eq!(positive.lat.values[a.lat], signed.lat.values[b.lat]);
        assert_eq!(positive.lat.values[a.lat], 56.5);
        let lon_a = LongitudeConvention::Signed.normalise(positive.lon.values[a.lon]);
        let lon_b = signed.lon.values[b.lon];
        assert!(is_close!(lon_a, lon_b));
        assert!(is_close!(lon_b, -52.5));
    }

    #[test]
    fn rejects_points_outside_the_grid() {
        let sampler = GridSampler::new(Site { lat: 10.0, lon: -52.22 });
        let result = sampler.locate(&one_degree_grid(-79.5));
        assert!(matches!(result, Err(ScoreError::Grid { .. })));

        let sampler = GridSampler::new(Site { lat: 56.8, lon: 20.0 });
        let result = sampler.locate(&one_degree_grid(-79.5));
        assert!(matches!(result, Err(ScoreError::Grid { .. })));
    }

    #[test]
    fn accepts_points_inside_the_outer_half_cell() {
        let sampler = GridSampler::new(Site { lat: 50.1, lon: -79.9 });
        let cell = sampler.locate(&one_degree_grid(-79.5)).unwrap();
        assert_eq!(cell, CellIndex { lat: 0, lon: 0 });
    }

    #[test]
    fn convention_hint_overrides_detection() {
        // A regional grid that happens to sit below 200 degrees east
        let grid = HorizontalGrid::new(Array1::range(50.5, 65.0, 1.0), Array1::range(150.5, 199.0, 1.0));
        let sampler = GridSampler::new(Site { lat: 56.8, lon: -170.2 })
            .with_convention(Some(LongitudeConvention::Positive));
        let cell = sampler.locate(&grid).unwrap();
        assert_eq!(grid.lon.values[cell.lon], 189.5);
    }

    #[test]
    fn single_cell_field_covers_half_a_cell() {
        let grid = HorizontalGrid::new(Array1::from(vec![56.5]), Array1::from(vec![-52.5]));
        let cell = GridSampler::new(Site::default()).locate(&grid).unwrap();
        assert_eq!(cell, CellIndex { lat: 0, lon: 0 });

        let far = GridSampler::new(Site { lat: 58.0, lon: -52.22 }).locate(&grid);
        assert!(matches!(far, Err(ScoreError::Grid { .. })));

        let narrow = GridSampler::new(Site::default())
            .with_single_cell_width(0.25)
            .locate(&grid);
        assert!(matches!(narrow, Err(ScoreError::Grid { .. })));
    }

    #[test]
    fn handles_descending_latitude() {
        let grid = HorizontalGrid::new(Array1::range(64.5, 50.0, -1.0), Array1::range(-79.5, -49.0, 1.0));
        let cell = GridSampler::new(Site::default()).locate(&grid).unwrap();
        assert_eq!(grid.lat.values[cell.lat], 56.5);
    }
}
