//! Vertical profiles.

use crate::errors::{ScoreError, ScoreResult};
use crate::timeseries::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Concentration as a function of depth, with strictly ascending depths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthProfile {
    depths: Array1<FloatValue>,
    values: Array1<FloatValue>,
}

impl DepthProfile {
    pub fn new(depths: Array1<FloatValue>, values: Array1<FloatValue>) -> ScoreResult<Self> {
        if depths.len() != values.len() {
            return Err(ScoreError::InvalidData(format!(
                "profile has {} depths but {} values",
                depths.len(),
                values.len()
            )));
        }
        if depths.iter().any(|d| d.is_nan()) {
            return Err(ScoreError::InvalidData(
                "profile depths must be defined".to_string(),
            ));
        }
        if depths.windows(2).into_iter().any(|w| w[0] >= w[1]) {
            return Err(ScoreError::InvalidData(
                "profile depths must be unique and ascending".to_string(),
            ));
        }
        Ok(Self { depths, values })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (FloatValue, FloatValue)>) -> ScoreResult<Self> {
        let (depths, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self::new(Array1::from(depths), Array1::from(values))
    }

    pub fn depths(&self) -> &Array1<FloatValue> {
        &self.depths
    }

    pub fn values(&self) -> &Array1<FloatValue> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    /// Linearly interpolate onto `targets`.
    ///
    /// Missing values are dropped before interpolating. Targets shallower than
    /// the first or deeper than the last defined depth are missing in the result.
    pub fn interpolate(&self, targets: &Array1<FloatValue>) -> DepthProfile {
        let known: Vec<(FloatValue, FloatValue)> = self
            .depths
            .iter()
            .zip(self.values.iter())
            .filter(|(_, v)| !v.is_nan())
            .map(|(d, v)| (*d, *v))
            .collect();

        let values = targets.mapv(|depth| interpolate_linear(&known, depth));
        DepthProfile {
            depths: targets.clone(),
            values,
        }
    }
}

fn interpolate_linear(known: &[(FloatValue, FloatValue)], depth: FloatValue) -> FloatValue {
    let upper = known.partition_point(|(d, _)| *d < depth);
    match (upper.checked_sub(1).map(|i| known[i]), known.get(upper)) {
        (_, Some(&(d1, v1))) if d1 == depth => v1,
        (Some((d0, v0)), Some(&(d1, v1))) => v0 + (v1 - v0) * (depth - d0) / (d1 - d0),
        _ => FloatValue::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn rejects_unsorted_depths() {
        assert!(DepthProfile::new(array![10.0, 5.0], array![1.0, 2.0]).is_err());
        assert!(DepthProfile::new(array![5.0, 5.0], array![1.0, 2.0]).is_err());
    }

    #[test]
    fn interpolates_between_levels() {
        let profile = DepthProfile::new(array![0.0, 100.0, 300.0], array![10.0, 20.0, 40.0]).unwrap();
        let result = profile.interpolate(&array![50.0, 100.0, 200.0, 300.0]);
        assert_relative_eq!(result.values()[0], 15.0);
        assert_relative_eq!(result.values()[1], 20.0);
        assert_relative_eq!(result.values()[2], 30.0);
        assert_relative_eq!(result.values()[3], 40.0);
    }

    #[test]
    fn does_not_extrapolate() {
        let profile = DepthProfile::new(array![10.0, 100.0], array![1.0, 2.0]).unwrap();
        let result = profile.interpolate(&array![5.0, 150.0]);
        assert!(result.values()[0].is_nan());
        assert!(result.values()[1].is_nan());
    }

    #[test]
    fn skips_missing_levels() {
        let profile =
            DepthProfile::new(array![0.0, 50.0, 100.0], array![10.0, f64::NAN, 20.0]).unwrap();
        let result = profile.interpolate(&array![50.0]);
        assert_relative_eq!(result.values()[0], 15.0);
    }
}
