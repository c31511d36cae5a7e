//! Run configuration.
//!
//! Everything that is a tunable constant of the scoring lives in
//! [`ScoringConfig`]. Per-model quirks are declared in [`ModelConfig`] and
//! looked up by model id. Both load from TOML, with dates written as quoted ISO
//! strings:
//!
//! ```toml
//! [scoring]
//! layer_threshold = 2200.0
//! reference_window = { start = "1990-01-01", end = "2014-12-31" }
//!
//! [[models]]
//! id = "MPI-ESM1-2-LR"
//! time_units_override = "days since 1700-01-01"
//! ```

use crate::align::DEFAULT_MAX_BACKFILL_DAYS;
use crate::errors::{ScoreError, ScoreResult};
use crate::layers::DEFAULT_LAYER_THRESHOLD;
use crate::sampler::{LongitudeConvention, Site};
use crate::score::{ClampPolicy, ExtremumWindows};
use crate::table::ModelId;
use crate::timeseries::{DateWindow, FloatValue};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// mol m-3 to umol kg-1 with a seawater density of 1025 kg m-3
pub const MOL_M3_TO_UMOL_KG: FloatValue = 1.0e6 / 1025.0;

/// Length of the year used to turn a flux rate into an annual total (s)
pub const SECONDS_PER_YEAR: FloatValue = 365.0 * 86_400.0;

fn default_reference_window() -> DateWindow {
    DateWindow {
        start: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        end: NaiveDate::from_ymd_opt(2014, 12, 31).unwrap_or_default(),
    }
}

/// Constants of the scoring.
///
/// Missing fields take their defaults, so an empty TOML table is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Location of the extracted column.
    /// default: 56.823 N, 52.22 W
    pub site: Site,

    /// Depth separating the upper and lower layer (m).
    /// default: 2200.0
    pub layer_threshold: FloatValue,

    /// Inclusive window for the mean profile and mean flux.
    /// default: 1990-01-01 to 2014-12-31
    pub reference_window: DateWindow,

    /// Factor applied to the mean model profile.
    /// default: 1e6 / 1025
    pub profile_unit_factor: FloatValue,

    /// Factor applied to the layer inventories.
    /// default: 1.0
    pub inventory_factor: FloatValue,

    /// default: 31536000.0
    pub seconds_per_year: FloatValue,

    /// Year ranges of the extremum score.
    /// default: 1990-1995 and 2004-2009
    pub extremum_windows: ExtremumWindows,

    /// default: symmetric
    pub extremum_clamp: ClampPolicy,

    /// default: lower_only
    pub variability_clamp: ClampPolicy,

    /// Largest gap (days) bridged by the backward fill of the alignment.
    /// default: 366
    pub max_backfill_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            site: Site::default(),
            layer_threshold: DEFAULT_LAYER_THRESHOLD,
            reference_window: default_reference_window(),
            profile_unit_factor: MOL_M3_TO_UMOL_KG,
            inventory_factor: 1.0,
            seconds_per_year: SECONDS_PER_YEAR,
            extremum_windows: ExtremumWindows::default(),
            extremum_clamp: ClampPolicy::Symmetric,
            variability_clamp: ClampPolicy::LowerOnly,
            max_backfill_days: DEFAULT_MAX_BACKFILL_DAYS,
        }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(text: &str) -> ScoreResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ScoreResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Check the relationships that deserialisation cannot express
    pub fn validate(&self) -> ScoreResult<()> {
        DateWindow::new(self.reference_window.start, self.reference_window.end)?;
        for (name, range) in [
            ("peak", self.extremum_windows.peak),
            ("trough", self.extremum_windows.trough),
        ] {
            if range.start > range.end {
                return Err(ScoreError::InvalidData(format!(
                    "extremum {name} window {}-{} is reversed",
                    range.start, range.end
                )));
            }
        }
        if !(self.layer_threshold > 0.0) {
            return Err(ScoreError::InvalidData(format!(
                "layer threshold must be positive, got {}",
                self.layer_threshold
            )));
        }
        if self.max_backfill_days < 0 {
            return Err(ScoreError::InvalidData(format!(
                "max_backfill_days must not be negative, got {}",
                self.max_backfill_days
            )));
        }
        Ok(())
    }
}

/// Per-model overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: ModelId,
    /// Replaces the units string of the model's time axes before decoding
    #[serde(default)]
    pub time_units_override: Option<String>,
    /// Skips longitude convention detection
    #[serde(default)]
    pub longitude_convention: Option<LongitudeConvention>,
}

impl ModelConfig {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            time_units_override: None,
            longitude_convention: None,
        }
    }

    pub fn with_time_units(mut self, units: &str) -> Self {
        self.time_units_override = Some(units.to_string());
        self
    }

    pub fn with_longitude_convention(mut self, convention: LongitudeConvention) -> Self {
        self.longitude_convention = Some(convention);
        self
    }
}

/// Scoring constants plus the models to score
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> ScoreResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.scoring.validate()?;
        if let Some(duplicate) = config
            .models
            .iter()
            .enumerate()
            .find(|(i, m)| config.models[..*i].iter().any(|other| other.id == m.id))
            .map(|(_, m)| m.id.clone())
        {
            return Err(ScoreError::InvalidData(format!(
                "model {duplicate} is configured more than once"
            )));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ScoreResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::YearRange;
    use is_close::is_close;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ScoringConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScoringConfig::default());
        assert!(is_close!(config.profile_unit_factor, 975.609756097561));
        assert_eq!(config.seconds_per_year, 31_536_000.0);
        assert_eq!(config.variability_clamp, ClampPolicy::LowerOnly);
    }

    #[test]
    fn partial_config_overrides() {
        let config = ScoringConfig::from_toml_str(
            r#"
            layer_threshold = 2000.0
            extremum_clamp = "lower_only"
            reference_window = { start = "1995-01-01", end = "2010-12-31" }
            extremum_windows = { peak = { start = 1990, end = 1995 }, trough = { start = 2002, end = 2007 } }
            "#,
        )
        .unwrap();
        assert_eq!(config.layer_threshold, 2000.0);
        assert_eq!(config.extremum_clamp, ClampPolicy::LowerOnly);
        assert_eq!(config.extremum_windows, ExtremumWindows::EARLY_TROUGH);
        assert_eq!(
            config.reference_window.start,
            NaiveDate::from_ymd_opt(1995, 1, 1).unwrap()
        );
        assert_eq!(config.site, Site::default());
    }

    #[test]
    fn rejects_reversed_windows() {
        let mut config = ScoringConfig::default();
        config.extremum_windows.trough = YearRange::new(2009, 2004);
        assert!(config.validate().is_err());

        let result = ScoringConfig::from_toml_str(
            r#"reference_window = { start = "2015-01-01", end = "1990-01-01" }"#,
        );
        assert!(matches!(result, Err(ScoreError::InvalidData(_))));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let result = ScoringConfig::from_toml_str("layer_threshold = \"deep\"");
        assert!(matches!(result, Err(ScoreError::Config(_))));
    }

    #[test]
    fn run_config_with_models() {
        let config = RunConfig::from_toml_str(
            r#"
            [scoring]
            max_backfill_days = 400

            [[models]]
            id = "MPI-ESM1-2-LR"
            time_units_override = "days since 1700-01-01"

            [[models]]
            id = "CanESM5"
            longitude_convention = "positive"
            "#,
        )
        .unwrap();
        assert_eq!(config.scoring.max_backfill_days, 400);
        assert_eq!(
            config.models,
            vec![
                ModelConfig::new("MPI-ESM1-2-LR").with_time_units("days since 1700-01-01"),
                ModelConfig::new("CanESM5").with_longitude_convention(LongitudeConvention::Positive),
            ]
        );
    }

    #[test]
    fn loads_from_path() {
        use std::fs;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let scoring_path = dir.path().join("scoring.toml");
        fs::write(&scoring_path, "layer_threshold = 2000.0\n").unwrap();
        let config = ScoringConfig::from_path(&scoring_path).unwrap();
        assert_eq!(config.layer_threshold, 2000.0);

        let run_path = dir.path().join("run.toml");
        fs::write(&run_path, "[[models]]\nid = \"CanESM5\"\n").unwrap();
        let run = RunConfig::from_path(&run_path).unwrap();
        assert_eq!(run.models, vec![ModelConfig::new("CanESM5")]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ScoringConfig::from_path(&missing),
            Err(ScoreError::Io(_))
        ));
        assert!(matches!(RunConfig::from_path(&missing), Err(ScoreError::Io(_))));
    }

    #[test]
    fn rejects_duplicate_models() {
        let result = RunConfig::from_toml_str(
            r#"
            [[models]]
            id = "CanESM5"
            [[models]]
            id = "CanESM5"
            "#,
        );
        assert!(result.is_err());
    }
}
