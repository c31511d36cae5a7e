use thiserror::Error;

/// Error type for failures while extracting or scoring a model.
///
/// Every variant is scoped to a single model; the batch driver records it and
/// carries on with the remaining models.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Data unavailable for model {model}: {reason}")]
    DataUnavailable { model: String, reason: String },
    #[error("Target point ({lat}, {lon}) is outside the field bounds: {reason}")]
    Grid { lat: f64, lon: f64, reason: String },
    #[error("Insufficient overlap with observations: {0}")]
    InsufficientOverlap(String),
    #[error("Data gap: {0}")]
    DataGap(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Invalid time units '{units}': {reason}")]
    TimeUnits { units: String, reason: String },
    #[error("Time indices differ: {left} entries vs {right} entries, or mismatched timestamps")]
    IndexMismatch { left: usize, right: usize },
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoreError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ScoreError::DataUnavailable { .. } => "DataUnavailable",
            ScoreError::Grid { .. } => "GridError",
            ScoreError::InsufficientOverlap(_) => "InsufficientOverlap",
            ScoreError::DataGap(_) => "DataGap",
            ScoreError::InvalidData(_) => "InvalidData",
            ScoreError::TimeUnits { .. } => "TimeUnits",
            ScoreError::IndexMismatch { .. } => "IndexMismatch",
            ScoreError::Config(_) => "Config",
            ScoreError::Io(_) => "Io",
        }
    }
}

/// Convenience type for `Result<T, ScoreError>`.
pub type ScoreResult<T> = Result<T, ScoreError>;
