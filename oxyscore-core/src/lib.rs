//! Scoring of climate model oxygen output against Labrador Sea observations.
//!
//! Each model is reduced to a water column at a single site, integrated over
//! two depth layers, aligned to the annual observations and scored on five
//! components worth 20 points each:
//!
//! ```text
//! DataProvider -> GridSampler -> LayerAggregator -> TemporalAligner
//!                                                        |
//!                          ReferenceDataset -> ComparisonTable -> ScoreEngine
//! ```
//!
//! [`pipeline::ScoringPipeline`] drives a batch of models and reports a score or
//! a failure for each one.

pub mod align;
pub mod calendar;
pub mod config;
pub mod errors;
pub mod grid;
pub mod layers;
pub mod pipeline;
pub mod profile;
pub mod provider;
#[cfg(feature = "python")]
pub mod python;
pub mod reference;
pub mod sampler;
pub mod score;
pub mod table;
pub mod timeseries;
