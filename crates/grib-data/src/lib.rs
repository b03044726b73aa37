//! Forecast data and persistence collaborators for the overlay

pub mod cache;
pub mod config;
pub mod dataset;
pub mod grid;
pub mod interpolate;
pub mod records;

use thiserror::Error;

// Re-exports
pub use cache::RenderCache;
pub use config::{ConfigStore, MemoryConfig, PersistedSettings};
pub use dataset::{DataSet, DataSlot};
pub use grid::RegularGrid;
pub use interpolate::{DirectionConvention, VectorSample};
pub use records::ForecastRecordSet;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("grid has {actual} values, expected {expected}")]
    GridShape { expected: usize, actual: usize },

    #[error("grid spacing must be positive and finite")]
    GridSpacing,
}
