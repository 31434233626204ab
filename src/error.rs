use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {name} must be numeric, found {dtype}")]
    NonNumericColumn { name: String, dtype: String },

    #[error("Missing aggregate result: {0}")]
    MissingKey(String),

    #[error("Aggregate {name} produced a non-finite value: {value}")]
    NonFinite { name: String, value: f64 },

    #[error("Aggregate already registered: {0}")]
    DuplicateAgg(String),

    #[error("No aggregates registered for source: {0}")]
    UnknownSource(String),

    #[error("Post-aggregation dependency cycle involving: {0}")]
    DependencyCycle(String),

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, AggError>;
