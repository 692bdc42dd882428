use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Missing source table '{table}': {path}")]
    MissingSource { table: String, path: String },

    #[error("Table '{table}' is missing required column '{column}'")]
    SchemaError { table: String, column: String },

    #[error("Table '{table}' already has a column named '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Invalid prediction horizon {0}: must be a positive number of years")]
    InvalidHorizon(u32),

    #[error("Invalid period end '{value}' for entity {entity}: expected YYYY-MM-DD")]
    InvalidPeriod { entity: String, value: String },

    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
