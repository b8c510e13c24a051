use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run store error: {0}")]
    RunStore(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Table not found in catalog: {database}.{table}")]
    TableNotFound { database: String, table: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Row has {found} values but the frame has {expected} columns")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("Invalid ruleset: {0}")]
    Ruleset(String),

    #[error("Data quality check failed for {context}: {failed} rule(s) did not pass")]
    DataQuality { context: String, failed: usize },
}

pub type Result<T> = std::result::Result<T, EtlError>;
