use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Cannot load historical data from '{path}': {reason}")]
    DataLoad { path: String, reason: String },

    #[error("Insufficient historical data: {reason}")]
    InsufficientData { reason: String },

    #[error("Degenerate distribution for '{factor}': no usable samples")]
    DegenerateDistribution { factor: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ForecastResult<T> = Result<T, ForecastError>;
