use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required input location not found: {path}")]
    MissingInput { path: String },

    #[error("Persisted store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GateResult<T> = Result<T, GateError>;
