//! Error types for the rutas agents.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid envelope: {0}")]
    Decode(String),

    #[error("Missing payload field: {0}")]
    MissingField(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
