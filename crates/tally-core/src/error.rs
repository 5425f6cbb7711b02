//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ledger API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by caller input rather than the ledger or transport
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidData(_) | Self::Import(_) | Self::Csv(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
