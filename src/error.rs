use std::time::Duration;

use thiserror::Error;

/// Why a single extraction step came back empty.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("loading {url} took longer than {waited:?}")]
    Timeout { url: String, waited: Duration },
    #[error("{0} not found")]
    ElementMissing(String),
    #[error("{0} is empty")]
    EmptyText(String),
    #[error("cannot parse {raw:?} as a number")]
    InvalidNumber { raw: String },
    #[error("invalid url {0}")]
    InvalidUrl(String),
}

/// Outcome of a query-service operation that did not succeed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Company not found: {0}")]
    NotFound(String),
    #[error("Invalid company: {0}")]
    Invalid(String),
    #[error("Company could not be saved: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl ServiceError {
    /// HTTP-equivalent status code.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Invalid(_) | ServiceError::Persistence(_) => 400,
        }
    }
}
