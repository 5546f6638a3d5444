use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("element set parse error ({location}): {reason}")]
    ElementsParse { location: String, reason: String },
    #[error("CDM parse error ({field}): {reason}")]
    CdmParse { field: String, reason: String },
    #[error("propagation failed for object {norad_id} at {instant}: {reason}")]
    Propagation {
        norad_id: u64,
        instant: DateTime<Utc>,
        reason: String,
    },
    #[error("numeric failure: {0}")]
    Numeric(String),
    #[error("invalid parameter: {0}")]
    Usage(String),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ScreenError>;
