use axum::http::StatusCode;
use thiserror::Error;

/// Neutral error kinds for the content directory core.
#[derive(Error, Debug)]
pub enum CdsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("object not found: {0}")]
    NotFound(i64),

    #[error("duplicate object for parent {parent_id} ref {ref_id:?} title {title:?}")]
    DuplicateObject {
        parent_id: i64,
        ref_id: Option<i64>,
        title: Option<String>,
    },

    #[error("autoscan overlaps an existing autoscan: {0}")]
    OverlappingAutoscan(String),

    #[error("database failure: {0}")]
    DatabaseFailure(#[from] sqlx::Error),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("timeout waiting for stream data")]
    Timeout,

    #[error("handler cancelled")]
    Cancelled,
}

impl CdsError {
    /// UPnP CDS fault-code mapping used by the SOAP dispatcher.
    pub fn upnp_fault_code(&self) -> u32 {
        match self {
            CdsError::NotFound(_) => 701,
            CdsError::InvalidArgument(_) => 402,
            CdsError::OverlappingAutoscan(_) => 501,
            CdsError::DatabaseFailure(_) => 501,
            CdsError::SourceUnavailable(_) => 501,
            CdsError::Timeout => 501,
            CdsError::Cancelled => 501,
            CdsError::DuplicateObject { .. } => 501,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            CdsError::NotFound(_) => StatusCode::NOT_FOUND,
            CdsError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CdsError::DatabaseFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CdsError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
            CdsError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CdsError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
            CdsError::OverlappingAutoscan(_) => StatusCode::CONFLICT,
            CdsError::DuplicateObject { .. } => StatusCode::OK, // recovered locally; never surfaced
        }
    }
}

pub type CdsResult<T> = Result<T, CdsError>;
