use axum::{
    http::{Error as HttpError, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cds::error::CdsError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid Range Header")]
    InvalidRange,

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("File system watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error(transparent)]
    Cds(#[from] CdsError),
}

/// Convenience alias for the result type used across the watcher and
/// platform layers, which only ever surface `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidRange => (StatusCode::RANGE_NOT_SATISFIABLE, self.to_string()),
            AppError::Internal(_) | AppError::Io(_) | AppError::Http(_) | AppError::Watcher(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Cds(ref e) => (e.http_status(), self.to_string()),
        };

        (status, message).into_response()
    }
}