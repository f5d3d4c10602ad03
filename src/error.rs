//! Error taxonomy shared by the stores, the study manager and the HTTP layer.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use snapdeck_core::SchedulingError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown deck, session or card id.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Rejected before any mutation.
    #[error("{0}")]
    InvalidInput(String),

    /// The session references a deck that has been deleted.
    #[error("deck of session {0} no longer exists")]
    DeckMissing(uuid::Uuid),

    /// A document changed underneath us, or the requested transition is no
    /// longer possible (e.g. reviewing a completed session).
    #[error("{0}")]
    Conflict(String),

    #[error("scheduling failed: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::DeckMissing(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Scheduling(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::DeckMissing(_) => "DECK_MISSING",
            Self::Conflict(_) => "CONFLICT",
            Self::Scheduling(_) => "CORRUPT_CARD_STATE",
            Self::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

/// Malformed or mistyped request bodies get the same 400 envelope as any
/// other validation failure.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the server log.
        let message = if status.is_server_error() {
            tracing::error!(code = self.code(), "Internal error: {}", self);
            "Internal server error".to_string()
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            error: message,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(Error::NotFound("Deck").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::invalid("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::DeckMissing(uuid::Uuid::nil()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Storage(anyhow::anyhow!("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::from(SchedulingError::CorruptState("x".into())).code(),
            "CORRUPT_CARD_STATE"
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(Error::NotFound("Study session").to_string(), "Study session not found");
    }
}
