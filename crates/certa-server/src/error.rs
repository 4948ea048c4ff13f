use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use certa_journal::JournalError;
use certa_minting::MintError;
use certa_records::RecordError;
use certa_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("attempt is busy: {0}")]
    Busy(String),

    #[error(transparent)]
    Mint(#[from] MintError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Busy(_) => "busy",
            Self::Mint(e) => e.kind(),
            Self::Store(_) => "storage_error",
            Self::Record(_) => "record_error",
            Self::Journal(_) => "journal_error",
            Self::Config(_) => "config_error",
            Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Busy(_) => StatusCode::CONFLICT,
            Self::Mint(e) => mint_status(e),
            Self::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            Self::Record(RecordError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Record(RecordError::Duplicate { .. }) => StatusCode::CONFLICT,
            Self::Record(RecordError::Invariant(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(_) | Self::Record(_) => StatusCode::BAD_GATEWAY,
            Self::Journal(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Status code for a mint attempt that could not be started or retried.
pub fn mint_status(e: &MintError) -> StatusCode {
    match e {
        MintError::Preflight(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MintError::DuplicateSubmission
        | MintError::IllegalTransition { .. }
        | MintError::NotRetryable(_)
        | MintError::AlreadyCompleted => StatusCode::CONFLICT,
        MintError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        }
        let body = json!({
            "error_kind": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
