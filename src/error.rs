//! Error taxonomy for the practice backend and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::ProblemId;

/// Failures of the durable stores (SQLite catalog/history, key-value layer).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted (e.g. a counter that is not an integer).
    #[error("corrupt value under '{key}': {detail}")]
    Corrupt { key: String, detail: String },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Identity provider failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    Malformed,

    #[error("token rejected by identity provider (HTTP {0})")]
    Rejected(u16),

    #[error("identity provider response has no subject")]
    MissingSubject,

    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
}

/// LLM analysis provider failures. Always surfaced so the caller can retry.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis provider is not configured")]
    NotConfigured,

    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("analysis provider HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("analysis provider returned an empty reply")]
    EmptyReply,
}

/// Top-level error for every session-machine operation.
#[derive(Debug, Error)]
pub enum PracticeError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("problem not found: {0}")]
    ProblemNotFound(ProblemId),

    #[error("no problems available in the catalog")]
    EmptyCatalog,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("all problems in the current set are completed")]
    SetCompleted,

    #[error("submitted problem {submitted} is not the current problem {current}")]
    ProblemMismatch { submitted: ProblemId, current: ProblemId },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PracticeError {
    /// Stable machine-readable code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            PracticeError::Auth(_) => "unauthorized",
            PracticeError::SessionNotFound(_) => "session_not_found",
            PracticeError::ProblemNotFound(_) => "problem_not_found",
            PracticeError::EmptyCatalog => "empty_catalog",
            PracticeError::Analysis(_) => "analysis_failed",
            PracticeError::SetCompleted => "set_completed",
            PracticeError::ProblemMismatch { .. } => "problem_mismatch",
            PracticeError::InvalidRequest(_) => "invalid_request",
            PracticeError::Store(_) => "store_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PracticeError::Auth(_) => StatusCode::UNAUTHORIZED,
            PracticeError::SessionNotFound(_) | PracticeError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
            PracticeError::EmptyCatalog => StatusCode::SERVICE_UNAVAILABLE,
            PracticeError::Analysis(_) => StatusCode::BAD_GATEWAY,
            PracticeError::SetCompleted | PracticeError::ProblemMismatch { .. } => StatusCode::CONFLICT,
            PracticeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PracticeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only analysis provider failures are worth an explicit retry by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PracticeError::Analysis(_))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&PracticeError> for ErrorBody {
    fn from(e: &PracticeError) -> Self {
        Self { error: e.code(), message: e.to_string(), retryable: e.is_retryable() }
    }
}

impl IntoResponse for PracticeError {
    fn into_response(self) -> Response {
        if matches!(self, PracticeError::Store(_)) {
            tracing::error!(target: "leetcoach_backend", error = %self, "store failure surfaced to caller");
        }
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_distinct_code() {
        let errors = vec![
            PracticeError::Auth(AuthError::MissingToken),
            PracticeError::SessionNotFound("s".into()),
            PracticeError::ProblemNotFound(7),
            PracticeError::EmptyCatalog,
            PracticeError::Analysis(AnalysisError::EmptyReply),
            PracticeError::SetCompleted,
            PracticeError::ProblemMismatch { submitted: 1, current: 2 },
            PracticeError::InvalidRequest("bad".into()),
            PracticeError::Store(StoreError::Poisoned),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn only_analysis_failures_are_retryable() {
        assert!(PracticeError::Analysis(AnalysisError::NotConfigured).is_retryable());
        assert!(!PracticeError::EmptyCatalog.is_retryable());
        assert!(!PracticeError::Auth(AuthError::Rejected(401)).is_retryable());
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(PracticeError::SessionNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(PracticeError::Auth(AuthError::Malformed).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(PracticeError::EmptyCatalog.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(PracticeError::SetCompleted.status(), StatusCode::CONFLICT);
    }
}
