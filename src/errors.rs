//! Wire-level error taxonomy.
//!
//! Every handler that can fail in a way the caller needs to see returns a
//! [`BrokerError`]. The transport layer converts it to the structured
//! `{"error": {"code": ..., "message": ...}}` envelope; nothing upstream of
//! the transport boundary should construct that JSON shape by hand.

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("no current tab")]
    NoTab,

    #[error("stale snapshot ref: {0}")]
    RefStale(String),

    #[error("max concurrent sessions reached")]
    Exhausted,

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("blocked by guardrail: {0}")]
    Blocked(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("peer-sync conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Extra structured detail (e.g. the guardrail rule name, or driver's
    /// verbatim message) — present only where the spec calls for a nested field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl BrokerError {
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            BrokerError::Unauthorized(_) => 401,
            BrokerError::Forbidden(_) => 403,
            BrokerError::BadInput(_) => 400,
            BrokerError::Unknown(_) => 404,
            BrokerError::NoTab => 409,
            BrokerError::RefStale(_) => 409,
            BrokerError::Exhausted => 503,
            BrokerError::Timeout(_) => 504,
            BrokerError::Driver(_) => 502,
            BrokerError::Blocked(_) => 422,
            BrokerError::Integrity(_) => 409,
            BrokerError::Conflict(_) => 409,
            BrokerError::Internal(_) => 500,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerError::Unauthorized(_) => "unauthorized",
            BrokerError::Forbidden(_) => "forbidden",
            BrokerError::BadInput(_) => "bad_input",
            BrokerError::Unknown(_) => "unknown",
            BrokerError::NoTab => "no_tab",
            BrokerError::RefStale(_) => "ref_stale",
            BrokerError::Exhausted => "exhausted",
            BrokerError::Timeout(_) => "timeout",
            BrokerError::Driver(_) => "driver",
            BrokerError::Blocked(_) => "blocked",
            BrokerError::Integrity(_) => "integrity",
            BrokerError::Conflict(_) => "conflict",
            BrokerError::Internal(_) => "internal",
        }
    }

    /// Nested nested-field detail the spec calls out for `Driver` (verbatim
    /// driver message) and `Blocked` (rule name).
    fn detail(&self) -> Option<serde_json::Value> {
        match self {
            BrokerError::Driver(msg) => Some(serde_json::json!({ "driverMessage": msg })),
            BrokerError::Blocked(rule) => Some(serde_json::json!({ "rule": rule })),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.as_str().to_string(),
            message: self.to_string(),
            detail: self.detail(),
        }
    }

    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse { error: self.to_error_body() }
    }
}

impl axum::response::IntoResponse for BrokerError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.http_status())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(code = self.as_str(), "request failed");
        (status, axum::Json(self.to_response())).into_response()
    }
}

impl From<anyhow::Error> for BrokerError {
    fn from(e: anyhow::Error) -> Self {
        BrokerError::Internal(e.to_string())
    }
}
