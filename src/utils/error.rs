//! Error handling module
//!
//! Defines the single error currency returned by every relay stage

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay error types
///
/// Every pipeline stage returns one of these; nothing else crosses the
/// orchestrator boundary.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Client sent a malformed or incomplete request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or unknown API token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No adaptor registered for the channel's API type
    #[error("Invalid api type: {0}")]
    InvalidApiType(String),

    /// Channel configuration or deployment entry missing
    #[error("{message}")]
    ConfigNotFound { code: &'static str, message: String },

    /// Channel configuration or pricing present but malformed
    #[error("{message}")]
    ConfigInvalid { code: &'static str, message: String },

    /// Account balance cannot cover the reservation
    #[error("Insufficient quota: required {required}, remaining {remaining}")]
    InsufficientQuota { required: i64, remaining: i64 },

    /// Quota ledger unavailable or rejected an operation
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Canonical request could not be converted for the upstream protocol
    #[error("Request conversion failed: {0}")]
    ConversionFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound call failed before a response arrived
    #[error("Upstream request failed: {0}")]
    TransportFailed(String),

    /// Upstream answered with an error; status is relayed verbatim
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        error_type: String,
        code: String,
    },

    /// Upstream body could not be parsed
    #[error("Failed to parse upstream response: {0}")]
    ResponseParseFailed(String),
}

/// Error body in OpenAI format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

/// Wrapper used on the wire: `{"error": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Upstreams send `code` as a string, a number or null
fn deserialize_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl RelayError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) | RelayError::InvalidApiType(_) => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::InsufficientQuota { .. } => StatusCode::PAYMENT_REQUIRED,
            RelayError::Upstream { status, .. } => *status,
            RelayError::ConfigNotFound { .. }
            | RelayError::ConfigInvalid { .. }
            | RelayError::Ledger(_)
            | RelayError::ConversionFailed(_)
            | RelayError::Serialization(_)
            | RelayError::TransportFailed(_)
            | RelayError::ResponseParseFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &str {
        match self {
            RelayError::InvalidRequest(_) => "invalid_text_request",
            RelayError::Unauthorized(_) => "invalid_token",
            RelayError::InvalidApiType(_) => "invalid_api_type",
            RelayError::ConfigNotFound { code, .. } | RelayError::ConfigInvalid { code, .. } => code,
            RelayError::InsufficientQuota { .. } => "insufficient_quota",
            RelayError::Ledger(_) => "ledger_failed",
            RelayError::ConversionFailed(_) => "convert_request_failed",
            RelayError::Serialization(_) => "json_marshal_failed",
            RelayError::TransportFailed(_) => "do_request_failed",
            RelayError::Upstream { code, .. } => code,
            RelayError::ResponseParseFailed(_) => "unmarshal_response_body_failed",
        }
    }

    /// Get error type string
    pub fn error_type(&self) -> &str {
        match self {
            RelayError::InvalidRequest(_) | RelayError::InvalidApiType(_) => "invalid_request_error",
            RelayError::Unauthorized(_) => "authentication_error",
            RelayError::InsufficientQuota { .. } => "billing_error",
            RelayError::Upstream { error_type, .. } => error_type,
            _ => "api_error",
        }
    }

    /// Convert to OpenAI error format
    pub fn to_error_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                message: self.to_string(),
                error_type: self.error_type().to_string(),
                code: Some(self.code().to_string()),
                param: None,
            },
        }
    }

    /// Translate a non-200 upstream body into the uniform shape
    ///
    /// The upstream status is preserved. When the body carries an OpenAI-style
    /// error object its message, type and code are kept.
    pub fn from_upstream(status: StatusCode, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<ErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error)
            .filter(|error| !error.message.is_empty());

        match parsed {
            Some(error) => RelayError::Upstream {
                status,
                message: error.message,
                error_type: if error.error_type.is_empty() {
                    "upstream_error".to_string()
                } else {
                    error.error_type
                },
                code: error.code.unwrap_or_else(|| "bad_response_status_code".to_string()),
            },
            None => RelayError::Upstream {
                status,
                message: format!("bad response status code {}", status.as_u16()),
                error_type: "upstream_error".to_string(),
                code: "bad_response_status_code".to_string(),
            },
        }
    }
}

/// Implement IntoResponse trait to allow errors to be returned directly as HTTP responses
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Relay error: {} - Status code: {}", self, status);
        } else {
            tracing::warn!("Relay rejected: {} ({}) - Status code: {}", self.code(), self, status);
        }

        (status, Json(self.to_error_envelope())).into_response()
    }
}

/// Result type alias
pub type RelayResult<T> = Result<T, RelayError>;

/// Error context extension trait
pub trait ErrorContext<T> {
    /// Map into an invalid-request error
    fn invalid_request_context(self, message: &str) -> RelayResult<T>;

    /// Map into a conversion error
    fn conversion_context(self, message: &str) -> RelayResult<T>;

    /// Map into a transport error
    fn transport_context(self, message: &str) -> RelayResult<T>;

    /// Map into a response parse error
    fn parse_context(self, message: &str) -> RelayResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn invalid_request_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::InvalidRequest(format!("{}: {}", message, e)))
    }

    fn conversion_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::ConversionFailed(format!("{}: {}", message, e)))
    }

    fn transport_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::TransportFailed(format!("{}: {}", message, e)))
    }

    fn parse_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::ResponseParseFailed(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(RelayError::InvalidRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RelayError::InsufficientQuota { required: 10, remaining: 1 }.status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(RelayError::TransportFailed("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_error_keeps_status_and_body() {
        let body = br#"{"error":{"message":"model overloaded","type":"server_error","code":"overloaded"}}"#;
        let err = RelayError::from_upstream(StatusCode::SERVICE_UNAVAILABLE, body);

        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "overloaded");
        assert_eq!(err.error_type(), "server_error");
        assert_eq!(err.to_string(), "model overloaded");
    }

    #[test]
    fn test_upstream_error_unparseable_body() {
        let err = RelayError::from_upstream(StatusCode::BAD_GATEWAY, b"<html>oops</html>");

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "bad_response_status_code");
        assert_eq!(err.error_type(), "upstream_error");
        assert_eq!(err.to_string(), "bad response status code 502");
    }

    #[test]
    fn test_numeric_upstream_code() {
        let body = br#"{"error":{"message":"denied","type":"","code":401}}"#;
        let err = RelayError::from_upstream(StatusCode::UNAUTHORIZED, body);

        assert_eq!(err.code(), "401");
        assert_eq!(err.error_type(), "upstream_error");
    }

    #[test]
    fn test_error_context() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused"
        ));

        match result.transport_context("Failed to reach upstream") {
            Err(RelayError::TransportFailed(msg)) => {
                assert!(msg.contains("Failed to reach upstream"));
                assert!(msg.contains("connection refused"));
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }
}
