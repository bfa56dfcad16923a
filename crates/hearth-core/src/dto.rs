//! Request and response DTOs flowing through the pipelines.
//!
//! The host binds an incoming request to a [`RequestDto`] before the global
//! request filters run, and services produce a [`ResponseDto`] that the
//! global response filters see before serialization. Both are deliberately
//! format-agnostic: serialization codecs live outside this core.

use http::StatusCode;
use serde_json::Value;

/// A bound request: the operation name plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDto {
    /// The operation (service) this request targets.
    pub operation: String,
    /// The deserialized request payload.
    pub body: Value,
}

impl RequestDto {
    /// Bind an operation name to a payload.
    pub fn new(operation: impl Into<String>, body: Value) -> Self {
        Self {
            operation: operation.into(),
            body,
        }
    }
}

/// A service result ready for the response filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDto {
    /// Status the transport should send.
    pub status: StatusCode,
    /// The response payload.
    pub body: Value,
}

impl ResponseDto {
    /// A successful response.
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// An error response with an explicit status.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message.into() }),
        }
    }
}
