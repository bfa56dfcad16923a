//! Unified error handling for the hearth host.
//!
//! This module provides a single error type [`HostError`] for all host
//! operations. Every error carries an [`ErrorKind`] classification which maps
//! to an HTTP status code, so error paths anywhere in the pipeline can
//! synthesize a response without knowing where the error originated.
//!
//! ## Example
//!
//! ```rust
//! use hearth_core::error::{ErrorKind, HostError, HostResult};
//!
//! fn find_widget(id: u64) -> HostResult<String> {
//!     Err(HostError::not_found(format!("widget {id}")))
//! }
//!
//! let err = find_widget(42).unwrap_err();
//! assert_eq!(err.kind, ErrorKind::NotFound);
//! assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
//! ```

use core::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Result type alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Unified host error type.
///
/// The single error type used across the hearth crates. The `component`
/// field tags the subsystem that produced the error (plugin loading, the
/// container, service dispatch) for structured log correlation; it is never
/// serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Component where the error occurred.
    #[serde(skip_serializing)]
    pub component: Option<String>,
}

/// Error classification for programmatic handling.
///
/// Each kind maps to an HTTP status code via [`HostError::status_code`];
/// the mapping is what the generic error path uses when no exception
/// handler claims a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A live host instance already exists (double-init violation).
    HostAlreadyInitialized,
    /// Invalid or missing configuration.
    Configuration,
    /// A plugin failed during pre-init or registration.
    PluginFailed,
    /// A dependency was not registered in the container.
    DependencyNotFound,
    /// No service or handler matched the request.
    NotFound,
    /// The request could not be bound or parsed.
    InvalidRequest,
    /// The request was bound but failed validation.
    Validation,
    /// Authentication required or failed.
    Unauthorized,
    /// Authenticated but not permitted.
    Forbidden,
    /// The operation timed out.
    Timeout,
    /// The operation conflicts with current state.
    Conflict,
    /// The service exists but cannot serve right now.
    ServiceUnavailable,
    /// A service implementation returned an error.
    ServiceError,
    /// Unclassified internal failure.
    Internal,
}

impl HostError {
    /// Create an error with an explicit kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            component: None,
        }
    }

    /// A second live host instance was requested.
    pub fn host_already_initialized() -> Self {
        Self::new(
            ErrorKind::HostAlreadyInitialized,
            "a live host instance already exists; dispose it before initializing another",
        )
    }

    /// Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Plugin pre-init or registration failure.
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PluginFailed, message).with_component(plugin)
    }

    /// A required dependency is missing from the container.
    pub fn dependency_not_found(type_name: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::DependencyNotFound,
            format!("no registration for {}", type_name.into()),
        )
        .with_component("container")
    }

    /// Nothing matched the request.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, what)
    }

    /// The request could not be bound.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// A service implementation failed.
    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceError, message)
    }

    /// Unclassified internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Tag the error with the component that produced it.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// The HTTP status code this error maps to.
    ///
    /// Used by the generic error path when no exception handler produces a
    /// response of its own.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidRequest | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::HostAlreadyInitialized
            | ErrorKind::Configuration
            | ErrorKind::PluginFailed
            | ErrorKind::DependencyNotFound
            | ErrorKind::ServiceError
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(component) => write!(f, "{:?} ({component}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for HostError {}
