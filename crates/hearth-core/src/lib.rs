//! # Hearth Core
//!
//! Foundation crate for the hearth application host providing the unified
//! error type, transport-facing request/response abstractions, and the
//! per-request context used by the pipeline engine.
//!
//! ## Architecture
//!
//! ```text
//! hearth-core/
//! ├── error/          # Unified HostError and status-code mapping
//! ├── request/        # Object-safe HttpRequest + in-memory BasicRequest
//! ├── response/       # Object-safe HttpResponse + in-memory BasicResponse
//! ├── context/        # Per-request state with deterministic teardown
//! ├── dto/            # Request/response DTOs flowing through the pipelines
//! └── content_type/   # Content-type and format-name vocabulary
//! ```
//!
//! This crate provides the foundation types used by `hearth-host`. It is
//! typically not used directly but imported through the host crate.

#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod content_type;
pub mod context;
pub mod dispose;
pub mod dto;
pub mod error;
pub mod request;
pub mod response;

pub use content_type::Format;
pub use context::RequestContext;
pub use dispose::Disposable;
pub use dto::{RequestDto, ResponseDto};
pub use error::{ErrorKind, HostError, HostResult};
pub use request::{BasicRequest, HttpRequest};
pub use response::{BasicResponse, HttpResponse};
