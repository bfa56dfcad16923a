//! # Hearth Host
//!
//! The request-processing core of a generic HTTP application host: a
//! single live [`AppHost`] per process owning configuration, a plugin
//! registry, a dependency container, and the pipeline chains every request
//! flows through around service execution.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth_host::prelude::*;
//!
//! struct OrdersApp;
//!
//! impl HostApp for OrdersApp {
//!     fn service_name(&self) -> &str {
//!         "orders"
//!     }
//!
//!     fn assemblies(&self) -> Vec<ServiceAssembly> {
//!         vec![ServiceAssembly::new("orders").service(
//!             "Ping",
//!             |_req: serde_json::Value, _ctx: &mut RequestContext| Ok("pong"),
//!         )]
//!     }
//!
//!     fn configure(&self, host: &AppHost) -> HostResult<()> {
//!         host.add_request_filter(|_req, _res, dto| {
//!             tracing::debug!(operation = %dto.operation, "request bound");
//!         });
//!         Ok(())
//!     }
//! }
//!
//! let host = AppHost::init(OrdersApp).expect("host init failed");
//! let mut req = BasicRequest::get("/metadata");
//! let mut res = BasicResponse::new();
//! host.handle_request(&mut req, &mut res);
//! host.dispose();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! hearth-host/
//! ├── host/           # AppHost: lifecycle, singleton slot, dispatch
//! ├── config/         # HostConfig + pure DerivedConfig recompute
//! ├── features/       # Feature bitset driving plugin/metadata exclusions
//! ├── plugin/         # Plugin contract, registry, two-phase loading
//! ├── pipeline/       # FilterChain / ResolverChain / RefineChain
//! ├── container/      # Minimal dependency container
//! ├── services/       # Service controller boundary + ServiceRoutes
//! ├── builtin/        # Default plugins (metadata, routes, formats)
//! ├── cache/          # Cache contract + in-memory fallback
//! ├── messaging/      # Messaging contracts + factory fallback rule
//! ├── vfs/            # Virtual file providers, first-match composition
//! └── logging/        # tracing initialization
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod builtin;
pub mod cache;
pub mod config;
pub mod container;
pub mod features;
pub mod handler;
pub mod host;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod plugin;
pub mod services;
pub mod vfs;

pub use config::{ConfigSnapshot, DerivedConfig, HostConfig};
pub use container::Container;
pub use features::{Feature, FeatureSet};
pub use handler::{HttpHandler, NotFoundHandler};
pub use host::{AppHost, HostApp};
pub use logging::{LoggingConfig, LoggingGuard};
pub use plugin::{LoadPhase, Plugin, PluginOutcome, PluginRegistry};
pub use services::{ServiceAssembly, ServiceController, ServiceRoutes};

// Re-export the foundation crate so embedders depend on one crate.
pub use hearth_core as core;

/// Common imports for embedders.
pub mod prelude {
    pub use crate::builtin::{MetadataPlugin, PredefinedRoutesPlugin, RequestInfoPlugin};
    pub use crate::cache::{CacheClient, MemoryCacheClient};
    pub use crate::config::HostConfig;
    pub use crate::features::{Feature, FeatureSet};
    pub use crate::handler::HttpHandler;
    pub use crate::host::{AppHost, HostApp};
    pub use crate::messaging::{MessageFactory, MessageProducer, MessageService};
    pub use crate::plugin::Plugin;
    pub use crate::services::{ServiceAssembly, ServiceController};
    pub use hearth_core::{
        BasicRequest, BasicResponse, HostError, HostResult, HttpRequest, HttpResponse,
        RequestContext, RequestDto, ResponseDto,
    };
}
