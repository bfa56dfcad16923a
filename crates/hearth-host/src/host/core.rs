//! Core host implementation.
//!
//! Contains the [`AppHost`] struct with its owned state, the pipeline
//! registration and application hooks, request dispatch, and disposal.
//! The ordered initialization sequence lives in [`super::init`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{error, trace, warn};

use hearth_core::{
    content_type, Format, HostError, HostResult, HttpRequest, HttpResponse, RequestContext,
    RequestDto, ResponseDto,
};

use crate::config::{ConfigSnapshot, HostConfig};
use crate::container::Container;
use crate::handler::{HttpHandler, NotFoundHandler};
use crate::pipeline::{
    CatchAllResolver, FilterChain, PreRequestFilter, RawHandlerResolver, RefineChain,
    RequestFilter, ResolverChain, ResponseFilter, ServiceExceptionHandler,
    UncaughtExceptionHandler,
};
use crate::plugin::{run_plugin_phase, LoadPhase, Plugin, PluginOutcome, PluginRegistry};
use crate::services::ServiceController;
use crate::vfs::VirtualFiles;

use super::init::HostApp;

/// Process-wide singleton slot.
///
/// Exists only to enforce the single-live-instance invariant and to back
/// the narrow [`AppHost::try_current`] accessor; everything else receives
/// the host by reference.
static ACTIVE_HOST: Lazy<RwLock<Option<Arc<AppHost>>>> = Lazy::new(|| RwLock::new(None));

/// The application host: owns configuration, the plugin registry, the
/// pipeline chains, and the dependency container for one running
/// application instance.
///
/// Exactly one live instance exists per process. Construct it through
/// [`AppHost::init`]; tear it down with [`AppHost::dispose`], after which a
/// new host may be initialized (test teardown/setup cycles rely on this).
pub struct AppHost {
    pub(crate) app: Box<dyn HostApp>,
    pub(crate) state: ArcSwap<ConfigSnapshot>,
    pub(crate) plugins: PluginRegistry,
    pub(crate) outcomes: RwLock<Vec<PluginOutcome>>,
    pub(crate) container: Container,
    pub(crate) services: Arc<dyn ServiceController>,
    pub(crate) content_types: DashMap<String, String>,
    pub(crate) virtual_files: RwLock<Option<Arc<dyn VirtualFiles>>>,
    pub(crate) file_sources: RwLock<Vec<Arc<dyn VirtualFiles>>>,

    pub(crate) pre_request_filters: FilterChain<PreRequestFilter>,
    pub(crate) request_filters: FilterChain<RequestFilter>,
    pub(crate) response_filters: FilterChain<ResponseFilter>,
    pub(crate) raw_handlers: ResolverChain<RawHandlerResolver>,
    pub(crate) catch_all_handlers: ResolverChain<CatchAllResolver>,
    pub(crate) service_exception_handlers: RefineChain<ServiceExceptionHandler>,
    pub(crate) uncaught_exception_handlers: FilterChain<UncaughtExceptionHandler>,

    pub(crate) plugins_loaded: AtomicBool,
    pub(crate) after_init_ran: AtomicBool,
    pub(crate) disposed: AtomicBool,
    pub(crate) started_at: RwLock<Option<DateTime<Utc>>>,
    pub(crate) ready_at: RwLock<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for AppHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHost")
            .field("service_name", &self.config().service_name)
            .field("plugins", &self.plugins)
            .field("plugins_loaded", &self.plugins_loaded.load(Ordering::SeqCst))
            .finish()
    }
}

// ===== Singleton access =====

impl AppHost {
    /// The live host, if one has been initialized.
    ///
    /// Narrow accessor for call sites that cannot receive the host by
    /// reference. Prefer passing the host explicitly.
    pub fn try_current() -> Option<Arc<AppHost>> {
        ACTIVE_HOST.read().clone()
    }

    pub(crate) fn publish(host: &Arc<AppHost>) -> HostResult<()> {
        let mut slot = ACTIVE_HOST.write();
        if slot.is_some() {
            return Err(HostError::host_already_initialized());
        }
        *slot = Some(host.clone());
        Ok(())
    }

    /// Release the dependency container and clear the singleton slot.
    ///
    /// Idempotent. Container disposal cascades to container-owned
    /// singletons; errors during that release are swallowed.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        trace!(service = %self.config().service_name, "disposing host");
        self.container.dispose();

        let mut slot = ACTIVE_HOST.write();
        if let Some(current) = slot.as_ref() {
            if std::ptr::eq(Arc::as_ptr(current), self as *const AppHost) {
                *slot = None;
            }
        }
    }
}

// ===== Configuration =====

impl AppHost {
    /// The current `(config, derived)` snapshot.
    pub fn config(&self) -> Arc<ConfigSnapshot> {
        self.state.load_full()
    }

    /// Replace the configuration wholesale, recomputing derived state.
    pub fn set_config(&self, config: HostConfig) {
        self.state.store(Arc::new(ConfigSnapshot::new(config)));
    }

    /// Clone-mutate-reassign convenience over [`AppHost::set_config`].
    pub fn update_config(&self, mutate: impl FnOnce(&mut HostConfig)) {
        let mut config = self.config().to_config();
        mutate(&mut config);
        self.set_config(config);
    }
}

// ===== Owned collaborators =====

impl AppHost {
    /// The dependency container.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The service controller.
    pub fn services(&self) -> &dyn ServiceController {
        self.services.as_ref()
    }

    /// The plugin registry.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Outcomes recorded by the plugin-loading loop, in execution order.
    pub fn plugin_outcomes(&self) -> Vec<PluginOutcome> {
        self.outcomes.read().clone()
    }

    /// Whether the two-phase plugin load has completed.
    pub fn plugins_loaded(&self) -> bool {
        self.plugins_loaded.load(Ordering::SeqCst)
    }

    /// Register a format's content type.
    pub fn register_format(&self, format: Format) {
        self.content_types.insert(
            format.short_name().to_string(),
            format.content_type().to_string(),
        );
    }

    /// The content type registered for a format short name.
    pub fn content_type_for(&self, format_name: &str) -> Option<String> {
        self.content_types.get(format_name).map(|e| e.value().clone())
    }

    /// Registered format short names, sorted.
    pub fn registered_formats(&self) -> Vec<String> {
        let mut names: Vec<String> = self.content_types.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// The virtual-files provider, once initialization resolved one.
    pub fn virtual_files(&self) -> Option<Arc<dyn VirtualFiles>> {
        self.virtual_files.read().clone()
    }

    /// Install a virtual-files provider, overriding default resolution.
    pub fn set_virtual_files(&self, provider: Arc<dyn VirtualFiles>) {
        *self.virtual_files.write() = Some(provider);
    }

    /// Contribute an additional file source (embedded resources) to
    /// default provider resolution.
    pub fn add_file_source(&self, source: Arc<dyn VirtualFiles>) {
        self.file_sources.write().push(source);
    }

    /// Timestamp recorded when `init` completed.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.read()
    }

    /// Timestamp recorded when `on_after_init` finished.
    pub fn ready_at(&self) -> Option<DateTime<Utc>> {
        *self.ready_at.read()
    }
}

// ===== Plugins =====

impl AppHost {
    /// Add a plugin.
    ///
    /// Before the two-phase load completes this appends to the registry for
    /// the normal sequence; afterwards the plugin registers immediately,
    /// through the same catch-and-log policy.
    pub fn add_plugin<P: Plugin>(&self, plugin: P) {
        if self.plugins_loaded() {
            let name = std::any::type_name::<P>();
            let plugin: Arc<dyn Plugin> = Arc::new(plugin);
            self.plugins
                .add_arc(name, std::any::TypeId::of::<P>(), plugin.clone());
            for phase in [LoadPhase::PreInit, LoadPhase::Register] {
                let outcome = run_plugin_phase(self, name, &plugin, phase);
                self.outcomes.write().push(outcome);
            }
        } else {
            self.plugins.add(plugin);
        }
    }
}

// ===== Pipeline registration =====

impl AppHost {
    /// Append a pre-request filter.
    pub fn add_pre_request_filter(
        &self,
        filter: impl Fn(&mut dyn HttpRequest, &mut dyn HttpResponse) + Send + Sync + 'static,
    ) {
        self.pre_request_filters.add(Arc::new(filter));
    }

    /// Append a global request filter.
    pub fn add_request_filter(
        &self,
        filter: impl Fn(&mut dyn HttpRequest, &mut dyn HttpResponse, &mut RequestDto)
        + Send
        + Sync
        + 'static,
    ) {
        self.request_filters.add(Arc::new(filter));
    }

    /// Append a global response filter.
    pub fn add_response_filter(
        &self,
        filter: impl Fn(&mut dyn HttpRequest, &mut dyn HttpResponse, &ResponseDto)
        + Send
        + Sync
        + 'static,
    ) {
        self.response_filters.add(Arc::new(filter));
    }

    /// Append a raw-handler resolver.
    pub fn add_raw_handler(
        &self,
        resolver: impl Fn(&AppHost, &dyn HttpRequest) -> Option<Arc<dyn HttpHandler>>
        + Send
        + Sync
        + 'static,
    ) {
        self.raw_handlers.add(Arc::new(resolver));
    }

    /// Append a catch-all resolver.
    pub fn add_catch_all_handler(
        &self,
        resolver: impl Fn(&AppHost, &dyn HttpRequest) -> Option<Arc<dyn HttpHandler>>
        + Send
        + Sync
        + 'static,
    ) {
        self.catch_all_handlers.add(Arc::new(resolver));
    }

    /// Append a service-exception handler.
    pub fn add_service_exception_handler(
        &self,
        handler: impl Fn(&dyn HttpRequest, &RequestDto, &HostError) -> Option<ResponseDto>
        + Send
        + Sync
        + 'static,
    ) {
        self.service_exception_handlers.add(Arc::new(handler));
    }

    /// Append an uncaught-exception handler.
    pub fn add_uncaught_exception_handler(
        &self,
        handler: impl Fn(&mut dyn HttpRequest, &mut dyn HttpResponse, &str, &HostError)
        + Send
        + Sync
        + 'static,
    ) {
        self.uncaught_exception_handlers.add(Arc::new(handler));
    }
}

// ===== Pipeline application =====

impl AppHost {
    /// Run the pre-request filters; stops once the response reports closed.
    pub fn apply_pre_request_filters(
        &self,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) {
        self.pre_request_filters.for_each(|filter| {
            filter(&mut *req, &mut *res);
            !res.is_closed()
        });
    }

    /// Run the global request filters against the bound DTO.
    pub fn apply_request_filters(
        &self,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
        dto: &mut RequestDto,
    ) {
        self.request_filters.for_each(|filter| {
            filter(&mut *req, &mut *res, dto);
            !res.is_closed()
        });
    }

    /// Run the global response filters.
    pub fn apply_response_filters(
        &self,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
        response: &ResponseDto,
    ) {
        self.response_filters.for_each(|filter| {
            filter(&mut *req, &mut *res, response);
            !res.is_closed()
        });
    }

    /// Try raw-handler resolvers in order; first match wins.
    pub fn resolve_raw_handler(&self, req: &dyn HttpRequest) -> Option<Arc<dyn HttpHandler>> {
        self.raw_handlers.resolve(|resolver| resolver(self, req))
    }

    /// Try catch-all resolvers in order; first match wins.
    pub fn resolve_catch_all_handler(&self, req: &dyn HttpRequest) -> Option<Arc<dyn HttpHandler>> {
        self.catch_all_handlers.resolve(|resolver| resolver(self, req))
    }

    /// Run the service-exception handlers; the last non-`None` result is
    /// the effective error response.
    pub fn apply_service_exception_handlers(
        &self,
        req: &dyn HttpRequest,
        dto: &RequestDto,
        err: &HostError,
    ) -> Option<ResponseDto> {
        self.service_exception_handlers
            .refine(|handler| handler(req, dto, err))
    }

    /// Handle an error that escaped the dispatch path.
    ///
    /// With handlers registered, all of them run in order and the host
    /// defers entirely to them. With none, a generic response is
    /// synthesized from the error, unless the response is already closed,
    /// in which case nothing is written.
    pub fn handle_uncaught_exception(
        &self,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
        operation: &str,
        err: &HostError,
    ) {
        if !self.uncaught_exception_handlers.is_empty() {
            self.uncaught_exception_handlers.for_each(|handler| {
                handler(&mut *req, &mut *res, operation, err);
                true
            });
            return;
        }

        if res.is_closed() {
            trace!(%operation, "response already closed, skipping error write");
            return;
        }

        error!(%operation, error = %err, "unhandled error during dispatch");
        self.write_response(
            res,
            err.status_code(),
            content_type::PLAIN_TEXT,
            err.message.as_bytes(),
        );
    }
}

// ===== Request dispatch =====

impl AppHost {
    /// Serve one request through the full pipeline.
    ///
    /// Raw handlers are tried first; otherwise the request flows through
    /// pre-request filters, binding, request filters, service execution,
    /// and response filters. Any error escaping this path goes through
    /// [`AppHost::handle_uncaught_exception`], so dispatch never panics the
    /// worker as long as the response is open.
    pub fn handle_request(&self, req: &mut dyn HttpRequest, res: &mut dyn HttpResponse) {
        let operation = self.operation_name(req);
        if let Err(err) = self.dispatch(req, res, &operation) {
            self.handle_uncaught_exception(req, res, &operation, &err);
        }
    }

    fn dispatch(
        &self,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
        operation: &str,
    ) -> HostResult<()> {
        if let Some(handler) = self.resolve_raw_handler(req) {
            return handler.process(self, req, res);
        }

        self.apply_pre_request_filters(req, res);
        if res.is_closed() {
            return Ok(());
        }

        if !self.services.has_operation(operation) {
            if let Some(handler) = self.resolve_catch_all_handler(req) {
                return handler.process(self, req, res);
            }
            return NotFoundHandler.process(self, req, res);
        }

        self.execute_operation(req, res, operation)
    }

    /// Bind, filter, execute, and write one service operation.
    pub fn execute_operation(
        &self,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
        operation: &str,
    ) -> HostResult<()> {
        let body = if req.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(req.body())
                .map_err(|e| HostError::invalid_request(format!("malformed request body: {e}")))?
        };
        let mut dto = RequestDto::new(operation, body);
        let mut ctx = RequestContext::new();

        self.apply_request_filters(req, res, &mut dto);
        if res.is_closed() {
            self.release_request(&mut ctx);
            return Ok(());
        }

        let response = match self.services.execute(&dto, &mut ctx) {
            Ok(response) => response,
            Err(err) => {
                warn!(%operation, error = %err, "service execution failed");
                self.apply_service_exception_handlers(req, &dto, &err)
                    .unwrap_or_else(|| ResponseDto::error(err.status_code(), err.message.clone()))
            }
        };

        self.apply_response_filters(req, res, &response);
        if !res.is_closed() {
            let body = serde_json::to_vec(&response.body).unwrap_or_default();
            let content_type = self
                .config()
                .default_content_type
                .clone()
                .unwrap_or_else(|| content_type::JSON.to_string());
            self.write_response(res, response.status, &content_type, &body);
        }

        self.release_request(&mut ctx);
        Ok(())
    }

    /// Write a complete response: global headers, content type, status,
    /// body. A closed response makes this a guarded no-op.
    pub fn write_response(
        &self,
        res: &mut dyn HttpResponse,
        status: StatusCode,
        content_type: &str,
        body: &[u8],
    ) {
        if res.is_closed() {
            trace!("response already closed, skipping write");
            return;
        }

        for (name, value) in &self.config().global_response_headers {
            match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                (Ok(name), Ok(value)) => {
                    res.headers_mut().insert(name, value);
                }
                _ => warn!(header = %name, "skipping malformed global response header"),
            }
        }
        if let Ok(value) = content_type.parse::<HeaderValue>() {
            res.headers_mut().insert(http::header::CONTENT_TYPE, value);
        }
        res.set_status(status);
        res.write(body);
        res.close();
    }

    /// Tear down per-request state, releasing every tracked item through
    /// the container adapter. Best-effort by contract.
    pub fn release_request(&self, ctx: &mut RequestContext) {
        for item in ctx.take_tracked() {
            self.container.release(item.as_ref());
        }
    }

    fn operation_name(&self, req: &dyn HttpRequest) -> String {
        let path = req.path().trim_matches('/');
        let snapshot = self.config();
        let handler_path = snapshot.derived.handler_path.as_str();

        let rest = if handler_path.is_empty() {
            path
        } else {
            path.strip_prefix(handler_path)
                .map(|r| r.trim_start_matches('/'))
                .unwrap_or(path)
        };
        rest.rsplit('/').next().unwrap_or("").to_string()
    }
}
