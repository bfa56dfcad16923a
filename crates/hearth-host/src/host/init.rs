//! Host initialization: the [`HostApp`] contract and the ordered startup
//! sequence.
//!
//! `init` runs once, synchronously, to completion before the host serves
//! requests: configuration defaults and the user config-load hook, service
//! discovery, user `configure`, virtual-files resolution, then
//! `on_after_init` (feature reconciliation, two-phase plugin loading, and
//! fallback dependency registration. A second `init` while a host is live
//! fails with [`hearth_core::ErrorKind::HostAlreadyInitialized`].

use std::sync::Arc;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use hearth_core::{content_type, Format, HostResult};

use crate::builtin::{
    CsvFormatPlugin, HtmlFormatPlugin, MarkdownFormatPlugin, MetadataPlugin,
    PredefinedRoutesPlugin, RequestInfoPlugin,
};
use crate::cache::{CacheClient, MemoryCacheClient};
use crate::config::{ConfigSnapshot, HostConfig};
use crate::container::Container;
use crate::features::Feature;
use crate::messaging::{MessageFactory, MessageService};
use crate::pipeline::{FilterChain, RefineChain, ResolverChain};
use crate::plugin::{run_plugin_phase, LoadPhase, PluginRegistry};
use crate::services::{ServiceAssembly, ServiceController, ServiceRoutes};
use crate::vfs::{FileSystemVirtualFiles, MultiVirtualFiles, VirtualFiles};

use super::core::AppHost;

/// The user's application: the single required extension point.
///
/// `configure` is where an embedder registers services, dependencies,
/// plugins, and pipeline entries. The remaining hooks have defaults.
pub trait HostApp: Send + Sync + 'static {
    /// Display name of the service, used for configuration defaults and
    /// startup logs.
    fn service_name(&self) -> &str;

    /// Service assemblies handed to the service controller for discovery.
    fn assemblies(&self) -> Vec<ServiceAssembly> {
        Vec::new()
    }

    /// Overridable hook to shape configuration before anything reads it.
    fn load_config(&self, config: &mut HostConfig) {
        let _ = config;
    }

    /// Configure the host: services, dependencies, plugins, filters.
    ///
    /// # Errors
    ///
    /// Errors from this hook propagate out of [`AppHost::init`]; user
    /// configuration failures are fatal to startup, unlike plugin
    /// registration failures which are recovered.
    fn configure(&self, host: &AppHost) -> HostResult<()>;
}

impl AppHost {
    /// Initialize the application host.
    ///
    /// Fails fatally if a live host already exists. The new host is
    /// published as the process-wide singleton before any further work so
    /// collaborators constructed during initialization can resolve it;
    /// a failed initialization unpublishes it again.
    ///
    /// # Errors
    ///
    /// `HostAlreadyInitialized` on a double-init, or whatever
    /// [`HostApp::configure`] returns.
    pub fn init(app: impl HostApp) -> HostResult<Arc<AppHost>> {
        let host = Arc::new(AppHost::construct(Box::new(app)));
        AppHost::publish(&host)?;

        info!(service = %host.app.service_name(), "initializing host");
        match host.run_init() {
            Ok(()) => Ok(host),
            Err(err) => {
                host.dispose();
                Err(err)
            }
        }
    }

    fn construct(app: Box<dyn HostApp>) -> AppHost {
        let host = AppHost {
            app,
            state: ArcSwap::from_pointee(ConfigSnapshot::new(HostConfig::default())),
            plugins: PluginRegistry::new(),
            outcomes: RwLock::new(Vec::new()),
            container: Container::new(),
            services: Arc::new(ServiceRoutes::new()),
            content_types: DashMap::new(),
            virtual_files: RwLock::new(None),
            file_sources: RwLock::new(Vec::new()),
            pre_request_filters: FilterChain::new(),
            request_filters: FilterChain::new(),
            response_filters: FilterChain::new(),
            raw_handlers: ResolverChain::new(),
            catch_all_handlers: ResolverChain::new(),
            service_exception_handlers: RefineChain::new(),
            uncaught_exception_handlers: FilterChain::new(),
            plugins_loaded: Default::default(),
            after_init_ran: Default::default(),
            disposed: Default::default(),
            started_at: RwLock::new(None),
            ready_at: RwLock::new(None),
        };

        // Always-on formats; the optional ones arrive via plugins.
        host.register_format(Format::Json);
        host.register_format(Format::Xml);
        host.register_format(Format::Jsv);

        // Default plugin set, removable by feature reconciliation.
        host.plugins.add(MetadataPlugin);
        host.plugins.add(PredefinedRoutesPlugin);
        host.plugins.add(CsvFormatPlugin);
        host.plugins.add(HtmlFormatPlugin);
        host.plugins.add(MarkdownFormatPlugin);

        host
    }

    fn run_init(&self) -> HostResult<()> {
        // Reset to defaults, then the user config-load hook.
        let mut config = HostConfig::for_service(self.app.service_name());
        self.app.load_config(&mut config);
        let debug_mode = config.debug;
        self.set_config(config);

        if debug_mode {
            self.plugins.add(RequestInfoPlugin);
        }

        // Service discovery, then the required user entry point. Errors
        // from user configuration propagate; startup must not continue on
        // a half-configured host.
        self.services.init(self.app.assemblies());
        self.app.configure(self)?;

        self.resolve_virtual_files();
        self.on_after_init();

        *self.started_at.write() = Some(Utc::now());
        info!(
            service = %self.config().service_name,
            plugins = self.plugins.len(),
            "host initialized"
        );
        Ok(())
    }

    /// If user configuration set no provider, build one from the physical
    /// host path plus any embedded-resource sources; multiple sources
    /// compose first-match-wins.
    fn resolve_virtual_files(&self) {
        if self.virtual_files().is_some() {
            return;
        }

        let root = self.config().web_host_physical_path.clone();
        let mut providers: Vec<Arc<dyn VirtualFiles>> =
            vec![Arc::new(FileSystemVirtualFiles::new(root))];
        providers.extend(self.file_sources.read().iter().cloned());

        let provider: Arc<dyn VirtualFiles> = if providers.len() == 1 {
            providers.remove(0)
        } else {
            Arc::new(MultiVirtualFiles::new(providers))
        };
        *self.virtual_files.write() = Some(provider);
    }

    /// Feature reconciliation and plugin finalization. Runs exactly once.
    pub(crate) fn on_after_init(&self) {
        if self.after_init_ran.swap(true, Ordering::SeqCst) {
            return;
        }

        // Disabled format features disappear from the metadata surface;
        // the formats themselves can still be requested directly.
        // The handler-factory prefix is normalized here as well.
        let features = self.config().features;
        self.update_config(|config| {
            for feature in Feature::ALL {
                if config.features.contains(feature) {
                    continue;
                }
                if let Some(format) = feature.metadata_format() {
                    config
                        .ignored_metadata_formats
                        .insert(format.short_name().to_string());
                }
            }
            if let Some(stripped) = config.handler_factory_path.strip_prefix('/') {
                config.handler_factory_path = stripped.to_string();
            }
        });

        // Disabled capabilities remove matching plugins by descriptor, so
        // external implementations of the capability go with them.
        self.plugins.retain_enabled(features);

        // An explicit user choice of default content type must survive
        // whatever plugins do below.
        let user_default = self.config().default_content_type.clone();

        // Phase 1: pre-init hooks, in registry order.
        for (name, plugin) in self.plugins.snapshot() {
            let outcome = run_plugin_phase(self, name, &plugin, LoadPhase::PreInit);
            self.outcomes.write().push(outcome);
        }

        // Phase 2: full registration. Indexed iteration, not a snapshot:
        // a plugin's register step may append more plugins and those load
        // in the same pass.
        let mut index = 0;
        while let Some((name, plugin)) = self.plugins.get(index) {
            let outcome = run_plugin_phase(self, name, &plugin, LoadPhase::Register);
            self.outcomes.write().push(outcome);
            index += 1;
        }

        self.plugins_loaded.store(true, Ordering::SeqCst);

        self.update_config(|config| match &user_default {
            Some(explicit) => config.default_content_type = Some(explicit.clone()),
            None => {
                if config.default_content_type.is_none() {
                    config.default_content_type = Some(content_type::JSON.to_string());
                }
            }
        });

        self.services.after_init();
        self.register_fallback_dependencies();

        *self.ready_at.write() = Some(Utc::now());
        debug!(
            outcomes = self.outcomes.read().len(),
            "plugin loading complete"
        );
    }

    fn register_fallback_dependencies(&self) {
        // Scoped probe: a user-registered cache must win, and the resolved
        // handle is dropped immediately rather than retained.
        let has_cache = { self.container.try_resolve::<dyn CacheClient>().is_some() };
        if !has_cache {
            self.container
                .register_arc::<dyn CacheClient>(Arc::new(MemoryCacheClient::new()));
            debug!("registered in-memory cache client fallback");
        }

        // A message service without a separately-registered factory lends
        // its own, so downstream code can always resolve a factory.
        if let Some(mq) = self.container.try_resolve::<dyn MessageService>() {
            if !self.container.has::<dyn MessageFactory>() {
                self.container
                    .register_arc::<dyn MessageFactory>(mq.message_factory());
                debug!("registered message factory from message service");
            }
        }
    }
}
