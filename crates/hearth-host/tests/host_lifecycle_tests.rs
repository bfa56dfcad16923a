//! Host lifecycle tests.
//!
//! Covers the initialization sequence end to end: the single-live-instance
//! invariant, the plugin partial-failure policy, deferred vs immediate
//! `add_plugin`, feature-driven exclusions, default-content-type
//! resolution, and the cache/messaging fallback rules.
//!
//! Every test here initializes the process-wide host, so the suite runs
//! serially.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serial_test::serial;

use hearth_host::prelude::*;
use hearth_host::{builtin::CsvFormatPlugin, LoadPhase};

type ConfigureFn = Box<dyn Fn(&AppHost) -> HostResult<()> + Send + Sync>;
type LoadConfigFn = Box<dyn Fn(&mut HostConfig) + Send + Sync>;
type AssembliesFn = Box<dyn Fn() -> Vec<ServiceAssembly> + Send + Sync>;

struct TestApp {
    configure: ConfigureFn,
    load_config: Option<LoadConfigFn>,
    assemblies: Option<AssembliesFn>,
}

impl TestApp {
    fn new(configure: impl Fn(&AppHost) -> HostResult<()> + Send + Sync + 'static) -> Self {
        Self {
            configure: Box::new(configure),
            load_config: None,
            assemblies: None,
        }
    }

    fn with_load_config(
        mut self,
        load_config: impl Fn(&mut HostConfig) + Send + Sync + 'static,
    ) -> Self {
        self.load_config = Some(Box::new(load_config));
        self
    }
}

impl HostApp for TestApp {
    fn service_name(&self) -> &str {
        "lifecycle-tests"
    }

    fn assemblies(&self) -> Vec<ServiceAssembly> {
        self.assemblies.as_ref().map_or_else(Vec::new, |f| f())
    }

    fn load_config(&self, config: &mut HostConfig) {
        if let Some(hook) = &self.load_config {
            hook(config);
        }
    }

    fn configure(&self, host: &AppHost) -> HostResult<()> {
        (self.configure)(host)
    }
}

#[test]
#[serial]
fn second_live_host_fails_every_time() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    for _ in 0..3 {
        let err = AppHost::init(TestApp::new(|_| Ok(()))).unwrap_err();
        assert_eq!(err.kind, hearth_host::core::ErrorKind::HostAlreadyInitialized);
    }

    host.dispose();

    // Disposal clears the slot; a new host may now be constructed.
    let next = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();
    next.dispose();
}

#[test]
#[serial]
fn failed_configure_propagates_and_unpublishes() {
    let err = AppHost::init(TestApp::new(|_| {
        Err(HostError::configuration("bad user code"))
    }))
    .unwrap_err();
    assert_eq!(err.kind, hearth_host::core::ErrorKind::Configuration);
    assert!(AppHost::try_current().is_none());

    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();
    host.dispose();
}

struct FailingPlugin;

impl Plugin for FailingPlugin {
    fn register(&self, _host: &AppHost) -> HostResult<()> {
        panic!("plugin A exploded");
    }
}

struct HeaderPlugin;

impl Plugin for HeaderPlugin {
    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.update_config(|config| {
            config
                .global_response_headers
                .push(("x-plugin-b".to_string(), "loaded".to_string()));
        });
        Ok(())
    }
}

#[test]
#[serial]
fn one_failing_plugin_does_not_abort_the_rest() {
    let host = AppHost::init(TestApp::new(|host| {
        host.add_plugin(FailingPlugin);
        host.add_plugin(HeaderPlugin);
        Ok(())
    }))
    .unwrap();

    // B's registration side effect is present despite A panicking first.
    assert!(host
        .config()
        .global_response_headers
        .iter()
        .any(|(name, value)| name == "x-plugin-b" && value == "loaded"));

    // A's failure is recorded with its type name, in the Register phase.
    let outcomes = host.plugin_outcomes();
    let failure = outcomes
        .iter()
        .find(|o| o.plugin.contains("FailingPlugin") && o.phase == LoadPhase::Register)
        .expect("failure outcome recorded");
    assert!(!failure.succeeded());
    assert!(failure.error.as_deref().unwrap().contains("plugin A exploded"));

    host.dispose();
}

struct SideEffectPlugin {
    registered: Arc<AtomicBool>,
}

impl Plugin for SideEffectPlugin {
    fn register(&self, _host: &AppHost) -> HostResult<()> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
#[serial]
fn add_plugin_defers_before_load_and_registers_immediately_after() {
    let during_configure = Arc::new(AtomicBool::new(false));
    let deferred = during_configure.clone();

    let host = AppHost::init(TestApp::new(move |host| {
        let registered = Arc::new(AtomicBool::new(false));
        host.add_plugin(SideEffectPlugin {
            registered: registered.clone(),
        });
        // Still deferred at this point: loading happens in on_after_init.
        deferred.store(registered.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }))
    .unwrap();

    assert!(!during_configure.load(Ordering::SeqCst));
    assert!(host.plugins_loaded());

    // Post-load additions register immediately.
    let immediate = Arc::new(AtomicBool::new(false));
    host.add_plugin(SideEffectPlugin {
        registered: immediate.clone(),
    });
    assert!(immediate.load(Ordering::SeqCst));

    host.dispose();
}

struct ExternalCsvPlugin {
    registered: Arc<AtomicBool>,
}

impl Plugin for ExternalCsvPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::Csv)
    }

    fn register(&self, _host: &AppHost) -> HostResult<()> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
#[serial]
fn disabling_a_format_feature_removes_plugins_and_hides_the_format() {
    let external_ran = Arc::new(AtomicBool::new(false));
    let probe = external_ran.clone();

    let host = AppHost::init(
        TestApp::new(move |host| {
            host.add_plugin(ExternalCsvPlugin {
                registered: probe.clone(),
            });
            Ok(())
        })
        .with_load_config(|config| {
            config.features = config.features.without(Feature::Csv);
        }),
    )
    .unwrap();

    // (a) Every plugin carrying the Csv capability is gone, the built-in
    // and the external implementation alike.
    assert!(!host.plugins().has::<CsvFormatPlugin>());
    assert!(!host.plugins().has::<ExternalCsvPlugin>());
    assert!(!external_ran.load(Ordering::SeqCst));
    assert!(host.content_type_for("csv").is_none());

    // (b) The short name lands in the ignored-metadata-formats set.
    assert!(host.config().ignored_metadata_formats.contains("csv"));
    assert!(!host.config().derived.metadata_formats.contains(&"csv"));

    // Enabled formats are untouched.
    assert!(host.content_type_for("html").is_some());
    assert!(host.config().derived.metadata_formats.contains(&"json"));

    host.dispose();
}

struct DefaultOverridePlugin;

impl Plugin for DefaultOverridePlugin {
    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.update_config(|config| {
            config.default_content_type = Some("application/xml".to_string());
        });
        Ok(())
    }
}

#[test]
#[serial]
fn explicit_default_content_type_survives_plugin_overrides() {
    let host = AppHost::init(TestApp::new(|host| {
        host.update_config(|config| {
            config.default_content_type = Some("text/csv".to_string());
        });
        host.add_plugin(DefaultOverridePlugin);
        Ok(())
    }))
    .unwrap();

    assert_eq!(host.config().default_content_type.as_deref(), Some("text/csv"));
    host.dispose();
}

#[test]
#[serial]
fn default_content_type_falls_back_to_json() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();
    assert_eq!(
        host.config().default_content_type.as_deref(),
        Some("application/json")
    );
    host.dispose();
}

#[test]
#[serial]
fn cache_fallback_registers_memory_client_only_when_absent() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();
    assert!(host.container().resolve::<dyn CacheClient>().is_ok());
    host.dispose();
}

#[test]
#[serial]
fn user_registered_cache_client_wins_over_the_default() {
    let custom: Arc<dyn CacheClient> = Arc::new(MemoryCacheClient::new());
    let expected = custom.clone();

    let host = AppHost::init(TestApp::new(move |host| {
        host.container().register_arc::<dyn CacheClient>(custom.clone());
        Ok(())
    }))
    .unwrap();

    let resolved = host.container().resolve::<dyn CacheClient>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &expected));
    host.dispose();
}

struct TestMessageService {
    factory: Arc<dyn MessageFactory>,
}

impl MessageService for TestMessageService {
    fn message_factory(&self) -> Arc<dyn MessageFactory> {
        self.factory.clone()
    }

    fn start(&self) -> HostResult<()> {
        Ok(())
    }

    fn stop(&self) {}
}

#[test]
#[serial]
fn message_factory_is_derived_from_the_service_when_missing() {
    use hearth_host::messaging::InMemoryMessageFactory;

    let factory: Arc<dyn MessageFactory> = Arc::new(InMemoryMessageFactory::new());
    let expected = factory.clone();

    let host = AppHost::init(TestApp::new(move |host| {
        host.container()
            .register_arc::<dyn MessageService>(Arc::new(TestMessageService {
                factory: factory.clone(),
            }));
        Ok(())
    }))
    .unwrap();

    let resolved = host.container().resolve::<dyn MessageFactory>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &expected));
    host.dispose();
}

struct CountingDisposable(Arc<AtomicUsize>);

impl hearth_host::core::Disposable for CountingDisposable {
    fn dispose(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
#[serial]
fn dispose_cascades_to_container_owned_singletons() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let count = disposed.clone();

    let host = AppHost::init(TestApp::new(move |host| {
        host.container()
            .register_disposable(CountingDisposable(count.clone()));
        Ok(())
    }))
    .unwrap();

    host.dispose();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    // Idempotent.
    host.dispose();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn init_records_startup_and_ready_timestamps() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();
    let ready = host.ready_at().expect("ready timestamp");
    let started = host.started_at().expect("startup timestamp");
    assert!(ready <= started);
    host.dispose();
}
