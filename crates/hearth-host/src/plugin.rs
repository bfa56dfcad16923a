//! Plugin contract and registry.
//!
//! Plugins are held in insertion order and loaded in two phases: every
//! plugin's `pre_init` runs first, then every plugin's `register`. A
//! plugin's `register` may itself add more plugins or pipeline entries;
//! additions made during loading are picked up by the same pass.
//!
//! Loading is a result-collecting loop: each phase of each plugin produces
//! a [`PluginOutcome`], and a failing plugin is logged and recorded without
//! aborting the rest. One misconfigured plugin must not prevent the host
//! from serving at all.

use std::any::TypeId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error};

use hearth_core::HostResult;

use crate::features::{Feature, FeatureSet};
use crate::host::AppHost;

/// A unit of optional host functionality.
///
/// Plugins may append to any pipeline chain, register dependencies, and
/// read or replace configuration. The capability descriptor ties a plugin
/// to the feature bit that gates it; feature reconciliation removes every
/// registered plugin whose capability is disabled, regardless of concrete
/// type, so external implementations of a built-in capability are removed
/// with it.
pub trait Plugin: Send + Sync + 'static {
    /// The feature gating this plugin, if any. `None` means the plugin is
    /// never removed by feature reconciliation.
    fn capability(&self) -> Option<Feature> {
        None
    }

    /// Phase-1 hook, invoked on every plugin before any plugin registers.
    ///
    /// Useful for plugins that need to observe or adjust configuration
    /// before other plugins commit to it.
    fn pre_init(&self, host: &AppHost) -> HostResult<()> {
        let _ = host;
        Ok(())
    }

    /// Phase-2 registration: contribute to pipelines, dependencies, and
    /// configuration.
    fn register(&self, host: &AppHost) -> HostResult<()>;
}

/// The phase a [`PluginOutcome`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Phase-1 `pre_init` hook.
    PreInit,
    /// Phase-2 `register`.
    Register,
}

/// The recorded result of one plugin phase.
#[derive(Debug, Clone)]
pub struct PluginOutcome {
    /// Type name of the plugin.
    pub plugin: &'static str,
    /// Which phase ran.
    pub phase: LoadPhase,
    /// The failure, if the phase did not complete cleanly.
    pub error: Option<String>,
}

impl PluginOutcome {
    /// Whether the phase completed cleanly.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub(crate) struct RegisteredPlugin {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) plugin: Arc<dyn Plugin>,
}

/// Ordered collection of plugins awaiting or past registration.
pub struct PluginRegistry {
    entries: RwLock<Vec<RegisteredPlugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_list().entries(entries.iter().map(|e| e.name)).finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append a plugin, preserving insertion order.
    pub fn add<P: Plugin>(&self, plugin: P) {
        self.add_arc(
            std::any::type_name::<P>(),
            TypeId::of::<P>(),
            Arc::new(plugin),
        );
    }

    pub(crate) fn add_arc(&self, name: &'static str, type_id: TypeId, plugin: Arc<dyn Plugin>) {
        self.entries.write().push(RegisteredPlugin {
            name,
            type_id,
            plugin,
        });
    }

    /// Whether a plugin of type `P` is registered.
    pub fn has<P: Plugin>(&self) -> bool {
        let id = TypeId::of::<P>();
        self.entries.read().iter().any(|e| e.type_id == id)
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Type names of registered plugins, in insertion order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.name).collect()
    }

    /// Drop every plugin whose capability is disabled in `features`.
    pub fn retain_enabled(&self, features: FeatureSet) {
        self.entries.write().retain(|e| {
            let keep = e
                .plugin
                .capability()
                .is_none_or(|cap| features.contains(cap));
            if !keep {
                debug!(plugin = e.name, "removing plugin for disabled feature");
            }
            keep
        });
    }

    pub(crate) fn get(&self, index: usize) -> Option<(&'static str, Arc<dyn Plugin>)> {
        self.entries
            .read()
            .get(index)
            .map(|e| (e.name, e.plugin.clone()))
    }

    pub(crate) fn snapshot(&self) -> Vec<(&'static str, Arc<dyn Plugin>)> {
        self.entries
            .read()
            .iter()
            .map(|e| (e.name, e.plugin.clone()))
            .collect()
    }
}

/// Run one phase of one plugin, converting errors and panics into a
/// recorded outcome. Never propagates.
pub(crate) fn run_plugin_phase(
    host: &AppHost,
    name: &'static str,
    plugin: &Arc<dyn Plugin>,
    phase: LoadPhase,
) -> PluginOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| match phase {
        LoadPhase::PreInit => plugin.pre_init(host),
        LoadPhase::Register => plugin.register(host),
    }));

    let error = match result {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(panic) => Some(panic_message(panic.as_ref())),
    };

    if let Some(message) = &error {
        error!(plugin = name, phase = ?phase, %message, "plugin failed to load");
    }

    PluginOutcome {
        plugin: name,
        phase,
        error,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "plugin panicked".to_string()
    }
}
