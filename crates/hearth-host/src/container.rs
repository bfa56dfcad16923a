//! Minimal dependency container.
//!
//! A thin registration/resolution surface over a concurrent type map:
//! singletons are registered by instance or by lazy factory and resolved by
//! type, including trait-object types (`Container::register_arc::<dyn
//! CacheClient>(..)`). Release is deliberately forgiving: an entry's
//! explicit release hook is preferred, instances implementing
//! [`Disposable`] are disposed directly, and any error or panic during
//! release is swallowed, because cleanup runs inside request-ending and
//! host-ending paths that must not fail.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use hearth_core::{Disposable, HostError, HostResult};

type AnyArc = Arc<dyn Any + Send + Sync>;
type ReleaseHook = Arc<dyn Fn() + Send + Sync>;
type FactoryFn = Arc<dyn Fn(&Container) -> AnyArc + Send + Sync>;

struct Entry {
    value: AnyArc,
    release: Option<ReleaseHook>,
}

/// Registry of shared singleton dependencies.
pub struct Container {
    entries: DashMap<TypeId, Entry>,
    factories: RwLock<HashMap<TypeId, FactoryFn>>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("entries", &self.entries.len())
            .field("factories", &self.factories.read().len())
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// An empty container.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            factories: RwLock::new(HashMap::new()),
        }
    }

    fn insert<T: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<T>,
        release: Option<ReleaseHook>,
    ) {
        self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                value: Arc::new(instance) as AnyArc,
                release,
            },
        );
    }

    /// Register a singleton instance by its concrete type.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        self.register_arc(Arc::new(instance));
    }

    /// Register a shared singleton, typically as a trait object:
    /// `container.register_arc::<dyn CacheClient>(client)`.
    pub fn register_arc<T: ?Sized + Send + Sync + 'static>(&self, instance: Arc<T>) {
        self.insert::<T>(instance, None);
    }

    /// Register a singleton whose `dispose` runs when the container is
    /// disposed.
    pub fn register_disposable<T: Disposable + 'static>(&self, instance: T) {
        let instance = Arc::new(instance);
        let hook: ReleaseHook = {
            let held = instance.clone();
            Arc::new(move || held.dispose())
        };
        self.insert::<T>(instance, Some(hook));
    }

    /// Register a shared singleton with an explicit release hook, preferred
    /// over [`Disposable`] when both exist.
    pub fn register_arc_with_release<T: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<T>,
        release: impl Fn(&Arc<T>) + Send + Sync + 'static,
    ) {
        let hook: ReleaseHook = {
            let held = instance.clone();
            Arc::new(move || release(&held))
        };
        self.insert::<T>(instance, Some(hook));
    }

    /// Register a lazy singleton factory; invoked at most once, on first
    /// resolution.
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Arc<T> + Send + Sync + 'static,
    {
        self.factories.write().insert(
            TypeId::of::<T>(),
            Arc::new(move |container| Arc::new(factory(container)) as AnyArc),
        );
    }

    /// Resolve a dependency, failing if nothing is registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`hearth_core::ErrorKind::DependencyNotFound`] when neither
    /// an instance nor a factory is registered.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> HostResult<Arc<T>> {
        self.try_resolve::<T>()
            .ok_or_else(|| HostError::dependency_not_found(std::any::type_name::<T>()))
    }

    /// Resolve a dependency, returning `None` if nothing is registered.
    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let id = TypeId::of::<T>();

        if let Some(entry) = self.entries.get(&id) {
            return downcast::<T>(&entry.value);
        }

        // Lazy-singleton path: clone the factory out so its body may itself
        // use the container without holding the lock.
        let factory = self.factories.read().get(&id).cloned()?;
        let value = factory(self);
        let resolved = downcast::<T>(&value);
        self.entries.entry(id).or_insert(Entry {
            value,
            release: None,
        });
        resolved
    }

    /// Whether a registration (instance or factory) exists for `T`.
    pub fn has<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.entries.contains_key(&id) || self.factories.read().contains_key(&id)
    }

    /// Release one item on behalf of request-teardown code.
    ///
    /// Errors and panics are swallowed; release must never fail the
    /// cleanup path it runs in.
    pub fn release(&self, item: &dyn Disposable) {
        if catch_unwind(AssertUnwindSafe(|| item.dispose())).is_err() {
            trace!("ignored panic during item release");
        }
    }

    /// Release every owned entry and clear the container.
    ///
    /// Entries registered with a release hook (or via
    /// [`Container::register_disposable`]) have the hook invoked; hook
    /// failures are swallowed.
    pub fn dispose(&self) {
        self.factories.write().clear();

        let ids: Vec<TypeId> = self.entries.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                if let Some(hook) = entry.release {
                    if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                        debug!("ignored panic during container disposal");
                    }
                }
            }
        }
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> Option<Arc<T>> {
    value
        .clone()
        .downcast::<Arc<T>>()
        .ok()
        .map(|outer| (*outer).clone())
}
