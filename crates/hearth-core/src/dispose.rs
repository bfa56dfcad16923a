//! Deterministic cleanup contract.

/// A resource with an explicit teardown step.
///
/// Disposal is best-effort everywhere in the host: callers invoke it through
/// release paths that swallow errors and panics, so implementations should
/// not rely on disposal for correctness of anything other than resource
/// reclamation.
pub trait Disposable: Send + Sync {
    /// Release resources held by this instance.
    fn dispose(&self);
}

impl core::fmt::Debug for dyn Disposable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Disposable")
    }
}
