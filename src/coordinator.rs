/// Coordinator (C5): primary/replica role tracking and the per-subject
/// write lease. Primary election itself is delegated to an external
/// collaborator (out of scope); this module exposes the role query and
/// the serialization discipline the write pipeline depends on.
use crate::error::{RegistryError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Coordinator {
    is_primary: AtomicBool,
    primary_endpoint: Mutex<Option<String>>,
    subject_leases: DashMap<String, Arc<Mutex<()>>>,
}

impl Coordinator {
    pub fn new(start_as_primary: bool) -> Self {
        Self {
            is_primary: AtomicBool::new(start_as_primary),
            primary_endpoint: Mutex::new(None),
            subject_leases: DashMap::new(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary.load(Ordering::SeqCst)
    }

    pub fn primary_endpoint(&self) -> Option<String> {
        self.primary_endpoint.lock().clone()
    }

    /// Invoked when the external election mechanism notifies a role
    /// change. Any write in flight under the old role is left to fail
    /// naturally: `is_primary()` is checked again before a command is
    /// committed.
    pub fn set_role(&self, is_primary: bool, primary_endpoint: Option<String>) {
        let was_primary = self.is_primary.swap(is_primary, Ordering::SeqCst);
        *self.primary_endpoint.lock() = primary_endpoint;
        if was_primary != is_primary {
            tracing::info!(is_primary, "coordinator role changed");
        }
    }

    /// Run `f` while holding the per-subject serialization lease required
    /// before a write may run its compatibility check and append its
    /// command. Fails `NOT_PRIMARY` if this node is not currently primary,
    /// without ever calling `f`.
    pub fn with_write_lease<T>(&self, subject: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.is_primary() {
            return Err(RegistryError::NotPrimary(format!(
                "this node is not primary; retry against {}",
                self.primary_endpoint().unwrap_or_else(|| "the current primary".to_string())
            )));
        }
        let lease = self
            .subject_leases
            .entry(subject.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lease.lock();
        f()
    }

    /// Re-check primacy mid-operation; used to fail an in-flight write
    /// with a retriable error if the role changed underneath it.
    pub fn ensure_still_primary(&self) -> Result<()> {
        if self.is_primary() {
            Ok(())
        } else {
            Err(RegistryError::NotPrimary(
                "lost primary role while the write was in flight".to_string(),
            ))
        }
    }
}
