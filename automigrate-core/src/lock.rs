//! Single-flight gate for migration runs.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes migration runs.
///
/// Clones share one permit, so a gate created by the host and handed to every
/// executor allows exactly one run at a time. Waiters are served in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct MigrationGate {
    inner: Arc<Mutex<()>>,
}

impl MigrationGate {
    /// Create a new gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the permit.
    pub async fn acquire(&self) -> MigrationGuard {
        MigrationGuard {
            _guard: self.inner.clone().lock_owned().await,
        }
    }

    /// Take the permit if no run is in flight.
    pub fn try_acquire(&self) -> Option<MigrationGuard> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| MigrationGuard { _guard: guard })
    }

    /// Check if a run currently holds the permit.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// Permit for one migration run, released on drop.
#[derive(Debug)]
pub struct MigrationGuard {
    _guard: OwnedMutexGuard<()>,
}
