//! Advisory per-tensor locks.
//!
//! The registry never takes these locks itself. They let independent graph
//! execution steps agree on who touches a shared tensor. A lock is held for
//! exactly as long as its [`TensorGuard`] lives.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created mutexes keyed by canonical tensor name.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: BTreeMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `name`, created on first request.
    pub fn handle(&mut self, name: &str) -> TensorLock {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        TensorLock {
            name: name.to_string(),
            mutex,
        }
    }

    /// Number of locks created so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// A tensor's lock, detached from the registry that created it.
///
/// Acquiring does not borrow the workspace, so a caller may fetch the handle
/// and then wait on it without keeping the workspace itself locked.
#[derive(Debug, Clone)]
pub struct TensorLock {
    name: String,
    mutex: Arc<Mutex<()>>,
}

impl TensorLock {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block the current thread until the lock is acquired.
    ///
    /// Not reentrant: locking again from the same thread before dropping the
    /// guard deadlocks.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context; use
    /// [`TensorLock::lock_async`] there.
    pub fn lock(&self) -> TensorGuard {
        TensorGuard {
            name: self.name.clone(),
            _guard: self.mutex.clone().blocking_lock_owned(),
        }
    }

    /// Wait asynchronously until the lock is acquired.
    pub async fn lock_async(&self) -> TensorGuard {
        TensorGuard {
            name: self.name.clone(),
            _guard: self.mutex.clone().lock_owned().await,
        }
    }

    /// Acquire the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<TensorGuard> {
        self.mutex
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| TensorGuard {
                name: self.name.clone(),
                _guard: guard,
            })
    }
}

/// Proof of holding a tensor's lock. Dropping it unlocks.
#[derive(Debug)]
pub struct TensorGuard {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl TensorGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}
