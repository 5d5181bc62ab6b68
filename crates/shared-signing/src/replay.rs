//! # Replay Guard
//!
//! Rejects a signed call whose composite key `(signature, timestamp, method,
//! path)` was already accepted.
//!
//! ## Eviction
//!
//! The store is wiped in full by a periodic task whose cadence equals the
//! timestamp tolerance. An entry therefore lives at most two tolerance windows.
//! Memory is bounded by requests per window.
//!
//! ## Scope
//!
//! The default store is process-local. A replay routed to a different
//! instance is not detected unless a shared [`ReplayStore`] is plugged in.

use crate::clock::Clock;
use crate::context::{SigningMaterial, ValidationContext};
use crate::errors::SigningError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const KEY_SEPARATOR: char = '|';

/// Replay rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("replay detected")]
    Detected,
}

// =============================================================================
// STORE
// =============================================================================

/// Set of accepted call keys.
///
/// `insert_if_absent` must be atomic: two concurrent inserts of the same key
/// yield exactly one `true`.
pub trait ReplayStore: Send + Sync + fmt::Debug {
    /// Inserts `key`. Returns `false` if it was already present.
    fn insert_if_absent(&self, key: &str) -> bool;

    fn remove(&self, key: &str) -> bool;

    /// Empties the store, returning how many keys were evicted.
    fn clear(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutex-guarded in-process store.
#[derive(Debug, Default)]
pub struct InMemoryReplayStore {
    keys: Mutex<HashSet<String>>,
}

impl InMemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayStore for InMemoryReplayStore {
    fn insert_if_absent(&self, key: &str) -> bool {
        let mut keys = self.keys.lock();
        if keys.contains(key) {
            return false;
        }
        keys.insert(key.to_string())
    }

    fn remove(&self, key: &str) -> bool {
        self.keys.lock().remove(key)
    }

    fn clear(&self) -> usize {
        let mut keys = self.keys.lock();
        let evicted = keys.len();
        keys.clear();
        evicted
    }

    fn len(&self) -> usize {
        self.keys.lock().len()
    }
}

/// Composite identity of one signed call.
///
/// Same signature with a different timestamp, method or path is a different
/// call. Every field is length-prefixed, so a separator inside a caller
/// supplied value cannot make two different calls render the same key. An
/// absent timestamp is encoded as `-`, distinct from an empty one.
pub fn replay_key(signature: &str, timestamp: Option<&str>, method: &str, path: &str) -> String {
    let mut key = String::with_capacity(
        signature.len() + timestamp.map_or(1, str::len) + method.len() + path.len() + 24,
    );
    push_field(&mut key, signature);
    key.push(KEY_SEPARATOR);
    match timestamp {
        Some(ts) => push_field(&mut key, ts),
        None => key.push('-'),
    }
    key.push(KEY_SEPARATOR);
    push_field(&mut key, method);
    key.push(KEY_SEPARATOR);
    push_field(&mut key, path);
    key
}

fn push_field(key: &mut String, value: &str) {
    key.push_str(&value.len().to_string());
    key.push(':');
    key.push_str(value);
}

// =============================================================================
// GUARD
// =============================================================================

#[derive(Debug)]
pub struct ReplayGuard {
    store: Arc<dyn ReplayStore>,
    clock: Arc<dyn Clock>,
    last_cleared_ms: AtomicU64,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn ReplayStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            last_cleared_ms: AtomicU64::new(0),
        }
    }

    /// Atomically checks and records the call described by `material`/`ctx`.
    ///
    /// Returns the recorded key so the caller can [`release`](Self::release)
    /// it if a later stage rejects the call. `Ok(None)` means protection is
    /// disabled and nothing was recorded.
    pub fn check_and_record(
        &self,
        material: &SigningMaterial,
        ctx: &ValidationContext,
        enabled: bool,
    ) -> Result<Option<String>, ReplayError> {
        if !enabled {
            return Ok(None);
        }

        let key = replay_key(
            &material.signature,
            material.timestamp.as_deref(),
            &ctx.method,
            &ctx.path,
        );

        if self.store.insert_if_absent(&key) {
            Ok(Some(key))
        } else {
            Err(ReplayError::Detected)
        }
    }

    /// Forgets a key recorded by [`check_and_record`](Self::check_and_record).
    pub fn release(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    /// Empties the cache. Returns the number of evicted keys.
    pub fn clear(&self) -> usize {
        let evicted = self.store.clear();
        self.last_cleared_ms
            .store(self.clock.now_ms(), Ordering::Relaxed);
        evicted
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Epoch milliseconds of the last clear, 0 if never cleared.
    pub fn last_cleared_ms(&self) -> u64 {
        self.last_cleared_ms.load(Ordering::Relaxed)
    }
}

// =============================================================================
// CLEANUP TASK
// =============================================================================

/// Handle to the periodic clearing task. Aborted on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct CleanupTask {
    handle: JoinHandle<()>,
    interval: Duration,
}

impl CleanupTask {
    /// Spawns the task on the current Tokio runtime.
    ///
    /// The first clear happens one `interval` after spawning, not immediately.
    pub fn spawn(guard: Arc<ReplayGuard>, interval: Duration) -> Result<Self, SigningError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SigningError::RuntimeUnavailable)?;

        let handle = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let evicted = guard.clear();
                debug!(evicted, "Cleared replay cache");
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Replay cleanup task started");
        Ok(Self { handle, interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        // Drop aborts.
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Replay cleanup task stopped");
    }
}
