//! # Address Lock Manager
//!
//! Serializes compositions per address. A composition locks the key
//! `"c-" + address` for every paying address, all at once: either the whole
//! set is free and taken in one step, or nothing is taken and the caller
//! waits for the next release. Partial overlaps therefore cannot deadlock.
//!
//! The lock is held for the entire round trip (snapshot, signing,
//! finalization, caller callback) and released through [`AddressLock`].

use composer_telemetry::{ADDRESS_LOCKS_HELD, LOCK_WAIT_DURATION};
use parking_lot::Mutex;
use shared_types::Address;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::domain::ComposeError;

/// Prefix of composition lock keys.
pub const LOCK_KEY_PREFIX: &str = "c-";

/// Lock key for one address.
pub fn lock_key(address: &Address) -> String {
    format!("{}{}", LOCK_KEY_PREFIX, address)
}

struct LockTable {
    held: Mutex<HashSet<String>>,
    released: Notify,
    acquisitions: AtomicU64,
    releases: AtomicU64,
}

impl LockTable {
    fn try_acquire(&self, keys: &[String]) -> bool {
        let mut held = self.held.lock();
        if keys.iter().any(|key| held.contains(key)) {
            return false;
        }
        held.extend(keys.iter().cloned());
        true
    }

    fn release(&self, keys: &[String]) {
        {
            let mut held = self.held.lock();
            for key in keys {
                held.remove(key);
            }
        }
        ADDRESS_LOCKS_HELD.sub(keys.len() as f64);
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.released.notify_waiters();
    }
}

/// Group lock over address keys.
#[derive(Clone)]
pub struct AddressLockManager {
    table: Arc<LockTable>,
}

impl AddressLockManager {
    /// Empty lock table.
    pub fn new() -> Self {
        Self {
            table: Arc::new(LockTable {
                held: Mutex::new(HashSet::new()),
                released: Notify::new(),
                acquisitions: AtomicU64::new(0),
                releases: AtomicU64::new(0),
            }),
        }
    }

    /// Take all keys of `addresses` if none is held right now.
    pub fn try_lock(&self, addresses: &[Address]) -> Option<AddressLock> {
        let keys = Self::keys(addresses);
        self.try_lock_keys(keys)
    }

    /// Wait until every key of `addresses` is free, then take them together.
    pub async fn lock(&self, addresses: &[Address]) -> AddressLock {
        let keys = Self::keys(addresses);
        let _timer = composer_telemetry::time_histogram!(LOCK_WAIT_DURATION);
        loop {
            let notified = self.table.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();

            if let Some(lock) = self.try_lock_keys(keys.clone()) {
                return lock;
            }
            tracing::debug!(keys = ?keys, "[composer] Waiting for address locks");
            notified.await;
        }
    }

    /// [`lock`](Self::lock) bounded by `timeout`; `None` waits forever.
    pub async fn lock_with_timeout(
        &self,
        addresses: &[Address],
        timeout: Option<Duration>,
    ) -> Result<AddressLock, ComposeError> {
        let Some(timeout) = timeout else {
            return Ok(self.lock(addresses).await);
        };
        let started = Instant::now();
        tokio::time::timeout(timeout, self.lock(addresses))
            .await
            .map_err(|_| ComposeError::LockTimeout {
                addresses: addresses.to_vec(),
                waited_ms: started.elapsed().as_millis() as u64,
            })
    }

    /// Whether the key of `address` is currently held.
    pub fn is_locked(&self, address: &Address) -> bool {
        self.table.held.lock().contains(&lock_key(address))
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.table.held.lock().len()
    }

    /// Group locks acquired since creation.
    pub fn acquisitions(&self) -> u64 {
        self.table.acquisitions.load(Ordering::SeqCst)
    }

    /// Group locks released since creation.
    pub fn releases(&self) -> u64 {
        self.table.releases.load(Ordering::SeqCst)
    }

    fn keys(addresses: &[Address]) -> Vec<String> {
        let mut keys: Vec<String> = addresses.iter().map(lock_key).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn try_lock_keys(&self, keys: Vec<String>) -> Option<AddressLock> {
        if !self.table.try_acquire(&keys) {
            return None;
        }
        ADDRESS_LOCKS_HELD.add(keys.len() as f64);
        self.table.acquisitions.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(keys = ?keys, "[composer] Address locks acquired");
        Some(AddressLock {
            keys,
            table: Arc::clone(&self.table),
            released: AtomicBool::new(false),
        })
    }
}

impl Default for AddressLockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Held address keys. Released by [`release`](Self::release) or on drop,
/// whichever comes first; later calls are no-ops.
pub struct AddressLock {
    keys: Vec<String>,
    table: Arc<LockTable>,
    released: AtomicBool,
}

impl AddressLock {
    /// Release all keys. Returns `true` only for the call that released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.table.release(&self.keys);
        tracing::debug!(keys = ?self.keys, "[composer] Address locks released");
        true
    }

    /// Whether this lock has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Locked keys, sorted.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for AddressLock {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for AddressLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressLock")
            .field("keys", &self.keys)
            .field("released", &self.is_released())
            .finish()
    }
}
