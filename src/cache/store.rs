// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::U256;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::{BrokerError, Result};
use crate::units::parse_u256;

/// What a cached value holds, so readers can reject a value of the wrong shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Arbitrary-precision integer stored as a decimal string
    BigInt,
    Text,
    /// JSON-encoded structure
    Object,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub kind: ValueKind,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug)]
pub(super) struct LockEntry {
    pub(super) holder: Uuid,
    pub(super) expires_at: Instant,
}

/// Process-wide expiring key/value store
pub struct KvCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    locks: Mutex<HashMap<String, LockEntry>>,
    pub(super) lock_released: Notify,
}

impl KvCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            lock_released: Notify::new(),
        }
    }

    /// Get a live entry; expired entries read as absent
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.clone())
    }

    pub fn set(&self, key: &str, value: Value, ttl: Duration, kind: ValueKind) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value,
                kind,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).filter(|e| !e.is_expired())
    }

    /// Read an integer value. A value of another kind, or one that does not
    /// parse, is reported as `CacheCorruption`.
    pub fn get_u256(&self, key: &str) -> Result<Option<U256>> {
        match self.get(key) {
            Some(entry) => decode_u256(&entry).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_u256(&self, key: &str, value: U256, ttl: Duration) {
        self.set(key, Value::String(value.to_string()), ttl, ValueKind::BigInt);
    }

    /// Read-modify-write an integer value while holding the entry map, so no
    /// other reader or writer observes the intermediate state. An absent or
    /// expired value reads as zero. `update` returns the value to store and a
    /// result for the caller; a corrupt value is left untouched.
    pub fn update_u256<R>(
        &self,
        key: &str,
        ttl: Duration,
        update: impl FnOnce(U256) -> (U256, R),
    ) -> Result<R> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => decode_u256(entry)?,
            _ => U256::zero(),
        };

        let (next, result) = update(current);
        entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value: Value::String(next.to_string()),
                kind: ValueKind::BigInt,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(result)
    }

    /// Saturating add; returns the new value
    pub fn add_u256(&self, key: &str, delta: U256, ttl: Duration) -> Result<U256> {
        self.update_u256(key, ttl, |current| {
            let next = current.saturating_add(delta);
            (next, next)
        })
    }

    /// Read an integer value and reset it to zero in one step
    pub fn take_u256(&self, key: &str, ttl: Duration) -> Result<U256> {
        self.update_u256(key, ttl, |current| (U256::zero(), current))
    }

    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(entry) = self.get(key) else {
            return Ok(None);
        };
        if entry.kind != ValueKind::Object {
            return Err(BrokerError::corruption(
                key,
                format!("expected object value, found {:?}", entry.kind),
            ));
        }
        serde_json::from_value(entry.value)
            .map(Some)
            .map_err(|e| BrokerError::corruption(key, e))
    }

    pub fn set_object<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| BrokerError::corruption(key, e))?;
        self.set(key, value, ttl, ValueKind::Object);
        Ok(())
    }

    /// Try to take the lock for `key` without waiting.
    ///
    /// Returns `false` while another holder's lock is live. A lock whose TTL
    /// has elapsed is considered abandoned and is taken over.
    pub fn acquire_lock(&self, key: &str, ttl: Duration) -> bool {
        self.try_acquire(key, ttl).is_some()
    }

    pub(super) fn try_acquire(&self, key: &str, ttl: Duration) -> Option<Uuid> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some(existing) = locks.get(key) {
            if existing.expires_at > now {
                return None;
            }
            debug!("Lock '{}' expired, taking over from {}", key, existing.holder);
        }

        let holder = Uuid::new_v4();
        locks.insert(
            key.to_string(),
            LockEntry {
                holder,
                expires_at: now + ttl,
            },
        );
        Some(holder)
    }

    /// Release the lock for `key` regardless of who holds it
    pub fn release_lock(&self, key: &str) {
        let removed = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.remove(key).is_some()
        };
        if removed {
            self.lock_released.notify_waiters();
        }
    }

    /// Release the lock only if `holder` still owns it. A holder whose TTL
    /// ran out and whose lock was taken over must not free the new owner's lock.
    pub(super) fn release_if_held(&self, key: &str, holder: Uuid) -> bool {
        let released = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            match locks.get(key) {
                Some(entry) if entry.holder == holder => {
                    locks.remove(key);
                    true
                }
                _ => false,
            }
        };
        if released {
            self.lock_released.notify_waiters();
        }
        released
    }

    pub fn is_locked(&self, key: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(key)
            .map(|l| l.expires_at > Instant::now())
            .unwrap_or(false)
    }

    /// Drop expired data entries and abandoned locks
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let purged = before - entries.len();
        drop(entries);

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, l| l.expires_at > now);
        purged
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode_u256(entry: &CacheEntry) -> Result<U256> {
    if entry.kind != ValueKind::BigInt {
        return Err(BrokerError::corruption(
            &entry.key,
            format!("expected integer value, found {:?}", entry.kind),
        ));
    }
    let raw = entry
        .value
        .as_str()
        .ok_or_else(|| BrokerError::corruption(&entry.key, "integer value is not a string"))?;
    parse_u256(raw).map_err(|e| BrokerError::corruption(&entry.key, e))
}

impl Default for KvCache {
    fn default() -> Self {
        Self::new()
    }
}
