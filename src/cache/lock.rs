// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::store::KvCache;
use crate::error::{BrokerError, Result};

/// A held cache lock. Dropping the guard releases the lock if this holder
/// still owns it; the lock's TTL bounds how long an abandoned guard can block
/// other callers.
pub struct LockGuard {
    cache: Arc<KvCache>,
    key: String,
    holder: Uuid,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release now. Returns `false` if the TTL had already elapsed and the
    /// lock belongs to someone else.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.cache.release_if_held(&self.key, self.holder)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if !self.cache.release_if_held(&self.key, self.holder) {
            warn!(
                "Lock '{}' expired before its holder released it",
                self.key
            );
        }
    }
}

impl KvCache {
    /// Wait until the lock for `key` is acquired.
    ///
    /// Waiters wake when a holder releases, and re-check every
    /// `retry_interval` so that a lock abandoned by a stalled holder is picked
    /// up once its TTL runs out. With `max_wait: None` the wait is unbounded.
    pub async fn lock(
        self: &Arc<Self>,
        key: &str,
        ttl: Duration,
        retry_interval: Duration,
        max_wait: Option<Duration>,
    ) -> Result<LockGuard> {
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            let notified = self.lock_released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(holder) = self.try_acquire(key, ttl) {
                if attempts > 0 {
                    debug!("Acquired lock '{}' after {} retries", key, attempts);
                }
                return Ok(LockGuard {
                    cache: Arc::clone(self),
                    key: key.to_string(),
                    holder,
                    released: false,
                });
            }

            let waited = started.elapsed();
            if let Some(max_wait) = max_wait {
                if waited >= max_wait {
                    return Err(BrokerError::LockTimeout {
                        key: key.to_string(),
                        waited,
                    });
                }
            }

            attempts += 1;
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(retry_interval) => {}
            }
        }
    }
}
