// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Settlement nonce issuance
//!
//! Nonces are time-derived and strictly increasing for one broker instance:
//!
//! ```text
//! candidate = now_ms * 10000 + 40
//! nonce     = last >= candidate ? last + 40 : candidate
//! ```
//!
//! The read-compare-store runs under the cache lock `nonce_lock`, so two
//! concurrent callers can never observe the same `last`.

use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::KvCache;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};

pub const NONCE_LOCK_KEY: &str = "nonce_lock";
pub const NONCE_KEY: &str = "nonce";
/// Minimum distance between two issued nonces
pub const NONCE_STEP: u64 = 40;
/// Low-order headroom reserved per millisecond
pub const NONCE_SCALE: u64 = 10_000;

/// Millisecond wall clock
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Clock pinned to a fixed instant
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

pub fn nonce_candidate(now_ms: u64) -> u64 {
    now_ms.saturating_mul(NONCE_SCALE).saturating_add(NONCE_STEP)
}

pub struct NonceGenerator {
    cache: Arc<KvCache>,
    clock: Arc<dyn Clock>,
    nonce_ttl: Duration,
    lock_ttl: Duration,
    retry_interval: Duration,
    max_wait: Option<Duration>,
}

impl NonceGenerator {
    pub fn new(cache: Arc<KvCache>, config: &BrokerConfig) -> Self {
        Self::with_clock(cache, config, Arc::new(SystemClock))
    }

    pub fn with_clock(cache: Arc<KvCache>, config: &BrokerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            nonce_ttl: config.nonce_ttl,
            lock_ttl: config.nonce_lock_ttl,
            retry_interval: config.lock_retry_interval,
            max_wait: config.lock_max_wait,
        }
    }

    /// Issue the next nonce. Waits for the nonce lock; fails with
    /// `LockTimeout` only when a maximum wait is configured.
    pub async fn next_nonce(&self) -> Result<u64> {
        let guard = self
            .cache
            .lock(NONCE_LOCK_KEY, self.lock_ttl, self.retry_interval, self.max_wait)
            .await?;

        let last = self.last_issued()?;
        let candidate = nonce_candidate(self.clock.now_ms());
        let nonce = if last >= candidate {
            last.checked_add(NONCE_STEP)
                .ok_or_else(|| BrokerError::corruption(NONCE_KEY, "nonce space exhausted"))?
        } else {
            candidate
        };

        self.cache.set_u256(NONCE_KEY, U256::from(nonce), self.nonce_ttl);
        guard.release();

        debug!("Issued nonce {} (last {})", nonce, last);
        Ok(nonce)
    }

    /// Time-derived nonce without touching shared state; not unique
    pub fn peek_nonce(&self) -> u64 {
        nonce_candidate(self.clock.now_ms())
    }

    /// Last issued nonce, 0 on a cold cache
    pub fn last_issued(&self) -> Result<u64> {
        match self.cache.get_u256(NONCE_KEY)? {
            None => Ok(0),
            Some(value) if value > U256::from(u64::MAX) => Err(BrokerError::corruption(
                NONCE_KEY,
                format!("{} does not fit a nonce", value),
            )),
            Some(value) => Ok(value.as_u64()),
        }
    }

    /// Forget the last issued nonce; used to recover from a corrupt entry
    pub fn reset(&self) {
        self.cache.remove(NONCE_KEY);
    }
}
