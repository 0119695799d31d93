// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use super::thresholds::AccountThresholds;
use crate::error::{BrokerError, Result};

/// Namespace prefix for every key written to persistent storage
pub const DEFAULT_STORAGE_PREFIX: &str = "_fabstir_broker_";

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub thresholds: AccountThresholds,
    /// How long a fetched `ServiceInfo` stays valid
    pub service_cache_ttl: Duration,
    /// How long the last issued nonce is remembered
    pub nonce_ttl: Duration,
    /// Auto-release deadline for the nonce lock
    pub nonce_lock_ttl: Duration,
    /// Auto-release deadline for a provider's balance check and top-up
    pub top_up_lock_ttl: Duration,
    /// Fixed retry interval while waiting for a held lock
    pub lock_retry_interval: Duration,
    /// `None` waits indefinitely for a lock; `Some` fails with `LockTimeout`
    pub lock_max_wait: Option<Duration>,
    /// How long accumulated-fee counters live in the cache
    pub fee_cache_ttl: Duration,
    /// Durable metadata directory; in-memory storage when unset
    pub metadata_dir: Option<PathBuf>,
    pub storage_prefix: String,
    pub request_timeout: Duration,
    pub rpc_url: String,
    pub chain_id: u64,
    pub ledger_address: Option<Address>,
    pub attestation_address: Option<Address>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            thresholds: AccountThresholds::default(),
            service_cache_ttl: Duration::from_secs(10 * 60),
            nonce_ttl: Duration::from_secs(24 * 60 * 60),
            nonce_lock_ttl: Duration::from_secs(5),
            top_up_lock_ttl: Duration::from_secs(120),
            lock_retry_interval: Duration::from_millis(50),
            lock_max_wait: None,
            fee_cache_ttl: Duration::from_secs(24 * 60 * 60),
            metadata_dir: None,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            request_timeout: Duration::from_secs(30),
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 84532, // Base Sepolia
            ledger_address: None,
            attestation_address: None,
        }
    }
}

impl BrokerConfig {
    /// Load configuration from `BROKER_*` environment variables.
    ///
    /// Unparseable values fall back to the default with a warning; threshold
    /// ordering is still enforced and reported as an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let thresholds = AccountThresholds::new(
            env_or(
                "BROKER_CHECK_ACCOUNT_THRESHOLD",
                defaults.thresholds.check(),
            ),
            env_or(
                "BROKER_TOP_UP_TRIGGER_THRESHOLD",
                defaults.thresholds.trigger(),
            ),
            env_or(
                "BROKER_TOP_UP_TARGET_THRESHOLD",
                defaults.thresholds.target(),
            ),
        )?;

        let config = Self {
            thresholds,
            service_cache_ttl: env_secs("BROKER_SERVICE_CACHE_TTL_SECS", defaults.service_cache_ttl),
            nonce_ttl: env_secs("BROKER_NONCE_TTL_SECS", defaults.nonce_ttl),
            nonce_lock_ttl: env_secs("BROKER_NONCE_LOCK_TTL_SECS", defaults.nonce_lock_ttl),
            top_up_lock_ttl: env_secs("BROKER_TOP_UP_LOCK_TTL_SECS", defaults.top_up_lock_ttl),
            lock_retry_interval: Duration::from_millis(env_or(
                "BROKER_LOCK_RETRY_MS",
                defaults.lock_retry_interval.as_millis() as u64,
            )),
            lock_max_wait: env_millis_opt("BROKER_LOCK_MAX_WAIT_MS"),
            fee_cache_ttl: env_secs("BROKER_FEE_CACHE_TTL_SECS", defaults.fee_cache_ttl),
            metadata_dir: std::env::var("BROKER_METADATA_DIR").ok().map(PathBuf::from),
            storage_prefix: std::env::var("BROKER_STORAGE_PREFIX")
                .unwrap_or(defaults.storage_prefix),
            request_timeout: env_secs("BROKER_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            rpc_url: std::env::var("BROKER_RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env_or("BROKER_CHAIN_ID", defaults.chain_id),
            ledger_address: env_address("BROKER_LEDGER_ADDRESS"),
            attestation_address: env_address("BROKER_ATTESTATION_ADDRESS"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        AccountThresholds::new(
            self.thresholds.check(),
            self.thresholds.trigger(),
            self.thresholds.target(),
        )?;

        if self.lock_retry_interval.is_zero() {
            return Err(BrokerError::InvalidConfiguration(
                "lock retry interval must be non-zero".to_string(),
            ));
        }
        if self.nonce_lock_ttl.is_zero() || self.top_up_lock_ttl.is_zero() {
            return Err(BrokerError::InvalidConfiguration(
                "lock TTLs must be non-zero".to_string(),
            ));
        }
        if self.storage_prefix.is_empty() {
            return Err(BrokerError::InvalidConfiguration(
                "storage prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(val) => match val.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("{}='{}' invalid, using default {}", name, val, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(name, default.as_secs()))
}

/// Optional millisecond duration; unset and unparseable both mean `None`
fn env_millis_opt(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            warn!("{}='{}' invalid, waiting for locks without a limit", name, raw);
            None
        }
    }
}

fn env_address(name: &str) -> Option<Address> {
    let raw = std::env::var(name).ok()?;
    match Address::from_str(raw.trim()) {
        Ok(addr) => Some(addr),
        Err(_) => {
            warn!("{}='{}' is not a valid address, ignoring", name, raw);
            None
        }
    }
}
