// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Broker error types
//!
//! Every failure the metering-and-settlement path can produce is surfaced to
//! the immediate caller as one of these variants. Nothing is swallowed, and a
//! failed header build never yields a partial header.

use ethers::types::{Address, U256};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// A cached or persisted value could not be decoded. Not retried: the
    /// caller must reset the key (for signing keys: regenerate and re-store).
    #[error("Corrupt cached value under '{key}': {reason}")]
    CacheCorruption { key: String, reason: String },

    /// Network failure or timeout talking to a provider. Safe to retry.
    #[error("Provider {provider:?} unreachable: {reason}")]
    ProviderUnreachable { provider: Address, reason: String },

    /// The provider has no passing attestation on record.
    #[error("Provider {0:?} is not trusted: no successful attestation on record")]
    UntrustedProvider(Address),

    #[error("Insufficient funds for provider {provider:?}: need {required}, {reason}")]
    InsufficientFunds {
        provider: Address,
        required: U256,
        reason: String,
    },

    #[error("Timed out after {waited:?} waiting for lock '{key}'")]
    LockTimeout { key: String, waited: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported service type: {0}")]
    UnsupportedServiceType(String),

    #[error("Fee overflow: {count} units at price {price}")]
    FeeOverflow { count: u64, price: U256 },

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Ledger call failed: {0}")]
    Ledger(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BrokerError {
    pub fn corruption(key: impl Into<String>, reason: impl ToString) -> Self {
        BrokerError::CacheCorruption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unreachable(provider: Address, reason: impl ToString) -> Self {
        BrokerError::ProviderUnreachable {
            provider,
            reason: reason.to_string(),
        }
    }

    /// Whether a caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::ProviderUnreachable { .. } | BrokerError::LockTimeout { .. }
        )
    }
}

impl From<ethers::providers::ProviderError> for BrokerError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        BrokerError::Ledger(err.to_string())
    }
}

impl<M: ethers::providers::Middleware> From<ethers::contract::ContractError<M>> for BrokerError {
    fn from(err: ethers::contract::ContractError<M>) -> Self {
        BrokerError::Ledger(err.to_string())
    }
}

impl From<k256::ecdsa::Error> for BrokerError {
    fn from(err: k256::ecdsa::Error) -> Self {
        BrokerError::Signing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
