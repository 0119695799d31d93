// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-provider fund guard
//!
//! ```text
//! accumulated >= check x unit  ──► live balance check ──► reset counter
//!        │                              │
//!        │                              └─ balance < trigger x unit: top up to target x unit
//!        └─ otherwise: accumulated += request fee
//! ```
//!
//! Both branches run under the per-provider lock `topup_{provider}`, so two
//! requests never read the same low balance and transfer twice.

use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ledger::{LedgerClient, TransferReceipt};
use crate::cache::{KvCache, LockGuard};
use crate::config::AccountThresholds;
use crate::error::{BrokerError, Result};
use crate::provider::ServiceInfo;

/// Covers a chain transfer plus its receipt
pub const DEFAULT_TOP_UP_LOCK_TTL: Duration = Duration::from_secs(120);
const DEFAULT_LOCK_RETRY: Duration = Duration::from_millis(50);

pub fn fee_cache_key(provider: Address) -> String {
    format!("{:?}_cachedFee", provider)
}

/// Output-fee estimates already added to the counter by skipped checks
pub fn counted_estimate_key(provider: Address) -> String {
    format!("{:?}_countedOutputEstimate", provider)
}

pub fn top_up_lock_key(provider: Address) -> String {
    format!("topup_{:?}", provider)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopUpOutcome {
    Sufficient { balance: U256 },
    ToppedUp { receipt: TransferReceipt, balance: U256 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Below the check threshold; the request fee was added to the counter
    Skipped { accumulated: U256 },
    /// Live balance was checked and the counter reset
    Checked(TopUpOutcome),
}

pub struct AccountGuard {
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<KvCache>,
    thresholds: AccountThresholds,
    fee_ttl: Duration,
    lock_ttl: Duration,
    retry_interval: Duration,
    max_wait: Option<Duration>,
}

impl AccountGuard {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        cache: Arc<KvCache>,
        thresholds: AccountThresholds,
        fee_ttl: Duration,
    ) -> Self {
        Self {
            ledger,
            cache,
            thresholds,
            fee_ttl,
            lock_ttl: DEFAULT_TOP_UP_LOCK_TTL,
            retry_interval: DEFAULT_LOCK_RETRY,
            max_wait: None,
        }
    }

    pub fn with_lock_timing(
        mut self,
        ttl: Duration,
        retry_interval: Duration,
        max_wait: Option<Duration>,
    ) -> Self {
        self.lock_ttl = ttl;
        self.retry_interval = retry_interval;
        self.max_wait = max_wait;
        self
    }

    async fn lock_provider(&self, provider: Address) -> Result<LockGuard> {
        self.cache
            .lock(
                &top_up_lock_key(provider),
                self.lock_ttl,
                self.retry_interval,
                self.max_wait,
            )
            .await
    }

    pub fn thresholds(&self) -> &AccountThresholds {
        &self.thresholds
    }

    pub fn user_address(&self) -> Address {
        self.ledger.user_address()
    }

    /// Fees billed since the last balance check; `CacheCorruption` if the
    /// counter does not decode
    pub fn accumulated_fee(&self, provider: Address) -> Result<U256> {
        Ok(self
            .cache
            .get_u256(&fee_cache_key(provider))?
            .unwrap_or_default())
    }

    pub fn accumulate(&self, provider: Address, fee: U256) -> Result<U256> {
        self.cache
            .add_u256(&fee_cache_key(provider), fee, self.fee_ttl)
    }

    pub fn reset_accumulated(&self, provider: Address) {
        self.cache
            .set_u256(&fee_cache_key(provider), U256::zero(), self.fee_ttl);
        self.cache
            .set_u256(&counted_estimate_key(provider), U256::zero(), self.fee_ttl);
    }

    /// Add the actual output fee of a finished response to the counter,
    /// minus whatever part of it a request estimate already counted.
    /// Returns the new accumulated total.
    pub fn settle_output_fee(&self, provider: Address, actual: U256) -> Result<U256> {
        let covered = self.cache.update_u256(
            &counted_estimate_key(provider),
            self.fee_ttl,
            |counted| {
                let covered = counted.min(actual);
                (counted - covered, covered)
            },
        )?;
        self.accumulate(provider, actual - covered)
    }

    /// Run before every request carrying `request_fee`
    pub async fn check_before_request(
        &self,
        service: &ServiceInfo,
        request_fee: U256,
    ) -> Result<GuardDecision> {
        self.check_with_estimate(service, request_fee, U256::zero())
            .await
    }

    /// Like `check_before_request`, where `output_fee_estimate` is the part of
    /// `request_fee` that a later `settle_output_fee` will replace with the
    /// actual output fee.
    pub async fn check_with_estimate(
        &self,
        service: &ServiceInfo,
        request_fee: U256,
        output_fee_estimate: U256,
    ) -> Result<GuardDecision> {
        let provider = service.provider;
        let _lock = self.lock_provider(provider).await?;

        let accumulated = self.accumulated_fee(provider)?;
        let check_at = self.thresholds.check_amount(service.unit_price());

        if accumulated < check_at {
            let accumulated = self.accumulate(provider, request_fee)?;
            if !output_fee_estimate.is_zero() {
                self.cache.add_u256(
                    &counted_estimate_key(provider),
                    output_fee_estimate.min(request_fee),
                    self.fee_ttl,
                )?;
            }
            debug!(
                "Provider {:?}: accumulated fee {} below check threshold {}",
                provider, accumulated, check_at
            );
            return Ok(GuardDecision::Skipped { accumulated });
        }

        info!(
            "Provider {:?}: accumulated fee {} reached {}, checking balance",
            provider, accumulated, check_at
        );
        let outcome = self.top_up_locked(service).await?;
        self.reset_accumulated(provider);
        Ok(GuardDecision::Checked(outcome))
    }

    /// Top the provider sub-account up to the target when the live balance
    /// is below the trigger. Leaves the fee counter alone.
    pub async fn top_up_account_if_needed(&self, service: &ServiceInfo) -> Result<TopUpOutcome> {
        let _lock = self.lock_provider(service.provider).await?;
        self.top_up_locked(service).await
    }

    /// Caller holds the provider's top-up lock, so the balance read here is
    /// the one the transfer is sized against.
    async fn top_up_locked(&self, service: &ServiceInfo) -> Result<TopUpOutcome> {
        let provider = service.provider;
        let unit_price = service.unit_price();
        let trigger = self.thresholds.trigger_amount(unit_price);
        let target = self.thresholds.target_amount(unit_price);

        let balance = self.ledger.get_account_balance(provider).await?;
        if balance >= trigger {
            debug!(
                "Provider {:?}: balance {} at or above trigger {}",
                provider, balance, trigger
            );
            return Ok(TopUpOutcome::Sufficient { balance });
        }

        let amount = target.saturating_sub(balance);
        info!(
            "Provider {:?}: balance {} below trigger {}, transferring {}",
            provider, balance, trigger, amount
        );

        let receipt = self
            .ledger
            .transfer_funds(provider, amount)
            .await
            .map_err(|e| {
                warn!("Top-up for provider {:?} failed: {}", provider, e);
                BrokerError::InsufficientFunds {
                    provider,
                    required: amount,
                    reason: format!("transfer failed: {}", e),
                }
            })?;

        let balance = self.ledger.get_account_balance(provider).await?;
        if balance < trigger {
            return Err(BrokerError::InsufficientFunds {
                provider,
                required: trigger,
                reason: format!("balance {} still below trigger after top-up", balance),
            });
        }

        info!(
            "Provider {:?}: topped up in {:?}, balance now {}",
            provider, receipt.tx_hash, balance
        );
        Ok(TopUpOutcome::ToppedUp { receipt, balance })
    }
}
