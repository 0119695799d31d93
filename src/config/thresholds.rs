// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fund-check policy thresholds
//!
//! All three thresholds are multiples of a provider's unit price
//! (`input_price + output_price`), so the same policy scales across
//! providers with very different prices.

use ethers::types::U256;
use serde::Serialize;

use crate::error::{BrokerError, Result};

pub const DEFAULT_CHECK_ACCOUNT_THRESHOLD: u64 = 1_000;
pub const DEFAULT_TOP_UP_TRIGGER_THRESHOLD: u64 = 5_000;
pub const DEFAULT_TOP_UP_TARGET_THRESHOLD: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountThresholds {
    check: u64,
    trigger: u64,
    target: u64,
}

impl AccountThresholds {
    /// Build a threshold set; fails unless `check <= trigger <= target`.
    pub fn new(check: u64, trigger: u64, target: u64) -> Result<Self> {
        if check > trigger {
            return Err(BrokerError::InvalidConfiguration(format!(
                "check-account threshold {} exceeds top-up trigger threshold {}",
                check, trigger
            )));
        }
        if trigger > target {
            return Err(BrokerError::InvalidConfiguration(format!(
                "top-up trigger threshold {} exceeds top-up target threshold {}",
                trigger, target
            )));
        }
        Ok(Self {
            check,
            trigger,
            target,
        })
    }

    pub fn check(&self) -> u64 {
        self.check
    }

    pub fn trigger(&self) -> u64 {
        self.trigger
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Accumulated fee at which a live balance check is due
    pub fn check_amount(&self, unit_price: U256) -> U256 {
        unit_price.saturating_mul(U256::from(self.check))
    }

    /// Balance below which a top-up is triggered
    pub fn trigger_amount(&self, unit_price: U256) -> U256 {
        unit_price.saturating_mul(U256::from(self.trigger))
    }

    /// Balance a top-up tops the account up to
    pub fn target_amount(&self, unit_price: U256) -> U256 {
        unit_price.saturating_mul(U256::from(self.target))
    }
}

impl Default for AccountThresholds {
    fn default() -> Self {
        Self {
            check: DEFAULT_CHECK_ACCOUNT_THRESHOLD,
            trigger: DEFAULT_TOP_UP_TRIGGER_THRESHOLD,
            target: DEFAULT_TOP_UP_TARGET_THRESHOLD,
        }
    }
}
