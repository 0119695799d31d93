// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client account funding
//!
//! The ledger holds the client's prepaid balance per provider. `AccountGuard`
//! decides, before each request, whether that balance needs checking and
//! topping up.

pub mod guard;
pub mod ledger;

pub use guard::{fee_cache_key, AccountGuard, GuardDecision, TopUpOutcome};
pub use ledger::{ContractLedger, LedgerClient, TransferReceipt};
