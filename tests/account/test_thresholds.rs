// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::U256;
use fabstir_serving_broker::config::thresholds::{
    DEFAULT_CHECK_ACCOUNT_THRESHOLD, DEFAULT_TOP_UP_TARGET_THRESHOLD, DEFAULT_TOP_UP_TRIGGER_THRESHOLD,
};
use fabstir_serving_broker::{AccountThresholds, BrokerConfig, BrokerError, InferenceBroker};
use std::sync::Arc;

use crate::common::{provider_address, FakeLedger};

#[test]
fn test_check_above_trigger_fails_fast() {
    let err = AccountThresholds::new(6_000, 5_000, 10_000).unwrap_err();
    assert!(matches!(err, BrokerError::InvalidConfiguration(_)));
}

#[test]
fn test_trigger_above_target_fails_fast() {
    assert!(AccountThresholds::new(1_000, 20_000, 10_000).is_err());
}

#[test]
fn test_defaults_are_ordered() {
    let thresholds = AccountThresholds::default();
    assert_eq!(thresholds.check(), DEFAULT_CHECK_ACCOUNT_THRESHOLD);
    assert_eq!(thresholds.trigger(), DEFAULT_TOP_UP_TRIGGER_THRESHOLD);
    assert_eq!(thresholds.target(), DEFAULT_TOP_UP_TARGET_THRESHOLD);
    assert!(thresholds.check() <= thresholds.trigger());
    assert!(thresholds.trigger() <= thresholds.target());
}

#[test]
fn test_amounts_scale_with_unit_price() {
    let thresholds = AccountThresholds::new(500, 1_000, 2_000).unwrap();
    assert_eq!(thresholds.check_amount(U256::from(5)), U256::from(2_500));
    assert_eq!(thresholds.trigger_amount(U256::from(5)), U256::from(5_000));
    assert_eq!(thresholds.target_amount(U256::from(5)), U256::from(10_000));
}

#[test]
fn test_broker_requires_ledger() {
    let result = InferenceBroker::builder(BrokerConfig::default()).build();
    assert!(matches!(result, Err(BrokerError::InvalidConfiguration(_))));
}

#[test]
fn test_broker_requires_attestation_verifier() {
    let ledger = Arc::new(FakeLedger::with_balance(provider_address(), U256::zero()));
    let result = InferenceBroker::builder(BrokerConfig::default())
        .ledger(ledger)
        .build();
    assert!(matches!(result, Err(BrokerError::InvalidConfiguration(_))));
}
