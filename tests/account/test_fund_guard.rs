// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use fabstir_serving_broker::account::{fee_cache_key, AccountGuard, GuardDecision, TopUpOutcome};
use fabstir_serving_broker::{AccountThresholds, BrokerError, KvCache, LedgerClient, Result, TransferReceipt};
use mockall::mock;
use mockall::predicate::eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{chatbot_service, provider_address, user_address, FakeLedger};

mock! {
    pub Ledger {}

    #[async_trait]
    impl LedgerClient for Ledger {
        fn user_address(&self) -> Address;
        async fn get_account_balance(&self, provider: Address) -> Result<U256>;
        async fn transfer_funds(&self, provider: Address, amount: U256) -> Result<TransferReceipt>;
    }
}

const FEE_TTL: Duration = Duration::from_secs(3600);

fn guard_with(ledger: Arc<dyn LedgerClient>, thresholds: AccountThresholds) -> (AccountGuard, Arc<KvCache>) {
    let cache = Arc::new(KvCache::new());
    (
        AccountGuard::new(ledger, cache.clone(), thresholds, FEE_TTL),
        cache,
    )
}

#[tokio::test]
async fn test_top_up_is_idempotent_when_balance_at_target() {
    let service = chatbot_service(provider_address());
    let thresholds = AccountThresholds::default();
    let target = thresholds.target_amount(service.unit_price());

    let mut ledger = MockLedger::new();
    ledger
        .expect_get_account_balance()
        .with(eq(provider_address()))
        .times(2)
        .returning(move |_| Ok(target));
    ledger.expect_transfer_funds().times(0);

    let (guard, _) = guard_with(Arc::new(ledger), thresholds);
    guard.accumulate(provider_address(), U256::from(77)).unwrap();

    for _ in 0..2 {
        let outcome = guard.top_up_account_if_needed(&service).await.unwrap();
        assert_eq!(outcome, TopUpOutcome::Sufficient { balance: target });
    }
    assert_eq!(guard.accumulated_fee(provider_address()).unwrap(), U256::from(77));
}

#[tokio::test]
async fn test_single_request_below_threshold_skips_chain() {
    let service = chatbot_service(provider_address());
    let mut ledger = MockLedger::new();
    ledger.expect_get_account_balance().times(0);
    ledger.expect_transfer_funds().times(0);

    let (guard, _) = guard_with(Arc::new(ledger), AccountThresholds::new(500, 1_000, 2_000).unwrap());
    let decision = guard
        .check_before_request(&service, U256::from(4))
        .await
        .unwrap();
    assert_eq!(decision, GuardDecision::Skipped { accumulated: U256::from(4) });
}

#[tokio::test]
async fn test_check_triggers_at_accumulated_threshold() {
    let service = chatbot_service(provider_address());
    let mut ledger = MockLedger::new();
    ledger
        .expect_get_account_balance()
        .times(1)
        .returning(|_| Ok(U256::from(1_000_000u64)));

    let (guard, _) = guard_with(Arc::new(ledger), AccountThresholds::new(500, 1_000, 2_000).unwrap());

    // 625 requests of fee 4 reach 2500 = 500 x (2 + 3)
    for _ in 0..625 {
        let decision = guard.check_before_request(&service, U256::from(4)).await.unwrap();
        assert!(matches!(decision, GuardDecision::Skipped { .. }));
    }
    assert_eq!(guard.accumulated_fee(provider_address()).unwrap(), U256::from(2_500));

    let decision = guard.check_before_request(&service, U256::from(4)).await.unwrap();
    assert!(matches!(decision, GuardDecision::Checked(TopUpOutcome::Sufficient { .. })));
    assert_eq!(guard.accumulated_fee(provider_address()).unwrap(), U256::zero());
}

#[tokio::test]
async fn test_top_up_transfers_difference_to_target() {
    let service = chatbot_service(provider_address());
    let ledger = Arc::new(FakeLedger::with_balance(provider_address(), U256::from(1_234)));
    let (guard, _) = guard_with(ledger.clone(), AccountThresholds::new(10, 1_000, 2_000).unwrap());

    let outcome = guard.top_up_account_if_needed(&service).await.unwrap();
    match outcome {
        TopUpOutcome::ToppedUp { receipt, balance } => {
            assert_eq!(receipt.amount, U256::from(10_000 - 1_234));
            assert_eq!(balance, U256::from(10_000));
        }
        other => panic!("expected a top-up, got {:?}", other),
    }
    assert_eq!(
        ledger.transfers.lock().unwrap().clone(),
        vec![(provider_address(), U256::from(8_766))]
    );
}

#[tokio::test]
async fn test_top_up_that_does_not_land_is_insufficient_funds() {
    let service = chatbot_service(provider_address());
    let mut ledger = MockLedger::new();
    ledger.expect_get_account_balance().returning(|_| Ok(U256::zero()));
    ledger.expect_transfer_funds().times(1).returning(|_, amount| {
        Ok(TransferReceipt {
            tx_hash: H256::repeat_byte(0x0f),
            amount,
            block_number: None,
        })
    });

    let (guard, _) = guard_with(Arc::new(ledger), AccountThresholds::default());
    let err = guard.top_up_account_if_needed(&service).await.unwrap_err();
    assert!(matches!(err, BrokerError::InsufficientFunds { provider, .. } if provider == provider_address()));
}

#[tokio::test]
async fn test_ledger_read_failure_propagates() {
    let service = chatbot_service(provider_address());
    let mut ledger = MockLedger::new();
    ledger
        .expect_get_account_balance()
        .returning(|_| Err(BrokerError::Ledger("rpc timeout".to_string())));

    let (guard, cache) = guard_with(Arc::new(ledger), AccountThresholds::new(1, 1, 1).unwrap());
    cache.set_u256(&fee_cache_key(provider_address()), U256::from(100), FEE_TTL);

    let err = guard.check_before_request(&service, U256::one()).await.unwrap_err();
    assert!(matches!(err, BrokerError::Ledger(_)));
    assert_eq!(guard.accumulated_fee(provider_address()).unwrap(), U256::from(100));
}

#[tokio::test]
async fn test_guard_reports_ledger_user() {
    let ledger = Arc::new(FakeLedger::with_balance(provider_address(), U256::zero()));
    let (guard, _) = guard_with(ledger, AccountThresholds::default());
    assert_eq!(guard.user_address(), user_address());
}

#[tokio::test]
async fn test_concurrent_checks_top_up_once() {
    let service = chatbot_service(provider_address());
    let ledger = Arc::new(FakeLedger::with_balance(provider_address(), U256::zero()));
    ledger.latency_ms.store(5, Ordering::SeqCst);
    let (guard, _) = guard_with(ledger.clone(), AccountThresholds::new(1, 1_000, 2_000).unwrap());
    guard.accumulate(provider_address(), U256::from(5)).unwrap();

    let (first, second) = tokio::join!(
        guard.check_before_request(&service, U256::from(4)),
        guard.check_before_request(&service, U256::from(4)),
    );
    first.unwrap();
    second.unwrap();

    // 2000 x (2 + 3)
    assert_eq!(ledger.transfer_count(), 1);
    assert_eq!(ledger.balance(provider_address()), U256::from(10_000));
}

#[tokio::test]
async fn test_concurrent_top_ups_stop_at_target() {
    let service = chatbot_service(provider_address());
    let ledger = Arc::new(FakeLedger::with_balance(provider_address(), U256::from(500)));
    ledger.latency_ms.store(5, Ordering::SeqCst);
    let (guard, _) = guard_with(ledger.clone(), AccountThresholds::new(1, 1_000, 2_000).unwrap());

    let (first, second) = tokio::join!(
        guard.top_up_account_if_needed(&service),
        guard.top_up_account_if_needed(&service),
    );
    assert!(matches!(first.unwrap(), TopUpOutcome::ToppedUp { .. }));
    assert!(matches!(second.unwrap(), TopUpOutcome::Sufficient { .. }));
    assert_eq!(ledger.balance(provider_address()), U256::from(10_000));
}
