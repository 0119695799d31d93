// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::U256;
use fabstir_serving_broker::cache::KvCache;
use fabstir_serving_broker::settlement::nonce::{NONCE_LOCK_KEY, NONCE_STEP};
use fabstir_serving_broker::settlement::{FixedClock, NonceGenerator, Transport};
use fabstir_serving_broker::BrokerConfig;
use futures_util::future::join_all;
use std::sync::Arc;

use crate::common::{harness, provider_address, HarnessOptions};

#[tokio::test]
async fn test_concurrent_nonces_are_unique_and_increasing() {
    let cache = Arc::new(KvCache::new());
    // Frozen clock forces every nonce after the first onto the +40 path
    let generator = Arc::new(NonceGenerator::with_clock(
        cache.clone(),
        &BrokerConfig::default(),
        Arc::new(FixedClock(1_700_000_000_000)),
    ));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let generator = generator.clone();
            tokio::spawn(async move { generator.next_nonce().await.unwrap() })
        })
        .collect();

    let mut nonces = Vec::new();
    for handle in handles {
        nonces.push(handle.await.unwrap());
    }
    nonces.sort_unstable();

    for pair in nonces.windows(2) {
        assert_eq!(pair[1] - pair[0], NONCE_STEP);
    }
    assert_eq!(nonces[0], 1_700_000_000_000 * 10_000 + 40);
    assert!(!cache.is_locked(NONCE_LOCK_KEY));
}

#[tokio::test]
async fn test_sequential_nonces_with_real_clock() {
    let generator = NonceGenerator::new(Arc::new(KvCache::new()), &BrokerConfig::default());

    let mut last = 0;
    for _ in 0..100 {
        let nonce = generator.next_nonce().await.unwrap();
        assert!(nonce > last);
        last = nonce;
    }
}

#[tokio::test]
async fn test_near_simultaneous_headers_get_distinct_nonces() {
    let h = harness(HarnessOptions::default());
    h.broker.acknowledge_provider(provider_address()).await.unwrap();

    let first = h
        .broker
        .get_request_headers(provider_address(), "hi", U256::zero(), Transport::Direct);
    let second = h
        .broker
        .get_request_headers(provider_address(), "hello", U256::zero(), Transport::Direct);
    let results = join_all(vec![first, second]).await;

    let nonces: Vec<u64> = results.into_iter().map(|r| r.unwrap().nonce).collect();
    assert_ne!(nonces[0], nonces[1]);
}

#[tokio::test]
async fn test_header_nonces_follow_issue_order() {
    let h = harness(HarnessOptions {
        clock_ms: Some(42),
        ..HarnessOptions::default()
    });
    h.broker.acknowledge_provider(provider_address()).await.unwrap();

    let mut previous = 0;
    for _ in 0..5 {
        let header = h
            .broker
            .get_request_headers(provider_address(), "hi", U256::zero(), Transport::Direct)
            .await
            .unwrap();
        assert!(header.nonce > previous);
        previous = header.nonce;
    }
    assert_eq!(previous, 42 * 10_000 + 40 + 4 * NONCE_STEP);
}

#[tokio::test]
async fn test_peek_nonce_leaves_no_trace() {
    let h = harness(HarnessOptions {
        clock_ms: Some(7),
        ..HarnessOptions::default()
    });

    assert_eq!(h.broker.peek_nonce(), 70_040);
    assert_eq!(h.broker.peek_nonce(), 70_040);
    assert!(h.broker.cache().is_empty());
}
