// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use fabstir_serving_broker::{AttestationGate, BrokerError};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::common::{chatbot_service, provider_address, provider_signer, FakeQuotes, FakeVerifier};

fn gate(accept: bool) -> (AttestationGate, Arc<FakeQuotes>, Arc<FakeVerifier>) {
    let quotes = Arc::new(FakeQuotes::new());
    let verifier = Arc::new(FakeVerifier::accepting(accept));
    (
        AttestationGate::new(quotes.clone(), verifier.clone()),
        quotes,
        verifier,
    )
}

#[tokio::test]
async fn test_never_verified_provider_is_untrusted() {
    let (gate, _, verifier) = gate(true);
    assert!(!gate.is_trusted(provider_address()));
    assert!(matches!(
        gate.ensure_trusted(provider_address()),
        Err(BrokerError::UntrustedProvider(_))
    ));
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_acknowledge_records_signer() {
    let (gate, _, _) = gate(true);
    let service = chatbot_service(provider_address());

    let signer = gate.acknowledge_provider(&service).await.unwrap();
    assert_eq!(signer, provider_signer());

    let record = gate.trust_record(provider_address()).unwrap();
    assert_eq!(record.signer, provider_signer());
}

#[tokio::test]
async fn test_failed_quote_is_never_cached() {
    let (gate, quotes, verifier) = gate(false);
    let service = chatbot_service(provider_address());

    for _ in 0..3 {
        let err = gate.acknowledge_provider(&service).await.unwrap_err();
        assert!(matches!(err, BrokerError::UntrustedProvider(_)));
    }
    assert_eq!(quotes.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_verify_quote_delegates_to_verifier() {
    let (gate, _, verifier) = gate(true);
    assert!(gate.verify_quote(&[0xc0, 0xff, 0xee]).await.unwrap());

    verifier.accept.store(false, Ordering::SeqCst);
    assert!(!gate.verify_quote(&[0xc0, 0xff, 0xee]).await.unwrap());
}

#[tokio::test]
async fn test_revoke_forgets_provider() {
    let (gate, _, _) = gate(true);
    gate.acknowledge_provider(&chatbot_service(provider_address()))
        .await
        .unwrap();

    gate.revoke(provider_address());
    assert!(!gate.is_trusted(provider_address()));
}
