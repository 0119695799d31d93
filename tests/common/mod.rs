// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hand-written collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use fabstir_serving_broker::metadata::MemoryStorage;
use fabstir_serving_broker::attestation::{AttestationVerifier, ProviderQuote, QuoteSource};
use fabstir_serving_broker::provider::{ResponseSignatureSource, ServiceDirectory, SignedResponse};
use fabstir_serving_broker::settlement::FixedClock;
use fabstir_serving_broker::{
    AccountThresholds, BrokerConfig, BrokerError, InferenceBroker, LedgerClient, MetadataStore,
    Result, ServiceInfo, ServiceType, TransferReceipt,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STORAGE_PREFIX: &str = "_test_broker_";
pub const QUOTE_HEX: &str = "0xc0ffee";

pub fn provider_address() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn user_address() -> Address {
    Address::repeat_byte(0xb2)
}

pub fn provider_signer() -> Address {
    Address::repeat_byte(0x5e)
}

/// Chatbot service priced at input 2 / output 3 neurons per byte
pub fn chatbot_service(provider: Address) -> ServiceInfo {
    ServiceInfo {
        provider,
        service_type: ServiceType::Chatbot,
        url: "http://provider.local".to_string(),
        model: "llama-3-8b".to_string(),
        input_price: U256::from(2),
        output_price: U256::from(3),
        updated_at: 1_700_000_000,
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    services: Mutex<HashMap<Address, ServiceInfo>>,
    pub calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with(services: Vec<ServiceInfo>) -> Self {
        let directory = Self::default();
        for service in services {
            directory.insert(service);
        }
        directory
    }

    pub fn insert(&self, service: ServiceInfo) {
        self.services.lock().unwrap().insert(service.provider, service);
    }
}

#[async_trait]
impl ServiceDirectory for FakeDirectory {
    async fn get_service(&self, provider: Address) -> Result<ServiceInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.services
            .lock()
            .unwrap()
            .get(&provider)
            .cloned()
            .ok_or_else(|| BrokerError::unreachable(provider, "connection refused"))
    }
}

pub struct FakeQuotes {
    pub fetches: AtomicUsize,
    pub signer: Mutex<Address>,
}

impl FakeQuotes {
    pub fn new() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            signer: Mutex::new(provider_signer()),
        }
    }
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn fetch_quote(&self, _service: &ServiceInfo) -> Result<ProviderQuote> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderQuote {
            quote: QUOTE_HEX.to_string(),
            provider_signer: *self.signer.lock().unwrap(),
            key_material: None,
            attestation_payload: serde_json::json!({"gpu": "H100"}),
        })
    }
}

pub struct FakeVerifier {
    pub accept: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn accepting(accept: bool) -> Self {
        Self {
            accept: AtomicBool::new(accept),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AttestationVerifier for FakeVerifier {
    async fn verify(&self, _raw_quote: &[u8]) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept.load(Ordering::SeqCst))
    }
}

/// In-memory ledger; a transfer credits the provider sub-account
pub struct FakeLedger {
    balances: Mutex<HashMap<Address, U256>>,
    pub transfers: Mutex<Vec<(Address, U256)>>,
    pub balance_reads: AtomicUsize,
    pub fail_transfers: AtomicBool,
    /// Simulated chain latency per call
    pub latency_ms: AtomicU64,
}

impl FakeLedger {
    pub fn with_balance(provider: Address, balance: U256) -> Self {
        let mut balances = HashMap::new();
        balances.insert(provider, balance);
        Self {
            balances: Mutex::new(balances),
            transfers: Mutex::new(Vec::new()),
            balance_reads: AtomicUsize::new(0),
            fail_transfers: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn balance(&self, provider: Address) -> U256 {
        self.balances
            .lock()
            .unwrap()
            .get(&provider)
            .copied()
            .unwrap_or_default()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }

    async fn chain_delay(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn user_address(&self) -> Address {
        user_address()
    }

    async fn get_account_balance(&self, provider: Address) -> Result<U256> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        self.chain_delay().await;
        Ok(self.balance(provider))
    }

    async fn transfer_funds(&self, provider: Address, amount: U256) -> Result<TransferReceipt> {
        self.chain_delay().await;
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(BrokerError::Ledger("insufficient ledger balance".to_string()));
        }
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(provider).or_default();
        *balance += amount;
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push((provider, amount));
        Ok(TransferReceipt {
            tx_hash: H256::from_low_u64_be(transfers.len() as u64),
            amount,
            block_number: Some(1),
        })
    }
}

pub struct FakeSignatures {
    pub response: Mutex<SignedResponse>,
}

impl FakeSignatures {
    pub fn new(text: &str, signature: &str) -> Self {
        Self {
            response: Mutex::new(SignedResponse {
                text: text.to_string(),
                signature: signature.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ResponseSignatureSource for FakeSignatures {
    async fn fetch_response_signature(&self, _service: &ServiceInfo, _chat_id: &str) -> Result<SignedResponse> {
        Ok(self.response.lock().unwrap().clone())
    }
}

pub struct Harness {
    pub broker: InferenceBroker,
    pub directory: Arc<FakeDirectory>,
    pub quotes: Arc<FakeQuotes>,
    pub verifier: Arc<FakeVerifier>,
    pub ledger: Arc<FakeLedger>,
    pub signatures: Arc<FakeSignatures>,
    pub metadata: Arc<MetadataStore>,
    pub storage: Arc<MemoryStorage>,
}

pub struct HarnessOptions {
    pub thresholds: AccountThresholds,
    pub balance: U256,
    pub accept_quotes: bool,
    pub clock_ms: Option<u64>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            thresholds: AccountThresholds::default(),
            balance: U256::from(1_000_000u64),
            accept_quotes: true,
            clock_ms: None,
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let provider = provider_address();
    let directory = Arc::new(FakeDirectory::with(vec![chatbot_service(provider)]));
    let quotes = Arc::new(FakeQuotes::new());
    let verifier = Arc::new(FakeVerifier::accepting(options.accept_quotes));
    let ledger = Arc::new(FakeLedger::with_balance(provider, options.balance));
    let signatures = Arc::new(FakeSignatures::new("", "0x"));
    let storage = Arc::new(MemoryStorage::new());
    let metadata = Arc::new(MetadataStore::new(storage.clone(), STORAGE_PREFIX));

    let config = BrokerConfig {
        thresholds: options.thresholds,
        ..BrokerConfig::default()
    };

    let mut builder = InferenceBroker::builder(config)
        .ledger(ledger.clone())
        .directory(directory.clone())
        .quote_source(quotes.clone())
        .signature_source(signatures.clone())
        .verifier(verifier.clone())
        .metadata(metadata.clone());
    if let Some(now_ms) = options.clock_ms {
        builder = builder.clock(Arc::new(FixedClock(now_ms)));
    }

    Harness {
        broker: builder.build().unwrap(),
        directory,
        quotes,
        verifier,
        ledger,
        signatures,
        metadata,
        storage,
    }
}
