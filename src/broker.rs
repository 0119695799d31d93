// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client-side inference broker
//!
//! Wires the cache, metadata store, provider client, attestation gate, fund
//! guard and header signer together. One broker instance owns one cache, so
//! nonce ordering holds across every header it signs.

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::info;

use crate::account::{AccountGuard, LedgerClient, TopUpOutcome};
use crate::attestation::{AttestationGate, AttestationVerifier, OnChainAttestationVerifier, QuoteSource};
use crate::cache::KvCache;
use crate::config::BrokerConfig;
use crate::crypto::{CommitmentHasher, KeccakCommitment};
use crate::error::{BrokerError, Result};
use crate::metadata::{MetadataStore, StorageBackend};
use crate::provider::{
    HttpProviderClient, ResponseSignatureSource, ServiceDirectory, ServiceInfo, ServiceMetadata,
    ServiceResolver,
};
use crate::settlement::{
    Clock, HeaderSigner, NonceGenerator, RequestHeader, ResponseProcessor, ResponseSettlement,
    SystemClock, Transport,
};

pub struct InferenceBroker {
    config: BrokerConfig,
    cache: Arc<KvCache>,
    resolver: Arc<ServiceResolver>,
    gate: Arc<AttestationGate>,
    guard: Arc<AccountGuard>,
    nonces: Arc<NonceGenerator>,
    signer: Arc<HeaderSigner>,
    responses: ResponseProcessor,
}

impl InferenceBroker {
    pub fn builder(config: BrokerConfig) -> BrokerBuilder {
        BrokerBuilder::new(config)
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<KvCache> {
        &self.cache
    }

    pub fn user_address(&self) -> Address {
        self.guard.user_address()
    }

    /// Verify the provider's hardware quote; required once before any header
    pub async fn acknowledge_provider(&self, provider: Address) -> Result<Address> {
        let service = self.resolver.resolve(provider).await?;
        self.gate.acknowledge_provider(&service).await
    }

    pub fn is_provider_trusted(&self, provider: Address) -> bool {
        self.gate.is_trusted(provider)
    }

    pub async fn get_service(&self, provider: Address) -> Result<ServiceInfo> {
        self.resolver.resolve(provider).await
    }

    /// Endpoint and model to send inference requests to
    pub async fn get_service_metadata(&self, provider: Address) -> Result<ServiceMetadata> {
        let service = self.resolver.resolve(provider).await?;
        Ok(ServiceMetadata {
            endpoint: format!("{}/v1/proxy", service.url),
            model: service.model,
        })
    }

    pub async fn get_request_headers(
        &self,
        provider: Address,
        content: &str,
        output_fee_estimate: U256,
        transport: Transport,
    ) -> Result<RequestHeader> {
        self.signer
            .build_header(provider, content, output_fee_estimate, transport)
            .await
    }

    pub async fn process_response(
        &self,
        provider: Address,
        content: &str,
        chat_id: Option<&str>,
    ) -> Result<ResponseSettlement> {
        self.responses
            .process_response(provider, content, chat_id)
            .await
    }

    /// Output fee the next header for `provider` will report
    pub fn pending_output_fee(&self, provider: Address) -> Result<U256> {
        self.signer.previous_output_fee(provider)
    }

    pub async fn top_up_account_if_needed(&self, provider: Address) -> Result<TopUpOutcome> {
        let service = self.resolver.resolve(provider).await?;
        self.guard.top_up_account_if_needed(&service).await
    }

    pub fn peek_nonce(&self) -> u64 {
        self.nonces.peek_nonce()
    }
}

/// Assembles an `InferenceBroker`.
///
/// Only the ledger is mandatory. Provider access defaults to one shared
/// `HttpProviderClient`; attestation defaults to the on-chain verifier at
/// `config.attestation_address`; key storage follows `config.metadata_dir`.
pub struct BrokerBuilder {
    config: BrokerConfig,
    cache: Option<Arc<KvCache>>,
    ledger: Option<Arc<dyn LedgerClient>>,
    directory: Option<Arc<dyn ServiceDirectory>>,
    quotes: Option<Arc<dyn QuoteSource>>,
    signatures: Option<Arc<dyn ResponseSignatureSource>>,
    verifier: Option<Arc<dyn AttestationVerifier>>,
    metadata: Option<Arc<MetadataStore>>,
    commitment: Option<Arc<dyn CommitmentHasher>>,
    clock: Option<Arc<dyn Clock>>,
}

impl BrokerBuilder {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            cache: None,
            ledger: None,
            directory: None,
            quotes: None,
            signatures: None,
            verifier: None,
            metadata: None,
            commitment: None,
            clock: None,
        }
    }

    pub fn cache(mut self, cache: Arc<KvCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn ServiceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn quote_source(mut self, quotes: Arc<dyn QuoteSource>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn signature_source(mut self, signatures: Arc<dyn ResponseSignatureSource>) -> Self {
        self.signatures = Some(signatures);
        self
    }

    /// Use one HTTP client for descriptors, quotes and response signatures
    pub fn http_provider(self, client: Arc<HttpProviderClient>) -> Self {
        self.directory(client.clone())
            .quote_source(client.clone())
            .signature_source(client)
    }

    pub fn verifier(mut self, verifier: Arc<dyn AttestationVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn metadata(mut self, metadata: Arc<MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn commitment(mut self, commitment: Arc<dyn CommitmentHasher>) -> Self {
        self.commitment = Some(commitment);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<InferenceBroker> {
        let config = self.config;
        config.validate()?;

        let ledger = self.ledger.ok_or_else(|| {
            BrokerError::InvalidConfiguration("a ledger client is required".to_string())
        })?;

        let mut http = None;
        let directory: Arc<dyn ServiceDirectory> = match self.directory {
            Some(directory) => directory,
            None => shared_http(&mut http, &config)?,
        };
        let quotes: Arc<dyn QuoteSource> = match self.quotes {
            Some(quotes) => quotes,
            None => shared_http(&mut http, &config)?,
        };
        let signatures: Arc<dyn ResponseSignatureSource> = match self.signatures {
            Some(signatures) => signatures,
            None => shared_http(&mut http, &config)?,
        };

        let verifier: Arc<dyn AttestationVerifier> = match self.verifier {
            Some(verifier) => verifier,
            None => {
                let address = config.attestation_address.ok_or_else(|| {
                    BrokerError::InvalidConfiguration(
                        "no attestation verifier and no attestation contract address".to_string(),
                    )
                })?;
                Arc::new(OnChainAttestationVerifier::new(&config.rpc_url, address)?)
            }
        };

        let metadata = match self.metadata {
            Some(metadata) => metadata,
            None => Arc::new(MetadataStore::with_backend(
                &StorageBackend::from_dir(config.metadata_dir.clone()),
                config.storage_prefix.clone(),
            )?),
        };

        let cache = self.cache.unwrap_or_else(|| Arc::new(KvCache::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let commitment = self
            .commitment
            .unwrap_or_else(|| Arc::new(KeccakCommitment));

        let resolver = Arc::new(ServiceResolver::new(
            directory,
            cache.clone(),
            config.service_cache_ttl,
        ));
        let gate = Arc::new(AttestationGate::new(quotes, verifier));
        let guard = Arc::new(AccountGuard::new(
            ledger,
            cache.clone(),
            config.thresholds,
            config.fee_cache_ttl,
        )
        .with_lock_timing(
            config.top_up_lock_ttl,
            config.lock_retry_interval,
            config.lock_max_wait,
        ));
        let nonces = Arc::new(NonceGenerator::with_clock(cache.clone(), &config, clock));

        let signer = Arc::new(HeaderSigner {
            resolver: resolver.clone(),
            gate: gate.clone(),
            guard: guard.clone(),
            nonces: nonces.clone(),
            metadata,
            cache: cache.clone(),
            commitment,
            fee_ttl: config.fee_cache_ttl,
        });
        let responses = ResponseProcessor::new(signer.clone(), signatures);

        info!(
            "Inference broker ready for user {:?} (thresholds {}/{}/{})",
            guard.user_address(),
            config.thresholds.check(),
            config.thresholds.trigger(),
            config.thresholds.target()
        );

        Ok(InferenceBroker {
            config,
            cache,
            resolver,
            gate,
            guard,
            nonces,
            signer,
            responses,
        })
    }
}

fn shared_http(
    slot: &mut Option<Arc<HttpProviderClient>>,
    config: &BrokerConfig,
) -> Result<Arc<HttpProviderClient>> {
    if let Some(client) = slot {
        return Ok(client.clone());
    }
    let client = Arc::new(HttpProviderClient::new(config.request_timeout)?);
    *slot = Some(client.clone());
    Ok(client)
}
