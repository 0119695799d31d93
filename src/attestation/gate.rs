// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use super::quote::{ProviderQuote, QuoteSource};
use super::verifier::AttestationVerifier;
use crate::error::{BrokerError, Result};
use crate::provider::ServiceInfo;

/// Outcome of the last passing verification for a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRecord {
    pub signer: Address,
    pub verified_at: DateTime<Utc>,
}

/// Tracks which providers have passed attestation.
///
/// A provider is trusted only while its most recent verification passed.
/// Failures and verifier errors revoke trust and drop the cached quote.
pub struct AttestationGate {
    source: Arc<dyn QuoteSource>,
    verifier: Arc<dyn AttestationVerifier>,
    quotes: RwLock<HashMap<Address, ProviderQuote>>,
    trusted: RwLock<HashMap<Address, TrustRecord>>,
}

impl AttestationGate {
    pub fn new(source: Arc<dyn QuoteSource>, verifier: Arc<dyn AttestationVerifier>) -> Self {
        Self {
            source,
            verifier,
            quotes: RwLock::new(HashMap::new()),
            trusted: RwLock::new(HashMap::new()),
        }
    }

    /// Provider quote, fetched once and cached until verification fails
    pub async fn get_quote(&self, service: &ServiceInfo) -> Result<ProviderQuote> {
        let cached = self
            .quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&service.provider)
            .cloned();
        if let Some(quote) = cached {
            return Ok(quote);
        }

        let quote = self.source.fetch_quote(service).await?;
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service.provider, quote.clone());
        Ok(quote)
    }

    pub async fn verify_quote(&self, raw_quote: &[u8]) -> Result<bool> {
        self.verifier.verify(raw_quote).await
    }

    /// Fetch and verify the provider's quote; on success the quote's signer
    /// becomes the provider's trusted signer
    pub async fn acknowledge_provider(&self, service: &ServiceInfo) -> Result<Address> {
        let provider = service.provider;
        let quote = self.get_quote(service).await?;

        let raw = match quote.raw_quote() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Provider {:?} published an undecodable quote: {}", provider, e);
                self.revoke(provider);
                return Err(BrokerError::UntrustedProvider(provider));
            }
        };

        let verified = match self.verify_quote(&raw).await {
            Ok(verified) => verified,
            Err(e) => {
                self.revoke(provider);
                return Err(e);
            }
        };

        if !verified {
            warn!("Attestation failed for provider {:?}", provider);
            self.revoke(provider);
            return Err(BrokerError::UntrustedProvider(provider));
        }

        info!(
            "Provider {:?} attested, signer {:?}",
            provider, quote.provider_signer
        );
        self.trusted
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                provider,
                TrustRecord {
                    signer: quote.provider_signer,
                    verified_at: Utc::now(),
                },
            );
        Ok(quote.provider_signer)
    }

    /// Trusted signer address, or `UntrustedProvider`
    pub fn ensure_trusted(&self, provider: Address) -> Result<Address> {
        self.trust_record(provider)
            .map(|record| record.signer)
            .ok_or(BrokerError::UntrustedProvider(provider))
    }

    pub fn trust_record(&self, provider: Address) -> Option<TrustRecord> {
        self.trusted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
    }

    pub fn is_trusted(&self, provider: Address) -> bool {
        self.trust_record(provider).is_some()
    }

    /// Forget the provider's quote and trust
    pub fn revoke(&self, provider: Address) {
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider);
        self.trusted
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider);
    }
}
