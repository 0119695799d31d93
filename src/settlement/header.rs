// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Signed request headers
//!
//! Builds the header a provider redeems against the client's ledger account:
//!
//! 1. Provider must hold a passing attestation
//! 2. Resolve `ServiceInfo` (cached)
//! 3. Price the request and run the fund guard
//! 4. Issue a nonce
//! 5. Commit to `(nonce, user, provider)`
//! 6. Sign `(nonce, inputFee, outputFee, previousOutputFee, provider)` with
//!    the per-provider settlement key, generating and persisting it on first use
//!
//! Any failure aborts the build; no partial header is ever returned.
//!
//! The pending previous-output fee is claimed in one cache step just before
//! signing, so concurrent builds never report the same fee twice, and a fee
//! recorded by `process_response` while a build is in flight is carried by
//! whichever header claims next. A build that fails after claiming puts the
//! fee back.

use ethers::types::{Address, H256, U256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::nonce::NonceGenerator;
use crate::account::AccountGuard;
use crate::attestation::AttestationGate;
use crate::cache::KvCache;
use crate::crypto::{sign_request, CommitmentHasher, RequestClaim, SigningKeyMaterial};
use crate::error::{BrokerError, Result};
use crate::extractor::extractor_for;
use crate::metadata::MetadataStore;
use crate::provider::ServiceResolver;

/// How the request reaches the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Direct,
    /// Routed through the provider's vLLM proxy
    Proxied,
}

impl Transport {
    pub fn is_proxied(&self) -> bool {
        matches!(self, Transport::Proxied)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub provider: Address,
    pub user: Address,
    pub nonce: u64,
    pub input_fee: U256,
    pub output_fee: U256,
    pub previous_output_fee: U256,
    pub request_hash: H256,
    pub signature: [u8; 65],
    pub transport: Transport,
}

impl RequestHeader {
    /// Flat field set, in wire order
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Address", format!("{:?}", self.provider)),
            ("User", format!("{:?}", self.user)),
            ("Nonce", self.nonce.to_string()),
            ("Input-Fee", self.input_fee.to_string()),
            ("Fee", self.output_fee.to_string()),
            ("Previous-Output-Fee", self.previous_output_fee.to_string()),
            ("Request-Hash", format!("{:?}", self.request_hash)),
            ("Signature", format!("0x{}", hex::encode(self.signature))),
            ("VLLM-Proxy", self.transport.is_proxied().to_string()),
        ]
    }

    pub fn claim(&self) -> RequestClaim {
        RequestClaim {
            nonce: self.nonce,
            input_fee: self.input_fee,
            output_fee: self.output_fee,
            previous_output_fee: self.previous_output_fee,
            provider: self.provider,
        }
    }
}

impl fmt::Debug for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHeader")
            .field("provider", &self.provider)
            .field("user", &self.user)
            .field("nonce", &self.nonce)
            .field("input_fee", &self.input_fee)
            .field("output_fee", &self.output_fee)
            .field("previous_output_fee", &self.previous_output_fee)
            .field("request_hash", &self.request_hash)
            .field("signature", &format!("0x{}", hex::encode(self.signature)))
            .field("transport", &self.transport)
            .finish()
    }
}

pub fn previous_output_fee_key(provider: Address) -> String {
    format!("{:?}_previousOutputFee", provider)
}

pub struct HeaderSigner {
    pub(crate) resolver: Arc<ServiceResolver>,
    pub(crate) gate: Arc<AttestationGate>,
    pub(crate) guard: Arc<AccountGuard>,
    pub(crate) nonces: Arc<NonceGenerator>,
    pub(crate) metadata: Arc<MetadataStore>,
    pub(crate) cache: Arc<KvCache>,
    pub(crate) commitment: Arc<dyn CommitmentHasher>,
    pub(crate) fee_ttl: Duration,
}

impl HeaderSigner {
    pub async fn build_header(
        &self,
        provider: Address,
        content: &str,
        output_fee_estimate: U256,
        transport: Transport,
    ) -> Result<RequestHeader> {
        self.gate.ensure_trusted(provider)?;
        let service = self.resolver.resolve(provider).await?;

        let extractor = extractor_for(service.clone());
        let input_fee = extractor.input_fee(content)?;

        let request_fee = input_fee.checked_add(output_fee_estimate).ok_or_else(|| {
            BrokerError::InvalidAmount {
                amount: output_fee_estimate.to_string(),
                reason: "request fee overflows".to_string(),
            }
        })?;
        self.guard
            .check_with_estimate(&service, request_fee, output_fee_estimate)
            .await?;

        let nonce = self.nonces.next_nonce().await?;
        let user = self.guard.user_address();
        let request_hash = self.commitment.commit(nonce, user, provider);

        let key = self.signing_key(provider).await?;
        let previous_output_fee = self.take_previous_output_fee(provider)?;
        let claim = RequestClaim {
            nonce,
            input_fee,
            output_fee: output_fee_estimate,
            previous_output_fee,
            provider,
        };
        let signature = match sign_request(&key, &claim) {
            Ok(signature) => signature,
            Err(e) => {
                self.restore_previous_output_fee(provider, previous_output_fee);
                return Err(e);
            }
        };

        info!(
            "Signed header for provider {:?}: nonce {}, input fee {}",
            provider, nonce, input_fee
        );
        Ok(RequestHeader {
            provider,
            user,
            nonce,
            input_fee,
            output_fee: output_fee_estimate,
            previous_output_fee,
            request_hash,
            signature,
            transport,
        })
    }

    /// Unsettled output fee of the previous round, 0 on the first round
    pub fn previous_output_fee(&self, provider: Address) -> Result<U256> {
        Ok(self
            .cache
            .get_u256(&previous_output_fee_key(provider))?
            .unwrap_or_default())
    }

    /// Add `fee` to the provider's pending output fee; returns the new total
    pub fn record_output_fee(&self, provider: Address, fee: U256) -> Result<U256> {
        self.cache
            .add_u256(&previous_output_fee_key(provider), fee, self.fee_ttl)
    }

    /// Claim the pending output fee; the next claim starts from zero
    pub fn take_previous_output_fee(&self, provider: Address) -> Result<U256> {
        self.cache
            .take_u256(&previous_output_fee_key(provider), self.fee_ttl)
    }

    fn restore_previous_output_fee(&self, provider: Address, fee: U256) {
        if fee.is_zero() {
            return;
        }
        if let Err(e) = self.record_output_fee(provider, fee) {
            warn!(
                "Could not restore output fee {} for provider {:?}: {}",
                fee, provider, e
            );
        }
    }

    /// Settlement key for `provider`. Missing or corrupt keys are replaced
    /// with a fresh one, which is persisted before use.
    pub async fn signing_key(&self, provider: Address) -> Result<SigningKeyMaterial> {
        match self.metadata.get_signing_key(provider).await {
            Ok(Some(key)) => return Ok(key),
            Ok(None) => debug!("No settlement key for provider {:?}", provider),
            Err(BrokerError::CacheCorruption { key, reason }) => {
                warn!("Discarding corrupt settlement key '{}': {}", key, reason);
            }
            Err(e) => return Err(e),
        }

        let material = SigningKeyMaterial::generate();
        self.metadata.store_signing_key(provider, &material).await?;
        info!(
            "Generated settlement key {:?} for provider {:?}",
            material.address(),
            provider
        );
        Ok(material)
    }
}
