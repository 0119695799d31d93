// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BrokerError, Result};

abigen!(
    AttestationVerifierContract,
    r#"[
        {
            "inputs": [{"internalType": "bytes", "name": "rawQuote", "type": "bytes"}],
            "name": "verifyAndAttestOnChain",
            "outputs": [
                {"internalType": "bool", "name": "success", "type": "bool"},
                {"internalType": "bytes", "name": "output", "type": "bytes"}
            ],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]"#
);

/// Decides whether a raw hardware quote is authentic
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    async fn verify(&self, raw_quote: &[u8]) -> Result<bool>;
}

/// Verifier backed by the on-chain attestation contract
pub struct OnChainAttestationVerifier {
    contract: AttestationVerifierContract<Provider<Http>>,
}

impl OnChainAttestationVerifier {
    pub fn new(rpc_url: &str, address: Address) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|e| {
            BrokerError::InvalidConfiguration(format!("Invalid RPC URL '{}': {}", rpc_url, e))
        })?;
        info!("Attestation verifier at {:?} via {}", address, rpc_url);

        Ok(Self {
            contract: AttestationVerifierContract::new(address, Arc::new(provider)),
        })
    }
}

#[async_trait]
impl AttestationVerifier for OnChainAttestationVerifier {
    async fn verify(&self, raw_quote: &[u8]) -> Result<bool> {
        let (success, output) = self
            .contract
            .verify_and_attest_on_chain(Bytes::from(raw_quote.to_vec()))
            .call()
            .await?;
        debug!(
            "verifyAndAttestOnChain returned {} ({} bytes of output)",
            success,
            output.len()
        );
        Ok(success)
    }
}
