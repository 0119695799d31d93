// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::provider::ServiceInfo;

/// Hardware quote as published by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuote {
    /// Hex-encoded raw quote, submitted as-is to the verifier
    pub quote: String,
    /// Address the provider signs responses with
    pub provider_signer: Address,
    /// Provider public key bound into the quote, if published
    #[serde(default)]
    pub key_material: Option<String>,
    /// Vendor attestation report (e.g. GPU evidence); opaque to the broker
    #[serde(default)]
    pub attestation_payload: serde_json::Value,
}

impl ProviderQuote {
    pub fn raw_quote(&self) -> std::result::Result<Vec<u8>, hex::FromHexError> {
        let digits = self.quote.trim();
        hex::decode(digits.strip_prefix("0x").unwrap_or(digits))
    }
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, service: &ServiceInfo) -> Result<ProviderQuote>;
}
