// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Provider network access
//!
//! Service descriptors, attestation quotes and response signatures are all
//! fetched from the provider over HTTP. `ServiceResolver` puts a TTL cache in
//! front of the descriptor lookup; the descriptor is always re-derivable, so
//! the cache is never the source of truth.

pub mod http;
pub mod resolver;
pub mod types;

use async_trait::async_trait;
use ethers::types::Address;

use crate::error::Result;

pub use http::HttpProviderClient;
pub use resolver::ServiceResolver;
pub use types::{ServiceInfo, ServiceMetadata, ServiceType};

/// Source of provider service descriptors
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Fails with `ProviderUnreachable` when the descriptor cannot be fetched
    async fn get_service(&self, provider: Address) -> Result<ServiceInfo>;
}

/// Source of provider-side signatures over finished responses
#[async_trait]
pub trait ResponseSignatureSource: Send + Sync {
    /// Returns the response text the provider signed and its hex signature
    async fn fetch_response_signature(&self, service: &ServiceInfo, chat_id: &str) -> Result<SignedResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SignedResponse {
    pub text: String,
    pub signature: String,
}
