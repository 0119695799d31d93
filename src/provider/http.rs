// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for provider-published JSON endpoints

use async_trait::async_trait;
use ethers::types::{Address, U256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use super::{ResponseSignatureSource, ServiceDirectory, ServiceInfo, ServiceType, SignedResponse};
use crate::attestation::{ProviderQuote, QuoteSource};
use crate::error::{BrokerError, Result};
use crate::units::u256_serde;

/// Service descriptor as served at `{base}/v1/service`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDescriptor {
    service_type: String,
    url: String,
    model: String,
    #[serde(with = "u256_serde")]
    input_price: U256,
    #[serde(with = "u256_serde")]
    output_price: U256,
    #[serde(default)]
    updated_at: i64,
}

impl ServiceDescriptor {
    fn into_service_info(self, provider: Address) -> Result<ServiceInfo> {
        let service_type: ServiceType = self.service_type.parse()?;
        Ok(ServiceInfo {
            provider,
            service_type,
            url: self.url.trim_end_matches('/').to_string(),
            model: self.model,
            input_price: self.input_price,
            output_price: self.output_price,
            updated_at: self.updated_at,
        })
    }
}

pub struct HttpProviderClient {
    client: Client,
    endpoints: RwLock<HashMap<Address, String>>,
}

impl HttpProviderClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::InvalidConfiguration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints: RwLock::new(HashMap::new()),
        })
    }

    /// Record where a provider publishes its service descriptor
    pub fn register_provider(&self, provider: Address, base_url: &str) -> Result<()> {
        let parsed = url::Url::parse(base_url).map_err(|e| {
            BrokerError::InvalidConfiguration(format!("Invalid provider URL '{}': {}", base_url, e))
        })?;
        let base = parsed.as_str().trim_end_matches('/').to_string();
        info!("Registered provider {:?} at {}", provider, base);

        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider, base);
        Ok(())
    }

    fn base_url(&self, provider: Address) -> Result<String> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
            .ok_or_else(|| BrokerError::unreachable(provider, "no endpoint registered"))
    }

    async fn get_json<T: DeserializeOwned>(&self, provider: Address, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BrokerError::unreachable(provider, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::unreachable(
                provider,
                format!("{} returned {}", url, status),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BrokerError::unreachable(provider, format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl ServiceDirectory for HttpProviderClient {
    async fn get_service(&self, provider: Address) -> Result<ServiceInfo> {
        let url = format!("{}/v1/service", self.base_url(provider)?);
        let descriptor: ServiceDescriptor = self.get_json(provider, &url).await?;
        descriptor.into_service_info(provider)
    }
}

#[async_trait]
impl QuoteSource for HttpProviderClient {
    async fn fetch_quote(&self, service: &ServiceInfo) -> Result<ProviderQuote> {
        let url = format!("{}/v1/quote", service.url);
        self.get_json(service.provider, &url).await
    }
}

#[async_trait]
impl ResponseSignatureSource for HttpProviderClient {
    async fn fetch_response_signature(&self, service: &ServiceInfo, chat_id: &str) -> Result<SignedResponse> {
        let url = format!("{}/v1/signature/{}", service.url, chat_id);
        self.get_json(service.provider, &url).await
    }
}
