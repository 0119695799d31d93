// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, TimeZone, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BrokerError;
use crate::units::u256_serde;

/// Kind of service a provider sells; selects the fee extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Chatbot,
    Embedding,
}

impl FromStr for ServiceType {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatbot" | "chat" | "chat-completion" => Ok(ServiceType::Chatbot),
            "embedding" | "embeddings" => Ok(ServiceType::Embedding),
            other => Err(BrokerError::UnsupportedServiceType(other.to_string())),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Chatbot => write!(f, "chatbot"),
            ServiceType::Embedding => write!(f, "embedding"),
        }
    }
}

/// A provider's advertised service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub provider: Address,
    pub service_type: ServiceType,
    /// Inference endpoint base URL
    pub url: String,
    pub model: String,
    /// Neurons per billing unit of input
    #[serde(with = "u256_serde")]
    pub input_price: U256,
    /// Neurons per billing unit of output
    #[serde(with = "u256_serde")]
    pub output_price: U256,
    /// Unix seconds of the provider's last update
    pub updated_at: i64,
}

impl ServiceInfo {
    /// `input_price + output_price`, the base every fund threshold scales
    pub fn unit_price(&self) -> U256 {
        self.input_price.saturating_add(self.output_price)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.updated_at, 0).single()
    }
}

/// What callers need to reach a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub endpoint: String,
    pub model: String,
}
