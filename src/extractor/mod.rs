// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Content-to-fee extraction
//!
//! One extractor per service type turns request/response content into
//! billable units. Fees are `count * price` in neurons with checked
//! arbitrary-precision arithmetic.

pub mod chatbot;
pub mod embedding;

use ethers::types::U256;

use crate::error::{BrokerError, Result};
use crate::provider::{ServiceInfo, ServiceType};

pub use chatbot::ChatbotExtractor;
pub use embedding::EmbeddingExtractor;

pub trait Extractor: Send + Sync {
    fn service_info(&self) -> &ServiceInfo;

    /// Billable units in the request content; `0` for empty content
    fn input_count(&self, content: &str) -> u64;

    /// Billable units in the generated content; `0` for empty content
    fn output_count(&self, content: &str) -> u64;

    fn input_fee(&self, content: &str) -> Result<U256> {
        compute_fee(self.input_count(content), self.service_info().input_price)
    }

    fn output_fee(&self, content: &str) -> Result<U256> {
        compute_fee(self.output_count(content), self.service_info().output_price)
    }
}

/// `count * price`, failing instead of wrapping on overflow
pub fn compute_fee(count: u64, price: U256) -> Result<U256> {
    U256::from(count)
        .checked_mul(price)
        .ok_or(BrokerError::FeeOverflow { count, price })
}

/// Pick the extractor for a service's type
pub fn extractor_for(service: ServiceInfo) -> Box<dyn Extractor> {
    match service.service_type {
        ServiceType::Chatbot => Box::new(ChatbotExtractor::new(service)),
        ServiceType::Embedding => Box::new(EmbeddingExtractor::new(service)),
    }
}
