// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::Extractor;
use crate::provider::ServiceInfo;

/// Embedding requests bill the input's UTF-8 byte length; the returned
/// vectors are not billed.
#[derive(Debug, Clone)]
pub struct EmbeddingExtractor {
    service: ServiceInfo,
}

impl EmbeddingExtractor {
    pub fn new(service: ServiceInfo) -> Self {
        Self { service }
    }
}

impl Extractor for EmbeddingExtractor {
    fn service_info(&self) -> &ServiceInfo {
        &self.service
    }

    fn input_count(&self, content: &str) -> u64 {
        content.len() as u64
    }

    fn output_count(&self, _content: &str) -> u64 {
        0
    }
}
