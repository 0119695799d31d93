// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::Extractor;
use crate::provider::ServiceInfo;

/// Chat completions bill the UTF-8 byte length of prompt and completion.
/// Byte length, not tokens, is the billing unit.
#[derive(Debug, Clone)]
pub struct ChatbotExtractor {
    service: ServiceInfo,
}

impl ChatbotExtractor {
    pub fn new(service: ServiceInfo) -> Self {
        Self { service }
    }
}

impl Extractor for ChatbotExtractor {
    fn service_info(&self) -> &ServiceInfo {
        &self.service
    }

    fn input_count(&self, content: &str) -> u64 {
        content.len() as u64
    }

    fn output_count(&self, content: &str) -> u64 {
        content.len() as u64
    }
}
