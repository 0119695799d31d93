// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{info, warn};

use super::header::HeaderSigner;
use crate::crypto::signature::{decode_signature_hex, verify_personal_signature};
use crate::error::Result;
use crate::extractor::extractor_for;
use crate::provider::ResponseSignatureSource;

/// Outcome of settling a finished response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSettlement {
    /// Output fee carried as `Previous-Output-Fee` on the next header
    pub output_fee: U256,
    /// Provider signature check; `None` when no chat id was given
    pub signature_valid: Option<bool>,
}

pub struct ResponseProcessor {
    signer: Arc<HeaderSigner>,
    signatures: Arc<dyn ResponseSignatureSource>,
}

impl ResponseProcessor {
    pub fn new(signer: Arc<HeaderSigner>, signatures: Arc<dyn ResponseSignatureSource>) -> Self {
        Self { signer, signatures }
    }

    /// Price the generated `content`, queue its fee for the next header and,
    /// given a `chat_id`, check the provider's signature over the response.
    pub async fn process_response(
        &self,
        provider: Address,
        content: &str,
        chat_id: Option<&str>,
    ) -> Result<ResponseSettlement> {
        let signer_address = self.signer.gate.ensure_trusted(provider)?;
        let service = self.signer.resolver.resolve(provider).await?;

        let output_fee = extractor_for(service.clone()).output_fee(content)?;
        self.signer.record_output_fee(provider, output_fee)?;
        self.signer.guard.settle_output_fee(provider, output_fee)?;

        let signature_valid = match chat_id {
            None => None,
            Some(chat_id) => {
                let signed = self
                    .signatures
                    .fetch_response_signature(&service, chat_id)
                    .await?;
                let signature = decode_signature_hex(&signed.signature)?;
                let valid =
                    verify_personal_signature(signed.text.as_bytes(), &signature, signer_address)?;
                if !valid {
                    warn!(
                        "Response {} from provider {:?} is not signed by its attested signer",
                        chat_id, provider
                    );
                }
                Some(valid)
            }
        };

        info!(
            "Processed response from provider {:?}: output fee {}",
            provider, output_fee
        );
        Ok(ResponseSettlement {
            output_fee,
            signature_valid,
        })
    }
}
