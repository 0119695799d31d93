// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::{KeyValueStorage, MemoryStorage, StorageBackend};
use crate::crypto::SigningKeyMaterial;
use crate::error::Result;

const SIGNING_KEY_SUFFIX: &str = "settleSignerPrivateKey";

/// Per-provider settlement key storage
///
/// Every key is namespaced by a fixed prefix. When the backend rejects a
/// write (full disk, read-only directory) the value is kept in an in-memory
/// substitute instead, so the broker keeps working for the life of the
/// process; reads consult the substitute first.
#[derive(Clone)]
pub struct MetadataStore {
    backend: Arc<dyn KeyValueStorage>,
    fallback: MemoryStorage,
    prefix: String,
}

impl MetadataStore {
    pub fn new(backend: Arc<dyn KeyValueStorage>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            fallback: MemoryStorage::new(),
            prefix: prefix.into(),
        }
    }

    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), prefix)
    }

    pub fn with_backend(backend: &StorageBackend, prefix: impl Into<String>) -> Result<Self> {
        info!("Opening metadata store ({:?})", backend);
        Ok(Self::new(backend.build()?, prefix))
    }

    fn signing_key_name(&self, provider: Address) -> String {
        format!("{}{:?}_{}", self.prefix, provider, SIGNING_KEY_SUFFIX)
    }

    pub async fn store_signing_key(&self, provider: Address, material: &SigningKeyMaterial) -> Result<()> {
        let key = self.signing_key_name(provider);
        let value = material.to_json();

        match self.backend.set_item(&key, &value).await {
            Ok(()) => {
                // A stale substitute would shadow the value just persisted
                self.fallback.remove_item(&key).await?;
                debug!("Stored settlement key for provider {:?}", provider);
            }
            Err(e) => {
                warn!(
                    "Persisting settlement key for {:?} failed ({}), keeping it in memory",
                    provider, e
                );
                self.fallback.set_item(&key, &value).await?;
            }
        }
        Ok(())
    }

    /// Read the provider's settlement key.
    ///
    /// A malformed record is `CacheCorruption`; the caller is expected to
    /// generate a new key and store it.
    pub async fn get_signing_key(&self, provider: Address) -> Result<Option<SigningKeyMaterial>> {
        let key = self.signing_key_name(provider);

        let raw = match self.fallback.get_item(&key).await? {
            Some(raw) => Some(raw),
            None => self.backend.get_item(&key).await?,
        };

        raw.map(|raw| SigningKeyMaterial::from_json(&key, &raw))
            .transpose()
    }

    pub async fn remove_signing_key(&self, provider: Address) -> Result<()> {
        let key = self.signing_key_name(provider);
        self.fallback.remove_item(&key).await?;
        self.backend.remove_item(&key).await
    }
}
