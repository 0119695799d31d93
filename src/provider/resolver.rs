// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ServiceDirectory, ServiceInfo};
use crate::cache::KvCache;
use crate::error::Result;

/// TTL-bounded cache in front of a `ServiceDirectory`
pub struct ServiceResolver {
    directory: Arc<dyn ServiceDirectory>,
    cache: Arc<KvCache>,
    ttl: Duration,
}

impl ServiceResolver {
    pub fn new(directory: Arc<dyn ServiceDirectory>, cache: Arc<KvCache>, ttl: Duration) -> Self {
        Self {
            directory,
            cache,
            ttl,
        }
    }

    fn cache_key(provider: Address) -> String {
        format!("service_{:?}", provider)
    }

    /// Cached descriptor, refetched on miss or expiry.
    ///
    /// A cached descriptor that fails to decode is `CacheCorruption`.
    pub async fn resolve(&self, provider: Address) -> Result<ServiceInfo> {
        let key = Self::cache_key(provider);
        if let Some(info) = self.cache.get_object::<ServiceInfo>(&key)? {
            debug!("Service info cache hit for {:?}", provider);
            return Ok(info);
        }

        info!("Fetching service info for provider {:?}", provider);
        let info = self.directory.get_service(provider).await?;
        self.cache.set_object(&key, &info, self.ttl)?;
        Ok(info)
    }

    /// Drop the cached descriptor so the next `resolve` refetches
    pub fn invalidate(&self, provider: Address) {
        if self.cache.remove(&Self::cache_key(provider)).is_some() {
            debug!("Invalidated service info for {:?}", provider);
        }
    }
}
