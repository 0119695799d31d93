// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Settlement Signing Keys
//!
//! The client holds one settlement key per provider. The secp256k1 secret
//! scalar is packed into two 128-bit integers (high half first), which is the
//! form persisted by the metadata store and the form the ledger expects when
//! the key's public half is registered.
//!
//! ## Security Considerations
//!
//! - `Debug` output is redacted; the key is never logged
//! - The key is never transmitted, only its public half and signatures
//! - `k256::ecdsa::SigningKey` zeroizes its scalar on drop

use ethers::types::{Address, U256};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use std::fmt;

use super::signature::address_from_verifying_key;
use crate::error::{BrokerError, Result};

#[derive(Clone)]
pub struct SigningKeyMaterial {
    key: SigningKey,
}

impl SigningKeyMaterial {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        Self { key }
    }

    /// Rebuild from the packed two-integer form
    pub fn from_packed(packed: [U256; 2]) -> Result<Self> {
        let half_limit = U256::one() << 128;
        if packed.iter().any(|half| *half >= half_limit) {
            return Err(BrokerError::Signing(
                "packed key half exceeds 128 bits".to_string(),
            ));
        }

        let mut secret = [0u8; 32];
        let mut word = [0u8; 32];
        packed[0].to_big_endian(&mut word);
        secret[..16].copy_from_slice(&word[16..]);
        packed[1].to_big_endian(&mut word);
        secret[16..].copy_from_slice(&word[16..]);

        let key = SigningKey::from_bytes((&secret).into())?;
        Ok(Self { key })
    }

    /// The secret scalar as `[high, low]` 128-bit halves
    pub fn packed(&self) -> [U256; 2] {
        let secret = self.key.to_bytes();
        [
            U256::from_big_endian(&secret[..16]),
            U256::from_big_endian(&secret[16..]),
        ]
    }

    /// Uncompressed public key coordinates `[x, y]`
    pub fn public_key(&self) -> [U256; 2] {
        let point = self.key.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        [
            U256::from_big_endian(&bytes[1..33]),
            U256::from_big_endian(&bytes[33..65]),
        ]
    }

    pub fn address(&self) -> Address {
        address_from_verifying_key(self.key.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// Persisted form: a JSON array of two decimal strings
    pub fn to_json(&self) -> String {
        let [high, low] = self.packed();
        serde_json::json!([high.to_string(), low.to_string()]).to_string()
    }

    /// Parse the persisted form. Anything malformed is `CacheCorruption`
    /// under `storage_key`, so callers know to regenerate and re-store.
    pub fn from_json(storage_key: &str, raw: &str) -> Result<Self> {
        let halves: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| BrokerError::corruption(storage_key, format!("not a JSON string array: {}", e)))?;
        if halves.len() != 2 {
            return Err(BrokerError::corruption(
                storage_key,
                format!("expected 2 key halves, found {}", halves.len()),
            ));
        }

        let mut packed = [U256::zero(); 2];
        for (slot, half) in packed.iter_mut().zip(&halves) {
            *slot = U256::from_dec_str(half)
                .map_err(|e| BrokerError::corruption(storage_key, format!("bad key half: {}", e)))?;
        }

        Self::from_packed(packed).map_err(|e| BrokerError::corruption(storage_key, e))
    }
}

impl PartialEq for SigningKeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.key.to_bytes() == other.key.to_bytes()
    }
}

impl Eq for SigningKeyMaterial {}

impl fmt::Debug for SigningKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyMaterial")
            .field("address", &self.address())
            .field("secret", &"<redacted>")
            .finish()
    }
}
