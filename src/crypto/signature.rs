// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Signature Recovery
//!
//! Recovers Ethereum addresses from 65-byte `r || s || v` signatures. Used to
//! check settlement signatures locally and to verify that a provider's
//! response signature came from the signer address named in its attested
//! quote.

use ethers::types::Address;
use ethers::utils::hash_message;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use tiny_keccak::{Hasher, Keccak};

use crate::error::{BrokerError, Result};

/// Derive the Ethereum address of a public key: the last 20 bytes of the
/// Keccak-256 hash of the uncompressed point without its 0x04 prefix.
pub fn address_from_verifying_key(verifying_key: &VerifyingKey) -> Address {
    let public_key = verifying_key.to_encoded_point(false);

    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(&public_key.as_bytes()[1..]);
    hasher.finalize(&mut hash);

    Address::from_slice(&hash[12..])
}

/// Recover the signer address from a signature over a 32-byte prehash
///
/// # Errors
///
/// - Signature is not exactly 65 bytes
/// - Message hash is not exactly 32 bytes
/// - Recovery ID is outside 0-3 (after normalising 27/28)
/// - Recovery fails
pub fn recover_signer(signature: &[u8], message_hash: &[u8]) -> Result<Address> {
    if signature.len() != 65 {
        return Err(BrokerError::Signing(format!(
            "Invalid signature size: expected 65 bytes, got {}",
            signature.len()
        )));
    }
    if message_hash.len() != 32 {
        return Err(BrokerError::Signing(format!(
            "Invalid message hash size: expected 32 bytes, got {}",
            message_hash.len()
        )));
    }

    let mut recovery_id = signature[64];
    // Ethereum-style v (27/28)
    if recovery_id >= 27 {
        recovery_id -= 27;
    }
    let recovery_id = RecoveryId::from_byte(recovery_id).ok_or_else(|| {
        BrokerError::Signing(format!("Invalid recovery ID: {}", signature[64]))
    })?;

    let signature = Signature::try_from(&signature[..64])?;
    let verifying_key = VerifyingKey::recover_from_prehash(message_hash, &signature, recovery_id)?;

    Ok(address_from_verifying_key(&verifying_key))
}

/// Check an EIP-191 `personal_sign` signature over `message`
pub fn verify_personal_signature(message: &[u8], signature: &[u8], expected: Address) -> Result<bool> {
    let digest = hash_message(message);
    let recovered = recover_signer(signature, digest.as_bytes())?;
    Ok(recovered == expected)
}

/// Decode a hex signature with or without the 0x prefix
pub fn decode_signature_hex(raw: &str) -> Result<Vec<u8>> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| BrokerError::Signing(format!("signature is not hex: {}", e)))
}
