// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Settlement Request Signing
//!
//! Signs the fee claim carried by each request header so the provider can
//! redeem it against the client's on-chain account.
//!
//! ## Signature Formula
//!
//! ```text
//! 1. digest = keccak256(abi.encodePacked(
//!        uint256 nonce, uint256 inputFee, uint256 outputFee,
//!        uint256 previousOutputFee, address provider))
//! 2. signature = ecdsa_sign(digest)  // 65 bytes: r(32) + s(32) + v(1), v in {27, 28}
//! ```

use ethers::types::{Address, U256};
use tiny_keccak::{Hasher, Keccak};
use tracing::debug;

use super::keys::SigningKeyMaterial;
use super::signature::recover_signer;
use crate::error::{BrokerError, Result};

/// The fields a settlement signature covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestClaim {
    pub nonce: u64,
    pub input_fee: U256,
    pub output_fee: U256,
    pub previous_output_fee: U256,
    pub provider: Address,
}

impl RequestClaim {
    /// Solidity `abi.encodePacked` equivalent: four uint256 words then the
    /// 20-byte provider address
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 * 4 + 20);
        for word in [
            U256::from(self.nonce),
            self.input_fee,
            self.output_fee,
            self.previous_output_fee,
        ] {
            let mut bytes = [0u8; 32];
            word.to_big_endian(&mut bytes);
            data.extend_from_slice(&bytes);
        }
        data.extend_from_slice(self.provider.as_bytes());
        data
    }

    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Keccak::v256();
        let mut hash = [0u8; 32];
        hasher.update(&self.encode());
        hasher.finalize(&mut hash);
        hash
    }
}

pub fn sign_request(key: &SigningKeyMaterial, claim: &RequestClaim) -> Result<[u8; 65]> {
    let digest = claim.digest();
    debug!(
        "Signing request claim nonce={} digest=0x{}",
        claim.nonce,
        hex::encode(digest)
    );

    let (signature, recovery_id) = key
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|e| BrokerError::Signing(e.to_string()))?;

    let mut sig_bytes = [0u8; 65];
    sig_bytes[..64].copy_from_slice(&signature.to_bytes());
    sig_bytes[64] = recovery_id.to_byte() + 27;
    Ok(sig_bytes)
}

/// Check that `signature` over `claim` was produced by `signer`
pub fn verify_request_signature(signature: &[u8], claim: &RequestClaim, signer: Address) -> Result<bool> {
    let recovered = recover_signer(signature, &claim.digest())?;
    Ok(recovered == signer)
}
