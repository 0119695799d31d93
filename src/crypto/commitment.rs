// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request Commitments
//!
//! Each request header carries a commitment binding the nonce to the
//! user/provider pair. The settlement contract recomputes it, so the hash
//! function and its parameters are dictated by the deployed contract.
//!
//! ## Formula (`KeccakCommitment`)
//!
//! ```text
//! commitment = keccak256(abi.encodePacked(uint256 nonce, address user, address provider))
//! ```

use ethers::types::{Address, H256, U256};
use tiny_keccak::{Hasher, Keccak};

pub trait CommitmentHasher: Send + Sync {
    fn commit(&self, nonce: u64, user: Address, provider: Address) -> H256;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeccakCommitment;

impl CommitmentHasher for KeccakCommitment {
    fn commit(&self, nonce: u64, user: Address, provider: Address) -> H256 {
        let mut data = Vec::with_capacity(32 + 20 + 20);

        let mut nonce_word = [0u8; 32];
        U256::from(nonce).to_big_endian(&mut nonce_word);
        data.extend_from_slice(&nonce_word);
        data.extend_from_slice(user.as_bytes());
        data.extend_from_slice(provider.as_bytes());

        let mut hasher = Keccak::v256();
        let mut hash = [0u8; 32];
        hasher.update(&data);
        hasher.finalize(&mut hash);
        H256::from(hash)
    }
}
