// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Settlement Cryptography
//!
//! - **Keys**: per-provider secp256k1 settlement keys, packed as two 128-bit integers
//! - **Commitment**: nonce/user/provider binding carried by every request header
//! - **Request signing**: ECDSA over the fee claim, recoverable to the key's address
//! - **Signature**: address recovery and EIP-191 verification of provider responses

pub mod commitment;
pub mod keys;
pub mod request_signer;
pub mod signature;

pub use commitment::{CommitmentHasher, KeccakCommitment};
pub use keys::SigningKeyMaterial;
pub use request_signer::{sign_request, verify_request_signature, RequestClaim};
pub use signature::{recover_signer, verify_personal_signature};
