// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Settlement signatures must be byte-compatible with what the contract
//! recomputes, so these tests check against ethers' own ABI packing and
//! signature recovery.

use ethers::abi::{encode_packed, Token};
use ethers::signers::LocalWallet;
use ethers::types::{Address, Signature, H256, U256};
use ethers::utils::keccak256;
use fabstir_serving_broker::crypto::{sign_request, verify_request_signature, RequestClaim};
use fabstir_serving_broker::SigningKeyMaterial;

fn claim() -> RequestClaim {
    RequestClaim {
        nonce: 17_000_000_000_000_040,
        input_fee: U256::from(4),
        output_fee: U256::exp10(18),
        previous_output_fee: U256::from(15),
        provider: Address::repeat_byte(0xa1),
    }
}

#[test]
fn test_encoding_matches_abi_encode_packed() {
    let claim = claim();
    let expected = encode_packed(&[
        Token::Uint(U256::from(claim.nonce)),
        Token::Uint(claim.input_fee),
        Token::Uint(claim.output_fee),
        Token::Uint(claim.previous_output_fee),
        Token::Address(claim.provider),
    ])
    .unwrap();

    assert_eq!(claim.encode(), expected);
    assert_eq!(claim.digest(), keccak256(&expected));
}

#[test]
fn test_signature_recovers_with_ethers() {
    let key = SigningKeyMaterial::generate();
    let claim = claim();
    let signature = sign_request(&key, &claim).unwrap();

    assert!(signature[64] == 27 || signature[64] == 28);

    let parsed = Signature::try_from(&signature[..]).unwrap();
    let recovered = parsed.recover(H256::from(claim.digest())).unwrap();
    assert_eq!(recovered, key.address());
}

#[test]
fn test_key_address_matches_wallet() {
    let key = SigningKeyMaterial::generate();
    let [high, low] = key.packed();

    let mut secret = [0u8; 32];
    let mut word = [0u8; 32];
    high.to_big_endian(&mut word);
    secret[..16].copy_from_slice(&word[16..]);
    low.to_big_endian(&mut word);
    secret[16..].copy_from_slice(&word[16..]);

    let wallet = LocalWallet::from_bytes(&secret).unwrap();
    assert_eq!(ethers::signers::Signer::address(&wallet), key.address());
}

#[test]
fn test_changed_previous_output_fee_breaks_signature() {
    let key = SigningKeyMaterial::generate();
    let original = claim();
    let signature = sign_request(&key, &original).unwrap();

    let tampered = RequestClaim {
        previous_output_fee: U256::zero(),
        ..original
    };
    assert!(verify_request_signature(&signature, &original, key.address()).unwrap());
    assert!(!verify_request_signature(&signature, &tampered, key.address()).unwrap());
}

#[test]
fn test_truncated_signature_is_an_error() {
    let key = SigningKeyMaterial::generate();
    let signature = sign_request(&key, &claim()).unwrap();
    assert!(verify_request_signature(&signature[..64], &claim(), key.address()).is_err());
}
