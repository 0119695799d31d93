// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Provider attestation
//!
//! A provider's settlement signer is only trusted after its hardware quote has
//! passed the on-chain attestation verifier. Until then every header request
//! for that provider fails with `UntrustedProvider`.

pub mod gate;
pub mod quote;
pub mod verifier;

pub use gate::AttestationGate;
pub use quote::{ProviderQuote, QuoteSource};
pub use verifier::{AttestationVerifier, OnChainAttestationVerifier};
