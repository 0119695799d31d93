// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Metering and settlement
//!
//! Nonce issuance, signed request headers and post-response fee tracking.

pub mod header;
pub mod nonce;
pub mod response;

pub use header::{HeaderSigner, RequestHeader, Transport};
pub use nonce::{Clock, FixedClock, NonceGenerator, SystemClock};
pub use response::{ResponseProcessor, ResponseSettlement};
