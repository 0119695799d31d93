// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
/// Display-unit / neuron conversions
///
/// Fees settle on-chain in integer minor units ("neurons"), where one display
/// unit is 10^18 neurons. Conversions here are exact decimal scaling; floating
/// point never enters the fee path.
///
/// # Examples
/// - "1" → 1_000_000_000_000_000_000 neurons
/// - "0.000000000000000001" → 1 neuron
use ethers::types::U256;
use ethers::utils::{format_units, parse_units};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{BrokerError, Result};

/// Decimals of the display unit
pub const DECIMALS: u32 = 18;

/// Neurons per display unit (10^18)
pub fn neuron_per_unit() -> U256 {
    U256::exp10(DECIMALS as usize)
}

/// Convert a display-unit decimal string into neurons
pub fn to_neuron(display: &str) -> Result<U256> {
    let trimmed = display.trim();
    let invalid = |reason: &str| BrokerError::InvalidAmount {
        amount: display.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty amount"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("negative amounts are not allowed"));
    }
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > DECIMALS as usize {
            return Err(invalid("more than 18 fractional digits"));
        }
    }

    let parsed = parse_units(trimmed, DECIMALS).map_err(|e| invalid(&e.to_string()))?;
    Ok(parsed.into())
}

/// Convert neurons into a display-unit decimal string without trailing zeros
pub fn from_neuron(neurons: U256) -> Result<String> {
    let formatted = format_units(neurons, DECIMALS).map_err(|e| BrokerError::InvalidAmount {
        amount: neurons.to_string(),
        reason: e.to_string(),
    })?;

    if !formatted.contains('.') {
        return Ok(formatted);
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    Ok(trimmed.to_string())
}

/// Parse a U256 from a decimal or 0x-prefixed hex string
pub fn parse_u256(raw: &str) -> std::result::Result<U256, String> {
    let raw = raw.trim();
    if let Some(hex_digits) = raw.strip_prefix("0x") {
        U256::from_str_radix(hex_digits, 16).map_err(|e| e.to_string())
    } else {
        U256::from_dec_str(raw).map_err(|e| e.to_string())
    }
}

/// Serde adapter for prices published by providers.
///
/// Accepts decimal strings, hex strings and JSON integers; always writes a
/// decimal string so values above 2^53 survive JSON round trips.
pub mod u256_serde {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<U256, D::Error> {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Number(n) => Ok(U256::from(n)),
            RawAmount::Text(s) => parse_u256(&s).map_err(serde::de::Error::custom),
        }
    }
}
