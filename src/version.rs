// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir serving broker

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-metered-settlement-2025-11-04";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-11-04";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "monotonic-nonces",
    "byte-metered-fees",
    "threshold-top-up",
    "attestation-gate",
    "signed-request-headers",
    "previous-output-fee",
    "response-signatures",
];

/// Service types a provider may advertise
pub const SUPPORTED_SERVICE_TYPES: &[&str] = &["chatbot", "embedding"];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir Serving Broker {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Version info as JSON, for `broker-cli --version` style output
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
        "serviceTypes": SUPPORTED_SERVICE_TYPES,
    })
}
