// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod account;
pub mod attestation;
pub mod broker;
pub mod cache;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod provider;
pub mod settlement;
pub mod units;
pub mod version;

pub use account::{AccountGuard, ContractLedger, LedgerClient, TopUpOutcome, TransferReceipt};
pub use attestation::{AttestationGate, AttestationVerifier, ProviderQuote, QuoteSource};
pub use broker::{BrokerBuilder, InferenceBroker};
pub use cache::KvCache;
pub use config::{AccountThresholds, BrokerConfig};
pub use crypto::{CommitmentHasher, KeccakCommitment, SigningKeyMaterial};
pub use error::{BrokerError, Result};
pub use metadata::{KeyValueStorage, MetadataStore, StorageBackend};
pub use provider::{HttpProviderClient, ServiceDirectory, ServiceInfo, ServiceMetadata, ServiceType};
pub use settlement::{RequestHeader, ResponseSettlement, Transport};
