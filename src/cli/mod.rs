// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::cache::KvCache;
use crate::config::BrokerConfig;
use crate::settlement::NonceGenerator;
use crate::units;
use crate::version;

/// Fabstir serving broker CLI
#[derive(Parser, Debug)]
#[command(name = "broker-cli")]
#[command(version)]
#[command(about = "Metering and settlement tools for Fabstir inference providers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a time-derived nonce without reserving it
    PeekNonce,

    /// Convert a display amount (e.g. 1.5) into neurons
    ToNeuron {
        amount: String,
    },

    /// Convert neurons into a display amount
    FromNeuron {
        amount: String,
    },

    /// Attest a provider and print a signed request header
    Headers(session::HeadersArgs),

    /// Fetch and verify a provider's attestation quote
    Acknowledge(session::ProviderArgs),

    /// Print build version, features and supported service types as JSON
    VersionInfo,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::PeekNonce => {
            let nonces = NonceGenerator::new(Arc::new(KvCache::new()), &BrokerConfig::default());
            println!("{}", nonces.peek_nonce());
            Ok(())
        }
        Commands::ToNeuron { amount } => {
            println!("{}", units::to_neuron(&amount)?);
            Ok(())
        }
        Commands::FromNeuron { amount } => {
            let neurons = units::parse_u256(&amount).map_err(anyhow::Error::msg)?;
            println!("{}", units::from_neuron(neurons)?);
            Ok(())
        }
        Commands::Headers(args) => session::print_headers(args).await,
        Commands::Acknowledge(args) => session::acknowledge(args).await,
        Commands::VersionInfo => {
            println!("{}", serde_json::to_string_pretty(&version::get_version_info())?);
            Ok(())
        }
    }
}
