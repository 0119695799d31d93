// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use ethers::types::Address;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::account::ContractLedger;
use crate::broker::InferenceBroker;
use crate::config::BrokerConfig;
use crate::provider::HttpProviderClient;
use crate::settlement::Transport;
use crate::units;

/// Provider and wallet selection shared by broker-backed commands
#[derive(Args, Debug)]
pub struct ProviderArgs {
    /// Provider address
    #[arg(long)]
    pub provider: String,

    /// Base URL the provider publishes its service descriptor under
    #[arg(long)]
    pub provider_url: String,

    /// Client wallet private key (can also be set via BROKER_PRIVATE_KEY env var)
    #[arg(long, env = "BROKER_PRIVATE_KEY")]
    pub private_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct HeadersArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Request content to meter
    #[arg(long)]
    pub content: String,

    /// Expected output fee in neurons
    #[arg(long, default_value = "0")]
    pub output_fee: String,

    /// Route through the provider's vLLM proxy
    #[arg(long)]
    pub proxied: bool,
}

fn connect(args: &ProviderArgs) -> Result<(InferenceBroker, Address)> {
    dotenv::dotenv().ok();

    let config = BrokerConfig::from_env()?;
    let provider = Address::from_str(&args.provider)
        .map_err(|e| anyhow!("Invalid provider address '{}': {}", args.provider, e))?;
    let private_key = args
        .private_key
        .clone()
        .ok_or_else(|| anyhow!("Private key required. Use --private-key or set BROKER_PRIVATE_KEY env var"))?;
    let ledger_address = config
        .ledger_address
        .ok_or_else(|| anyhow!("BROKER_LEDGER_ADDRESS must be set"))?;

    let ledger = ContractLedger::connect(&config.rpc_url, &private_key, config.chain_id, ledger_address)?;
    let http = Arc::new(HttpProviderClient::new(config.request_timeout)?);
    http.register_provider(provider, &args.provider_url)?;

    let broker = InferenceBroker::builder(config)
        .ledger(Arc::new(ledger))
        .http_provider(http)
        .build()?;
    Ok((broker, provider))
}

pub async fn acknowledge(args: ProviderArgs) -> Result<()> {
    let (broker, provider) = connect(&args)?;
    let signer = broker.acknowledge_provider(provider).await?;
    println!("Provider {:?} attested; signer {:?}", provider, signer);
    Ok(())
}

pub async fn print_headers(args: HeadersArgs) -> Result<()> {
    let (broker, provider) = connect(&args.provider)?;
    let output_fee = units::parse_u256(&args.output_fee).map_err(anyhow::Error::msg)?;
    let transport = if args.proxied {
        Transport::Proxied
    } else {
        Transport::Direct
    };

    broker.acknowledge_provider(provider).await?;
    let header = broker
        .get_request_headers(provider, &args.content, output_fee, transport)
        .await?;
    info!("Built header with nonce {}", header.nonce);

    for (name, value) in header.fields() {
        println!("{}: {}", name, value);
    }
    Ok(())
}
