// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::error::{BrokerError, Result};

abigen!(
    LedgerContract,
    r#"[
        {
            "inputs": [
                {"internalType": "address", "name": "user", "type": "address"},
                {"internalType": "address", "name": "provider", "type": "address"}
            ],
            "name": "getAccount",
            "outputs": [
                {"internalType": "uint256", "name": "balance", "type": "uint256"},
                {"internalType": "uint256", "name": "pendingRefund", "type": "uint256"}
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "address", "name": "provider", "type": "address"},
                {"internalType": "string", "name": "serviceType", "type": "string"},
                {"internalType": "uint256", "name": "amount", "type": "uint256"}
            ],
            "name": "transferFund",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]"#
);

type LedgerSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Service label passed to `transferFund` when none is configured
pub const DEFAULT_LEDGER_SERVICE: &str = "inference";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: H256,
    pub amount: U256,
    pub block_number: Option<u64>,
}

/// The client's prepaid account with each provider
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn user_address(&self) -> Address;

    /// Spendable balance (neurons) held for `provider`
    async fn get_account_balance(&self, provider: Address) -> Result<U256>;

    /// Move `amount` neurons from the ledger into the provider sub-account
    async fn transfer_funds(&self, provider: Address, amount: U256) -> Result<TransferReceipt>;
}

pub struct ContractLedger {
    contract: LedgerContract<LedgerSigner>,
    user: Address,
    service_label: String,
}

impl ContractLedger {
    pub fn connect(rpc_url: &str, private_key: &str, chain_id: u64, address: Address) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|e| {
            BrokerError::InvalidConfiguration(format!("Invalid RPC URL '{}': {}", rpc_url, e))
        })?;
        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| BrokerError::InvalidConfiguration(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain_id);
        let user = wallet.address();

        info!(
            "Ledger {:?} on chain {} for user {:?}",
            address, chain_id, user
        );

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        Ok(Self {
            contract: LedgerContract::new(address, client),
            user,
            service_label: DEFAULT_LEDGER_SERVICE.to_string(),
        })
    }

    pub fn with_service_label(mut self, label: impl Into<String>) -> Self {
        self.service_label = label.into();
        self
    }
}

#[async_trait]
impl LedgerClient for ContractLedger {
    fn user_address(&self) -> Address {
        self.user
    }

    async fn get_account_balance(&self, provider: Address) -> Result<U256> {
        let (balance, pending_refund) = self.contract.get_account(self.user, provider).call().await?;
        Ok(balance.saturating_sub(pending_refund))
    }

    async fn transfer_funds(&self, provider: Address, amount: U256) -> Result<TransferReceipt> {
        let call = self
            .contract
            .transfer_fund(provider, self.service_label.clone(), amount);
        let pending = call.send().await?;
        let tx_hash = *pending;

        let receipt = pending
            .await?
            .ok_or_else(|| BrokerError::Ledger(format!("transfer {:?} dropped", tx_hash)))?;

        if receipt.status == Some(U64::zero()) {
            return Err(BrokerError::Ledger(format!("transfer {:?} reverted", tx_hash)));
        }

        Ok(TransferReceipt {
            tx_hash,
            amount,
            block_number: receipt.block_number.map(|n| n.as_u64()),
        })
    }
}
