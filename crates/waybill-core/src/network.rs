//! Network boundary
//!
//! Everything the deployment engine needs from a chain goes through the
//! [`Network`] trait: submit a transaction, wait for it to be mined, run a
//! read-only call, and report the chain identifier and signing address.
//! [`AlloyNetwork`] implements it over an alloy HTTP provider.

use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, PendingTransactionConfig, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{ChainId, Receipt, SubmittedTx, TxOverrides};

// =============================================================================
// Trait Definition
// =============================================================================

/// A signing identity bound to one network
#[async_trait]
pub trait Network: Send + Sync {
    /// Address that signs and pays for submitted transactions
    fn sender(&self) -> Address;

    /// Query the chain identifier of the connected network
    async fn chain_id(&self) -> Result<ChainId>;

    /// Sign and broadcast a transaction. `to = None` creates a contract.
    ///
    /// Returns as soon as the node accepts the transaction.
    async fn submit(&self, to: Option<Address>, data: Bytes, overrides: TxOverrides)
        -> Result<SubmittedTx>;

    /// Wait until `tx_hash` has `confirmations` blocks on top of it
    async fn confirm(&self, tx_hash: B256, confirmations: u64) -> Result<Receipt>;

    /// Execute a read-only call against the latest block
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

/// How long and how deep to wait for a transaction to be mined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub confirmations: u64,
    pub timeout: Duration,
}

impl ConfirmationPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(confirmations: u64, timeout: Duration) -> Self {
        Self {
            confirmations,
            timeout,
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_TIMEOUT)
    }
}

/// Wait for confirmation, bounded by the policy's timeout.
///
/// A mined-but-reverted transaction is reported as
/// [`Error::ConfirmationFailure`].
pub async fn confirm_with_policy(
    network: &dyn Network,
    tx_hash: B256,
    policy: ConfirmationPolicy,
) -> Result<Receipt> {
    let receipt = tokio::time::timeout(policy.timeout, network.confirm(tx_hash, policy.confirmations))
        .await
        .map_err(|_| Error::ConfirmationTimeout {
            tx_hash,
            timeout: policy.timeout,
        })??;

    if !receipt.success {
        return Err(Error::ConfirmationFailure {
            tx_hash,
            reason: "transaction reverted".to_string(),
        });
    }

    Ok(receipt)
}

// =============================================================================
// Alloy Implementation
// =============================================================================

/// [`Network`] backed by an alloy HTTP provider and a local private key
pub struct AlloyNetwork {
    provider: DynProvider,
    sender: Address,
}

impl AlloyNetwork {
    /// Connect to `rpc_url`, signing with `private_key` (hex, with or without 0x)
    pub fn connect(rpc_url: &str, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| Error::Rpc(format!("Invalid private key: {}", e)))?;
        let url: Url = rpc_url
            .parse()
            .map_err(|e| Error::Rpc(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

        Ok(Self::with_signer(url, signer))
    }

    pub fn with_signer(url: Url, signer: PrivateKeySigner) -> Self {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        Self { provider, sender }
    }
}

#[async_trait]
impl Network for AlloyNetwork {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<ChainId> {
        self.provider
            .get_chain_id()
            .await
            .map(ChainId)
            .map_err(|e| Error::Rpc(format!("Failed to query chain ID: {}", e)))
    }

    async fn submit(
        &self,
        to: Option<Address>,
        data: Bytes,
        overrides: TxOverrides,
    ) -> Result<SubmittedTx> {
        // The nonce is pinned here so the CREATE address is known before mining
        let nonce = self
            .provider
            .get_transaction_count(self.sender)
            .pending()
            .await
            .map_err(|e| Error::Submission(format!("Failed to fetch nonce: {}", e)))?;

        let mut tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_nonce(nonce);
        tx = match to {
            Some(to) => tx.with_to(to).with_input(data),
            None => tx.with_deploy_code(data),
        };
        if let Some(gas_limit) = overrides.gas_limit {
            tx = tx.with_gas_limit(gas_limit);
        }
        if let Some(gas_price) = overrides.gas_price {
            tx = tx.with_gas_price(gas_price);
        }
        if let Some(value) = overrides.value {
            tx = tx.with_value(value);
        }

        tracing::debug!(
            nonce,
            to = ?to,
            data_len = tx.input.input().map(|d| d.len()).unwrap_or(0),
            gas_limit = ?overrides.gas_limit,
            "Sending transaction"
        );

        let pending = self.provider.send_transaction(tx).await.map_err(|e| {
            tracing::error!(error = %e, "Transaction submission failed");
            Error::Submission(e.to_string())
        })?;

        Ok(SubmittedTx {
            tx_hash: *pending.tx_hash(),
            nonce,
        })
    }

    async fn confirm(&self, tx_hash: B256, confirmations: u64) -> Result<Receipt> {
        let config = PendingTransactionConfig::new(tx_hash)
            .with_required_confirmations(confirmations.max(1));

        let confirmed = self
            .provider
            .watch_pending_transaction(config)
            .await
            .map_err(|e| Error::ConfirmationFailure {
                tx_hash,
                reason: format!("Transaction watch failed: {}", e),
            })?
            .await
            .map_err(|e| Error::ConfirmationFailure {
                tx_hash,
                reason: format!("Failed to confirm transaction: {}", e),
            })?;

        let receipt = self
            .provider
            .get_transaction_receipt(confirmed)
            .await
            .map_err(|e| Error::Rpc(format!("Failed to get receipt: {}", e)))?
            .ok_or_else(|| Error::ConfirmationFailure {
                tx_hash,
                reason: "receipt not found after confirmation".to_string(),
            })?;

        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used,
            success: receipt.status(),
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(data);

        self.provider
            .call(tx)
            .await
            .map_err(|e| Error::Rpc(format!("eth_call failed: {}", e)))
    }
}
