//! Deployment execution: submit, wait for confirmation, hand back a live contract.

use alloy::primitives::{Address, B256};
use serde_json::Value;
use tracing::instrument;

use crate::error::Result;
use crate::factory::ContractFactory;
use crate::handle::ContractHandle;
use crate::network::ConfirmationPolicy;
use crate::types::{Receipt, TxOverrides};

/// A confirmed deployment
#[derive(Debug, Clone)]
pub struct Deployment {
    pub name: String,
    pub handle: ContractHandle,
    pub tx_hash: B256,
    pub receipt: Receipt,
}

impl Deployment {
    pub fn address(&self) -> Address {
        self.handle.address()
    }
}

/// Runs creation transactions to completion under an injected confirmation policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentExecutor {
    policy: ConfirmationPolicy,
}

impl DeploymentExecutor {
    pub fn new(policy: ConfirmationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConfirmationPolicy {
        self.policy
    }

    /// Deploy `factory` with `args` and wait until the transaction is mined.
    ///
    /// All-or-nothing: any submission or confirmation failure is returned as
    /// an error and no handle is produced.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn deploy_and_confirm(
        &self,
        name: &str,
        factory: &ContractFactory,
        args: &[Value],
        overrides: TxOverrides,
    ) -> Result<Deployment> {
        let pending = factory.deploy(args, overrides).await.inspect_err(|e| {
            tracing::error!(error = %e, "Deployment submission failed");
        })?;
        let tx_hash = pending.tx_hash;

        tracing::info!(
            address = %pending.address,
            tx_hash = %tx_hash,
            confirmations = self.policy.confirmations,
            "Deployment submitted, waiting for confirmation"
        );

        let (handle, receipt) = pending.confirm(self.policy).await.inspect_err(|e| {
            tracing::error!(tx_hash = %tx_hash, error = %e, "Deployment not confirmed");
        })?;

        tracing::info!(
            address = %handle.address(),
            tx_hash = %tx_hash,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Deployed"
        );

        Ok(Deployment {
            name: name.to_string(),
            handle,
            tx_hash,
            receipt,
        })
    }
}
