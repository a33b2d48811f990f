use std::sync::Arc;

use alloy::primitives::{Address, B256};
use serde_json::Value;

use crate::abi::{self, Abi};
use crate::error::{Error, Result};
use crate::network::{confirm_with_policy, ConfirmationPolicy, Network};
use crate::types::{Receipt, TxOverrides};

/// A live contract: address and ABI bound to a signing identity
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    abi: Abi,
    network: Arc<dyn Network>,
    deploy_tx: Option<B256>,
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("deploy_tx", &self.deploy_tx)
            .finish()
    }
}

impl ContractHandle {
    pub(crate) fn new(
        address: Address,
        abi: Abi,
        network: Arc<dyn Network>,
        deploy_tx: Option<B256>,
    ) -> Self {
        Self {
            address,
            abi,
            network,
            deploy_tx,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Hash of the creation transaction; `None` for attached handles
    pub fn deploy_tx(&self) -> Option<B256> {
        self.deploy_tx
    }

    /// True if `function` (with `arity` arguments) is `view` or `pure`
    pub fn is_read_only(&self, function: &str, arity: usize) -> bool {
        self.abi.is_read_only(function, arity)
    }

    /// Submit a state-changing call and wait for it to be mined
    pub async fn send(
        &self,
        function: &str,
        args: &[Value],
        overrides: TxOverrides,
        policy: ConfirmationPolicy,
    ) -> Result<Receipt> {
        let (func, data) = self.abi.encode_call(function, args)?;
        if abi::is_read_only(&func) {
            return Err(Error::Encoding(format!(
                "{} is read-only, use call instead",
                func.signature()
            )));
        }

        let submitted = self
            .network
            .submit(Some(self.address), data, overrides)
            .await?;
        tracing::info!(
            contract = %self.address,
            function = %func.signature(),
            tx_hash = %submitted.tx_hash,
            "Submitted call"
        );

        confirm_with_policy(self.network.as_ref(), submitted.tx_hash, policy).await
    }

    /// Run a read-only call and decode its outputs
    pub async fn call(&self, function: &str, args: &[Value]) -> Result<Vec<Value>> {
        let (func, data) = self.abi.encode_call(function, args)?;
        let output = self.network.call(self.address, data).await?;
        Abi::decode_output(&func, &output)
    }
}
