//! Contract factories
//!
//! A [`ContractFactory`] binds an ABI and creation bytecode to a signing
//! [`Network`]. It can submit a creation transaction ([`ContractFactory::deploy`])
//! or bind the ABI to an existing address ([`ContractFactory::attach`]).

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use serde_json::Value;

use crate::abi::Abi;
use crate::artifact::Artifact;
use crate::bytecode::Bytecode;
use crate::error::{Error, Result};
use crate::handle::ContractHandle;
use crate::network::{confirm_with_policy, ConfirmationPolicy, Network};
use crate::types::{Receipt, TxOverrides};

/// ABI + bytecode bound to a signing identity
#[derive(Clone)]
pub struct ContractFactory {
    label: String,
    abi: Abi,
    bytecode: Bytecode,
    network: Arc<dyn Network>,
}

impl std::fmt::Debug for ContractFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractFactory")
            .field("label", &self.label)
            .field("bytecode_len", &self.bytecode.len())
            .field("sender", &self.network.sender())
            .finish()
    }
}

impl ContractFactory {
    pub fn new(abi: Abi, bytecode: Bytecode, network: Arc<dyn Network>) -> Self {
        Self {
            label: "contract".to_string(),
            abi,
            bytecode,
            network,
        }
    }

    /// Build a factory from a resolved artifact
    pub fn from_artifact(artifact: &Artifact, network: Arc<dyn Network>) -> Result<Self> {
        if !artifact.is_deployable() {
            return Err(Error::NotDeployable(artifact.key.to_string()));
        }

        Ok(Self {
            label: artifact.key.to_string(),
            abi: artifact.abi.clone(),
            bytecode: artifact.bytecode.clone(),
            network,
        })
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Creation payload for `args`, validated against the constructor
    pub fn deploy_data(&self, args: &[Value], overrides: &TxOverrides) -> Result<Bytes> {
        if self.bytecode.is_empty() {
            return Err(Error::NotDeployable(self.label.clone()));
        }
        if overrides.value.is_some_and(|v| !v.is_zero()) && !self.abi.constructor_is_payable() {
            return Err(Error::Encoding(format!(
                "Cannot send value to non-payable constructor of {}",
                self.label
            )));
        }

        let encoded = self.abi.encode_constructor_args(args)?;
        Ok(self.bytecode.with_constructor_args(&encoded))
    }

    /// Encode and submit a creation transaction.
    ///
    /// Argument errors surface before anything is sent. The returned handle
    /// already knows the contract address; confirmation is a separate step.
    pub async fn deploy(&self, args: &[Value], overrides: TxOverrides) -> Result<PendingDeployment> {
        let data = self.deploy_data(args, &overrides)?;
        tracing::debug!(
            contract = %self.label,
            code_hash = %self.bytecode.hash(),
            payload_len = data.len(),
            "Submitting creation transaction"
        );
        let submitted = self.network.submit(None, data, overrides).await?;
        let address = self.network.sender().create(submitted.nonce);

        Ok(PendingDeployment {
            address,
            tx_hash: submitted.tx_hash,
            abi: self.abi.clone(),
            network: Arc::clone(&self.network),
        })
    }

    /// Bind the ABI to an already deployed contract. No transaction is sent.
    pub fn attach(&self, address: Address) -> ContractHandle {
        ContractHandle::new(address, self.abi.clone(), Arc::clone(&self.network), None)
    }
}

/// A submitted, not yet confirmed, creation transaction
pub struct PendingDeployment {
    pub address: Address,
    pub tx_hash: B256,
    abi: Abi,
    network: Arc<dyn Network>,
}

impl std::fmt::Debug for PendingDeployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDeployment")
            .field("address", &self.address)
            .field("tx_hash", &self.tx_hash)
            .finish()
    }
}

impl PendingDeployment {
    /// Wait for the creation transaction to be mined
    pub async fn confirm(self, policy: ConfirmationPolicy) -> Result<(ContractHandle, Receipt)> {
        let receipt = confirm_with_policy(self.network.as_ref(), self.tx_hash, policy).await?;

        let address = match receipt.contract_address {
            Some(actual) if actual != self.address => {
                tracing::warn!(
                    predicted = %self.address,
                    actual = %actual,
                    "Deployed address differs from prediction"
                );
                actual
            }
            _ => self.address,
        };

        let handle = ContractHandle::new(address, self.abi, self.network, Some(self.tx_hash));
        Ok((handle, receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use alloy::primitives::{address, U256};
    use async_trait::async_trait;
    use serde_json::json;

    use crate::types::{ArtifactKey, ChainId, SubmittedTx};

    const SENDER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    const COUNTER_ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"start","type":"uint256"}],"stateMutability":"nonpayable"}
    ]"#;

    /// Records submissions and mines everything immediately
    #[derive(Default)]
    struct RecordingNetwork {
        submitted: Mutex<Vec<(Option<Address>, Bytes, TxOverrides)>>,
    }

    #[async_trait]
    impl Network for RecordingNetwork {
        fn sender(&self) -> Address {
            SENDER
        }

        async fn chain_id(&self) -> Result<ChainId> {
            Ok(ChainId(31337))
        }

        async fn submit(
            &self,
            to: Option<Address>,
            data: Bytes,
            overrides: TxOverrides,
        ) -> Result<SubmittedTx> {
            let mut submitted = self.submitted.lock().unwrap();
            let nonce = submitted.len() as u64 + 7;
            submitted.push((to, data, overrides));
            Ok(SubmittedTx {
                tx_hash: B256::left_padding_from(&nonce.to_be_bytes()),
                nonce,
            })
        }

        async fn confirm(&self, tx_hash: B256, _confirmations: u64) -> Result<Receipt> {
            Ok(Receipt {
                tx_hash,
                block_number: Some(1),
                contract_address: Some(SENDER.create(7)),
                gas_used: 21_000,
                success: true,
            })
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
            Ok(Bytes::new())
        }
    }

    fn counter_factory(network: Arc<RecordingNetwork>) -> ContractFactory {
        ContractFactory::new(
            Abi::parse(COUNTER_ABI).unwrap(),
            Bytecode::from_hex("0x6080604052").unwrap(),
            network,
        )
    }

    #[tokio::test]
    async fn test_deploy_predicts_create_address() {
        let network = Arc::new(RecordingNetwork::default());
        let factory = counter_factory(Arc::clone(&network));

        let pending = factory.deploy(&[json!(5)], TxOverrides::default()).await.unwrap();
        assert_eq!(pending.address, SENDER.create(7));

        let submitted = network.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let (to, data, _) = &submitted[0];
        assert!(to.is_none());
        assert!(data.starts_with(&[0x60, 0x80, 0x60, 0x40, 0x52]));
        assert_eq!(data.len(), 5 + 32);
    }

    #[tokio::test]
    async fn test_deploy_then_confirm() {
        let network = Arc::new(RecordingNetwork::default());
        let factory = counter_factory(network);

        let pending = factory.deploy(&[json!("0x10")], TxOverrides::default()).await.unwrap();
        let tx_hash = pending.tx_hash;
        let (handle, receipt) = pending.confirm(ConfirmationPolicy::default()).await.unwrap();

        assert_eq!(handle.address(), SENDER.create(7));
        assert_eq!(handle.deploy_tx(), Some(tx_hash));
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_deploy_bad_args_sends_nothing() {
        let network = Arc::new(RecordingNetwork::default());
        let factory = counter_factory(Arc::clone(&network));

        let err = factory.deploy(&[], TxOverrides::default()).await.unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));

        let err = factory
            .deploy(&[json!("not a number")], TxOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));

        assert!(network.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_value_to_non_payable_constructor() {
        let network = Arc::new(RecordingNetwork::default());
        let factory = counter_factory(Arc::clone(&network));

        let overrides = TxOverrides {
            value: Some(U256::from(1)),
            ..TxOverrides::default()
        };
        let err = factory.deploy(&[json!(1)], overrides).await.unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(network.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overrides_are_forwarded() {
        let network = Arc::new(RecordingNetwork::default());
        let factory = counter_factory(Arc::clone(&network));

        let overrides = TxOverrides {
            gas_limit: Some(3_000_000),
            gas_price: Some(2_000_000_000),
            value: None,
        };
        factory.deploy(&[json!(1)], overrides).await.unwrap();

        let submitted = network.submitted.lock().unwrap();
        assert_eq!(submitted[0].2, overrides);
    }

    #[test]
    fn test_from_artifact_rejects_interface() {
        let artifact = Artifact {
            key: ArtifactKey::new("src/IOracle.sol", "IOracle"),
            abi: Abi::parse("[]").unwrap(),
            bytecode: Bytecode::default(),
        };

        let err = ContractFactory::from_artifact(&artifact, Arc::new(RecordingNetwork::default()))
            .unwrap_err();
        assert!(matches!(err, Error::NotDeployable(ref key) if key == "src/IOracle.sol:IOracle"));
    }

    #[test]
    fn test_attach_sends_nothing() {
        let network = Arc::new(RecordingNetwork::default());
        let factory = counter_factory(Arc::clone(&network));
        let target = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

        let handle = factory.attach(target);
        assert_eq!(handle.address(), target);
        assert_eq!(handle.deploy_tx(), None);
        assert!(network.submitted.lock().unwrap().is_empty());
    }
}
