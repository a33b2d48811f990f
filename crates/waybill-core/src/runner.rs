//! Plan execution
//!
//! [`PlanRunner`] turns a [`DeploymentPlan`] into transactions. Running is
//! split in two phases:
//!
//! 1. [`PlanRunner::prepare`] queries the chain identifier, reads the ledger,
//!    orders the steps, resolves every artifact and encodes every argument
//!    list against placeholder addresses. Nothing is sent.
//! 2. [`PlanRunner::execute`] walks the prepared steps, substituting real
//!    addresses, waiting for each transaction and recording each deployment
//!    in the ledger as soon as it is confirmed.
//!
//! A failure in phase 1 deploys nothing and writes nothing. A failure in
//! phase 2 stops the run; everything confirmed before it stays recorded.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use serde_json::Value;

use crate::abi::Abi;
use crate::artifact::{Artifact, ArtifactResolver};
use crate::error::{Error, Result};
use crate::executor::DeploymentExecutor;
use crate::factory::ContractFactory;
use crate::handle::ContractHandle;
use crate::ledger::{AddressBook, AddressStore};
use crate::network::Network;
use crate::plan::{substitute_references, CallTarget, DeploymentPlan, Step};
use crate::types::{ArtifactKey, ChainId, TxOverrides};

/// What to do with a deploy step whose name is already in the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordedPolicy {
    /// Deploy again and overwrite the recorded address
    #[default]
    Redeploy,
    /// Attach to the recorded address without sending a transaction
    Skip,
}

/// A step ready to run: artifacts resolved, arguments type-checked
#[derive(Debug)]
pub enum PreparedStep {
    Deploy {
        name: String,
        artifact: ArtifactKey,
        factory: ContractFactory,
        args: Vec<Value>,
        overrides: TxOverrides,
        /// Address already in the ledger under `name`
        recorded: Option<Address>,
    },
    Call {
        label: String,
        target: CallTarget,
        function: String,
        abi: Option<Abi>,
        args: Vec<Value>,
        overrides: TxOverrides,
    },
}

impl PreparedStep {
    pub fn label(&self) -> &str {
        match self {
            PreparedStep::Deploy { name, .. } => name,
            PreparedStep::Call { label, .. } => label,
        }
    }
}

/// A validated plan bound to one chain
#[derive(Debug)]
pub struct PreparedPlan {
    pub chain_id: ChainId,
    pub recorded: AddressBook,
    pub steps: Vec<PreparedStep>,
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Deployed {
        name: String,
        address: Address,
        tx_hash: B256,
        block_number: Option<u64>,
    },
    /// Recorded address reused under [`RecordedPolicy::Skip`]
    Reused { name: String, address: Address },
    /// State-changing call, mined
    Sent {
        label: String,
        tx_hash: B256,
        block_number: Option<u64>,
    },
    /// Read-only call
    Queried { label: String, outputs: Vec<Value> },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub chain_id: ChainId,
    pub outcomes: Vec<StepOutcome>,
    /// Every address known at the end of the run, ledger included
    pub addresses: AddressBook,
}

/// Progress callbacks for operator output
pub trait RunObserver {
    fn step_started(&mut self, _step: &PreparedStep) {}
    fn step_finished(&mut self, _outcome: &StepOutcome) {}
}

impl RunObserver for () {}

pub struct PlanRunner<'a> {
    network: Arc<dyn Network>,
    resolver: &'a dyn ArtifactResolver,
    ledger: &'a dyn AddressStore,
    executor: DeploymentExecutor,
    recorded_policy: RecordedPolicy,
}

impl<'a> PlanRunner<'a> {
    pub fn new(
        network: Arc<dyn Network>,
        resolver: &'a dyn ArtifactResolver,
        ledger: &'a dyn AddressStore,
        executor: DeploymentExecutor,
    ) -> Self {
        Self {
            network,
            resolver,
            ledger,
            executor,
            recorded_policy: RecordedPolicy::default(),
        }
    }

    pub fn with_recorded_policy(mut self, policy: RecordedPolicy) -> Self {
        self.recorded_policy = policy;
        self
    }

    /// Prepare and execute `plan`
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport> {
        let prepared = self.prepare(plan).await?;
        self.execute(prepared, observer).await
    }

    /// Validate `plan` against the connected chain without sending anything
    pub async fn prepare(&self, plan: &DeploymentPlan) -> Result<PreparedPlan> {
        let chain_id = self.network.chain_id().await?;
        let recorded = self.ledger.read_all(chain_id)?;
        let order = plan.execution_order(&recorded)?;

        // Plan-produced addresses are unknown until execution; a zero address
        // is enough to type-check arguments
        let mut placeholders = recorded.clone();
        for name in plan.deploy_names() {
            placeholders.insert(name.to_string(), Address::ZERO);
        }

        let mut resolved: HashMap<ArtifactKey, Artifact> = HashMap::new();
        let mut resolve = |key: &ArtifactKey| -> Result<Artifact> {
            if let Some(artifact) = resolved.get(key) {
                return Ok(artifact.clone());
            }
            let artifact = self.resolver.resolve(key)?;
            resolved.insert(key.clone(), artifact.clone());
            Ok(artifact)
        };

        let mut deploy_abis: HashMap<&str, Abi> = HashMap::new();
        let mut steps = Vec::with_capacity(order.len());

        for step in order {
            let label = step.label();
            let overrides = step.overrides().map_err(|e| e.in_step(&label))?;
            let checked_args = substitute_references(&label, step.args(), &placeholders)
                .map_err(|e| e.in_step(&label))?;

            match step {
                Step::Deploy(deploy) => {
                    let artifact = resolve(&deploy.artifact).map_err(|e| e.in_step(&label))?;
                    let factory = ContractFactory::from_artifact(&artifact, Arc::clone(&self.network))
                        .map_err(|e| e.in_step(&label))?;
                    factory
                        .deploy_data(&checked_args, &overrides)
                        .map_err(|e| e.in_step(&label))?;

                    deploy_abis.insert(deploy.name.as_str(), artifact.abi.clone());
                    steps.push(PreparedStep::Deploy {
                        name: deploy.name.clone(),
                        artifact: deploy.artifact.clone(),
                        factory,
                        args: deploy.args.clone(),
                        overrides,
                        recorded: recorded.get(&deploy.name).copied(),
                    });
                }
                Step::Call(call) => {
                    let target = call.target();
                    let abi = match &call.artifact {
                        Some(key) => Some(resolve(key).map_err(|e| e.in_step(&label))?.abi),
                        None => None,
                    };
                    let checking_abi = match (&abi, &target) {
                        (Some(abi), _) => abi,
                        (None, CallTarget::Named(name)) => {
                            deploy_abis.get(name.as_str()).ok_or_else(|| {
                                Error::InvalidPlan(format!(
                                    "call target '{}' is not deployed by this plan, set `artifact` to supply its ABI",
                                    name
                                ))
                                .in_step(&label)
                            })?
                        }
                        (None, CallTarget::Address(address)) => {
                            return Err(Error::InvalidPlan(format!(
                                "call to literal address {} needs an `artifact`",
                                address
                            ))
                            .in_step(&label))
                        }
                    };
                    checking_abi
                        .encode_call(&call.function, &checked_args)
                        .map_err(|e| e.in_step(&label))?;

                    steps.push(PreparedStep::Call {
                        label,
                        target,
                        function: call.function.clone(),
                        abi,
                        args: call.args.clone(),
                        overrides,
                    });
                }
            }
        }

        tracing::info!(
            chain_id = %chain_id,
            steps = steps.len(),
            artifacts = resolved.len(),
            "Plan prepared"
        );

        Ok(PreparedPlan {
            chain_id,
            recorded,
            steps,
        })
    }

    /// Run prepared steps in order, recording every deployment immediately
    pub async fn execute(
        &self,
        prepared: PreparedPlan,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport> {
        let PreparedPlan {
            chain_id,
            recorded,
            steps,
        } = prepared;

        let mut addresses = recorded;
        let mut handles: HashMap<String, ContractHandle> = HashMap::new();
        let mut outcomes = Vec::with_capacity(steps.len());

        for step in &steps {
            observer.step_started(step);
            let label = step.label().to_string();

            let outcome = self
                .execute_step(chain_id, step, &mut addresses, &mut handles)
                .await
                .map_err(|e| e.in_step(&label))?;

            observer.step_finished(&outcome);
            outcomes.push(outcome);
        }

        Ok(RunReport {
            chain_id,
            outcomes,
            addresses,
        })
    }

    async fn execute_step(
        &self,
        chain_id: ChainId,
        step: &PreparedStep,
        addresses: &mut BTreeMap<String, Address>,
        handles: &mut HashMap<String, ContractHandle>,
    ) -> Result<StepOutcome> {
        match step {
            PreparedStep::Deploy {
                name,
                factory,
                recorded: Some(address),
                ..
            } if self.recorded_policy == RecordedPolicy::Skip => {
                tracing::info!(name = %name, address = %address, "Already recorded, skipping deployment");
                handles.insert(name.clone(), factory.attach(*address));
                Ok(StepOutcome::Reused {
                    name: name.clone(),
                    address: *address,
                })
            }
            PreparedStep::Deploy {
                name,
                factory,
                args,
                overrides,
                ..
            } => {
                let args = substitute_references(name, args, addresses)?;
                let deployment = self
                    .executor
                    .deploy_and_confirm(name, factory, &args, *overrides)
                    .await?;
                let address = deployment.address();

                self.ledger
                    .record(chain_id, name, address)
                    .inspect_err(|e| {
                        tracing::error!(
                            name = %name,
                            address = %address,
                            tx_hash = %deployment.tx_hash,
                            error = %e,
                            "Contract deployed but NOT recorded in the ledger"
                        );
                    })?;

                addresses.insert(name.clone(), address);
                handles.insert(name.clone(), deployment.handle);
                Ok(StepOutcome::Deployed {
                    name: name.clone(),
                    address,
                    tx_hash: deployment.tx_hash,
                    block_number: deployment.receipt.block_number,
                })
            }
            PreparedStep::Call {
                label,
                target,
                function,
                abi,
                args,
                overrides,
            } => {
                let handle = self.call_handle(label, target, abi.as_ref(), addresses, handles)?;
                let args = substitute_references(label, args, addresses)?;

                if handle.is_read_only(function, args.len()) {
                    let outputs = handle.call(function, &args).await?;
                    tracing::info!(step = %label, outputs = ?outputs, "Queried");
                    return Ok(StepOutcome::Queried {
                        label: label.clone(),
                        outputs,
                    });
                }

                let receipt = handle
                    .send(function, &args, *overrides, self.executor.policy())
                    .await?;
                tracing::info!(
                    step = %label,
                    tx_hash = %receipt.tx_hash,
                    block = ?receipt.block_number,
                    "Call confirmed"
                );
                Ok(StepOutcome::Sent {
                    label: label.clone(),
                    tx_hash: receipt.tx_hash,
                    block_number: receipt.block_number,
                })
            }
        }
    }

    fn call_handle(
        &self,
        label: &str,
        target: &CallTarget,
        abi: Option<&Abi>,
        addresses: &BTreeMap<String, Address>,
        handles: &HashMap<String, ContractHandle>,
    ) -> Result<ContractHandle> {
        let address = match target {
            CallTarget::Address(address) => *address,
            CallTarget::Named(name) => match (handles.get(name), abi) {
                (Some(handle), None) => return Ok(handle.clone()),
                (Some(handle), Some(_)) => handle.address(),
                (None, _) => *addresses.get(name).ok_or_else(|| Error::UnresolvedReference {
                    step: label.to_string(),
                    reference: name.clone(),
                })?,
            },
        };

        let abi = abi.ok_or_else(|| {
            Error::InvalidPlan(format!("no ABI available for call target {}", address))
        })?;
        Ok(ContractHandle::new(
            address,
            abi.clone(),
            Arc::clone(&self.network),
            None,
        ))
    }
}
