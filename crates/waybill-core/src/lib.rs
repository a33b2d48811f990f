//! Contract deployment engine
//!
//! Resolves compiled artifacts, deploys them through a signing [`Network`],
//! waits for confirmation and records the resulting addresses in a
//! chain-scoped [`JsonLedger`]. Multi-contract deployments are described by a
//! [`DeploymentPlan`] and executed in dependency order by a [`PlanRunner`].

pub mod abi;
pub mod artifact;
pub mod bytecode;
pub mod error;
pub mod executor;
pub mod factory;
pub mod handle;
pub mod ledger;
pub mod network;
pub mod plan;
pub mod runner;
pub mod types;

pub use abi::{json_to_sol_value, parse_int, parse_uint, sol_value_to_json, Abi};
pub use artifact::{Artifact, ArtifactBundle, ArtifactInfo, ArtifactResolver, ForgeOutDir};
pub use bytecode::Bytecode;
pub use error::{Error, Result};
pub use executor::{Deployment, DeploymentExecutor};
pub use factory::{ContractFactory, PendingDeployment};
pub use handle::ContractHandle;
pub use ledger::{AddressBook, AddressStore, JsonLedger};
pub use network::{confirm_with_policy, AlloyNetwork, ConfirmationPolicy, Network};
pub use plan::{CallStep, CallTarget, DeployStep, DeploymentPlan, Step};
pub use runner::{
    PlanRunner, PreparedPlan, PreparedStep, RecordedPolicy, RunObserver, RunReport, StepOutcome,
};
pub use types::*;
