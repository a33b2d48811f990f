use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Artifact not found: {contract} in {source_path}")]
    ArtifactNotFound {
        source_path: String,
        contract: String,
    },

    #[error("Artifact bundle error: {0}")]
    Bundle(String),

    #[error("ABI parse error: {0}")]
    AbiParse(String),

    #[error("Invalid bytecode: {0}")]
    InvalidBytecode(String),

    #[error("Contract {0} has no bytecode (interface or abstract contract)")]
    NotDeployable(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Transaction {tx_hash} not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx_hash: B256, timeout: Duration },

    #[error("Transaction {tx_hash} failed: {reason}")]
    ConfirmationFailure { tx_hash: B256, reason: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Ledger error at {}: {reason}", path.display())]
    Ledger { path: PathBuf, reason: String },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Unresolved reference ${{{reference}}} in step {step}")]
    UnresolvedReference { step: String, reference: String },

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn artifact_not_found(source_path: impl Into<String>, contract: impl Into<String>) -> Self {
        Self::ArtifactNotFound {
            source_path: source_path.into(),
            contract: contract.into(),
        }
    }

    pub fn ledger(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Ledger {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach the name of the plan step that produced this error
    pub fn in_step(self, step: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through step wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::InvalidBytecode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
