use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Re-export alloy types for convenience
pub use alloy::primitives::{Address, Bytes, B256, U256};

// =============================================================================
// Identifiers
// =============================================================================

/// Chain ID wrapper, used to scope ledger files
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ChainId> for u64 {
    fn from(value: ChainId) -> Self {
        value.0
    }
}

/// Identifies a compiled contract by source path and contract name,
/// written as `path:Name` (e.g. `src/oracle/Oracle.sol:Oracle`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub source_path: String,
    pub contract: String,
}

impl ArtifactKey {
    pub fn new(source_path: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            contract: contract.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_path, self.contract)
    }
}

impl FromStr for ArtifactKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the last ':' so Windows-style drive prefixes survive
        match s.rsplit_once(':') {
            Some((path, name)) if !path.is_empty() && !name.is_empty() => {
                Ok(Self::new(path, name))
            }
            _ => Err(Error::InvalidPlan(format!(
                "Invalid artifact '{}', expected 'path:ContractName'",
                s
            ))),
        }
    }
}

impl Serialize for ArtifactKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArtifactKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Caller-supplied transaction overrides, passed through untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOverrides {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub value: Option<U256>,
}

/// A transaction accepted by the network but not yet confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: B256,
    pub nonce: u64,
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub success: bool,
}
