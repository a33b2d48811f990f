//! Creation bytecode

use std::fmt;

use alloy::primitives::{keccak256, Bytes, B256};

use crate::error::{Error, Result};

/// Contract creation code as emitted by the compiler.
///
/// Empty for interfaces and abstract contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytecode(Bytes);

impl Bytecode {
    /// Parse compiler output (with or without 0x prefix).
    ///
    /// Unlinked library references (`__$<hash>$__`) are rejected: such code
    /// cannot be deployed until the libraries are linked.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let clean = strip_prefix(hex.trim());
        if let Some(start) = clean.find("__$") {
            let placeholder: String = clean[start..].chars().take(40).collect();
            return Err(Error::InvalidBytecode(format!(
                "unlinked library placeholder {}",
                placeholder
            )));
        }
        Ok(Self(Bytes::from(hex::decode(clean)?)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// keccak256 of the creation code
    pub fn hash(&self) -> B256 {
        keccak256(&self.0)
    }

    /// Creation payload: code followed by ABI-encoded constructor arguments
    pub fn with_constructor_args(&self, encoded_args: &[u8]) -> Bytes {
        [self.0.as_ref(), encoded_args].concat().into()
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// True if `hex` decodes to non-empty code
pub fn is_deployable_hex(hex: &str) -> bool {
    let clean = strip_prefix(hex.trim());
    !clean.is_empty() && !clean.contains("__$") && hex::decode(clean).is_ok()
}

fn strip_prefix(hex: &str) -> &str {
    hex.strip_prefix("0x").unwrap_or(hex)
}
