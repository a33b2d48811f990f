//! Artifact resolution
//!
//! Compiled contracts are looked up by [`ArtifactKey`] (source path + contract
//! name). Two layouts are supported:
//!
//! - [`ArtifactBundle`] - a single solc standard-JSON output file
//!   (`contracts[path][name]`), validated when loaded. Contracts that still
//!   need library linking load but fail when resolved.
//! - [`ForgeOutDir`] - Foundry's `out/<File>.sol/<Name>.json` directory tree,
//!   read on demand

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::abi::Abi;
use crate::bytecode::Bytecode;
use crate::error::{Error, Result};
use crate::types::ArtifactKey;

// =============================================================================
// Trait Definition
// =============================================================================

/// Trait for resolving compiled contracts from various sources
pub trait ArtifactResolver: Send + Sync {
    /// Look up the ABI and creation bytecode stored under `key`
    fn resolve(&self, key: &ArtifactKey) -> Result<Artifact>;

    /// List all available artifacts
    fn list(&self) -> Result<Vec<ArtifactInfo>>;
}

/// A compiled contract: interface description plus creation bytecode
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub key: ArtifactKey,
    pub abi: Abi,
    pub bytecode: Bytecode,
}

impl Artifact {
    /// Interfaces and abstract contracts have no creation bytecode
    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }
}

/// Summary of an artifact (for listing)
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub key: ArtifactKey,
    pub has_constructor: bool,
    pub has_bytecode: bool,
}

impl From<&Artifact> for ArtifactInfo {
    fn from(artifact: &Artifact) -> Self {
        Self {
            key: artifact.key.clone(),
            has_constructor: artifact.abi.has_constructor_with_args(),
            has_bytecode: artifact.is_deployable(),
        }
    }
}

// =============================================================================
// Solc Standard-JSON Bundle
// =============================================================================

#[derive(Debug, Deserialize)]
struct StandardJsonOutput {
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, StandardJsonContract>>,
}

#[derive(Debug, Deserialize)]
struct StandardJsonContract {
    #[serde(default)]
    abi: serde_json::Value,
    #[serde(default)]
    evm: Option<EvmOutput>,
}

#[derive(Debug, Deserialize)]
struct EvmOutput {
    #[serde(default)]
    bytecode: Option<BytecodeObject>,
}

/// Bytecode object as emitted by solc and forge
#[derive(Debug, Deserialize)]
struct BytecodeObject {
    #[serde(default)]
    object: String,
}

/// Immutable, validated mapping of source path -> contract name -> artifact
#[derive(Debug, Clone, Default)]
pub struct ArtifactBundle {
    artifacts: BTreeMap<ArtifactKey, BundleEntry>,
}

#[derive(Debug, Clone)]
struct BundleEntry {
    artifact: Artifact,
    /// Set when the bytecode has unlinked library placeholders
    unlinked: Option<String>,
}

impl ArtifactBundle {
    /// Load a solc standard-JSON output file (e.g. `out/dapp.sol.json`)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Bundle(format!(
                "Could not read artifact bundle at {}: {}",
                path.display(),
                e
            ))
        })?;
        let bundle = Self::from_json(&content)?;

        tracing::debug!(
            path = %path.display(),
            artifacts = bundle.len(),
            "Loaded artifact bundle"
        );
        Ok(bundle)
    }

    /// Parse and validate every entry of a standard-JSON output document
    pub fn from_json(json: &str) -> Result<Self> {
        let output: StandardJsonOutput = serde_json::from_str(json)
            .map_err(|e| Error::Bundle(format!("Invalid artifact bundle: {}", e)))?;

        let mut artifacts = BTreeMap::new();
        for (source_path, contracts) in output.contracts {
            for (name, contract) in contracts {
                let key = ArtifactKey::new(source_path.clone(), name);
                let abi = parse_abi(&key, &contract.abi)?;
                let object = contract
                    .evm
                    .and_then(|evm| evm.bytecode)
                    .map(|b| b.object)
                    .unwrap_or_default();
                let (bytecode, unlinked) = match parse_bytecode(&key, &object) {
                    Ok(bytecode) => (bytecode, None),
                    Err(Error::InvalidBytecode(reason)) if object.contains("__$") => {
                        tracing::debug!(artifact = %key, "Artifact needs library linking");
                        (Bytecode::default(), Some(reason))
                    }
                    Err(e) => return Err(e),
                };

                let artifact = Artifact {
                    key: key.clone(),
                    abi,
                    bytecode,
                };
                artifacts.insert(key, BundleEntry { artifact, unlinked });
            }
        }

        Ok(Self { artifacts })
    }

    /// Number of contracts in the bundle
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Borrowing lookup; [`ArtifactResolver::resolve`] returns an owned copy
    pub fn get(&self, key: &ArtifactKey) -> Result<&Artifact> {
        tracing::info!(path = %key.source_path, name = %key.contract, "Resolving artifact");
        let entry = self
            .artifacts
            .get(key)
            .ok_or_else(|| Error::artifact_not_found(&key.source_path, &key.contract))?;
        match &entry.unlinked {
            Some(reason) => Err(Error::InvalidBytecode(reason.clone())),
            None => Ok(&entry.artifact),
        }
    }
}

impl ArtifactResolver for ArtifactBundle {
    fn resolve(&self, key: &ArtifactKey) -> Result<Artifact> {
        self.get(key).cloned()
    }

    fn list(&self) -> Result<Vec<ArtifactInfo>> {
        Ok(self
            .artifacts
            .values()
            .map(|entry| ArtifactInfo::from(&entry.artifact))
            .collect())
    }
}

// =============================================================================
// Foundry Output Directory
// =============================================================================

/// Foundry artifact file (`out/<File>.sol/<Name>.json`)
#[derive(Debug, Deserialize)]
struct ForgeArtifact {
    abi: serde_json::Value,
    #[serde(default)]
    bytecode: Option<BytecodeObject>,
    #[serde(default)]
    ast: Option<ForgeAst>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgeAst {
    absolute_path: Option<String>,
}

/// Artifact resolver that reads Foundry build output from disk
#[derive(Debug, Clone)]
pub struct ForgeOutDir {
    out_dir: PathBuf,
}

impl ForgeOutDir {
    /// Resolve artifacts under `<project_root>/out`
    pub fn with_paths(project_root: &Path) -> Self {
        Self {
            out_dir: project_root.join("out"),
        }
    }

    /// Resolve artifacts under an explicit output directory
    pub fn with_dir(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    fn artifact_path(&self, key: &ArtifactKey) -> Option<PathBuf> {
        let file_name = Path::new(&key.source_path).file_name()?;
        Some(
            self.out_dir
                .join(file_name)
                .join(format!("{}.json", key.contract)),
        )
    }

    fn read(&self, path: &Path) -> Result<ForgeArtifact> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Bundle(format!("Could not read artifact {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Bundle(format!("Invalid artifact {}: {}", path.display(), e)))
    }
}

impl ArtifactResolver for ForgeOutDir {
    fn resolve(&self, key: &ArtifactKey) -> Result<Artifact> {
        tracing::info!(path = %key.source_path, name = %key.contract, "Resolving artifact");

        let path = self
            .artifact_path(key)
            .filter(|p| p.is_file())
            .ok_or_else(|| Error::artifact_not_found(&key.source_path, &key.contract))?;
        let raw = self.read(&path)?;

        // Same file name in two directories: only the path forge compiled counts
        if let Some(absolute) = raw.ast.as_ref().and_then(|a| a.absolute_path.as_deref()) {
            if absolute != key.source_path {
                return Err(Error::artifact_not_found(&key.source_path, &key.contract));
            }
        }

        let abi = parse_abi(key, &raw.abi)?;
        let object = raw.bytecode.map(|b| b.object).unwrap_or_default();
        let bytecode = parse_bytecode(key, &object)?;

        Ok(Artifact {
            key: key.clone(),
            abi,
            bytecode,
        })
    }

    fn list(&self) -> Result<Vec<ArtifactInfo>> {
        if !self.out_dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();

        for entry in std::fs::read_dir(&self.out_dir)
            .map_err(|e| Error::Bundle(format!("{}: {}", self.out_dir.display(), e)))?
            .flatten()
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let dir_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            // Skip build-info and other special directories
            if dir_name.starts_with('.') || dir_name == "build-info" {
                continue;
            }

            let Ok(files) = std::fs::read_dir(&path) else {
                continue;
            };

            for json_path in files.flatten().map(|f| f.path()) {
                if json_path.extension().is_none_or(|e| e != "json") {
                    continue;
                }

                let contract = match json_path.file_stem().and_then(|n| n.to_str()) {
                    Some(name) if !name.ends_with(".metadata") => name.to_string(),
                    _ => continue,
                };

                let Ok(raw) = self.read(&json_path) else {
                    continue;
                };

                let source_path = raw
                    .ast
                    .as_ref()
                    .and_then(|a| a.absolute_path.clone())
                    .unwrap_or_else(|| dir_name.clone());
                let has_constructor = Abi::from_value(&raw.abi)
                    .map(|abi| abi.has_constructor_with_args())
                    .unwrap_or(false);
                let has_bytecode = raw
                    .bytecode
                    .as_ref()
                    .is_some_and(|b| crate::bytecode::is_deployable_hex(&b.object));

                artifacts.push(ArtifactInfo {
                    key: ArtifactKey::new(source_path, contract),
                    has_constructor,
                    has_bytecode,
                });
            }
        }

        artifacts.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(artifacts)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_abi(key: &ArtifactKey, value: &serde_json::Value) -> Result<Abi> {
    if value.is_null() {
        return Abi::parse("[]");
    }
    Abi::from_value(value).map_err(|e| Error::AbiParse(format!("{}: {}", key, e)))
}

fn parse_bytecode(key: &ArtifactKey, object: &str) -> Result<Bytecode> {
    Bytecode::from_hex(object).map_err(|e| Error::InvalidBytecode(format!("{}: {}", key, e)))
}
