//! Address ledger
//!
//! A persisted, chain-scoped registry of logical contract names to addresses.
//! [`JsonLedger`] keeps one pretty-printed `{chainId}.json` file per chain so
//! the records stay readable and diffable by any tool.
//!
//! Every [`AddressStore::record`] is a read-merge-write of the whole file:
//! existing names are preserved, a repeated name is overwritten. Nothing is
//! ever deleted. Writers are assumed to be sequential.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use alloy::primitives::Address;

use crate::error::{Error, Result};
use crate::types::ChainId;

/// Chain-scoped name -> address mapping
pub type AddressBook = BTreeMap<String, Address>;

/// Storage interface for recorded deployments
pub trait AddressStore: Send + Sync {
    /// All names recorded for `chain_id` (empty if none were ever recorded)
    fn read_all(&self, chain_id: ChainId) -> Result<AddressBook>;

    /// Record `name -> address` for `chain_id`, keeping every other entry
    fn record(&self, chain_id: ChainId, name: &str, address: Address) -> Result<()>;

    /// Look up a single name
    fn get(&self, chain_id: ChainId, name: &str) -> Result<Option<Address>> {
        Ok(self.read_all(chain_id)?.get(name).copied())
    }
}

/// JSON-file ledger, one file per chain inside `dir`
#[derive(Debug, Clone)]
pub struct JsonLedger {
    dir: PathBuf,
}

impl JsonLedger {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ledger file for a chain: `<dir>/<chainId>.json`
    pub fn path_for(&self, chain_id: ChainId) -> PathBuf {
        self.dir.join(format!("{}.json", chain_id))
    }

    /// Chains that have a ledger file, ascending
    pub fn chains(&self) -> Result<Vec<ChainId>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::ledger(&self.dir, e)),
        };

        let mut chains: Vec<ChainId> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_none_or(|e| e != "json") {
                    return None;
                }
                path.file_stem()?.to_str()?.parse::<u64>().ok().map(ChainId)
            })
            .collect();
        chains.sort();
        Ok(chains)
    }

    fn load(&self, path: &Path) -> Result<AddressBook> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AddressBook::new()),
            Err(e) => return Err(Error::ledger(path, e)),
        };

        let raw: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| Error::ledger(path, format!("corrupt ledger: {}", e)))?;

        raw.into_iter()
            .map(|(name, address)| {
                address
                    .parse::<Address>()
                    .map(|a| (name.clone(), a))
                    .map_err(|e| {
                        Error::ledger(path, format!("invalid address for '{}': {}", name, e))
                    })
            })
            .collect()
    }

    fn store(&self, path: &Path, book: &AddressBook) -> Result<()> {
        let raw: BTreeMap<&str, String> = book
            .iter()
            .map(|(name, address)| (name.as_str(), address.to_checksum(None)))
            .collect();
        let mut content =
            serde_json::to_string_pretty(&raw).map_err(|e| Error::ledger(path, e))?;
        content.push('\n');

        std::fs::create_dir_all(&self.dir).map_err(|e| Error::ledger(&self.dir, e))?;

        // Write to a sibling file then rename so readers never see a partial file
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).map_err(|e| Error::ledger(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| Error::ledger(path, e))?;
        Ok(())
    }
}

impl AddressStore for JsonLedger {
    fn read_all(&self, chain_id: ChainId) -> Result<AddressBook> {
        self.load(&self.path_for(chain_id))
    }

    fn record(&self, chain_id: ChainId, name: &str, address: Address) -> Result<()> {
        let path = self.path_for(chain_id);

        let mut book = self.load(&path)?;
        let previous = book.insert(name.to_string(), address);
        self.store(&path, &book)?;

        match previous {
            Some(old) if old != address => tracing::info!(
                chain_id = %chain_id,
                name,
                address = %address,
                previous = %old,
                file = %path.display(),
                "Ledger entry overwritten"
            ),
            _ => tracing::info!(
                chain_id = %chain_id,
                name,
                address = %address,
                file = %path.display(),
                "Ledger entry recorded"
            ),
        }
        Ok(())
    }
}
