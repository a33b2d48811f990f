use clap::Args;
use color_eyre::eyre::{eyre, Result};
use waybill_core::{AddressStore, ChainId, JsonLedger};

use crate::config::ProjectConfig;

/// Print the recorded address of one contract
#[derive(Args)]
pub struct GetCommand {
    /// Logical name the contract was recorded under
    pub name: String,

    #[arg(long)]
    pub chain_id: u64,
}

impl GetCommand {
    pub fn run(self) -> Result<()> {
        let config = ProjectConfig::load()?;
        let ledger = JsonLedger::new(&config.ledger_dir);

        match ledger.get(ChainId(self.chain_id), &self.name)? {
            Some(address) => {
                // Just print the address for easy scripting: $(waybill get Oracle --chain-id 1)
                println!("{}", address.to_checksum(None));
                Ok(())
            }
            None => Err(eyre!(
                "No address recorded for '{}' on chain {}",
                self.name,
                self.chain_id
            )),
        }
    }
}
