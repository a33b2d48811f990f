//! Print recorded addresses

use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use waybill_core::{AddressStore, ChainId, JsonLedger};

use crate::config::ProjectConfig;

/// Print the recorded addresses of a chain
#[derive(Args)]
pub struct ListCommand {
    /// Only show this chain (all chains with a ledger file otherwise)
    #[arg(long)]
    pub chain_id: Option<u64>,
}

impl ListCommand {
    pub fn run(self) -> Result<()> {
        let config = ProjectConfig::load()?;
        let ledger = JsonLedger::new(&config.ledger_dir);

        let chains = match self.chain_id {
            Some(id) => vec![ChainId(id)],
            None => ledger.chains()?,
        };

        let mut total = 0;
        for chain_id in chains {
            let book = ledger.read_all(chain_id)?;
            if book.is_empty() {
                continue;
            }

            println!(
                "{} chain {} ({})",
                style("ℹ").blue(),
                style(chain_id).cyan(),
                ledger.path_for(chain_id).display()
            );
            println!("{:<30} {:<44}", "Name", "Address");
            println!("{}", "-".repeat(75));
            for (name, address) in &book {
                println!("{:<30} {:<44}", name, address.to_checksum(None));
            }
            println!();
            total += book.len();
        }

        if total == 0 {
            println!("No deployments found.");
            if self.chain_id.is_some() {
                println!(
                    "Try running without {} to see all chains.",
                    style("--chain-id").yellow()
                );
            }
            return Ok(());
        }

        println!("Total: {} deployment(s)", total);
        Ok(())
    }
}
