//! List compiled contracts

use clap::Args;
use color_eyre::eyre::Result;
use console::style;

use crate::config::ProjectConfig;

/// List contracts available in the artifact bundle
#[derive(Args)]
pub struct ArtifactsCommand {
    /// Include interfaces and abstract contracts
    #[arg(long)]
    pub all: bool,
}

impl ArtifactsCommand {
    pub fn run(self) -> Result<()> {
        let config = ProjectConfig::load()?;
        let resolver = config.artifact_resolver()?;

        let artifacts: Vec<_> = resolver
            .list()?
            .into_iter()
            .filter(|a| self.all || a.has_bytecode)
            .collect();

        if artifacts.is_empty() {
            println!(
                "No contracts found in {}. Did you compile?",
                config.artifacts.display()
            );
            return Ok(());
        }

        println!("{:<30} {:<12} {}", "Contract", "Args", "Artifact");
        println!("{}", "-".repeat(90));
        for artifact in &artifacts {
            let args = if artifact.has_constructor { "yes" } else { "-" };
            let name = if artifact.has_bytecode {
                style(&artifact.key.contract).cyan()
            } else {
                style(&artifact.key.contract).dim()
            };
            println!("{:<30} {:<12} {}", name, args, artifact.key);
        }

        println!();
        println!("Total: {} contract(s)", artifacts.len());
        Ok(())
    }
}
