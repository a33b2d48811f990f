//! Initialize waybill in a project

use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::eyre::{eyre, Result};
use console::style;

use crate::config::CONFIG_FILE;

const PLAN_FILE: &str = "deploy.toml";

const STARTER_CONFIG: &str = r#"# Compiled contracts: a solc standard-JSON bundle or a Foundry out/ directory
artifacts = "out/dapp.sol.json"

# One <chainId>.json address ledger per chain is kept here
ledger_dir = "."

[confirmation]
confirmations = 1
timeout_secs = 600

[networks]
local = "http://localhost:8545"
# mainnet = "${MAINNET_RPC_URL}"
"#;

const STARTER_PLAN: &str = r#"# Steps run in dependency order. "${Name}" is replaced by the address
# deployed (or already recorded) under Name.

# [[steps]]
# action = "deploy"
# name = "ElementVP"
# artifact = "src/valueprovider/ElementFinance/ElementFinanceValueProvider.sol:ElementFinanceValueProvider"
# args = []
#
# [[steps]]
# action = "deploy"
# name = "ElementOracle"
# artifact = "src/oracle/Oracle.sol:Oracle"
# args = ["${ElementVP}", "600", "1200", "100000000000000000"]
#
# [[steps]]
# action = "call"
# target = "ElementOracle"
# function = "update"
"#;

/// Write a starter waybill.toml and deploy.toml
#[derive(Args)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

impl InitCommand {
    pub fn run(self) -> Result<()> {
        let config_path = self.dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(eyre!(
                "Waybill is already initialized in this project ({} exists)",
                config_path.display()
            ));
        }

        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&config_path, STARTER_CONFIG)?;
        println!("{} Created {}", style("✓").green(), CONFIG_FILE);

        let plan_path = self.dir.join(PLAN_FILE);
        if write_if_missing(&plan_path, STARTER_PLAN)? {
            println!("{} Created {}", style("✓").green(), PLAN_FILE);
        } else {
            println!(
                "{} {} already exists, left untouched",
                style("ℹ").blue(),
                PLAN_FILE
            );
        }

        println!();
        println!(
            "{} Waybill initialized successfully!",
            style("✓").green().bold()
        );
        println!();
        println!("Next steps:");
        println!(
            "  1. Configure networks in {} under {}",
            CONFIG_FILE,
            style("[networks]").cyan()
        );
        println!("  2. Describe your contracts in {}", PLAN_FILE);
        println!(
            "  3. Run {} to check the plan, add {} to send it",
            style("waybill deploy --network <name>").cyan(),
            style("--broadcast").yellow()
        );

        Ok(())
    }
}

fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, content)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use tempfile::TempDir;
    use waybill_core::DeploymentPlan;

    #[test]
    fn test_init_writes_starter_files() {
        let dir = TempDir::new().unwrap();
        InitCommand {
            dir: dir.path().to_path_buf(),
        }
        .run()
        .unwrap();

        let config = ProjectConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.network_url("local").unwrap(), "http://localhost:8545");

        let plan = DeploymentPlan::load(&dir.path().join(PLAN_FILE)).unwrap();
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn test_init_refuses_existing_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "ledger_dir = \"x\"\n").unwrap();

        let result = InitCommand {
            dir: dir.path().to_path_buf(),
        }
        .run();
        assert!(result.is_err());

        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "ledger_dir = \"x\"\n");
    }

    #[test]
    fn test_init_keeps_existing_plan() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PLAN_FILE), "# mine\n").unwrap();

        InitCommand {
            dir: dir.path().to_path_buf(),
        }
        .run()
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join(PLAN_FILE)).unwrap();
        assert_eq!(content, "# mine\n");
    }

    #[test]
    fn test_starter_plan_example_parses() {
        let uncommented: String = STARTER_PLAN
            .lines()
            .filter_map(|line| line.strip_prefix("# ").or(line.strip_prefix('#')))
            .filter(|line| line.starts_with('[') || line.contains(" = "))
            .map(|line| format!("{}\n", line))
            .collect();

        let plan = DeploymentPlan::from_toml(&uncommented).unwrap();
        assert_eq!(plan.steps.len(), 3);
    }
}
