//! Run a deployment plan

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use dialoguer::Confirm;
use waybill_core::{
    AlloyNetwork, DeploymentExecutor, DeploymentPlan, JsonLedger, Network, PlanRunner,
    PreparedPlan, PreparedStep, RecordedPolicy, RunObserver, StepOutcome,
};

use crate::config::ProjectConfig;

/// Run a deployment plan (dry run unless --broadcast)
#[derive(Args)]
pub struct DeployCommand {
    /// Deployment plan file
    #[arg(default_value = "deploy.toml")]
    pub plan: PathBuf,

    /// Network name from [networks] in waybill.toml
    #[arg(long, short)]
    pub network: Option<String>,

    /// RPC endpoint, used when --network is not given
    #[arg(long, env = "ETH_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Hex private key of the deployer
    #[arg(long, env = "ETH_FROM_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Actually send transactions
    #[arg(long)]
    pub broadcast: bool,

    /// Attach to names already in the ledger instead of redeploying them
    #[arg(long)]
    pub skip_recorded: bool,

    /// Do not ask for confirmation before broadcasting
    #[arg(long, short)]
    pub yes: bool,

    /// Blocks to wait for (overrides waybill.toml)
    #[arg(long)]
    pub confirmations: Option<u64>,
}

impl DeployCommand {
    pub async fn run(self) -> Result<()> {
        let config = ProjectConfig::load()?;
        let plan = DeploymentPlan::load(&self.plan)?;
        let rpc_url = config.rpc_url(self.network.as_deref(), self.rpc_url.as_deref())?;

        let mut policy = config.confirmation.policy();
        if let Some(confirmations) = self.confirmations {
            policy.confirmations = confirmations;
        }
        let recorded_policy = if self.skip_recorded {
            RecordedPolicy::Skip
        } else {
            RecordedPolicy::Redeploy
        };

        println!(
            "{} Connecting to {}...",
            style("→").blue(),
            style(self.network.as_deref().unwrap_or(&rpc_url)).cyan()
        );
        let network: Arc<dyn Network> = Arc::new(AlloyNetwork::connect(&rpc_url, &self.private_key)?);
        let sender = network.sender();

        let resolver = config.artifact_resolver()?;
        let ledger = JsonLedger::new(&config.ledger_dir);
        let runner = PlanRunner::new(
            Arc::clone(&network),
            &*resolver,
            &ledger,
            DeploymentExecutor::new(policy),
        )
        .with_recorded_policy(recorded_policy);

        let prepared = runner.prepare(&plan).await?;
        print_plan(&prepared, recorded_policy);

        if !self.broadcast {
            println!();
            println!(
                "{} Dry run complete. Use {} to actually deploy.",
                style("ℹ").blue(),
                style("--broadcast").yellow()
            );
            return Ok(());
        }

        if !self.yes {
            println!();
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Broadcast {} step(s) to chain {} from {}?",
                    prepared.steps.len(),
                    prepared.chain_id,
                    sender
                ))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{} Cancelled", style("*").dim());
                return Ok(());
            }
        }

        let chain_id = prepared.chain_id;
        println!();
        let report = runner.execute(prepared, &mut ConsoleObserver).await?;

        let deployed = report
            .outcomes
            .iter()
            .filter(|o| matches!(o, StepOutcome::Deployed { .. }))
            .count();

        println!();
        println!(
            "{} {} step(s) done, {} contract(s) deployed and recorded in {}",
            style("✓").green().bold(),
            report.outcomes.len(),
            deployed,
            ledger.path_for(chain_id).display()
        );

        Ok(())
    }
}

fn print_plan(prepared: &PreparedPlan, recorded_policy: RecordedPolicy) {
    println!(
        "{} Plan for chain {} ({} step(s)):",
        style("ℹ").blue(),
        style(prepared.chain_id).cyan(),
        prepared.steps.len()
    );

    for (i, step) in prepared.steps.iter().enumerate() {
        match step {
            PreparedStep::Deploy {
                name,
                artifact,
                recorded,
                ..
            } => {
                let note = match (recorded, recorded_policy) {
                    (Some(address), RecordedPolicy::Skip) => {
                        format!(" (recorded at {}, will reuse)", address)
                    }
                    (Some(address), RecordedPolicy::Redeploy) => {
                        format!(" (recorded at {}, will redeploy)", address)
                    }
                    (None, _) => String::new(),
                };
                println!(
                    "  {:>2}. deploy {} from {}{}",
                    i + 1,
                    style(name).cyan(),
                    artifact,
                    style(note).dim()
                );
            }
            PreparedStep::Call { label, .. } => {
                println!("  {:>2}. call   {}", i + 1, style(label).cyan());
            }
        }
    }
}

/// Prints one progress line per step
struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn step_started(&mut self, step: &PreparedStep) {
        let verb = match step {
            PreparedStep::Deploy { .. } => "Deploying",
            PreparedStep::Call { .. } => "Calling",
        };
        println!("{} {} {}...", style("→").blue(), verb, style(step.label()).cyan());
    }

    fn step_finished(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Deployed {
                name,
                address,
                tx_hash,
                ..
            } => println!(
                "{} {} deployed at {} (tx {})",
                style("✓").green(),
                style(name).cyan(),
                style(address).yellow(),
                tx_hash
            ),
            StepOutcome::Reused { name, address } => println!(
                "{} {} already recorded at {}, skipped",
                style("⚠").yellow(),
                style(name).cyan(),
                style(address).yellow()
            ),
            StepOutcome::Sent { label, tx_hash, .. } => println!(
                "{} {} confirmed (tx {})",
                style("✓").green(),
                style(label).cyan(),
                tx_hash
            ),
            StepOutcome::Queried { label, outputs } => println!(
                "{} {} returned {}",
                style("ℹ").blue(),
                style(label).cyan(),
                serde_json::Value::Array(outputs.clone())
            ),
        }
    }
}
