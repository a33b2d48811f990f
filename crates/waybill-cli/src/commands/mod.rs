//! CLI commands for waybill

use clap::Subcommand;
use color_eyre::eyre::Result;

pub mod artifacts;
pub mod deploy;
pub mod get;
pub mod init;
pub mod list;

/// All available CLI commands
#[derive(Subcommand)]
pub enum Command {
    /// Write a starter waybill.toml and deploy.toml
    Init(init::InitCommand),

    /// Run a deployment plan (dry run unless --broadcast)
    Deploy(deploy::DeployCommand),

    /// List contracts available in the artifact bundle
    Artifacts(artifacts::ArtifactsCommand),

    /// Print the recorded addresses of a chain
    List(list::ListCommand),

    /// Print the recorded address of one contract
    Get(get::GetCommand),
}

impl Command {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        match self {
            Command::Init(cmd) => cmd.run(),
            Command::Deploy(cmd) => cmd.run().await,
            Command::Artifacts(cmd) => cmd.run(),
            Command::List(cmd) => cmd.run(),
            Command::Get(cmd) => cmd.run(),
        }
    }
}
