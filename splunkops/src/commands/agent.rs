use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use crate::{
  agent::{AgentInstaller, SshAgentInstaller, DEFAULT_SETTLE},
  ec2::{self, ComputeProvisioner},
  ssh::SshConnector,
  ssm::{self, RemoteCommandRunner},
};

#[derive(Args, Debug)]
pub struct Agent {
  #[command(subcommand)]
  pub command: AgentCommands,
}

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
  /// Probe the SSM agent once, sending the install sequence when it is not running
  ///
  /// Exits non-zero when the agent was not running; check again later to confirm an install.
  Check(Check),

  /// Send the install and start sequence for the SSM agent
  Install { instance_id: String },
}

#[derive(Args, Debug)]
pub struct Check {
  pub instance_id: String,

  /// Check and remediate over SSH to the instance's public address instead of SSM
  #[arg(long, requires = "key_path")]
  pub ssh: bool,

  /// Private key used for the SSH session
  #[arg(long)]
  pub key_path: Option<PathBuf>,

  #[arg(long, default_value = "ec2-user")]
  pub username: String,

  /// Seconds to wait between sending the probe and checking its result
  #[arg(long, default_value_t = DEFAULT_SETTLE.as_secs())]
  pub settle_secs: u64,
}

/// Region the SDK configuration resolved to, used to pick the agent distribution bucket
fn region(config: &SdkConfig) -> Result<String> {
  config
    .region()
    .map(|r| r.to_string())
    .ok_or_else(|| anyhow!("Unable to determine AWS region; pass --region"))
}

impl Agent {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    match &self.command {
      AgentCommands::Check(check) if check.ssh => {
        let key_path = check
          .key_path
          .as_ref()
          .ok_or_else(|| anyhow!("--key-path is required with --ssh"))?;
        let installer = SshAgentInstaller::new(
          ComputeProvisioner::new(Arc::new(ec2::get_client(config))),
          Arc::new(SshConnector::default()),
          &check.username,
          key_path,
        );

        if !installer.check_and_resolve(&check.instance_id).await {
          bail!("SSM agent is not running on instance {}", check.instance_id);
        }
        println!("active");
      }
      AgentCommands::Check(check) => {
        let installer = AgentInstaller::new(RemoteCommandRunner::new(Arc::new(ssm::get_client(config))), region(config)?)
          .with_settle(Duration::from_secs(check.settle_secs));

        if !installer.check_agent(&check.instance_id).await {
          bail!("SSM agent is not running on instance {}", check.instance_id);
        }
        println!("active");
      }
      AgentCommands::Install { instance_id } => {
        let installer = AgentInstaller::new(RemoteCommandRunner::new(Arc::new(ssm::get_client(config))), region(config)?);

        if !installer.install_agent(instance_id).await {
          bail!("Failed to send SSM agent installation to instance {instance_id}");
        }
      }
    }

    Ok(())
  }
}
