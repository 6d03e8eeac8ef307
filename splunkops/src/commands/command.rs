use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::print_json;
use crate::ssm::{self, RemoteCommandRunner};

#[derive(Args, Debug)]
pub struct Command {
  #[command(subcommand)]
  pub command: CommandCommands,
}

#[derive(Debug, Subcommand)]
pub enum CommandCommands {
  /// Send shell commands to an instance as one batch
  Run {
    instance_id: String,

    /// Commands, run in order
    #[arg(required = true)]
    commands: Vec<String>,
  },

  /// Check the status and output of a command invocation
  Result {
    command_id: String,

    instance_id: String,

    /// Poll until the invocation finishes or this many seconds pass, instead of checking once
    #[arg(long)]
    wait_secs: Option<u64>,

    /// Seconds between checks when waiting
    #[arg(long, default_value_t = 5, requires = "wait_secs", value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,
  },
}

impl Command {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let runner = RemoteCommandRunner::new(Arc::new(ssm::get_client(config)));

    match &self.command {
      CommandCommands::Run { instance_id, commands } => match runner.run_commands(instance_id, commands).await {
        Some(invocation) => print_json(&invocation)?,
        None => bail!("Failed to send commands to instance {instance_id}"),
      },
      CommandCommands::Result {
        command_id,
        instance_id,
        wait_secs,
        interval_secs,
      } => {
        let result = match wait_secs {
          Some(secs) => {
            runner
              .wait_for_invocation(
                command_id,
                instance_id,
                Duration::from_secs(*secs),
                Duration::from_secs(*interval_secs),
              )
              .await
          }
          None => runner.get_invocation_result(command_id, instance_id).await,
        };

        match result {
          Some(result) => print_json(&result)?,
          None => bail!("Unable to get the result of command {command_id} on instance {instance_id}"),
        }
      }
    }

    Ok(())
  }
}
