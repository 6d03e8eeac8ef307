use anyhow::Result;
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::{print_json, SplunkArgs};

#[derive(Args, Debug)]
pub struct Server {
  #[command(subcommand)]
  pub command: ServerCommands,

  #[clap(flatten)]
  pub splunk: SplunkArgs,
}

#[derive(Debug, Subcommand)]
pub enum ServerCommands {
  /// Request a restart of splunkd
  Restart,

  /// Print server version and host details
  Info,
}

impl Server {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let client = self.splunk.client(config).await?;

    match &self.command {
      ServerCommands::Restart => print_json(&client.restart_server().await?),
      ServerCommands::Info => print_json(&client.server_info().await?),
    }
  }
}
