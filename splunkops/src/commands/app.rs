use std::path::PathBuf;

use anyhow::Result;
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::{print_json, SplunkArgs};

#[derive(Args, Debug)]
pub struct App {
  #[command(subcommand)]
  pub command: AppCommands,

  #[clap(flatten)]
  pub splunk: SplunkArgs,
}

#[derive(Debug, Subcommand)]
pub enum AppCommands {
  /// Upload and install an app package
  Install {
    package: PathBuf,

    /// Replace the app if it is already installed
    #[arg(long)]
    update: bool,
  },

  List,

  Delete {
    name: String,
  },
}

impl App {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let client = self.splunk.client(config).await?;

    match &self.command {
      AppCommands::Install { package, update } => print_json(&client.install_app(package, *update).await?),
      AppCommands::List => print_json(&client.list_apps().await?),
      AppCommands::Delete { name } => print_json(&client.delete_app(name).await?),
    }
  }
}
