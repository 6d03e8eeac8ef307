use anyhow::Result;
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::{print_json, SplunkArgs};
use crate::splunk::{DEFAULT_EARLIEST, DEFAULT_LATEST};

#[derive(Args, Debug)]
pub struct Search {
  #[command(subcommand)]
  pub command: SearchCommands,

  #[clap(flatten)]
  pub splunk: SplunkArgs,
}

#[derive(Debug, Subcommand)]
pub enum SearchCommands {
  /// Submit a search job and print its results
  Run {
    /// SPL query; `search` is prepended unless it starts with `search` or `|`
    query: String,

    #[arg(long, default_value = DEFAULT_EARLIEST)]
    earliest: String,

    #[arg(long, default_value = DEFAULT_LATEST)]
    latest: String,
  },

  /// Print the results of an existing search job
  Results { sid: String },
}

impl Search {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let client = self.splunk.client(config).await?;

    match &self.command {
      SearchCommands::Run {
        query,
        earliest,
        latest,
      } => print_json(&client.execute_search(query, earliest, latest).await?),
      SearchCommands::Results { sid } => print_json(&client.get_results(sid).await?),
    }
  }
}
