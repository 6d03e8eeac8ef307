use anyhow::Result;
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::{print_json, SplunkArgs};
use crate::splunk::IndexSpec;

#[derive(Args, Debug)]
pub struct Index {
  #[command(subcommand)]
  pub command: IndexCommands,

  #[clap(flatten)]
  pub splunk: SplunkArgs,
}

#[derive(Debug, Subcommand)]
pub enum IndexCommands {
  Create {
    name: String,

    /// Maximum total size of the index
    #[arg(long)]
    max_size_mb: Option<u64>,

    /// Path for hot and warm buckets, e.g. $SPLUNK_DB/<name>/db
    #[arg(long)]
    home_path: Option<String>,
  },

  Delete {
    name: String,
  },

  List,

  Get {
    name: String,
  },
}

impl Index {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let client = self.splunk.client(config).await?;

    match &self.command {
      IndexCommands::Create {
        name,
        max_size_mb,
        home_path,
      } => {
        let spec = IndexSpec {
          name: name.clone(),
          max_size_mb: *max_size_mb,
          home_path: home_path.clone(),
        };
        print_json(&client.create_index(&spec).await?)
      }
      IndexCommands::Delete { name } => print_json(&client.delete_index(name).await?),
      IndexCommands::List => print_json(&client.list_indexes().await?),
      IndexCommands::Get { name } => print_json(&client.get_index(name).await?),
    }
  }
}
