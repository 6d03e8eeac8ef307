use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::print_json;
use crate::s3::{self, ObjectStoreClient};

#[derive(Args, Debug)]
pub struct Object {
  #[command(subcommand)]
  pub command: ObjectCommands,

  /// Bucket holding the artifacts
  #[arg(long, global = true, env = "SPLUNK_ARTIFACT_BUCKET")]
  pub bucket: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ObjectCommands {
  /// Upload a local file
  Upload { path: PathBuf, key: String },

  /// Download an object to a local file
  Download { key: String, path: PathBuf },

  /// List keys under a prefix
  List {
    #[arg(long, default_value = "")]
    prefix: String,
  },

  Delete { key: String },
}

impl Object {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let Some(bucket) = &self.bucket else {
      bail!("--bucket (or SPLUNK_ARTIFACT_BUCKET) is required");
    };
    let store = ObjectStoreClient::new(Arc::new(s3::get_client(config)));

    match &self.command {
      ObjectCommands::Upload { path, key } => {
        if !store.upload(bucket, key, path).await {
          bail!("Failed to upload {} to s3://{bucket}/{key}", path.display());
        }
      }
      ObjectCommands::Download { key, path } => {
        if !store.download(bucket, key, path).await {
          bail!("Failed to download s3://{bucket}/{key}");
        }
      }
      ObjectCommands::List { prefix } => print_json(&store.list(bucket, prefix).await)?,
      ObjectCommands::Delete { key } => {
        if !store.delete(bucket, key).await {
          bail!("Failed to delete s3://{bucket}/{key}");
        }
      }
    }

    Ok(())
  }
}
