pub mod agent;
pub mod alarm;
pub mod app;
pub mod command;
pub mod index;
pub mod instance;
pub mod object;
pub mod search;
pub mod server;
pub mod splunk;

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use clap::Args;
use serde::Serialize;

use crate::{secrets, splunk::SplunkClient};

/// Connection settings shared by the Splunk REST commands
#[derive(Args, Debug, Clone)]
pub struct SplunkArgs {
  /// Splunk management endpoint, e.g. https://splunk.example.com:8089
  #[arg(long, global = true, env = "SPLUNK_URL")]
  pub splunk_url: Option<String>,

  /// Secrets Manager secret holding a JSON object with `username` and `password`
  #[arg(long, global = true, env = "SPLUNK_SECRET_NAME")]
  pub secret_name: Option<String>,
}

impl SplunkArgs {
  /// Resolve the credentials and build the REST client
  pub async fn client(&self, config: &SdkConfig) -> Result<SplunkClient> {
    let (Some(url), Some(secret_name)) = (&self.splunk_url, &self.secret_name) else {
      bail!("--splunk-url and --secret-name (or SPLUNK_URL and SPLUNK_SECRET_NAME) are required");
    };

    let secrets = secrets::get_client(config);
    let client = SplunkClient::new(url, secret_name, &secrets).await?;

    Ok(client)
  }
}

/// Write a value to stdout as pretty JSON
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
