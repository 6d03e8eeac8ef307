pub mod agent;
pub mod cli;
pub mod cloudwatch;
pub mod commands;
pub mod configure;
pub mod ec2;
pub mod error;
pub mod s3;
pub mod secrets;
pub mod splunk;
pub mod ssh;
pub mod ssm;

#[cfg(test)]
pub(crate) mod testing;

use std::env;

use anyhow::Result;
use aws_config::{meta::region::RegionProviderChain, retry::RetryConfig, BehaviorVersion, SdkConfig};
use aws_types::region::Region;
pub use cli::{Cli, Commands};

/// Get the configuration to authn/authz with AWS that will be used across AWS clients
///
/// Retries are disabled on every client built from this configuration; each operation is a
/// single request and callers decide whether to try again.
pub async fn get_sdk_config(region: Option<String>) -> Result<SdkConfig> {
  let aws_region = match region {
    Some(region) => Some(Region::new(region)),
    None => env::var("AWS_DEFAULT_REGION").ok().map(Region::new),
  };

  let region_provider = RegionProviderChain::first_try(aws_region).or_default_provider();

  Ok(
    aws_config::defaults(BehaviorVersion::latest())
      .region(region_provider)
      .retry_config(RetryConfig::disabled())
      .load()
      .await,
  )
}
