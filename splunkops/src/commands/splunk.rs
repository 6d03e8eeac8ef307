use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use crate::{
  agent::DEFAULT_SETTLE,
  configure::{read_config_map, ApplicationConfigurator},
  ssm::{self, RemoteCommandRunner},
};

#[derive(Args, Debug)]
pub struct Splunk {
  #[command(subcommand)]
  pub command: SplunkCommands,
}

#[derive(Debug, Subcommand)]
pub enum SplunkCommands {
  /// Download the Splunk package onto an instance and unpack it under /opt
  Deploy {
    instance_id: String,

    /// URL of the Splunk .tgz package
    #[arg(long)]
    package_url: String,
  },

  /// Write Splunk configuration files on an instance in a single command batch
  ///
  /// The config file is YAML mapping license, index, forwarder and search_head to the literal
  /// contents of license.conf, indexes.conf, inputs.conf and outputs.conf.
  Configure {
    instance_id: String,

    #[arg(long)]
    config: PathBuf,
  },

  /// Run `splunk status` on an instance once
  Health {
    instance_id: String,

    /// Seconds to wait between sending the check and reading its result
    #[arg(long, default_value_t = DEFAULT_SETTLE.as_secs())]
    settle_secs: u64,
  },
}

impl Splunk {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let configurator = ApplicationConfigurator::new(RemoteCommandRunner::new(Arc::new(ssm::get_client(config))));

    match &self.command {
      SplunkCommands::Deploy {
        instance_id,
        package_url,
      } => {
        if !configurator.deploy_package(instance_id, package_url).await {
          bail!("Failed to send Splunk deployment to instance {instance_id}");
        }
      }
      SplunkCommands::Configure {
        instance_id,
        config: path,
      } => {
        let config_map = read_config_map(path)?;
        if !configurator.configure(instance_id, &config_map).await {
          bail!("Failed to send Splunk configuration to instance {instance_id}");
        }
      }
      SplunkCommands::Health {
        instance_id,
        settle_secs,
      } => {
        let configurator = configurator.with_settle(Duration::from_secs(*settle_secs));
        if !configurator.health_check(instance_id).await {
          bail!("Splunk on instance {instance_id} is not healthy");
        }
        println!("healthy");
      }
    }

    Ok(())
  }
}
