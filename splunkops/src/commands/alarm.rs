use std::sync::Arc;

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::print_json;
use crate::cloudwatch::{self, AlarmSpec, InstanceMonitor, DEFAULT_METRIC};

#[derive(Args, Debug)]
pub struct Alarm {
  #[command(subcommand)]
  pub command: AlarmCommands,
}

#[derive(Debug, Subcommand)]
pub enum AlarmCommands {
  /// Create or replace a metric alarm on an instance
  Create {
    instance_id: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    threshold: f64,

    #[arg(long, default_value = DEFAULT_METRIC)]
    metric: String,

    /// GreaterThanThreshold, GreaterThanOrEqualToThreshold, LessThanThreshold or LessThanOrEqualToThreshold
    #[arg(long, default_value = "GreaterThanThreshold")]
    comparison_operator: String,
  },

  /// List the alarms on an instance's metric
  List {
    instance_id: String,

    #[arg(long, default_value = DEFAULT_METRIC)]
    metric: String,
  },
}

impl Alarm {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let monitor = InstanceMonitor::new(Arc::new(cloudwatch::get_client(config)));

    match &self.command {
      AlarmCommands::Create {
        instance_id,
        name,
        threshold,
        metric,
        comparison_operator,
      } => {
        let spec = AlarmSpec::new(name, instance_id, metric, *threshold, comparison_operator);
        if !monitor.create_alarm(&spec).await {
          bail!("Failed to create alarm {name} on instance {instance_id}");
        }
      }
      AlarmCommands::List { instance_id, metric } => print_json(&monitor.list_alarms(instance_id, metric).await)?,
    }

    Ok(())
  }
}
