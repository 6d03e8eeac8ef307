use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatch::types::{ComparisonOperator, Dimension, Statistic};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const EC2_NAMESPACE: &str = "AWS/EC2";

pub const DEFAULT_METRIC: &str = "CPUUtilization";

/// A metric alarm on a single instance
#[derive(Clone, Debug, PartialEq)]
pub struct AlarmSpec {
  pub name: String,
  pub instance_id: String,
  pub metric_name: String,
  pub threshold: f64,
  /// e.g. `GreaterThanThreshold`
  pub comparison_operator: String,
  pub period_secs: i32,
  pub evaluation_periods: i32,
}

impl AlarmSpec {
  /// Average over 300 second periods, alarming after a single breaching period
  pub fn new(
    name: impl Into<String>,
    instance_id: impl Into<String>,
    metric_name: impl Into<String>,
    threshold: f64,
    comparison_operator: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      instance_id: instance_id.into(),
      metric_name: metric_name.into(),
      threshold,
      comparison_operator: comparison_operator.into(),
      period_secs: 300,
      evaluation_periods: 1,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlarmSummary {
  pub name: String,
  pub state: Option<String>,
  pub threshold: Option<f64>,
}

#[async_trait]
pub trait AlarmApi: Send + Sync {
  async fn put_alarm(&self, spec: &AlarmSpec) -> Result<()>;

  async fn alarms_for_metric(&self, instance_id: &str, metric_name: &str) -> Result<Vec<AlarmSummary>>;
}

/// Construct and return the CloudWatch client
pub fn get_client(config: &SdkConfig) -> aws_sdk_cloudwatch::Client {
  aws_sdk_cloudwatch::Client::new(config)
}

fn instance_dimension(instance_id: &str) -> Dimension {
  Dimension::builder().name("InstanceId").value(instance_id).build()
}

#[async_trait]
impl AlarmApi for aws_sdk_cloudwatch::Client {
  async fn put_alarm(&self, spec: &AlarmSpec) -> Result<()> {
    self
      .put_metric_alarm()
      .alarm_name(&spec.name)
      .metric_name(&spec.metric_name)
      .namespace(EC2_NAMESPACE)
      .statistic(Statistic::Average)
      .period(spec.period_secs)
      .evaluation_periods(spec.evaluation_periods)
      .threshold(spec.threshold)
      .comparison_operator(ComparisonOperator::from(spec.comparison_operator.as_str()))
      .dimensions(instance_dimension(&spec.instance_id))
      .send()
      .await?;
    Ok(())
  }

  async fn alarms_for_metric(&self, instance_id: &str, metric_name: &str) -> Result<Vec<AlarmSummary>> {
    let response = self
      .describe_alarms_for_metric()
      .metric_name(metric_name)
      .namespace(EC2_NAMESPACE)
      .dimensions(instance_dimension(instance_id))
      .send()
      .await?;

    Ok(
      response
        .metric_alarms()
        .iter()
        .map(|alarm| AlarmSummary {
          name: alarm.alarm_name().unwrap_or_default().to_owned(),
          state: alarm.state_value().map(|s| s.as_str().to_owned()),
          threshold: alarm.threshold(),
        })
        .collect(),
    )
  }
}

/// CloudWatch alarms for instances running Splunk
#[derive(Clone)]
pub struct InstanceMonitor {
  api: Arc<dyn AlarmApi>,
}

impl InstanceMonitor {
  pub fn new(api: Arc<dyn AlarmApi>) -> Self {
    Self { api }
  }

  pub async fn create_alarm(&self, spec: &AlarmSpec) -> bool {
    match self.api.put_alarm(spec).await {
      Ok(()) => {
        info!("CloudWatch alarm '{}' created for instance {}", spec.name, spec.instance_id);
        true
      }
      Err(e) => {
        error!("Error creating CloudWatch alarm for instance {}: {e:#}", spec.instance_id);
        false
      }
    }
  }

  pub async fn list_alarms(&self, instance_id: &str, metric_name: &str) -> Vec<AlarmSummary> {
    match self.api.alarms_for_metric(instance_id, metric_name).await {
      Ok(alarms) => {
        info!("Found {} alarms for instance {instance_id}", alarms.len());
        alarms
      }
      Err(e) => {
        error!("Error listing CloudWatch alarms for instance {instance_id}: {e:#}");
        Vec::new()
      }
    }
  }
}
