use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::types::{
  Filter, IamInstanceProfileSpecification, InstanceType, ResourceType, Tag, TagSpecification,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Tag key to tag value; keys are unique
pub type Tags = BTreeMap<String, String>;

/// Lifecycle state of an instance as reported by EC2
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
  Pending,
  Running,
  ShuttingDown,
  Stopping,
  Stopped,
  Terminated,
  Unknown(String),
}

impl From<&str> for InstanceState {
  fn from(state: &str) -> Self {
    match state {
      "pending" => Self::Pending,
      "running" => Self::Running,
      "shutting-down" => Self::ShuttingDown,
      "stopping" => Self::Stopping,
      "stopped" => Self::Stopped,
      "terminated" => Self::Terminated,
      other => Self::Unknown(other.to_owned()),
    }
  }
}

/// An EC2 instance, reduced to the details used when deploying Splunk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
  pub id: String,
  pub instance_type: String,
  pub image_id: String,
  pub key_name: Option<String>,
  pub security_group_ids: Vec<String>,
  pub subnet_id: Option<String>,
  /// Value of the `Name` tag
  pub name: Option<String>,
  pub public_ip: Option<String>,
  pub state: InstanceState,
  pub tags: Tags,
}

impl From<&aws_sdk_ec2::types::Instance> for Instance {
  fn from(instance: &aws_sdk_ec2::types::Instance) -> Self {
    let tags: Tags = instance
      .tags()
      .iter()
      .filter_map(|t| Some((t.key()?.to_owned(), t.value().unwrap_or_default().to_owned())))
      .collect();

    let state = instance
      .state()
      .and_then(|s| s.name())
      .map(|n| InstanceState::from(n.as_str()))
      .unwrap_or_else(|| InstanceState::Unknown("unknown".to_owned()));

    Instance {
      id: instance.instance_id().unwrap_or_default().to_owned(),
      instance_type: instance
        .instance_type()
        .map(|t| t.as_str().to_owned())
        .unwrap_or_default(),
      image_id: instance.image_id().unwrap_or_default().to_owned(),
      key_name: instance.key_name().map(str::to_owned),
      security_group_ids: instance
        .security_groups()
        .iter()
        .filter_map(|g| g.group_id())
        .map(str::to_owned)
        .collect(),
      subnet_id: instance.subnet_id().map(str::to_owned),
      name: tags.get("Name").cloned(),
      public_ip: instance.public_ip_address().map(str::to_owned),
      state,
      tags,
    }
  }
}

/// Parameters for launching a single instance
#[derive(Clone, Debug, Default)]
pub struct LaunchRequest {
  pub instance_type: String,
  pub image_id: String,
  pub key_name: String,
  pub security_group_ids: Vec<String>,
  pub subnet_id: String,
  pub name: String,
  pub tags: Tags,
}

impl LaunchRequest {
  /// Tags applied at launch
  ///
  /// `Name` is always present and set to the instance name; additional tags are merged in
  /// with a `Name` among them being overridden by the instance name.
  pub fn launch_tags(&self) -> Tags {
    let mut tags = self.tags.clone();
    tags.insert("Name".to_owned(), self.name.clone());
    tags
  }
}

/// A `describe-instances` filter, `name=value1,value2` on the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceFilter {
  pub name: String,
  pub values: Vec<String>,
}

impl FromStr for InstanceFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (name, values) = s
      .split_once('=')
      .ok_or_else(|| format!("invalid filter '{s}', expected name=value[,value...]"))?;
    if name.is_empty() || values.is_empty() {
      return Err(format!("invalid filter '{s}', expected name=value[,value...]"));
    }

    Ok(InstanceFilter {
      name: name.to_owned(),
      values: values.split(',').map(str::to_owned).collect(),
    })
  }
}

impl fmt::Display for InstanceFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}={}", self.name, self.values.join(","))
  }
}

impl From<&InstanceFilter> for Filter {
  fn from(filter: &InstanceFilter) -> Self {
    Filter::builder()
      .name(&filter.name)
      .set_values(Some(filter.values.clone()))
      .build()
  }
}

/// Parse a `key=value` tag argument
pub fn parse_tag(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
    _ => Err(format!("invalid tag '{s}', expected key=value")),
  }
}

/// The instance management calls made against EC2
#[async_trait]
pub trait ComputeApi: Send + Sync {
  /// Launch exactly one instance, returning its ID
  async fn launch_instance(&self, request: &LaunchRequest) -> Result<String>;

  /// Describe instances by ID and/or filter; both empty describes every instance
  async fn find_instances(&self, instance_ids: &[String], filters: &[InstanceFilter]) -> Result<Vec<Instance>>;

  async fn start_instance(&self, instance_id: &str) -> Result<()>;

  async fn stop_instance(&self, instance_id: &str) -> Result<()>;

  async fn terminate_instance(&self, instance_id: &str) -> Result<()>;

  async fn apply_tags(&self, instance_id: &str, tags: &Tags) -> Result<()>;

  /// Associate an instance profile, given either its ARN or its name
  async fn attach_instance_profile(&self, instance_id: &str, profile: &str) -> Result<()>;
}

/// Construct and return the EC2 client
pub fn get_client(config: &SdkConfig) -> aws_sdk_ec2::Client {
  aws_sdk_ec2::Client::new(config)
}

fn to_sdk_tags(tags: &Tags) -> Vec<Tag> {
  tags.iter().map(|(k, v)| Tag::builder().key(k).value(v).build()).collect()
}

#[async_trait]
impl ComputeApi for aws_sdk_ec2::Client {
  async fn launch_instance(&self, request: &LaunchRequest) -> Result<String> {
    let tag_spec = TagSpecification::builder()
      .resource_type(ResourceType::Instance)
      .set_tags(Some(to_sdk_tags(&request.launch_tags())))
      .build();

    let response = self
      .run_instances()
      .instance_type(InstanceType::from(request.instance_type.as_str()))
      .image_id(&request.image_id)
      .key_name(&request.key_name)
      .set_security_group_ids(Some(request.security_group_ids.clone()))
      .subnet_id(&request.subnet_id)
      .min_count(1)
      .max_count(1)
      .tag_specifications(tag_spec)
      .send()
      .await?;

    response
      .instances()
      .first()
      .and_then(|i| i.instance_id())
      .map(str::to_owned)
      .ok_or_else(|| anyhow!("RunInstances response did not include an instance"))
  }

  async fn find_instances(&self, instance_ids: &[String], filters: &[InstanceFilter]) -> Result<Vec<Instance>> {
    let pages = self
      .describe_instances()
      .set_instance_ids((!instance_ids.is_empty()).then(|| instance_ids.to_vec()))
      .set_filters((!filters.is_empty()).then(|| filters.iter().map(Filter::from).collect()))
      .into_paginator()
      .send()
      .try_collect()
      .await?;

    Ok(
      pages
        .iter()
        .flat_map(|page| page.reservations())
        .flat_map(|reservation| reservation.instances())
        .map(Instance::from)
        .collect(),
    )
  }

  async fn start_instance(&self, instance_id: &str) -> Result<()> {
    self.start_instances().instance_ids(instance_id).send().await?;
    Ok(())
  }

  async fn stop_instance(&self, instance_id: &str) -> Result<()> {
    self.stop_instances().instance_ids(instance_id).send().await?;
    Ok(())
  }

  async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
    self.terminate_instances().instance_ids(instance_id).send().await?;
    Ok(())
  }

  async fn apply_tags(&self, instance_id: &str, tags: &Tags) -> Result<()> {
    self
      .create_tags()
      .resources(instance_id)
      .set_tags(Some(to_sdk_tags(tags)))
      .send()
      .await?;
    Ok(())
  }

  async fn attach_instance_profile(&self, instance_id: &str, profile: &str) -> Result<()> {
    let spec = match profile.starts_with("arn:") {
      true => IamInstanceProfileSpecification::builder().arn(profile).build(),
      false => IamInstanceProfileSpecification::builder().name(profile).build(),
    };

    self
      .associate_iam_instance_profile()
      .instance_id(instance_id)
      .iam_instance_profile(spec)
      .send()
      .await?;
    Ok(())
  }
}

/// True when every required tag is present with exactly the required value
pub fn has_tags(tags: &Tags, required: &Tags) -> bool {
  required.iter().all(|(key, value)| tags.get(key) == Some(value))
}

/// Creates instances and manages their lifecycle
///
/// Every operation is a single call; provider errors are logged and reported as `None`,
/// `false` or an empty list.
#[derive(Clone)]
pub struct ComputeProvisioner {
  api: Arc<dyn ComputeApi>,
}

impl ComputeProvisioner {
  pub fn new(api: Arc<dyn ComputeApi>) -> Self {
    Self { api }
  }

  /// Launch an instance, returning its ID
  pub async fn create_instance(&self, request: &LaunchRequest) -> Option<String> {
    match self.api.launch_instance(request).await {
      Ok(instance_id) => {
        info!("Provisioned EC2 instance with ID: {instance_id}");
        Some(instance_id)
      }
      Err(e) => {
        error!("Error provisioning EC2 instance {}: {e:#}", request.name);
        None
      }
    }
  }

  pub async fn list_instances(&self, filters: &[InstanceFilter]) -> Vec<Instance> {
    match self.api.find_instances(&[], filters).await {
      Ok(instances) => {
        info!("Found {} instances", instances.len());
        instances
      }
      Err(e) => {
        error!("Error listing instances: {e:#}");
        Vec::new()
      }
    }
  }

  pub async fn describe_instance(&self, instance_id: &str) -> Option<Instance> {
    match self.api.find_instances(&[instance_id.to_owned()], &[]).await {
      Ok(instances) => {
        let instance = instances.into_iter().find(|i| i.id == instance_id);
        if instance.is_none() {
          warn!("Instance {instance_id} not found");
        }
        instance
      }
      Err(e) => {
        error!("Error describing instance {instance_id}: {e:#}");
        None
      }
    }
  }

  /// The public IPv4 address of the instance, if it has one
  pub async fn public_address(&self, instance_id: &str) -> Option<String> {
    let address = self.describe_instance(instance_id).await?.public_ip;
    if address.is_none() {
      warn!("Instance {instance_id} does not have a public IP");
    }
    address
  }

  pub async fn start_instance(&self, instance_id: &str) -> bool {
    match self.api.start_instance(instance_id).await {
      Ok(()) => {
        info!("Instance {instance_id} started");
        true
      }
      Err(e) => {
        error!("Error starting instance {instance_id}: {e:#}");
        false
      }
    }
  }

  pub async fn stop_instance(&self, instance_id: &str) -> bool {
    match self.api.stop_instance(instance_id).await {
      Ok(()) => {
        info!("Instance {instance_id} stopped");
        true
      }
      Err(e) => {
        error!("Error stopping instance {instance_id}: {e:#}");
        false
      }
    }
  }

  pub async fn terminate_instance(&self, instance_id: &str) -> bool {
    match self.api.terminate_instance(instance_id).await {
      Ok(()) => {
        info!("Instance {instance_id} terminated");
        true
      }
      Err(e) => {
        error!("Error terminating instance {instance_id}: {e:#}");
        false
      }
    }
  }

  pub async fn tag_instance(&self, instance_id: &str, tags: &Tags) -> bool {
    match self.api.apply_tags(instance_id, tags).await {
      Ok(()) => {
        info!("Applied {} tags to instance {instance_id}", tags.len());
        true
      }
      Err(e) => {
        error!("Error tagging instance {instance_id}: {e:#}");
        false
      }
    }
  }

  /// Check that the instance carries every required tag with exactly the required value
  pub async fn check_tags(&self, instance_id: &str, required: &Tags) -> bool {
    let Some(instance) = self.describe_instance(instance_id).await else {
      return false;
    };

    for (key, value) in required {
      if instance.tags.get(key) != Some(value) {
        warn!("Instance {instance_id} is missing required tag: {key}={value}");
      }
    }

    let result = has_tags(&instance.tags, required);
    if result {
      info!("Instance {instance_id} has all required tags");
    }
    result
  }

  /// Associate an IAM instance profile (by ARN or name) with the instance
  pub async fn associate_role(&self, instance_id: &str, role: &str) -> bool {
    match self.api.attach_instance_profile(instance_id, role).await {
      Ok(()) => {
        info!("Associated IAM role {role} with instance {instance_id}");
        true
      }
      Err(e) => {
        error!("Error associating IAM role with instance {instance_id}: {e:#}");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;
  use crate::testing::FakeCompute;

  fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  fn request() -> LaunchRequest {
    LaunchRequest {
      instance_type: "t2.medium".to_owned(),
      image_id: "ami-0abcdef1234567890".to_owned(),
      key_name: "my-key-pair".to_owned(),
      security_group_ids: vec!["sg-12345678".to_owned()],
      subnet_id: "subnet-abcde123".to_owned(),
      name: "splunk-indexer".to_owned(),
      tags: tags(&[("App", "Splunk")]),
    }
  }

  #[rstest]
  #[case(&[("App", "Splunk"), ("Env", "prod")], &[("App", "Splunk")], true)]
  #[case(&[("App", "Splunk"), ("Env", "prod")], &[("App", "Splunk"), ("Env", "prod")], true)]
  #[case(&[("App", "Splunk")], &[], true)]
  #[case(&[], &[], true)]
  #[case(&[("App", "Splunk")], &[("Env", "prod")], false)]
  #[case(&[("App", "Splunk")], &[("App", "splunk")], false)]
  #[case(&[("App", "Splunk")], &[("App", "")], false)]
  #[case(&[], &[("App", "Splunk")], false)]
  fn has_tags_test(#[case] present: &[(&str, &str)], #[case] required: &[(&str, &str)], #[case] expected: bool) {
    assert_eq!(has_tags(&tags(present), &tags(required)), expected);
  }

  #[rstest]
  #[case(&[], &[("Name", "splunk-indexer")])]
  #[case(&[("App", "Splunk")], &[("App", "Splunk"), ("Name", "splunk-indexer")])]
  #[case(&[("Name", "other"), ("App", "Splunk")], &[("App", "Splunk"), ("Name", "splunk-indexer")])]
  fn launch_tags_test(#[case] extra: &[(&str, &str)], #[case] expected: &[(&str, &str)]) {
    let req = LaunchRequest {
      tags: tags(extra),
      ..request()
    };
    assert_eq!(req.launch_tags(), tags(expected));
  }

  #[rstest]
  #[case("tag:App=splunk", "tag:App", &["splunk"])]
  #[case("instance-state-name=running,stopped", "instance-state-name", &["running", "stopped"])]
  fn filter_parse_test(#[case] input: &str, #[case] name: &str, #[case] values: &[&str]) {
    let filter: InstanceFilter = input.parse().unwrap();
    assert_eq!(filter.name, name);
    assert_eq!(filter.values, values);
    assert_eq!(filter.to_string(), input);
  }

  #[rstest]
  #[case("no-equals")]
  #[case("=value")]
  #[case("name=")]
  fn filter_parse_rejects(#[case] input: &str) {
    assert!(input.parse::<InstanceFilter>().is_err());
  }

  #[test]
  fn it_parses_tags() {
    assert_eq!(parse_tag("App=Splunk").unwrap(), ("App".to_owned(), "Splunk".to_owned()));
    assert_eq!(parse_tag("Empty=").unwrap(), ("Empty".to_owned(), String::new()));
    assert!(parse_tag("App").is_err());
    assert!(parse_tag("=Splunk").is_err());
  }

  #[tokio::test]
  async fn it_creates_an_instance() {
    let api = Arc::new(FakeCompute::default());
    let provisioner = ComputeProvisioner::new(api.clone());

    let id = provisioner.create_instance(&request()).await.unwrap();
    assert!(!id.is_empty());

    let instance = provisioner.describe_instance(&id).await.unwrap();
    assert_eq!(instance.state, InstanceState::Pending);
    assert_eq!(instance.name.as_deref(), Some("splunk-indexer"));
    assert_eq!(instance.tags, tags(&[("App", "Splunk"), ("Name", "splunk-indexer")]));
    assert_eq!(api.launches(), 1);
  }

  #[tokio::test]
  async fn it_returns_none_on_provider_error() {
    let api = Arc::new(FakeCompute::failing());
    let provisioner = ComputeProvisioner::new(api.clone());

    assert_eq!(provisioner.create_instance(&request()).await, None);
    assert_eq!(api.launches(), 1);
  }

  #[tokio::test]
  async fn it_reports_false_on_provider_error() {
    let provisioner = ComputeProvisioner::new(Arc::new(FakeCompute::failing()));

    assert!(!provisioner.start_instance("i-0123").await);
    assert!(!provisioner.stop_instance("i-0123").await);
    assert!(!provisioner.terminate_instance("i-0123").await);
    assert!(!provisioner.tag_instance("i-0123", &tags(&[("App", "Splunk")])).await);
    assert!(!provisioner.check_tags("i-0123", &Tags::new()).await);
    assert!(!provisioner.associate_role("i-0123", "splunk-role").await);
    assert!(provisioner.list_instances(&[]).await.is_empty());
    assert_eq!(provisioner.public_address("i-0123").await, None);
  }

  #[tokio::test]
  async fn it_manages_lifecycle() {
    let provisioner = ComputeProvisioner::new(Arc::new(FakeCompute::default()));
    let id = provisioner.create_instance(&request()).await.unwrap();

    assert!(provisioner.stop_instance(&id).await);
    assert_eq!(
      provisioner.describe_instance(&id).await.unwrap().state,
      InstanceState::Stopped
    );

    assert!(provisioner.start_instance(&id).await);
    assert_eq!(
      provisioner.describe_instance(&id).await.unwrap().state,
      InstanceState::Running
    );

    assert!(provisioner.terminate_instance(&id).await);
    assert_eq!(
      provisioner.describe_instance(&id).await.unwrap().state,
      InstanceState::Terminated
    );
  }

  #[tokio::test]
  async fn it_tags_and_checks_tags() {
    let provisioner = ComputeProvisioner::new(Arc::new(FakeCompute::default()));
    let id = provisioner.create_instance(&request()).await.unwrap();

    assert!(provisioner.check_tags(&id, &tags(&[("App", "Splunk")])).await);
    assert!(!provisioner.check_tags(&id, &tags(&[("Env", "prod")])).await);

    assert!(provisioner.tag_instance(&id, &tags(&[("Env", "prod")])).await);
    assert!(
      provisioner
        .check_tags(&id, &tags(&[("App", "Splunk"), ("Env", "prod")]))
        .await
    );
    assert!(!provisioner.check_tags(&id, &tags(&[("Env", "dev")])).await);
  }

  #[tokio::test]
  async fn it_checks_tags_on_unknown_instance() {
    let provisioner = ComputeProvisioner::new(Arc::new(FakeCompute::default()));
    assert!(!provisioner.check_tags("i-missing", &Tags::new()).await);
  }

  #[tokio::test]
  async fn it_lists_with_filters() {
    let provisioner = ComputeProvisioner::new(Arc::new(FakeCompute::default()));
    let first = provisioner.create_instance(&request()).await.unwrap();
    let second = provisioner
      .create_instance(&LaunchRequest {
        name: "splunk-search-head".to_owned(),
        ..request()
      })
      .await
      .unwrap();

    assert_eq!(provisioner.list_instances(&[]).await.len(), 2);

    let filter: InstanceFilter = "tag:Name=splunk-search-head".parse().unwrap();
    let found = provisioner.list_instances(&[filter]).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, second);
    assert_ne!(found[0].id, first);
  }

  #[tokio::test]
  async fn it_associates_role() {
    let api = Arc::new(FakeCompute::default());
    let provisioner = ComputeProvisioner::new(api.clone());
    let id = provisioner.create_instance(&request()).await.unwrap();

    assert!(
      provisioner
        .associate_role(&id, "arn:aws:iam::123456789012:instance-profile/splunk")
        .await
    );
    assert_eq!(
      api.profile(&id).as_deref(),
      Some("arn:aws:iam::123456789012:instance-profile/splunk")
    );
  }
}
