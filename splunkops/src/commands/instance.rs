use std::sync::Arc;

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use clap::{Args, Subcommand};

use super::print_json;
use crate::ec2::{self, parse_tag, ComputeProvisioner, InstanceFilter, LaunchRequest, Tags};

#[derive(Args, Debug)]
pub struct Instance {
  #[command(subcommand)]
  pub command: InstanceCommands,
}

#[derive(Debug, Subcommand)]
pub enum InstanceCommands {
  /// Launch a single instance
  Create(Create),

  /// List instances, optionally filtered
  List {
    /// Filter as name=value[,value...], e.g. tag:App=Splunk or instance-state-name=running
    #[arg(long = "filter")]
    filters: Vec<InstanceFilter>,
  },

  /// Describe a single instance
  Describe { instance_id: String },

  Start { instance_id: String },

  Stop { instance_id: String },

  Terminate { instance_id: String },

  /// Add or overwrite tags on an instance
  Tag {
    instance_id: String,

    /// Tag as key=value; repeat for multiple tags
    #[arg(long = "tag", value_parser = parse_tag, required = true)]
    tags: Vec<(String, String)>,
  },

  /// Exit non-zero unless the instance has every tag with exactly the given value
  CheckTags {
    instance_id: String,

    #[arg(long = "tag", value_parser = parse_tag, required = true)]
    tags: Vec<(String, String)>,
  },

  /// Associate an IAM instance profile, by ARN or name
  AssociateRole { instance_id: String, role: String },
}

#[derive(Args, Debug)]
pub struct Create {
  /// Name tag of the instance
  #[arg(long)]
  pub name: String,

  #[arg(long, default_value = "t2.medium")]
  pub instance_type: String,

  /// AMI ID
  #[arg(long)]
  pub image_id: String,

  /// EC2 key pair name
  #[arg(long)]
  pub key_name: String,

  /// Security group ID; repeat for multiple groups
  #[arg(long = "security-group-id", required = true)]
  pub security_group_ids: Vec<String>,

  #[arg(long)]
  pub subnet_id: String,

  /// Additional tag as key=value; a Name tag here is replaced by --name
  #[arg(long = "tag", value_parser = parse_tag)]
  pub tags: Vec<(String, String)>,
}

impl Create {
  fn request(&self) -> LaunchRequest {
    LaunchRequest {
      instance_type: self.instance_type.clone(),
      image_id: self.image_id.clone(),
      key_name: self.key_name.clone(),
      security_group_ids: self.security_group_ids.clone(),
      subnet_id: self.subnet_id.clone(),
      name: self.name.clone(),
      tags: self.tags.iter().cloned().collect(),
    }
  }
}

fn to_tags(pairs: &[(String, String)]) -> Tags {
  pairs.iter().cloned().collect()
}

impl Instance {
  pub async fn run(&self, config: &SdkConfig) -> Result<()> {
    let provisioner = ComputeProvisioner::new(Arc::new(ec2::get_client(config)));

    match &self.command {
      InstanceCommands::Create(create) => match provisioner.create_instance(&create.request()).await {
        Some(instance_id) => println!("{instance_id}"),
        None => bail!("Failed to create instance {}", create.name),
      },
      InstanceCommands::List { filters } => print_json(&provisioner.list_instances(filters).await)?,
      InstanceCommands::Describe { instance_id } => match provisioner.describe_instance(instance_id).await {
        Some(instance) => print_json(&instance)?,
        None => bail!("Instance {instance_id} not found"),
      },
      InstanceCommands::Start { instance_id } => {
        if !provisioner.start_instance(instance_id).await {
          bail!("Failed to start instance {instance_id}");
        }
      }
      InstanceCommands::Stop { instance_id } => {
        if !provisioner.stop_instance(instance_id).await {
          bail!("Failed to stop instance {instance_id}");
        }
      }
      InstanceCommands::Terminate { instance_id } => {
        if !provisioner.terminate_instance(instance_id).await {
          bail!("Failed to terminate instance {instance_id}");
        }
      }
      InstanceCommands::Tag { instance_id, tags } => {
        if !provisioner.tag_instance(instance_id, &to_tags(tags)).await {
          bail!("Failed to tag instance {instance_id}");
        }
      }
      InstanceCommands::CheckTags { instance_id, tags } => {
        if !provisioner.check_tags(instance_id, &to_tags(tags)).await {
          bail!("Instance {instance_id} does not have the required tags");
        }
      }
      InstanceCommands::AssociateRole { instance_id, role } => {
        if !provisioner.associate_role(instance_id, role).await {
          bail!("Failed to associate {role} with instance {instance_id}");
        }
      }
    }

    Ok(())
  }
}
