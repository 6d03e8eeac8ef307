use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::{
  ec2::ComputeProvisioner,
  ssh::{ShellConnector, ShellSession},
  ssm::RemoteCommandRunner,
};

/// Prints `active` (exit 0) when the agent is running
pub const AGENT_PROBE: &str = "systemctl is-active amazon-ssm-agent";

/// Wait between submitting a probe and checking its result
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(5);

/// Commands that install the SSM agent from the regional distribution bucket, then enable and start it
pub fn install_commands(region: &str) -> Vec<String> {
  vec![
    format!(
      "curl -fsSL https://amazon-ssm-{region}.s3.{region}.amazonaws.com/latest/linux_amd64/amazon-ssm-agent.rpm -o /tmp/amazon-ssm-agent.rpm"
    ),
    "sudo rpm -U --replacepkgs /tmp/amazon-ssm-agent.rpm".to_owned(),
    "sudo systemctl enable amazon-ssm-agent".to_owned(),
    "sudo systemctl start amazon-ssm-agent".to_owned(),
  ]
}

/// Checks the SSM agent on an instance and installs it when it is not running
#[derive(Clone)]
pub struct AgentInstaller {
  runner: RemoteCommandRunner,
  region: String,
  settle: Duration,
}

impl AgentInstaller {
  pub fn new(runner: RemoteCommandRunner, region: impl Into<String>) -> Self {
    Self {
      runner,
      region: region.into(),
      settle: DEFAULT_SETTLE,
    }
  }

  pub fn with_settle(mut self, settle: Duration) -> Self {
    self.settle = settle;
    self
  }

  /// Probe the agent once
  ///
  /// When the probe does not report the agent as active the install sequence is sent and `false`
  /// is returned; the caller checks again later to confirm. A failure to submit the probe or read
  /// its result returns `false` without attempting an install.
  pub async fn check_agent(&self, instance_id: &str) -> bool {
    let Some(result) = self
      .runner
      .probe(instance_id, &[AGENT_PROBE.to_owned()], self.settle)
      .await
    else {
      return false;
    };

    if result.succeeded() && result.stdout() == "active" {
      info!("SSM agent is running on instance {instance_id}");
      return true;
    }

    warn!(
      "SSM agent not running on instance {instance_id} (status: {:?}). Installing...",
      result.status
    );
    self.install_agent(instance_id).await;
    false
  }

  /// Send the install and start sequence; true when the submission succeeded
  pub async fn install_agent(&self, instance_id: &str) -> bool {
    match self
      .runner
      .run_commands(instance_id, &install_commands(&self.region))
      .await
    {
      Some(_) => {
        info!("SSM agent installation started on instance {instance_id}");
        true
      }
      None => false,
    }
  }
}

/// Resolves the SSM agent over a direct SSH session to the instance's public address
pub struct SshAgentInstaller {
  provisioner: ComputeProvisioner,
  connector: Arc<dyn ShellConnector>,
  username: String,
  key_path: PathBuf,
}

/// Install and start the agent from the distribution package repository
const SSH_REMEDIATION: [&str; 3] = [
  "sudo yum install -y amazon-ssm-agent",
  "sudo systemctl enable amazon-ssm-agent",
  "sudo systemctl start amazon-ssm-agent",
];

impl SshAgentInstaller {
  pub fn new(
    provisioner: ComputeProvisioner,
    connector: Arc<dyn ShellConnector>,
    username: impl Into<String>,
    key_path: impl AsRef<Path>,
  ) -> Self {
    Self {
      provisioner,
      connector,
      username: username.into(),
      key_path: key_path.as_ref().to_path_buf(),
    }
  }

  /// True if the agent is running, or is running after remediation
  ///
  /// Fails closed when the instance has no public address or the session cannot be opened.
  pub async fn check_and_resolve(&self, instance_id: &str) -> bool {
    let Some(host) = self.provisioner.public_address(instance_id).await else {
      return false;
    };

    let mut session = match self.connector.connect(&host, &self.username, &self.key_path).await {
      Ok(session) => session,
      Err(e) => {
        error!("SSH error on instance {instance_id}: {e:#}");
        return false;
      }
    };

    let result = resolve(session.as_mut(), instance_id).await;
    if let Err(e) = session.close().await {
      warn!("Error closing SSH session to instance {instance_id}: {e:#}");
    }

    match result {
      Ok(active) => active,
      Err(e) => {
        error!("SSH error on instance {instance_id}: {e:#}");
        false
      }
    }
  }
}

async fn resolve(session: &mut dyn ShellSession, instance_id: &str) -> Result<bool> {
  if session.exec(AGENT_PROBE).await?.trim() == "active" {
    info!("SSM agent is running on instance {instance_id}");
    return Ok(true);
  }

  warn!("SSM agent is not running on instance {instance_id}. Attempting to resolve...");
  for command in SSH_REMEDIATION {
    session.exec(command).await?;
  }

  let active = session.exec(AGENT_PROBE).await?.trim() == "active";
  match active {
    true => info!("SSM agent successfully installed and started on instance {instance_id}"),
    false => error!("Failed to start SSM agent on instance {instance_id}"),
  }

  Ok(active)
}
