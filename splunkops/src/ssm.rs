use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

/// SSM document that runs a list of shell commands
const RUN_SHELL_SCRIPT: &str = "AWS-RunShellScript";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
  Pending,
  Success,
  Failed,
}

impl InvocationStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Pending)
  }
}

impl From<&str> for InvocationStatus {
  /// Collapse the SSM command and invocation status values
  fn from(status: &str) -> Self {
    match status {
      "Success" => Self::Success,
      "Pending" | "InProgress" | "Delayed" | "Cancelling" => Self::Pending,
      _ => Self::Failed,
    }
  }
}

/// A batch of shell commands submitted to one instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
  pub id: String,
  pub instance_id: String,
  pub commands: Vec<String>,
  pub status: InvocationStatus,
}

/// Status and captured output of an invocation at the time it was checked
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
  pub status: Option<InvocationStatus>,
  pub output: Option<String>,
  pub error_output: Option<String>,
}

impl InvocationResult {
  pub fn succeeded(&self) -> bool {
    self.status == Some(InvocationStatus::Success)
  }

  /// Captured stdout with surrounding whitespace removed
  pub fn stdout(&self) -> &str {
    self.output.as_deref().unwrap_or_default().trim()
  }
}

/// Out-of-band command execution on instances
#[async_trait]
pub trait CommandApi: Send + Sync {
  async fn submit_commands(&self, instance_id: &str, commands: &[String]) -> Result<Invocation>;

  async fn invocation_result(&self, invocation_id: &str, instance_id: &str) -> Result<InvocationResult>;
}

/// Construct and return the SSM client
pub fn get_client(config: &SdkConfig) -> aws_sdk_ssm::Client {
  aws_sdk_ssm::Client::new(config)
}

#[async_trait]
impl CommandApi for aws_sdk_ssm::Client {
  async fn submit_commands(&self, instance_id: &str, commands: &[String]) -> Result<Invocation> {
    let response = self
      .send_command()
      .instance_ids(instance_id)
      .document_name(RUN_SHELL_SCRIPT)
      .parameters("commands", commands.to_vec())
      .send()
      .await?;

    let command = response
      .command()
      .ok_or_else(|| anyhow!("SendCommand response did not include a command"))?;

    Ok(Invocation {
      id: command.command_id().unwrap_or_default().to_owned(),
      instance_id: instance_id.to_owned(),
      commands: commands.to_vec(),
      status: command
        .status()
        .map(|s| InvocationStatus::from(s.as_str()))
        .unwrap_or(InvocationStatus::Pending),
    })
  }

  async fn invocation_result(&self, invocation_id: &str, instance_id: &str) -> Result<InvocationResult> {
    let response = self
      .get_command_invocation()
      .command_id(invocation_id)
      .instance_id(instance_id)
      .send()
      .await?;

    Ok(InvocationResult {
      status: response.status().map(|s| InvocationStatus::from(s.as_str())),
      output: response.standard_output_content().map(str::to_owned),
      error_output: response.standard_error_content().map(str::to_owned),
    })
  }
}

/// Sends shell commands to instances and reads back their status
///
/// There is no internal retry; a single result check is the whole status signal unless the caller
/// opts into [`RemoteCommandRunner::wait_for_invocation`].
#[derive(Clone)]
pub struct RemoteCommandRunner {
  api: Arc<dyn CommandApi>,
}

impl RemoteCommandRunner {
  pub fn new(api: Arc<dyn CommandApi>) -> Self {
    Self { api }
  }

  /// Submit one batch of commands to the instance
  pub async fn run_commands(&self, instance_id: &str, commands: &[String]) -> Option<Invocation> {
    debug!("Sending {} command(s) to instance {instance_id}: {commands:?}", commands.len());

    match self.api.submit_commands(instance_id, commands).await {
      Ok(invocation) => {
        info!("Sent command {} to instance {instance_id}", invocation.id);
        Some(invocation)
      }
      Err(e) => {
        error!("Error sending command to instance {instance_id}: {e:#}");
        None
      }
    }
  }

  /// Check the invocation once
  pub async fn get_invocation_result(&self, invocation_id: &str, instance_id: &str) -> Option<InvocationResult> {
    match self.api.invocation_result(invocation_id, instance_id).await {
      Ok(result) => {
        debug!("Command {invocation_id} on instance {instance_id}: {:?}", result.status);
        Some(result)
      }
      Err(e) => {
        error!("Error getting result of command {invocation_id} on instance {instance_id}: {e:#}");
        None
      }
    }
  }

  /// Submit the commands, wait `settle`, then check the result exactly once
  pub async fn probe(&self, instance_id: &str, commands: &[String], settle: Duration) -> Option<InvocationResult> {
    let invocation = self.run_commands(instance_id, commands).await?;
    if !settle.is_zero() {
      sleep(settle).await;
    }
    self.get_invocation_result(&invocation.id, instance_id).await
  }

  /// Poll the invocation every `interval` until it reaches a terminal status or `timeout` elapses
  ///
  /// Lookup errors while polling are treated as "not yet available". Returns the last result seen,
  /// which may still be pending when the timeout is reached.
  pub async fn wait_for_invocation(
    &self,
    invocation_id: &str,
    instance_id: &str,
    timeout: Duration,
    interval: Duration,
  ) -> Option<InvocationResult> {
    let deadline = Instant::now() + timeout;
    let mut last = None;

    loop {
      if let Some(result) = self.get_invocation_result(invocation_id, instance_id).await {
        let done = result.status.map(|s| s.is_terminal()).unwrap_or(false);
        last = Some(result);
        if done {
          break;
        }
      }

      if Instant::now() + interval > deadline {
        info!("Timed out waiting for command {invocation_id} on instance {instance_id}");
        break;
      }
      sleep(interval).await;
    }

    last
  }
}
