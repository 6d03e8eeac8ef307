//! In-memory stand-ins for the vendor APIs, shared by the unit tests

use std::{
  collections::{BTreeMap, HashMap},
  path::Path,
  sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::{
  cloudwatch::{AlarmApi, AlarmSpec, AlarmSummary},
  ec2::{ComputeApi, Instance, InstanceFilter, InstanceState, LaunchRequest, Tags},
  s3::ObjectStoreApi,
  secrets::SecretSource,
  ssh::{ShellConnector, ShellSession},
  ssm::{CommandApi, Invocation, InvocationResult, InvocationStatus},
};

/// Secrets held in memory; unknown names fail the lookup
#[derive(Default)]
pub struct StaticSecrets {
  secrets: HashMap<String, String>,
}

impl StaticSecrets {
  pub fn with(name: &str, secret: &str) -> Self {
    Self {
      secrets: HashMap::from([(name.to_owned(), secret.to_owned())]),
    }
  }
}

#[async_trait]
impl SecretSource for StaticSecrets {
  async fn secret_string(&self, name: &str) -> Result<String> {
    self
      .secrets
      .get(name)
      .cloned()
      .ok_or_else(|| anyhow!("ResourceNotFoundException: secret {name} not found"))
  }
}

#[derive(Default)]
struct ComputeState {
  instances: Vec<Instance>,
  profiles: HashMap<String, String>,
  launches: usize,
}

/// EC2 stand-in that keeps launched instances in memory
#[derive(Default)]
pub struct FakeCompute {
  state: Mutex<ComputeState>,
  failing: bool,
}

impl FakeCompute {
  /// Every call fails as if the provider rejected it
  pub fn failing() -> Self {
    Self {
      failing: true,
      ..Self::default()
    }
  }

  pub fn with_instance(instance: Instance) -> Self {
    let fake = Self::default();
    fake.state.lock().unwrap().instances.push(instance);
    fake
  }

  /// Number of launch attempts, failed ones included
  pub fn launches(&self) -> usize {
    self.state.lock().unwrap().launches
  }

  pub fn profile(&self, instance_id: &str) -> Option<String> {
    self.state.lock().unwrap().profiles.get(instance_id).cloned()
  }

  fn check(&self) -> Result<()> {
    match self.failing {
      true => bail!("UnauthorizedOperation: You are not authorized to perform this operation"),
      false => Ok(()),
    }
  }

  fn update(&self, instance_id: &str, f: impl FnOnce(&mut Instance)) -> Result<()> {
    self.check()?;
    let mut state = self.state.lock().unwrap();
    let instance = state
      .instances
      .iter_mut()
      .find(|i| i.id == instance_id)
      .ok_or_else(|| anyhow!("InvalidInstanceID.NotFound: {instance_id}"))?;
    f(instance);
    Ok(())
  }
}

fn state_name(state: &InstanceState) -> &str {
  match state {
    InstanceState::Pending => "pending",
    InstanceState::Running => "running",
    InstanceState::ShuttingDown => "shutting-down",
    InstanceState::Stopping => "stopping",
    InstanceState::Stopped => "stopped",
    InstanceState::Terminated => "terminated",
    InstanceState::Unknown(other) => other,
  }
}

fn matches_filter(instance: &Instance, filter: &InstanceFilter) -> bool {
  let value = match filter.name.as_str() {
    "instance-id" => Some(instance.id.as_str()),
    "instance-state-name" => Some(state_name(&instance.state)),
    "instance-type" => Some(instance.instance_type.as_str()),
    name => name
      .strip_prefix("tag:")
      .and_then(|key| instance.tags.get(key))
      .map(String::as_str),
  };

  value.map(|v| filter.values.iter().any(|f| f == v)).unwrap_or(false)
}

#[async_trait]
impl ComputeApi for FakeCompute {
  async fn launch_instance(&self, request: &LaunchRequest) -> Result<String> {
    self.state.lock().unwrap().launches += 1;
    self.check()?;

    let mut state = self.state.lock().unwrap();
    let id = format!("i-{:017x}", state.launches);
    let tags = request.launch_tags();
    state.instances.push(Instance {
      id: id.clone(),
      instance_type: request.instance_type.clone(),
      image_id: request.image_id.clone(),
      key_name: Some(request.key_name.clone()),
      security_group_ids: request.security_group_ids.clone(),
      subnet_id: Some(request.subnet_id.clone()),
      name: tags.get("Name").cloned(),
      public_ip: None,
      state: InstanceState::Pending,
      tags,
    });

    Ok(id)
  }

  async fn find_instances(&self, instance_ids: &[String], filters: &[InstanceFilter]) -> Result<Vec<Instance>> {
    self.check()?;

    Ok(
      self
        .state
        .lock()
        .unwrap()
        .instances
        .iter()
        .filter(|i| instance_ids.is_empty() || instance_ids.contains(&i.id))
        .filter(|i| filters.iter().all(|f| matches_filter(i, f)))
        .cloned()
        .collect(),
    )
  }

  async fn start_instance(&self, instance_id: &str) -> Result<()> {
    self.update(instance_id, |i| i.state = InstanceState::Running)
  }

  async fn stop_instance(&self, instance_id: &str) -> Result<()> {
    self.update(instance_id, |i| i.state = InstanceState::Stopped)
  }

  async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
    self.update(instance_id, |i| i.state = InstanceState::Terminated)
  }

  async fn apply_tags(&self, instance_id: &str, tags: &Tags) -> Result<()> {
    self.update(instance_id, |i| {
      i.tags.extend(tags.clone());
      i.name = i.tags.get("Name").cloned();
    })
  }

  async fn attach_instance_profile(&self, instance_id: &str, profile: &str) -> Result<()> {
    self.update(instance_id, |_| {})?;
    self
      .state
      .lock()
      .unwrap()
      .profiles
      .insert(instance_id.to_owned(), profile.to_owned());
    Ok(())
  }
}

#[derive(Default)]
struct CommandState {
  submitted: Vec<(String, Vec<String>)>,
  result_checks: usize,
}

/// SSM stand-in returning a scripted sequence of results
///
/// Each result check takes the next response; the last one repeats once the sequence is exhausted.
/// Without a script every check reports the invocation as pending.
#[derive(Default)]
pub struct FakeCommands {
  state: Mutex<CommandState>,
  responses: Vec<(InvocationStatus, String)>,
  failing: bool,
}

impl FakeCommands {
  pub fn failing() -> Self {
    Self {
      failing: true,
      ..Self::default()
    }
  }

  pub fn responding(responses: &[(InvocationStatus, &str)]) -> Self {
    Self {
      responses: responses.iter().map(|(s, out)| (*s, out.to_string())).collect(),
      ..Self::default()
    }
  }

  /// Instance and commands of each accepted submission, in order
  pub fn submitted(&self) -> Vec<(String, Vec<String>)> {
    self.state.lock().unwrap().submitted.clone()
  }

  pub fn result_checks(&self) -> usize {
    self.state.lock().unwrap().result_checks
  }
}

#[async_trait]
impl CommandApi for FakeCommands {
  async fn submit_commands(&self, instance_id: &str, commands: &[String]) -> Result<Invocation> {
    if self.failing {
      bail!("InvalidInstanceId: Instances not in a valid state for account");
    }

    let mut state = self.state.lock().unwrap();
    state.submitted.push((instance_id.to_owned(), commands.to_vec()));

    Ok(Invocation {
      id: format!("cmd-{}", state.submitted.len()),
      instance_id: instance_id.to_owned(),
      commands: commands.to_vec(),
      status: InvocationStatus::Pending,
    })
  }

  async fn invocation_result(&self, invocation_id: &str, _instance_id: &str) -> Result<InvocationResult> {
    if self.failing {
      bail!("InvocationDoesNotExist: {invocation_id}");
    }

    let mut state = self.state.lock().unwrap();
    let index = state.result_checks;
    state.result_checks += 1;

    let result = match self.responses.get(index).or(self.responses.last()) {
      Some((status, output)) => InvocationResult {
        status: Some(*status),
        output: Some(output.clone()),
        error_output: None,
      },
      None => InvocationResult {
        status: Some(InvocationStatus::Pending),
        ..InvocationResult::default()
      },
    };
    Ok(result)
  }
}

#[derive(Default)]
struct ShellState {
  outputs: Vec<String>,
  executed: Vec<String>,
  connected_to: Option<String>,
  closed: bool,
}

/// Shell connector whose sessions answer commands with scripted outputs, in order
///
/// Commands beyond the script produce empty output.
#[derive(Default)]
pub struct FakeShell {
  state: Arc<Mutex<ShellState>>,
  rejecting: bool,
}

impl FakeShell {
  pub fn new(outputs: &[&str]) -> Self {
    let state = ShellState {
      outputs: outputs.iter().rev().map(|o| o.to_string()).collect(),
      ..ShellState::default()
    };
    Self {
      state: Arc::new(Mutex::new(state)),
      rejecting: false,
    }
  }

  /// Every connection fails authentication
  pub fn rejecting() -> Self {
    Self {
      rejecting: true,
      ..Self::default()
    }
  }

  pub fn executed(&self) -> Vec<String> {
    self.state.lock().unwrap().executed.clone()
  }

  /// `user@host` of the last connection
  pub fn connected_to(&self) -> Option<String> {
    self.state.lock().unwrap().connected_to.clone()
  }

  pub fn closed(&self) -> bool {
    self.state.lock().unwrap().closed
  }
}

struct FakeSession {
  state: Arc<Mutex<ShellState>>,
}

#[async_trait]
impl ShellConnector for FakeShell {
  async fn connect(&self, host: &str, username: &str, _key_path: &Path) -> Result<Box<dyn ShellSession>> {
    if self.rejecting {
      bail!("Public key authentication failed for {username}@{host}");
    }
    self.state.lock().unwrap().connected_to = Some(format!("{username}@{host}"));

    Ok(Box::new(FakeSession {
      state: self.state.clone(),
    }))
  }
}

#[async_trait]
impl ShellSession for FakeSession {
  async fn exec(&mut self, command: &str) -> Result<String> {
    let mut state = self.state.lock().unwrap();
    state.executed.push(command.to_owned());
    Ok(state.outputs.pop().unwrap_or_default())
  }

  async fn close(self: Box<Self>) -> Result<()> {
    self.state.lock().unwrap().closed = true;
    Ok(())
  }
}

/// S3 stand-in keyed by (bucket, key) so listings come back in key order
#[derive(Default)]
pub struct FakeObjectStore {
  objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
  failing: bool,
}

impl FakeObjectStore {
  pub fn failing() -> Self {
    Self {
      failing: true,
      ..Self::default()
    }
  }

  pub fn insert(&self, bucket: &str, key: &str, body: &[u8]) {
    self
      .objects
      .lock()
      .unwrap()
      .insert((bucket.to_owned(), key.to_owned()), body.to_vec());
  }

  fn check(&self) -> Result<()> {
    match self.failing {
      true => bail!("AccessDenied: Access Denied"),
      false => Ok(()),
    }
  }
}

#[async_trait]
impl ObjectStoreApi for FakeObjectStore {
  async fn store_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
    self.check()?;
    let body = tokio::fs::read(path).await?;
    self.insert(bucket, key, &body);
    Ok(())
  }

  async fn fetch_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
    self.check()?;
    let body = self
      .objects
      .lock()
      .unwrap()
      .get(&(bucket.to_owned(), key.to_owned()))
      .cloned()
      .ok_or_else(|| anyhow!("NoSuchKey: {key}"))?;
    tokio::fs::write(path, body).await?;
    Ok(())
  }

  async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    self.check()?;
    Ok(
      self
        .objects
        .lock()
        .unwrap()
        .keys()
        .filter(|(b, k)| b == bucket && k.starts_with(prefix))
        .map(|(_, k)| k.clone())
        .collect(),
    )
  }

  async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
    self.check()?;
    self
      .objects
      .lock()
      .unwrap()
      .remove(&(bucket.to_owned(), key.to_owned()));
    Ok(())
  }
}

/// CloudWatch stand-in; new alarms start in `INSUFFICIENT_DATA`
#[derive(Default)]
pub struct FakeAlarms {
  alarms: Mutex<Vec<AlarmSpec>>,
  failing: bool,
}

impl FakeAlarms {
  pub fn failing() -> Self {
    Self {
      failing: true,
      ..Self::default()
    }
  }
}

#[async_trait]
impl AlarmApi for FakeAlarms {
  async fn put_alarm(&self, spec: &AlarmSpec) -> Result<()> {
    if self.failing {
      bail!("LimitExceeded: The maximum number of alarms has been reached");
    }
    let mut alarms = self.alarms.lock().unwrap();
    alarms.retain(|a| a.name != spec.name);
    alarms.push(spec.clone());
    Ok(())
  }

  async fn alarms_for_metric(&self, instance_id: &str, metric_name: &str) -> Result<Vec<AlarmSummary>> {
    if self.failing {
      bail!("AccessDenied: not authorized to perform cloudwatch:DescribeAlarmsForMetric");
    }
    Ok(
      self
        .alarms
        .lock()
        .unwrap()
        .iter()
        .filter(|a| a.instance_id == instance_id && a.metric_name == metric_name)
        .map(|a| AlarmSummary {
          name: a.name.clone(),
          state: Some("INSUFFICIENT_DATA".to_owned()),
          threshold: Some(a.threshold),
        })
        .collect(),
    )
  }
}
