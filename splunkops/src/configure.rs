use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::Result;
use tracing::{info, warn};

use crate::ssm::RemoteCommandRunner;

/// Configuration key to literal file contents
pub type ConfigMap = BTreeMap<String, String>;

/// Recognized configuration keys and the file each one overwrites, in the order they are written
pub const CONFIG_FILES: [(&str, &str); 4] = [
  ("license", "/opt/splunk/etc/system/local/license.conf"),
  ("index", "/opt/splunk/etc/system/local/indexes.conf"),
  ("forwarder", "/opt/splunk/etc/system/local/inputs.conf"),
  ("search_head", "/opt/splunk/etc/system/local/outputs.conf"),
];

const PACKAGE_PATH: &str = "/tmp/splunk.tgz";

/// Read a config map from a YAML file of string keys to string contents
pub fn read_config_map<P: AsRef<Path>>(path: P) -> Result<ConfigMap> {
  let file = File::open(path)?;
  let reader = BufReader::new(file);
  let config: ConfigMap = serde_yaml::from_reader(reader)?;

  Ok(config)
}

/// Quote a string as a single shell word
fn shell_quote(value: &str) -> String {
  format!("'{}'", value.replace('\'', r"'\''"))
}

/// One overwrite command per recognized key present in the map; other keys are ignored
pub fn config_commands(config: &ConfigMap) -> Vec<String> {
  CONFIG_FILES
    .iter()
    .filter_map(|(key, path)| {
      config
        .get(*key)
        .map(|content| format!("printf '%s\\n' {} > {path}", shell_quote(content)))
    })
    .collect()
}

/// Download the package and unpack it under /opt, producing /opt/splunk
pub fn deploy_commands(package_url: &str) -> Vec<String> {
  vec![
    format!("curl -fsSL {} -o {PACKAGE_PATH}", shell_quote(package_url)),
    format!("tar -xzf {PACKAGE_PATH} -C /opt"),
  ]
}

/// Installs and configures Splunk on an instance through the command runner
#[derive(Clone)]
pub struct ApplicationConfigurator {
  runner: RemoteCommandRunner,
  settle: Duration,
}

impl ApplicationConfigurator {
  pub fn new(runner: RemoteCommandRunner) -> Self {
    Self {
      runner,
      settle: crate::agent::DEFAULT_SETTLE,
    }
  }

  pub fn with_settle(mut self, settle: Duration) -> Self {
    self.settle = settle;
    self
  }

  /// Write the configuration files for every recognized key in one command batch
  ///
  /// The result reflects only whether the batch was submitted; the files are not read back.
  /// A map without recognized keys sends nothing and reports success.
  pub async fn configure(&self, instance_id: &str, config: &ConfigMap) -> bool {
    for key in config.keys() {
      if !CONFIG_FILES.iter().any(|(known, _)| known == key) {
        warn!("Ignoring unrecognized configuration key '{key}'");
      }
    }

    let commands = config_commands(config);
    if commands.is_empty() {
      info!("No configuration to apply on instance {instance_id}");
      return true;
    }

    let submitted = self.runner.run_commands(instance_id, &commands).await.is_some();
    if submitted {
      info!("Splunk configuration started on instance {instance_id}");
    }
    submitted
  }

  /// Send the download and unpack sequence for the Splunk package
  pub async fn deploy_package(&self, instance_id: &str, package_url: &str) -> bool {
    let submitted = self
      .runner
      .run_commands(instance_id, &deploy_commands(package_url))
      .await
      .is_some();
    if submitted {
      info!("Deploying Splunk on instance {instance_id}");
    }
    submitted
  }

  /// Run `splunk status` once and report whether it succeeded
  pub async fn health_check(&self, instance_id: &str) -> bool {
    let status = ["/opt/splunk/bin/splunk status".to_owned()];
    match self.runner.probe(instance_id, &status, self.settle).await {
      Some(result) if result.succeeded() => {
        info!("Splunk instance {instance_id} is healthy");
        true
      }
      Some(result) => {
        warn!(
          "Health check failed for Splunk instance {instance_id} (status: {:?})",
          result.status
        );
        false
      }
      None => false,
    }
  }
}
