//! Direct shell sessions to instances, used where the SSM channel is unavailable

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use russh::{client, ChannelMsg, Disconnect};
use russh_keys::key;
use tracing::debug;

/// An open, authenticated shell session
#[async_trait]
pub trait ShellSession: Send {
  /// Run a command to completion and return its stdout
  async fn exec(&mut self, command: &str) -> Result<String>;

  async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens shell sessions using a private key
#[async_trait]
pub trait ShellConnector: Send + Sync {
  async fn connect(&self, host: &str, username: &str, key_path: &Path) -> Result<Box<dyn ShellSession>>;
}

/// SSH connector backed by `russh`
#[derive(Clone, Debug)]
pub struct SshConnector {
  pub port: u16,
  pub inactivity_timeout: Duration,
}

impl Default for SshConnector {
  fn default() -> Self {
    Self {
      port: 22,
      inactivity_timeout: Duration::from_secs(60),
    }
  }
}

/// Accepts whichever host key the instance presents; freshly launched instances are never in known_hosts
struct AcceptHostKey;

#[async_trait]
impl client::Handler for AcceptHostKey {
  type Error = russh::Error;

  async fn check_server_key(&mut self, _server_public_key: &key::PublicKey) -> Result<bool, Self::Error> {
    Ok(true)
  }
}

struct SshSession {
  handle: client::Handle<AcceptHostKey>,
}

#[async_trait]
impl ShellConnector for SshConnector {
  async fn connect(&self, host: &str, username: &str, key_path: &Path) -> Result<Box<dyn ShellSession>> {
    let config = Arc::new(client::Config {
      inactivity_timeout: Some(self.inactivity_timeout),
      ..Default::default()
    });

    debug!("Connecting to {username}@{host}:{}", self.port);
    let mut handle = client::connect(config, (host, self.port), AcceptHostKey).await?;

    let key_pair = russh_keys::load_secret_key(key_path, None)?;
    if !handle.authenticate_publickey(username, Arc::new(key_pair)).await? {
      bail!("Public key authentication failed for {username}@{host}");
    }

    Ok(Box::new(SshSession { handle }))
  }
}

#[async_trait]
impl ShellSession for SshSession {
  async fn exec(&mut self, command: &str) -> Result<String> {
    let mut channel = self.handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    while let Some(msg) = channel.wait().await {
      match msg {
        ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
        ChannelMsg::ExitStatus { exit_status } => debug!("'{command}' exited with {exit_status}"),
        _ => {}
      }
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
  }

  async fn close(self: Box<Self>) -> Result<()> {
    self
      .handle
      .disconnect(Disconnect::ByApplication, "", "English")
      .await?;
    Ok(())
  }
}
