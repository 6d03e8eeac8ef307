use std::fmt;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SecretError;

/// Source of secret strings, keyed by name
#[async_trait]
pub trait SecretSource: Send + Sync {
  /// Return the secret string stored under the given name (or ARN)
  async fn secret_string(&self, name: &str) -> Result<String>;
}

/// Construct and return the Secrets Manager client
pub fn get_client(config: &SdkConfig) -> aws_sdk_secretsmanager::Client {
  aws_sdk_secretsmanager::Client::new(config)
}

#[async_trait]
impl SecretSource for aws_sdk_secretsmanager::Client {
  async fn secret_string(&self, name: &str) -> Result<String> {
    let output = self.get_secret_value().secret_id(name).send().await?;

    output
      .secret_string()
      .map(str::to_owned)
      .ok_or_else(|| anyhow!("Secret {name} has no string value"))
  }
}

/// Username and password used to authenticate with Splunk
///
/// Held in memory for the lifetime of the client that resolved it, never written anywhere
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .finish()
  }
}

#[derive(Deserialize)]
struct SecretPayload {
  username: Option<String>,
  password: Option<String>,
}

impl Credentials {
  /// Parse a secret string as a JSON object holding `username` and `password`
  ///
  /// Anything that is not a JSON object, or an object with either field absent or empty, is rejected
  pub fn parse(name: &str, secret: &str) -> Result<Self, SecretError> {
    let malformed = |source| SecretError::Malformed {
      name: name.to_owned(),
      source,
    };
    // Struct deserialization also accepts a JSON array; only an object is a valid secret
    let object: Map<String, Value> = serde_json::from_str(secret).map_err(malformed)?;
    let payload: SecretPayload = serde_json::from_value(Value::Object(object)).map_err(malformed)?;

    let username = payload.username.filter(|u| !u.is_empty());
    let password = payload.password.filter(|p| !p.is_empty());

    match (username, password) {
      (Some(username), Some(password)) => Ok(Credentials { username, password }),
      (None, _) => Err(SecretError::MissingField {
        name: name.to_owned(),
        field: "username",
      }),
      (_, None) => Err(SecretError::MissingField {
        name: name.to_owned(),
        field: "password",
      }),
    }
  }
}

/// Fetch the named secret and parse it into a credential pair
pub async fn get_credentials(source: &dyn SecretSource, name: &str) -> Result<Credentials, SecretError> {
  debug!("Resolving credentials from secret {name}");
  let secret = source.secret_string(name).await.map_err(|source| SecretError::Lookup {
    name: name.to_owned(),
    source,
  })?;

  Credentials::parse(name, &secret)
}
