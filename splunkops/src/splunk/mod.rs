//! Client for the Splunk management REST API
//!
//! Every call is authenticated with the credential pair resolved from Secrets Manager when the
//! client is constructed, asks for JSON output, and surfaces any non-2xx response as
//! [`SplunkError::Status`]. Certificate validation is disabled: management endpoints on freshly
//! deployed instances present self-signed certificates.

mod app;
mod index;
mod search;
mod server;

pub use index::IndexSpec;
use reqwest::{Method, RequestBuilder, Url};
pub use search::{DEFAULT_EARLIEST, DEFAULT_LATEST};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
  error::SplunkError,
  secrets::{self, Credentials, SecretSource},
};

/// One item of a Splunk Atom-style JSON feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub name: String,
  #[serde(default)]
  pub content: Value,
}

#[derive(Deserialize)]
struct Feed {
  #[serde(default)]
  entry: Vec<Entry>,
}

/// Extract the `entry` list from a feed response
fn entries(value: Value) -> Result<Vec<Entry>, SplunkError> {
  if value.is_null() {
    return Ok(Vec::new());
  }
  let feed: Feed = serde_json::from_value(value).map_err(SplunkError::Decode)?;

  Ok(feed.entry)
}

pub struct SplunkClient {
  base_url: Url,
  credentials: Credentials,
  http: reqwest::Client,
}

impl SplunkClient {
  /// Resolve credentials from the named secret and build the client
  ///
  /// Fails if the secret cannot be read or lacks a username or password.
  pub async fn new(base_url: &str, secret_name: &str, secrets: &dyn SecretSource) -> Result<Self, SplunkError> {
    let credentials = secrets::get_credentials(secrets, secret_name).await?;

    Self::with_credentials(base_url, credentials)
  }

  pub fn with_credentials(base_url: &str, credentials: Credentials) -> Result<Self, SplunkError> {
    let invalid = |reason: String| SplunkError::InvalidUrl {
      url: base_url.to_owned(),
      reason,
    };

    let url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    let http = reqwest::Client::builder()
      .danger_accept_invalid_certs(true)
      .build()?;

    Ok(Self {
      base_url: url,
      credentials,
      http,
    })
  }

  pub fn base_url(&self) -> &str {
    self.base_url.as_str().trim_end_matches('/')
  }

  /// The base URL with the given path segments appended, each percent-encoded
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
    let url = self.endpoint(segments);
    debug!("{method} {url}");

    self
      .http
      .request(method, url)
      .basic_auth(&self.credentials.username, Some(&self.credentials.password))
      .query(&[("output_mode", "json")])
  }

  async fn send(&self, request: RequestBuilder) -> Result<Value, SplunkError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      return Err(SplunkError::Status {
        status: status.as_u16(),
        body,
      });
    }

    if body.trim().is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(SplunkError::Decode)
  }
}
