use std::path::PathBuf;

use thiserror::Error;

/// Failures resolving the Splunk credential pair from Secrets Manager
#[derive(Debug, Error)]
pub enum SecretError {
  #[error("unable to retrieve secret {name}")]
  Lookup {
    name: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("secret {name} is not a JSON object of strings")]
  Malformed {
    name: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("secret {name} does not contain '{field}'")]
  MissingField { name: String, field: &'static str },
}

/// Errors raised by the Splunk REST client
///
/// Unlike the AWS facing operations, these are surfaced to the caller rather than converted into
/// sentinel values so the HTTP status and body are available to act on.
#[derive(Debug, Error)]
pub enum SplunkError {
  #[error(transparent)]
  Credentials(#[from] SecretError),

  #[error("invalid Splunk URL {url}: {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("request to Splunk failed")]
  Transport(#[from] reqwest::Error),

  #[error("Splunk returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("unable to decode Splunk response")]
  Decode(#[source] serde_json::Error),

  #[error("search job submission did not return a sid")]
  MissingSid,

  #[error("unable to read app package {}", path.display())]
  Package {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
