use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{entries, Entry, SplunkClient};
use crate::error::SplunkError;

const INDEXES: [&str; 3] = ["services", "data", "indexes"];

/// Form parameters for creating an index
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
  pub name: String,

  #[serde(rename = "maxTotalDataSizeMB", skip_serializing_if = "Option::is_none")]
  pub max_size_mb: Option<u64>,

  #[serde(rename = "homePath", skip_serializing_if = "Option::is_none")]
  pub home_path: Option<String>,
}

impl IndexSpec {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }
}

impl SplunkClient {
  pub async fn create_index(&self, spec: &IndexSpec) -> Result<Value, SplunkError> {
    let response = self.send(self.request(Method::POST, &INDEXES).form(spec)).await?;
    info!("Created index {}", spec.name);

    Ok(response)
  }

  pub async fn delete_index(&self, name: &str) -> Result<Value, SplunkError> {
    let [services, data, indexes] = INDEXES;
    let response = self
      .send(self.request(Method::DELETE, &[services, data, indexes, name]))
      .await?;
    info!("Deleted index {name}");

    Ok(response)
  }

  pub async fn list_indexes(&self) -> Result<Vec<Entry>, SplunkError> {
    let response = self.send(self.request(Method::GET, &INDEXES)).await?;

    entries(response)
  }

  pub async fn get_index(&self, name: &str) -> Result<Value, SplunkError> {
    let [services, data, indexes] = INDEXES;

    self
      .send(self.request(Method::GET, &[services, data, indexes, name]))
      .await
  }
}
