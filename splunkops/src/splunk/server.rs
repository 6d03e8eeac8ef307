use reqwest::Method;
use serde_json::Value;
use tracing::info;

use super::SplunkClient;
use crate::error::SplunkError;

impl SplunkClient {
  pub async fn restart_server(&self) -> Result<Value, SplunkError> {
    let response = self
      .send(self.request(Method::POST, &["services", "server", "control", "restart"]))
      .await?;
    info!("Restart requested for {}", self.base_url());

    Ok(response)
  }

  pub async fn server_info(&self) -> Result<Value, SplunkError> {
    self
      .send(self.request(Method::GET, &["services", "server", "info"]))
      .await
  }
}
