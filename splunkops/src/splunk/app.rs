use std::path::Path;

use reqwest::{
  multipart::{Form, Part},
  Method,
};
use serde_json::Value;
use tracing::info;

use super::{entries, Entry, SplunkClient};
use crate::error::SplunkError;

const APPS: [&str; 3] = ["services", "apps", "local"];

impl SplunkClient {
  /// Upload an app package (`.tgz`/`.spl`) as a multipart form
  ///
  /// `update` replaces an app that is already installed under the same name.
  pub async fn install_app(&self, package: &Path, update: bool) -> Result<Value, SplunkError> {
    let contents = tokio::fs::read(package).await.map_err(|source| SplunkError::Package {
      path: package.to_path_buf(),
      source,
    })?;
    let file_name = package
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "app.tgz".to_owned());

    let form = Form::new()
      .text("filename", "true")
      .text("update", update.to_string())
      .part("name", Part::bytes(contents).file_name(file_name.clone()));

    let response = self.send(self.request(Method::POST, &APPS).multipart(form)).await?;
    info!("Installed app package {file_name}");

    Ok(response)
  }

  pub async fn list_apps(&self) -> Result<Vec<Entry>, SplunkError> {
    let response = self.send(self.request(Method::GET, &APPS)).await?;

    entries(response)
  }

  pub async fn delete_app(&self, name: &str) -> Result<Value, SplunkError> {
    let [services, apps, local] = APPS;
    let response = self
      .send(self.request(Method::DELETE, &[services, apps, local, name]))
      .await?;
    info!("Deleted app {name}");

    Ok(response)
  }
}
