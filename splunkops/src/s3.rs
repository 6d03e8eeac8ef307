use std::{path::Path, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use tokio::{
  fs::{self, File},
  io::{self, AsyncWriteExt},
};
use tracing::{error, info};

/// Object storage calls made against S3
#[async_trait]
pub trait ObjectStoreApi: Send + Sync {
  /// Stream the local file at `path` into the object
  async fn store_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

  /// Stream the object into a local file at `path`; the file is not created if the object cannot be read
  async fn fetch_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

  async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

  async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Construct and return the S3 client
pub fn get_client(config: &SdkConfig) -> aws_sdk_s3::Client {
  aws_sdk_s3::Client::new(config)
}

#[async_trait]
impl ObjectStoreApi for aws_sdk_s3::Client {
  async fn store_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
    let body = ByteStream::from_path(path).await?;
    self.put_object().bucket(bucket).key(key).body(body).send().await?;
    Ok(())
  }

  async fn fetch_object(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
    let response = self.get_object().bucket(bucket).key(key).send().await?;

    let body = response.body.into_async_read();
    tokio::pin!(body);
    let mut file = File::create(path).await?;
    if let Err(e) = io::copy(&mut body, &mut file).await {
      drop(file);
      let _ = fs::remove_file(path).await;
      return Err(e.into());
    }
    file.flush().await?;
    Ok(())
  }

  async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let pages = self
      .list_objects_v2()
      .bucket(bucket)
      .prefix(prefix)
      .into_paginator()
      .send()
      .try_collect()
      .await?;

    Ok(
      pages
        .iter()
        .flat_map(|page| page.contents())
        .filter_map(|object| object.key())
        .map(str::to_owned)
        .collect(),
    )
  }

  async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
    self.delete_object().bucket(bucket).key(key).send().await?;
    Ok(())
  }
}

/// Moves artifacts between local files and a bucket
///
/// Same contract as the compute operations: one call, errors logged and reported as `false` or an
/// empty list.
#[derive(Clone)]
pub struct ObjectStoreClient {
  api: Arc<dyn ObjectStoreApi>,
}

impl ObjectStoreClient {
  pub fn new(api: Arc<dyn ObjectStoreApi>) -> Self {
    Self { api }
  }

  pub async fn upload(&self, bucket: &str, key: &str, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match self.api.store_object(bucket, key, path).await {
      Ok(()) => {
        info!("Uploaded {} to s3://{bucket}/{key}", path.display());
        true
      }
      Err(e) => {
        error!("Error uploading {} to s3://{bucket}/{key}: {e:#}", path.display());
        false
      }
    }
  }

  pub async fn download(&self, bucket: &str, key: &str, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match self.api.fetch_object(bucket, key, path).await {
      Ok(()) => {
        info!("Downloaded s3://{bucket}/{key} to {}", path.display());
        true
      }
      Err(e) => {
        error!("Error downloading s3://{bucket}/{key}: {e:#}");
        false
      }
    }
  }

  /// Keys under the prefix; an empty prefix lists the whole bucket
  pub async fn list(&self, bucket: &str, prefix: &str) -> Vec<String> {
    match self.api.list_keys(bucket, prefix).await {
      Ok(keys) => {
        info!("Found {} objects under prefix '{prefix}'", keys.len());
        keys
      }
      Err(e) => {
        error!("Error listing objects in s3://{bucket}: {e:#}");
        Vec::new()
      }
    }
  }

  pub async fn delete(&self, bucket: &str, key: &str) -> bool {
    match self.api.remove_object(bucket, key).await {
      Ok(()) => {
        info!("Deleted s3://{bucket}/{key}");
        true
      }
      Err(e) => {
        error!("Error deleting s3://{bucket}/{key}: {e:#}");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;
  use crate::testing::FakeObjectStore;

  #[tokio::test]
  async fn it_uploads_and_downloads() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("splunk.tgz");
    let dest = dir.path().join("copy.tgz");
    tokio::fs::write(&source, b"package bytes").await.unwrap();

    let store = ObjectStoreClient::new(Arc::new(FakeObjectStore::default()));
    assert!(store.upload("artifacts", "splunk/splunk.tgz", &source).await);
    assert!(store.download("artifacts", "splunk/splunk.tgz", &dest).await);

    assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"package bytes");
  }

  #[tokio::test]
  async fn it_lists_by_prefix_and_deletes() {
    let api = Arc::new(FakeObjectStore::default());
    api.insert("artifacts", "apps/a.tgz", b"a");
    api.insert("artifacts", "apps/b.tgz", b"b");
    api.insert("artifacts", "logs/x.log", b"x");
    let store = ObjectStoreClient::new(api);

    assert_eq!(store.list("artifacts", "apps/").await, vec!["apps/a.tgz", "apps/b.tgz"]);
    assert_eq!(store.list("artifacts", "").await.len(), 3);

    assert!(store.delete("artifacts", "apps/a.tgz").await);
    assert_eq!(store.list("artifacts", "apps/").await, vec!["apps/b.tgz"]);
  }

  #[tokio::test]
  async fn it_fails_closed() {
    let dir = tempdir().unwrap();
    let store = ObjectStoreClient::new(Arc::new(FakeObjectStore::default()));

    // Missing local file
    assert!(!store.upload("artifacts", "k", dir.path().join("missing")).await);
    // Missing object, no local file left behind
    assert!(!store.download("artifacts", "missing", dir.path().join("out")).await);
    assert!(!dir.path().join("out").exists());

    let failing = ObjectStoreClient::new(Arc::new(FakeObjectStore::failing()));
    assert!(failing.list("artifacts", "").await.is_empty());
    assert!(!failing.delete("artifacts", "k").await);
  }
}
