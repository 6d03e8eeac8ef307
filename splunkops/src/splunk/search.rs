use reqwest::Method;
use serde_json::Value;
use tracing::info;

use super::SplunkClient;
use crate::error::SplunkError;

pub const DEFAULT_EARLIEST: &str = "-1h";
pub const DEFAULT_LATEST: &str = "now";

/// Prefix bare queries with the `search` command; generating commands (`| ...`) pass through
fn search_string(query: &str) -> String {
  let query = query.trim();
  match query.to_ascii_lowercase().starts_with("search ") || query.starts_with('|') {
    true => query.to_owned(),
    false => format!("search {query}"),
  }
}

impl SplunkClient {
  /// Submit a search job and return its sid
  ///
  /// Jobs run in blocking mode so the job has finished when the sid is returned.
  pub async fn submit_search(&self, query: &str, earliest: &str, latest: &str) -> Result<String, SplunkError> {
    let form = [
      ("search", search_string(query)),
      ("earliest_time", earliest.to_owned()),
      ("latest_time", latest.to_owned()),
      ("exec_mode", "blocking".to_owned()),
    ];

    let response = self
      .send(self.request(Method::POST, &["services", "search", "jobs"]).form(&form))
      .await?;

    let sid = response
      .get("sid")
      .and_then(Value::as_str)
      .ok_or(SplunkError::MissingSid)?;
    info!("Submitted search job {sid}");

    Ok(sid.to_owned())
  }

  /// Submit a search job and fetch its results once
  pub async fn execute_search(&self, query: &str, earliest: &str, latest: &str) -> Result<Value, SplunkError> {
    let sid = self.submit_search(query, earliest, latest).await?;

    self.get_results(&sid).await
  }

  /// Fetch the results of a search job
  pub async fn get_results(&self, sid: &str) -> Result<Value, SplunkError> {
    self
      .send(self.request(Method::GET, &["services", "search", "jobs", sid, "results"]))
      .await
  }
}
