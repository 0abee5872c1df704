use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use super::filter::{Filter, Select};
use super::{read_json, AccessToken, HttpBase, RemoteTable};
use crate::error::ApiError;

/// Table API client (PostgREST dialect).
#[derive(Clone)]
pub struct RestClient {
  base: HttpBase,
  token: Arc<dyn AccessToken>,
}

impl RestClient {
  pub fn new(base: HttpBase, token: Arc<dyn AccessToken>) -> Self {
    Self { base, token }
  }

  fn table_url(&self, table: &str, pairs: &[(String, String)]) -> Result<Url, ApiError> {
    let mut url = self.base.url(&format!("rest/v1/{}", table))?;
    if !pairs.is_empty() {
      url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
  }

  async fn send(&self, method: Method, url: Url, prefer: &str, body: Option<Value>) -> Result<Vec<Value>, ApiError> {
    // Without a session the anon key doubles as the bearer token.
    let bearer = self
      .token
      .access_token()
      .unwrap_or_else(|| self.base.anon_key().to_string());

    tracing::debug!(%method, path = url.path(), "table request");

    let mut request = self
      .base
      .request(method, url)
      .bearer_auth(bearer)
      .header("Prefer", prefer);
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request.send().await?;
    match read_json(response).await? {
      Value::Array(rows) => Ok(rows),
      Value::Null => Ok(Vec::new()),
      other => Ok(vec![other]),
    }
  }
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
  filters.iter().map(Filter::to_pair).collect()
}

#[async_trait]
impl RemoteTable for RestClient {
  async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, ApiError> {
    let url = self.table_url(table, &query.query_pairs())?;
    self.send(Method::GET, url, "count=none", None).await
  }

  async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, ApiError> {
    let url = self.table_url(table, &[])?;
    self
      .send(Method::POST, url, "return=representation", Some(Value::Array(rows)))
      .await
  }

  async fn update(
    &self,
    table: &str,
    filters: &[Filter],
    patch: Value,
  ) -> Result<Vec<Value>, ApiError> {
    if filters.is_empty() {
      return Err(ApiError::validation("Refusing to update without a filter"));
    }
    let url = self.table_url(table, &filter_pairs(filters))?;
    self
      .send(Method::PATCH, url, "return=representation", Some(patch))
      .await
  }

  async fn upsert(
    &self,
    table: &str,
    rows: Vec<Value>,
    on_conflict: &str,
  ) -> Result<Vec<Value>, ApiError> {
    let pairs = vec![("on_conflict".to_string(), on_conflict.to_string())];
    let url = self.table_url(table, &pairs)?;
    self
      .send(
        Method::POST,
        url,
        "resolution=merge-duplicates,return=representation",
        Some(Value::Array(rows)),
      )
      .await
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, ApiError> {
    if filters.is_empty() {
      return Err(ApiError::validation("Refusing to delete without a filter"));
    }
    let url = self.table_url(table, &filter_pairs(filters))?;
    self
      .send(Method::DELETE, url, "return=representation", None)
      .await
  }
}
