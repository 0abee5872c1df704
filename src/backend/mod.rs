//! Seams to the hosted backend: table API, auth API and file storage.
//!
//! Each seam is a trait so the rest of the crate never talks HTTP directly.
//! The reqwest implementations live next to the traits; in-memory fakes are
//! compiled for tests only.

pub mod api_types;
pub mod auth_api;
pub mod files;
pub mod filter;
#[cfg(test)]
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::error::{ApiError, ErrorKind};

pub use auth_api::{AuthApi, AuthUser, HttpAuthApi, Session, SignUpResult, UserRole};
pub use files::{FileStorage, HttpFileStorage};
pub use filter::{Filter, Select};
pub use rest::RestClient;

/// Table names on the backend.
pub mod tables {
  pub const PROFILES: &str = "profiles";
  pub const WORKOUTS: &str = "workouts";
  pub const WORKOUT_PLANS: &str = "workout_plans";
  pub const HEALTH_METRICS: &str = "health_metrics";
  pub const HEALTH_ACTIVITIES: &str = "health_activities";
  pub const PENDING_SIGNUPS: &str = "pending_signups";
}

/// Per-table CRUD with filter chaining.
///
/// Row-level security is enforced server side from the bearer token; callers
/// still filter reads by their own user id.
#[async_trait]
pub trait RemoteTable: Send + Sync {
  async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, ApiError>;

  /// Insert rows and return them as stored.
  async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, ApiError>;

  /// Patch every row matching `filters` and return the updated rows.
  async fn update(&self, table: &str, filters: &[Filter], patch: Value)
    -> Result<Vec<Value>, ApiError>;

  /// Insert or merge rows on the `on_conflict` column.
  async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str)
    -> Result<Vec<Value>, ApiError>;

  /// Delete matching rows and return them.
  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, ApiError>;
}

/// Source of the bearer token attached to authenticated requests.
pub trait AccessToken: Send + Sync {
  fn access_token(&self) -> Option<String>;
}

/// Shared HTTP settings for every backend endpoint.
#[derive(Clone)]
pub struct HttpBase {
  http: reqwest::Client,
  base: Url,
  anon_key: String,
}

impl HttpBase {
  pub fn new(config: &Config) -> Result<Self> {
    let mut raw = config.backend.url.trim().to_string();
    if !raw.ends_with('/') {
      raw.push('/');
    }
    let base = Url::parse(&raw).map_err(|e| eyre!("Invalid backend url {}: {}", raw, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.backend.timeout_secs))
      .user_agent(concat!("vitals/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      anon_key: config.anon_key()?,
    })
  }

  pub(crate) fn url(&self, path: &str) -> Result<Url, ApiError> {
    self
      .base
      .join(path)
      .map_err(|e| ApiError::unexpected(format!("Invalid endpoint {}: {}", path, e)))
  }

  pub(crate) fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
    self
      .http
      .request(method, url)
      .header("apikey", &self.anon_key)
  }

  pub(crate) fn anon_key(&self) -> &str {
    &self.anon_key
  }
}

/// Read a response body as JSON, turning non-2xx answers into [`ApiError`].
pub(crate) async fn read_json(resp: reqwest::Response) -> Result<Value, ApiError> {
  let status = resp.status();
  let bytes = resp.bytes().await?;

  if !status.is_success() {
    let body = String::from_utf8_lossy(&bytes);
    return Err(api_types::parse_error(status.as_u16(), &body));
  }

  if bytes.is_empty() {
    return Ok(Value::Null);
  }
  Ok(serde_json::from_slice(&bytes)?)
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, ApiError> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(ApiError::from))
    .collect()
}

/// Narrow a result to at most one row.
pub fn maybe_single<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, ApiError> {
  if rows.len() > 1 {
    return Err(ApiError::new(
      ErrorKind::Unexpected,
      format!("Expected a single row, got {}", rows.len()),
    ));
  }
  rows
    .into_iter()
    .next()
    .map(|row| serde_json::from_value(row).map_err(ApiError::from))
    .transpose()
}

/// Narrow a result to exactly one row.
pub fn single<T: DeserializeOwned>(rows: Vec<Value>) -> Result<T, ApiError> {
  maybe_single(rows)?.ok_or_else(|| ApiError::not_found("No matching row"))
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Value, ApiError> {
  serde_json::to_value(value).map_err(|e| ApiError::unexpected(format!("Failed to encode row: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Row {
    id: u32,
  }

  #[test]
  fn test_single_row_narrowing() {
    let one: Row = single(vec![json!({"id": 1})]).unwrap();
    assert_eq!(one, Row { id: 1 });

    let none: Option<Row> = maybe_single(vec![]).unwrap();
    assert_eq!(none, None);

    let err = single::<Row>(vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = single::<Row>(vec![json!({"id": 1}), json!({"id": 2})]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unexpected);
  }

  #[test]
  fn test_bad_shape_is_decode_error() {
    let err = decode_rows::<Row>(vec![json!({"id": "x"})]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Decode);
  }
}
