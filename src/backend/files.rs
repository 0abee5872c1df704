//! Object storage for uploaded files (profile pictures).

use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;

use super::{read_json, AccessToken, HttpBase};
use crate::error::ApiError;

#[async_trait]
pub trait FileStorage: Send + Sync {
  /// Upload (replacing any existing object) and return the public URL.
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<String, ApiError>;
}

#[derive(Clone)]
pub struct HttpFileStorage {
  base: HttpBase,
  token: Arc<dyn AccessToken>,
}

impl HttpFileStorage {
  pub fn new(base: HttpBase, token: Arc<dyn AccessToken>) -> Self {
    Self { base, token }
  }

  pub fn public_url(&self, bucket: &str, path: &str) -> Result<String, ApiError> {
    Ok(
      self
        .base
        .url(&format!("storage/v1/object/public/{}/{}", bucket, path))?
        .to_string(),
    )
  }
}

#[async_trait]
impl FileStorage for HttpFileStorage {
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<String, ApiError> {
    let token = self
      .token
      .access_token()
      .ok_or_else(|| ApiError::unauthorized("Sign in to upload files"))?;

    let url = self
      .base
      .url(&format!("storage/v1/object/{}/{}", bucket, path))?;

    tracing::debug!(bucket, path, size = bytes.len(), "uploading file");

    let response = self
      .base
      .request(Method::POST, url)
      .bearer_auth(token)
      .header("x-upsert", "true")
      .header(reqwest::header::CONTENT_TYPE, content_type)
      .body(bytes)
      .send()
      .await?;
    read_json(response).await?;

    self.public_url(bucket, path)
  }
}
