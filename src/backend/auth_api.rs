//! Auth boundary: email/password and OAuth sign-in, sign-up, refresh, sign-out.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::api_types::{ApiSession, ApiUser};
use super::{read_json, HttpBase};
use crate::error::{ApiError, ErrorKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  #[default]
  User,
  Admin,
}

impl std::fmt::Display for UserRole {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      UserRole::User => "user",
      UserRole::Admin => "admin",
    })
  }
}

/// The authenticated identity every query is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub role: UserRole,
  pub full_name: Option<String>,
}

impl AuthUser {
  pub fn is_admin(&self) -> bool {
    self.role == UserRole::Admin
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
  pub user: AuthUser,
}

impl Session {
  pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
    self.expires_at - now <= window
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResult {
  /// Auto-confirmed account, already signed in
  SignedIn(Session),
  /// Account created but email confirmation (or approval) is pending
  ConfirmationRequired(AuthUser),
}

#[async_trait]
pub trait AuthApi: Send + Sync {
  async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError>;

  async fn sign_up(
    &self,
    email: &str,
    password: &str,
    full_name: Option<&str>,
  ) -> Result<SignUpResult, ApiError>;

  async fn refresh(&self, refresh_token: &str) -> Result<Session, ApiError>;

  async fn sign_out(&self, access_token: &str) -> Result<(), ApiError>;

  /// URL to open in a browser for an OAuth sign-in redirect.
  fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<Url, ApiError>;
}

/// Auth client for a GoTrue-style endpoint.
#[derive(Clone)]
pub struct HttpAuthApi {
  base: HttpBase,
}

impl HttpAuthApi {
  pub fn new(base: HttpBase) -> Self {
    Self { base }
  }

  async fn post(&self, path: &str, bearer: Option<&str>, body: Value) -> Result<Value, ApiError> {
    let url = self.base.url(path)?;
    let mut request = self.base.request(Method::POST, url).json(&body);
    if let Some(token) = bearer {
      request = request.bearer_auth(token);
    }
    let response = request.send().await?;
    read_json(response).await
  }

  async fn token(&self, grant_type: &str, body: Value) -> Result<Session, ApiError> {
    let value = self
      .post(&format!("auth/v1/token?grant_type={}", grant_type), None, body)
      .await?;
    let api: ApiSession = serde_json::from_value(value)?;
    Ok(api.into_session(Utc::now()))
  }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
  async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
    self
      .token("password", json!({ "email": email, "password": password }))
      .await
      .map_err(|e| match e.kind {
        // GoTrue reports bad credentials as a 400
        ErrorKind::Validation => ApiError::unauthorized("Invalid email or password"),
        _ => e,
      })
  }

  async fn sign_up(
    &self,
    email: &str,
    password: &str,
    full_name: Option<&str>,
  ) -> Result<SignUpResult, ApiError> {
    let body = json!({
      "email": email,
      "password": password,
      "data": { "full_name": full_name },
    });
    let value = self.post("auth/v1/signup", None, body).await?;

    if value.get("access_token").is_some() {
      let api: ApiSession = serde_json::from_value(value)?;
      return Ok(SignUpResult::SignedIn(api.into_session(Utc::now())));
    }

    let user_value = value.get("user").cloned().unwrap_or(value);
    let user: ApiUser = serde_json::from_value(user_value)?;
    if user.is_existing_account() {
      return Err(ApiError::new(ErrorKind::Conflict, "User already registered"));
    }
    Ok(SignUpResult::ConfirmationRequired(user.into_user()))
  }

  async fn refresh(&self, refresh_token: &str) -> Result<Session, ApiError> {
    self
      .token("refresh_token", json!({ "refresh_token": refresh_token }))
      .await
  }

  async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
    self
      .post("auth/v1/logout", Some(access_token), json!({}))
      .await?;
    Ok(())
  }

  fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<Url, ApiError> {
    let mut url = self.base.url("auth/v1/authorize")?;
    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("provider", provider);
      if let Some(redirect) = redirect_to {
        pairs.append_pair("redirect_to", redirect);
      }
    }
    Ok(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;

  #[test]
  fn test_authorize_url() {
    let config =
      Config::parse("backend:\n  url: https://demo.supabase.co\n  anon_key: anon\n").unwrap();
    let api = HttpAuthApi::new(HttpBase::new(&config).unwrap());
    let url = api
      .authorize_url("google", Some("http://localhost:3000/dashboard"))
      .unwrap();
    assert_eq!(url.path(), "/auth/v1/authorize");
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
      pairs,
      vec![
        ("provider".to_string(), "google".to_string()),
        (
          "redirect_to".to_string(),
          "http://localhost:3000/dashboard".to_string()
        ),
      ]
    );
  }

  #[test]
  fn test_session_expiry_window() {
    let now = Utc::now();
    let session = Session {
      access_token: "a".into(),
      refresh_token: "r".into(),
      expires_at: now + Duration::seconds(30),
      user: AuthUser {
        id: "u".into(),
        email: "e".into(),
        role: UserRole::User,
        full_name: None,
      },
    };
    assert!(session.expires_within(now, Duration::seconds(60)));
    assert!(!session.expires_within(now, Duration::seconds(10)));
  }
}
