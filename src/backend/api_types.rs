//! Serde types matching backend responses.
//!
//! Kept apart from domain types so the wire shape can change without
//! touching the rest of the crate.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::auth_api::{AuthUser, Session, UserRole};
use crate::error::ApiError;

// ============================================================================
// Error bodies
// ============================================================================

/// Union of the PostgREST (`code`, `message`, `details`, `hint`) and GoTrue
/// (`error_code`, `msg`, `error_description`) error shapes.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  pub code: Option<Value>,
  pub error_code: Option<String>,
  pub message: Option<String>,
  pub msg: Option<String>,
  pub error_description: Option<String>,
  pub details: Option<String>,
}

impl ApiErrorBody {
  fn code(&self) -> Option<String> {
    if let Some(code) = &self.error_code {
      return Some(code.clone());
    }
    match &self.code {
      Some(Value::String(s)) => Some(s.clone()),
      _ => None,
    }
  }

  fn message(&self) -> Option<String> {
    self
      .message
      .clone()
      .or_else(|| self.msg.clone())
      .or_else(|| self.error_description.clone())
  }
}

/// Build an [`ApiError`] from a failed response.
pub fn parse_error(status: u16, body: &str) -> ApiError {
  let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
  let message = parsed.message().unwrap_or_else(|| {
    if body.trim().is_empty() {
      format!("Request failed with status {}", status)
    } else {
      body.trim().to_string()
    }
  });
  let message = match &parsed.details {
    Some(details) if !details.is_empty() => format!("{} ({})", message, details),
    _ => message,
  };
  ApiError::from_status(status, parsed.code().as_deref(), message)
}

// ============================================================================
// Auth responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub app_metadata: Value,
  #[serde(default)]
  pub user_metadata: Value,
  /// Empty for an obfuscated sign-up of an already registered email
  pub identities: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSession {
  pub access_token: String,
  pub refresh_token: String,
  #[serde(default)]
  pub expires_in: i64,
  pub expires_at: Option<i64>,
  pub user: ApiUser,
}

impl ApiUser {
  pub fn into_user(self) -> AuthUser {
    let role = match self.app_metadata.get("role").and_then(Value::as_str) {
      Some("admin") => UserRole::Admin,
      _ => UserRole::User,
    };
    let full_name = self
      .user_metadata
      .get("full_name")
      .and_then(Value::as_str)
      .map(String::from);
    AuthUser {
      id: self.id,
      email: self.email.unwrap_or_default(),
      role,
      full_name,
    }
  }

  /// GoTrue hides duplicate sign-ups behind a user with no identities.
  pub fn is_existing_account(&self) -> bool {
    matches!(&self.identities, Some(ids) if ids.is_empty())
  }
}

impl ApiSession {
  pub fn into_session(self, now: DateTime<Utc>) -> Session {
    let expires_at = self
      .expires_at
      .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
      .unwrap_or_else(|| now + Duration::seconds(self.expires_in));
    Session {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at,
      user: self.user.into_user(),
    }
  }
}
