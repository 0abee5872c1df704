//! Structured errors that cross the data-access boundary.
//!
//! Application plumbing (config, terminal, local storage) uses `color_eyre`.
//! Anything that comes back from the hosted backend is normalized into an
//! [`ApiError`] so callers can branch on a reason code instead of parsing text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason code attached to every [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Input rejected before or by the backend
  Validation,
  /// Missing or expired session
  Unauthorized,
  /// Row-level security refused the operation
  PermissionDenied,
  NotFound,
  /// Unique constraint or duplicate account
  Conflict,
  /// Transport failure, the request never got an answer
  Network,
  /// Backend answered with a 5xx
  Unavailable,
  /// Response body did not match the expected shape
  Decode,
  Unexpected,
}

impl ErrorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::Validation => "validation",
      ErrorKind::Unauthorized => "unauthorized",
      ErrorKind::PermissionDenied => "permission_denied",
      ErrorKind::NotFound => "not_found",
      ErrorKind::Conflict => "conflict",
      ErrorKind::Network => "network",
      ErrorKind::Unavailable => "unavailable",
      ErrorKind::Decode => "decode",
      ErrorKind::Unexpected => "unexpected",
    }
  }
}

/// Error returned by the backend seams and carried inside [`crate::data::Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
  pub kind: ErrorKind,
  pub message: String,
}

impl ApiError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Validation, message)
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::NotFound, message)
  }

  pub fn unauthorized(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Unauthorized, message)
  }

  pub fn unexpected(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Unexpected, message)
  }

  /// Map an HTTP status plus an optional PostgREST/GoTrue error code onto a kind.
  ///
  /// Backend codes take precedence over the status because PostgREST reports
  /// several constraint failures as plain 400s.
  pub fn from_status(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
    let message = message.into();
    let kind = match code {
      Some("42501") => ErrorKind::PermissionDenied,
      Some("23505") | Some("user_already_exists") | Some("email_exists") => ErrorKind::Conflict,
      Some("23502") | Some("23514") | Some("22P02") => ErrorKind::Validation,
      Some("PGRST116") => ErrorKind::NotFound,
      // Older GoTrue releases send a duplicate signup without an error code
      _ if matches!(status, 400 | 422) && message.to_lowercase().contains("already registered") => {
        ErrorKind::Conflict
      }
      _ => match status {
        400 | 422 => ErrorKind::Validation,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::PermissionDenied,
        404 | 406 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        500..=599 => ErrorKind::Unavailable,
        _ => ErrorKind::Unexpected,
      },
    };
    Self::new(kind, message)
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::new(ErrorKind::Decode, format!("Failed to decode response: {}", err))
    } else if err.is_timeout() || err.is_connect() || err.is_request() {
      ApiError::new(ErrorKind::Network, format!("Network error: {}", err))
    } else if let Some(status) = err.status() {
      ApiError::from_status(status.as_u16(), None, err.to_string())
    } else {
      ApiError::unexpected(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::new(ErrorKind::Decode, format!("Unexpected row shape: {}", err))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_duplicate_signup_without_code_is_conflict() {
    let err = ApiError::from_status(422, None, "User already registered");
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.message, "User already registered");
    assert_eq!(ApiError::from_status(422, None, "Password should be at least 6 characters").kind, ErrorKind::Validation);
  }

  #[test]
  fn test_backend_code_wins_over_status() {
    let err = ApiError::from_status(400, Some("23505"), "duplicate key");
    assert_eq!(err.kind, ErrorKind::Conflict);

    let err = ApiError::from_status(401, Some("42501"), "rls");
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
  }

  #[test]
  fn test_status_mapping() {
    assert_eq!(ApiError::from_status(401, None, "").kind, ErrorKind::Unauthorized);
    assert_eq!(ApiError::from_status(403, None, "").kind, ErrorKind::PermissionDenied);
    assert_eq!(ApiError::from_status(404, None, "").kind, ErrorKind::NotFound);
    assert_eq!(ApiError::from_status(422, None, "").kind, ErrorKind::Validation);
    assert_eq!(ApiError::from_status(503, None, "").kind, ErrorKind::Unavailable);
    assert_eq!(ApiError::from_status(418, None, "").kind, ErrorKind::Unexpected);
  }

  #[test]
  fn test_serializes_with_reason_code() {
    let err = ApiError::new(ErrorKind::PermissionDenied, "nope");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "permission_denied");
    assert_eq!(json["message"], "nope");
  }
}
