//! Data access functions, one module per entity.
//!
//! Every function performs a single remote call scoped to the acting user and
//! returns an [`Outcome`]. Expected backend failures become
//! `success: false`; a panic inside the call is caught and normalized to the
//! same shape, so nothing escapes this layer.

pub mod activities;
pub mod metrics;
pub mod plans;
pub mod profile;
pub mod signups;
pub mod workouts;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;

use crate::error::{ApiError, ErrorKind};

/// Uniform `{success, data?, error?}` result of a data access call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<T>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<ApiError>,
}

impl<T> Outcome<T> {
  pub fn ok(data: T) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
    }
  }

  pub fn fail(error: ApiError) -> Self {
    Self {
      success: false,
      data: None,
      error: Some(error),
    }
  }

  pub fn into_result(self) -> Result<T, ApiError> {
    match (self.success, self.data, self.error) {
      (true, Some(data), _) => Ok(data),
      (_, _, Some(error)) => Err(error),
      _ => Err(ApiError::unexpected("Call reported success without data")),
    }
  }
}

impl<T> From<Result<T, ApiError>> for Outcome<T> {
  fn from(result: Result<T, ApiError>) -> Self {
    match result {
      Ok(data) => Outcome::ok(data),
      Err(error) => Outcome::fail(error),
    }
  }
}

/// Run one data access operation, logging failures and catching panics.
pub(crate) async fn guarded<T, Fut>(op: &'static str, fut: Fut) -> Outcome<T>
where
  Fut: Future<Output = Result<T, ApiError>>,
{
  match AssertUnwindSafe(fut).catch_unwind().await {
    Ok(Ok(data)) => Outcome::ok(data),
    Ok(Err(error)) => {
      tracing::warn!(op, kind = error.kind.as_str(), error = %error.message, "data call failed");
      Outcome::fail(error)
    }
    Err(panic) => {
      let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
      tracing::error!(op, detail = %detail, "data call panicked");
      Outcome::fail(ApiError::new(
        ErrorKind::Unexpected,
        format!("Unexpected error in {}", op),
      ))
    }
  }
}

/// Inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
    if start <= end {
      Self { start, end }
    } else {
      Self {
        start: end,
        end: start,
      }
    }
  }

  /// The last `days` days ending today (inclusive).
  pub fn last_days(days: u32, today: NaiveDate) -> Self {
    let span = Duration::days(i64::from(days.max(1)) - 1);
    Self::new(today - span, today)
  }

  /// Half-open UTC bounds `[start 00:00, end+1 00:00)`.
  pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = self.start.and_time(NaiveTime::MIN).and_utc();
    let end = (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
    (start, end)
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
    let end = self.end;
    self.start.iter_days().take_while(move |d| *d <= end)
  }
}

/// Parse a user-entered time in the local zone.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD` (midnight) and `HH:MM`
/// (today).
pub fn parse_local_datetime(raw: &str) -> Result<DateTime<Utc>, ApiError> {
  let raw = raw.trim();
  if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
    return Ok(at.with_timezone(&Utc));
  }
  let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
    .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
    .or_else(|_| {
      NaiveTime::parse_from_str(raw, "%H:%M").map(|t| Local::now().date_naive().and_time(t))
    })
    .map_err(|_| ApiError::validation(format!("Cannot read '{}' as a date/time (use YYYY-MM-DD HH:MM)", raw)))?;
  Local
    .from_local_datetime(&naive)
    .earliest()
    .map(|at| at.with_timezone(&Utc))
    .ok_or_else(|| ApiError::validation(format!("{} does not exist in the local time zone", raw)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_local_datetime() {
    let utc = parse_local_datetime("2024-05-10T07:30:00Z").unwrap();
    assert_eq!(utc.to_rfc3339(), "2024-05-10T07:30:00+00:00");

    let local = parse_local_datetime("2024-05-10 07:30").unwrap();
    assert_eq!(
      local.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
      "2024-05-10 07:30"
    );
    assert!(parse_local_datetime("2024-05-10").is_ok());
    assert!(parse_local_datetime("18:45").is_ok());

    let err = parse_local_datetime("next tuesday").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
  }

  #[tokio::test]
  async fn test_guarded_normalizes_errors() {
    let outcome: Outcome<u32> = guarded("test", async {
      Err(ApiError::new(ErrorKind::PermissionDenied, "rls"))
    })
    .await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::PermissionDenied);
  }

  #[tokio::test]
  async fn test_guarded_catches_panics() {
    let outcome: Outcome<u32> = guarded("boom", async {
      let v: Vec<u32> = Vec::new();
      let first = v[0];
      Ok(first)
    })
    .await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::Unexpected);
  }

  #[test]
  fn test_outcome_serialized_shape() {
    let ok = serde_json::to_value(Outcome::ok(5)).unwrap();
    assert_eq!(ok, serde_json::json!({"success": true, "data": 5}));

    let fail = serde_json::to_value(Outcome::<u32>::fail(ApiError::not_found("gone"))).unwrap();
    assert_eq!(
      fail,
      serde_json::json!({"success": false, "error": {"kind": "not_found", "message": "gone"}})
    );
  }

  #[test]
  fn test_date_range() {
    let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
    let range = DateRange::last_days(7, today);
    assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
    assert_eq!(range.days().count(), 7);
    assert!(range.contains(today));

    let (start, end) = range.bounds();
    assert_eq!(start.to_rfc3339(), "2024-05-04T00:00:00+00:00");
    assert_eq!(end.to_rfc3339(), "2024-05-11T00:00:00+00:00");
  }

  #[test]
  fn test_reversed_range_is_normalized() {
    let a = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
    let b = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let range = DateRange::new(a, b);
    assert_eq!(range.start, b);
    assert_eq!(range.end, a);
  }
}
