use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::{guarded, Outcome};
use crate::backend::{decode_rows, single, tables, Filter, RemoteTable, Select};
use crate::error::ApiError;
use crate::models::{PendingSignup, SignupStatus};

/// Record a signup awaiting admin review. Requesting again with the same
/// email refreshes the existing request instead of adding a second one.
pub async fn request_signup(
  remote: &dyn RemoteTable,
  email: &str,
  full_name: Option<&str>,
) -> Outcome<PendingSignup> {
  guarded("request_signup", async {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
      return Err(ApiError::validation("Email is required"));
    }
    let row = json!({
      "email": email,
      "full_name": full_name,
      "status": SignupStatus::Pending,
      "requested_at": Utc::now(),
    });
    let rows = remote
      .upsert(tables::PENDING_SIGNUPS, vec![row], "email")
      .await?;
    single(rows)
  })
  .await
}

/// Requests still waiting for a decision, oldest first.
pub async fn list_pending_signups(remote: &dyn RemoteTable) -> Outcome<Vec<PendingSignup>> {
  guarded("list_pending_signups", async {
    let query = Select::new()
      .eq("status", SignupStatus::Pending.to_string())
      .order("requested_at", true);
    let rows = remote.select(tables::PENDING_SIGNUPS, &query).await?;
    decode_rows(rows)
  })
  .await
}

/// Approve or reject a pending request. Already reviewed requests are left
/// alone and reported as not found.
pub async fn review_signup(
  remote: &dyn RemoteTable,
  reviewer_id: &str,
  id: Uuid,
  decision: SignupStatus,
) -> Outcome<PendingSignup> {
  guarded("review_signup", async {
    if decision == SignupStatus::Pending {
      return Err(ApiError::validation("A review must approve or reject"));
    }
    let rows = remote
      .update(
        tables::PENDING_SIGNUPS,
        &[
          Filter::eq("id", id.to_string()),
          Filter::eq("status", SignupStatus::Pending.to_string()),
        ],
        json!({
          "status": decision,
          "reviewed_at": Utc::now(),
          "reviewed_by": reviewer_id,
        }),
      )
      .await?;
    single(rows).map_err(|_| ApiError::not_found(format!("No pending signup {}", id)))
  })
  .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryTables;
  use crate::error::ErrorKind;

  #[tokio::test]
  async fn test_request_and_review() {
    let remote = MemoryTables::new();
    let first = request_signup(&remote, "Ann@Example.com", Some("Ann"))
      .await
      .into_result()
      .unwrap();
    request_signup(&remote, "bob@example.com", None)
      .await
      .into_result()
      .unwrap();
    assert_eq!(first.email, "ann@example.com");

    let pending = list_pending_signups(&remote).await.into_result().unwrap();
    assert_eq!(pending.len(), 2);

    let reviewed = review_signup(&remote, "admin-1", first.id, SignupStatus::Approved)
      .await
      .into_result()
      .unwrap();
    assert_eq!(reviewed.status, SignupStatus::Approved);
    assert_eq!(reviewed.reviewed_by.as_deref(), Some("admin-1"));

    let pending = list_pending_signups(&remote).await.into_result().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].email, "bob@example.com");

    let again = review_signup(&remote, "admin-1", first.id, SignupStatus::Rejected).await;
    assert_eq!(again.error.unwrap().kind, ErrorKind::NotFound);
  }

  #[tokio::test]
  async fn test_repeat_request_does_not_duplicate() {
    let remote = MemoryTables::new();
    for _ in 0..2 {
      request_signup(&remote, "ann@example.com", Some("Ann"))
        .await
        .into_result()
        .unwrap();
    }
    assert_eq!(remote.rows(tables::PENDING_SIGNUPS).len(), 1);
  }

  #[tokio::test]
  async fn test_pending_is_not_a_decision() {
    let remote = MemoryTables::new();
    let outcome = review_signup(&remote, "admin-1", Uuid::new_v4(), SignupStatus::Pending).await;
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::Validation);
    assert_eq!(remote.total_calls(), 0);
  }
}
