use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use super::{guarded, DateRange, Outcome};
use crate::backend::{decode_rows, single, tables, to_row, Filter, RemoteTable, Select};
use crate::error::ApiError;
use crate::models::{ActivityDraft, HealthActivity};

/// Scheduled activities in order of their start time.
pub async fn list_activities(
  remote: &dyn RemoteTable,
  user_id: &str,
  range: Option<DateRange>,
) -> Outcome<Vec<HealthActivity>> {
  guarded("list_activities", async {
    let mut query = Select::new().eq("user_id", user_id);
    if let Some(range) = range {
      let (start, end) = range.bounds();
      query = query
        .gte("scheduled_at", start.to_rfc3339())
        .lt("scheduled_at", end.to_rfc3339());
    }
    let rows = remote
      .select(tables::HEALTH_ACTIVITIES, &query.order("scheduled_at", true))
      .await?;
    decode_rows(rows)
  })
  .await
}

pub async fn create_activity(
  remote: &dyn RemoteTable,
  user_id: &str,
  draft: ActivityDraft,
) -> Outcome<HealthActivity> {
  guarded("create_activity", async {
    let activity = draft.into_activity(user_id);
    let rows = remote
      .insert(tables::HEALTH_ACTIVITIES, vec![to_row(&activity)?])
      .await?;
    single(rows)
  })
  .await
}

pub async fn complete_activity(
  remote: &dyn RemoteTable,
  user_id: &str,
  id: Uuid,
  completed: bool,
) -> Outcome<HealthActivity> {
  guarded("complete_activity", async {
    let rows = remote
      .update(
        tables::HEALTH_ACTIVITIES,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
        json!({ "completed": completed }),
      )
      .await?;
    single(rows).map_err(|_| ApiError::not_found(format!("Activity {} not found", id)))
  })
  .await
}

pub async fn delete_activity(remote: &dyn RemoteTable, user_id: &str, id: Uuid) -> Outcome<()> {
  guarded("delete_activity", async {
    let removed = remote
      .delete(
        tables::HEALTH_ACTIVITIES,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
      )
      .await?;
    if removed.is_empty() {
      return Err(ApiError::not_found(format!("Activity {} not found", id)));
    }
    Ok(())
  })
  .await
}

/// Activities whose reminder has not been sent and falls in `[now, now + lead]`.
pub async fn due_reminders(
  remote: &dyn RemoteTable,
  user_id: &str,
  now: DateTime<Utc>,
  lead: Duration,
) -> Outcome<Vec<HealthActivity>> {
  guarded("due_reminders", async {
    let query = Select::new()
      .eq("user_id", user_id)
      .eq("reminder_sent", false)
      .gte("reminder_time", now.to_rfc3339())
      .lte("reminder_time", (now + lead).to_rfc3339())
      .order("reminder_time", true);
    let rows = remote.select(tables::HEALTH_ACTIVITIES, &query).await?;
    decode_rows(rows)
  })
  .await
}

/// Flag a reminder as delivered. Marking an already-sent reminder is a no-op
/// that still succeeds.
pub async fn mark_reminder_sent(remote: &dyn RemoteTable, user_id: &str, id: Uuid) -> Outcome<()> {
  guarded("mark_reminder_sent", async {
    remote
      .update(
        tables::HEALTH_ACTIVITIES,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
        json!({ "reminder_sent": true }),
      )
      .await?;
    Ok(())
  })
  .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryTables;
  use crate::models::ActivityCategory;

  fn draft(title: &str, at: DateTime<Utc>, remind_before: Option<i64>) -> ActivityDraft {
    ActivityDraft {
      title: title.into(),
      category: ActivityCategory::Meditation,
      scheduled_at: at,
      duration_minutes: Some(10),
      remind_before,
      notes: None,
    }
  }

  #[tokio::test]
  async fn test_due_reminders_window() {
    let remote = MemoryTables::with_actor("u1");
    let now = Utc::now();
    // reminder at now+10m: due
    create_activity(&remote, "u1", draft("soon", now + Duration::minutes(15), Some(5)))
      .await
      .into_result()
      .unwrap();
    // reminder at now+50m: outside the window
    create_activity(&remote, "u1", draft("later", now + Duration::hours(1), Some(10)))
      .await
      .into_result()
      .unwrap();
    // reminder already passed
    create_activity(&remote, "u1", draft("past", now - Duration::minutes(5), Some(5)))
      .await
      .into_result()
      .unwrap();
    // no reminder at all
    create_activity(&remote, "u1", draft("none", now + Duration::minutes(5), None))
      .await
      .into_result()
      .unwrap();

    let due = due_reminders(&remote, "u1", now, Duration::minutes(15))
      .await
      .into_result()
      .unwrap();
    let titles: Vec<&str> = due.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["soon"]);
  }

  #[tokio::test]
  async fn test_marked_reminder_is_no_longer_due() {
    let remote = MemoryTables::with_actor("u1");
    let now = Utc::now();
    let activity = create_activity(&remote, "u1", draft("soon", now + Duration::minutes(20), Some(10)))
      .await
      .into_result()
      .unwrap();

    assert!(mark_reminder_sent(&remote, "u1", activity.id).await.success);
    assert!(mark_reminder_sent(&remote, "u1", activity.id).await.success);

    let due = due_reminders(&remote, "u1", now, Duration::minutes(15))
      .await
      .into_result()
      .unwrap();
    assert!(due.is_empty());
  }

  #[tokio::test]
  async fn test_complete_activity() {
    let remote = MemoryTables::with_actor("u1");
    let activity = create_activity(&remote, "u1", draft("walk", Utc::now(), None))
      .await
      .into_result()
      .unwrap();
    let done = complete_activity(&remote, "u1", activity.id, true)
      .await
      .into_result()
      .unwrap();
    assert!(done.completed);
  }
}
