use serde_json::json;
use uuid::Uuid;

use super::{guarded, DateRange, Outcome};
use crate::backend::{decode_rows, single, tables, to_row, Filter, RemoteTable, Select};
use crate::error::ApiError;
use crate::models::{Workout, WorkoutDraft};

/// Workouts for the caller, newest first, optionally limited to a date range.
pub async fn list_workouts(
  remote: &dyn RemoteTable,
  user_id: &str,
  range: Option<DateRange>,
) -> Outcome<Vec<Workout>> {
  guarded("list_workouts", async {
    let mut query = Select::new().eq("user_id", user_id);
    if let Some(range) = range {
      let (start, end) = range.bounds();
      query = query
        .gte("performed_at", start.to_rfc3339())
        .lt("performed_at", end.to_rfc3339());
    }
    let rows = remote
      .select(tables::WORKOUTS, &query.order("performed_at", false))
      .await?;
    decode_rows(rows)
  })
  .await
}

pub async fn create_workout(
  remote: &dyn RemoteTable,
  user_id: &str,
  draft: WorkoutDraft,
) -> Outcome<Workout> {
  guarded("create_workout", async {
    let workout = draft.into_workout(user_id);
    let rows = remote
      .insert(tables::WORKOUTS, vec![to_row(&workout)?])
      .await?;
    single(rows)
  })
  .await
}

/// Overwrite the editable fields of an existing workout.
pub async fn update_workout(
  remote: &dyn RemoteTable,
  user_id: &str,
  workout: &Workout,
) -> Outcome<Workout> {
  guarded("update_workout", async {
    let patch = json!({
      "workout_type": workout.workout_type,
      "duration_minutes": workout.duration_minutes,
      "calories_burned": workout.calories_burned,
      "intensity": workout.intensity,
      "notes": workout.notes,
      "performed_at": workout.performed_at,
    });
    let rows = remote
      .update(
        tables::WORKOUTS,
        &[
          Filter::eq("id", workout.id.to_string()),
          Filter::eq("user_id", user_id),
        ],
        patch,
      )
      .await?;
    single(rows)
  })
  .await
}

pub async fn delete_workout(remote: &dyn RemoteTable, user_id: &str, id: Uuid) -> Outcome<()> {
  guarded("delete_workout", async {
    let removed = remote
      .delete(
        tables::WORKOUTS,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
      )
      .await?;
    if removed.is_empty() {
      return Err(ApiError::not_found(format!("Workout {} not found", id)));
    }
    Ok(())
  })
  .await
}
