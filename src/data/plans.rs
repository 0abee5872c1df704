use serde_json::json;
use uuid::Uuid;

use super::{guarded, Outcome};
use crate::backend::{decode_rows, single, tables, to_row, Filter, RemoteTable, Select};
use crate::error::ApiError;
use crate::models::{PlanDraft, WorkoutPlan};

/// The caller's plans, active ones first, then newest.
pub async fn list_plans(remote: &dyn RemoteTable, user_id: &str) -> Outcome<Vec<WorkoutPlan>> {
  guarded("list_plans", async {
    let rows = remote
      .select(
        tables::WORKOUT_PLANS,
        &Select::new().eq("user_id", user_id).order("created_at", false),
      )
      .await?;
    let mut plans: Vec<WorkoutPlan> = decode_rows(rows)?;
    plans.sort_by_key(|p| !p.is_active);
    Ok(plans)
  })
  .await
}

pub async fn create_plan(
  remote: &dyn RemoteTable,
  user_id: &str,
  draft: PlanDraft,
) -> Outcome<WorkoutPlan> {
  guarded("create_plan", async {
    let plan = draft.into_plan(user_id);
    let rows = remote
      .insert(tables::WORKOUT_PLANS, vec![to_row(&plan)?])
      .await?;
    single(rows)
  })
  .await
}

pub async fn set_active_plan(
  remote: &dyn RemoteTable,
  user_id: &str,
  id: Uuid,
  active: bool,
) -> Outcome<WorkoutPlan> {
  guarded("set_active_plan", async {
    let rows = remote
      .update(
        tables::WORKOUT_PLANS,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
        json!({ "is_active": active }),
      )
      .await?;
    single(rows).map_err(|_| ApiError::not_found(format!("Plan {} not found", id)))
  })
  .await
}

pub async fn delete_plan(remote: &dyn RemoteTable, user_id: &str, id: Uuid) -> Outcome<()> {
  guarded("delete_plan", async {
    let removed = remote
      .delete(
        tables::WORKOUT_PLANS,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
      )
      .await?;
    if removed.is_empty() {
      return Err(ApiError::not_found(format!("Plan {} not found", id)));
    }
    Ok(())
  })
  .await
}
