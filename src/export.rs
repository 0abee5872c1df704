//! Export a user's data to a JSON bundle and import it back.
//!
//! A bundle is `{manifest, data}`. The manifest records the format version,
//! per-table row counts and hashes, and a sha256 over the serialized data
//! that import checks before writing anything.

use chrono::{SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::backend::{tables, to_row, AuthUser, RemoteTable};
use crate::data::{activities, metrics, plans, profile, workouts};
use crate::error::ApiError;
use crate::models::{HealthActivity, HealthMetric, Profile, Workout, WorkoutPlan};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TableInfo {
  pub count: u64,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
  pub app_version: String,
  pub format_version: u32,
  pub created_at: String,
  pub tables: BTreeMap<String, TableInfo>,
  /// Hash of the whole `data` section
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExportData {
  pub profile: Option<Profile>,
  #[serde(default)]
  pub workouts: Vec<Workout>,
  #[serde(default)]
  pub plans: Vec<WorkoutPlan>,
  #[serde(default)]
  pub metrics: Vec<HealthMetric>,
  #[serde(default)]
  pub activities: Vec<HealthActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExport {
  pub manifest: ExportManifest,
  pub data: ExportData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  pub profile: bool,
  pub workouts: usize,
  pub plans: usize,
  pub metrics: usize,
  pub activities: usize,
}

fn sha256_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
  let bytes = serde_json::to_vec(value)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

fn table_info<T: Serialize>(rows: &[T]) -> Result<TableInfo, ApiError> {
  Ok(TableInfo {
    count: rows.len() as u64,
    sha256: sha256_json(&rows)?,
  })
}

impl UserExport {
  pub fn new(data: ExportData) -> Result<Self, ApiError> {
    let mut infos = BTreeMap::new();
    infos.insert(tables::WORKOUTS.to_string(), table_info(&data.workouts)?);
    infos.insert(tables::WORKOUT_PLANS.to_string(), table_info(&data.plans)?);
    infos.insert(tables::HEALTH_METRICS.to_string(), table_info(&data.metrics)?);
    infos.insert(tables::HEALTH_ACTIVITIES.to_string(), table_info(&data.activities)?);
    let manifest = ExportManifest {
      app_version: env!("CARGO_PKG_VERSION").to_string(),
      format_version: FORMAT_VERSION,
      created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      tables: infos,
      sha256: sha256_json(&data)?,
    };
    Ok(Self { manifest, data })
  }

  /// Check format version and checksum.
  pub fn verify(&self) -> Result<(), ApiError> {
    if self.manifest.format_version != FORMAT_VERSION {
      return Err(ApiError::validation(format!(
        "Unsupported export format {} (expected {})",
        self.manifest.format_version, FORMAT_VERSION
      )));
    }
    if sha256_json(&self.data)? != self.manifest.sha256 {
      return Err(ApiError::validation(
        "Export checksum does not match its data; the file was modified or is corrupt",
      ));
    }
    Ok(())
  }
}

/// Collect everything the user owns.
pub async fn export_user(remote: &dyn RemoteTable, user_id: &str) -> Result<UserExport, ApiError> {
  let data = ExportData {
    profile: profile::get_profile(remote, user_id).await.into_result()?,
    workouts: workouts::list_workouts(remote, user_id, None).await.into_result()?,
    plans: plans::list_plans(remote, user_id).await.into_result()?,
    metrics: metrics::list_metrics(remote, user_id, None, None)
      .await
      .into_result()?,
    activities: activities::list_activities(remote, user_id, None)
      .await
      .into_result()?,
  };
  let export = UserExport::new(data)?;
  tracing::info!(
    user = user_id,
    workouts = export.data.workouts.len(),
    metrics = export.data.metrics.len(),
    "export built"
  );
  Ok(export)
}

/// Write a verified bundle into the actor's account.
///
/// Rows are re-owned by the actor and creation timestamps are left to the
/// backend. The profile keeps the actor's own email. Row ids are kept, so
/// importing the same bundle twice updates instead of duplicating.
pub async fn import_user(
  remote: &dyn RemoteTable,
  actor: &AuthUser,
  export: UserExport,
) -> Result<ImportReport, ApiError> {
  export.verify()?;
  let user_id = actor.id.as_str();
  let data = export.data;
  let mut report = ImportReport::default();

  if let Some(mut p) = data.profile {
    p.email = actor.email.clone();
    p.created_at = None;
    profile::upsert_profile(remote, user_id, &p).await.into_result()?;
    report.profile = true;
  }

  let owned = |mut w: Workout| {
    w.user_id = user_id.to_string();
    w.created_at = None;
    w
  };
  let rows: Vec<Workout> = data.workouts.into_iter().map(owned).collect();
  report.workouts = upsert_rows(remote, tables::WORKOUTS, &rows).await?;

  let rows: Vec<WorkoutPlan> = data
    .plans
    .into_iter()
    .map(|mut p| {
      p.user_id = user_id.to_string();
      p.created_at = None;
      p
    })
    .collect();
  report.plans = upsert_rows(remote, tables::WORKOUT_PLANS, &rows).await?;

  let rows: Vec<HealthMetric> = data
    .metrics
    .into_iter()
    .map(|mut m| {
      m.user_id = user_id.to_string();
      m
    })
    .collect();
  report.metrics = upsert_rows(remote, tables::HEALTH_METRICS, &rows).await?;

  let rows: Vec<HealthActivity> = data
    .activities
    .into_iter()
    .map(|mut a| {
      a.user_id = user_id.to_string();
      a
    })
    .collect();
  report.activities = upsert_rows(remote, tables::HEALTH_ACTIVITIES, &rows).await?;

  tracing::info!(user = user_id, ?report, "import finished");
  Ok(report)
}

async fn upsert_rows<T: Serialize>(
  remote: &dyn RemoteTable,
  table: &str,
  rows: &[T],
) -> Result<usize, ApiError> {
  if rows.is_empty() {
    return Ok(0);
  }
  let values = rows.iter().map(to_row).collect::<Result<Vec<_>, _>>()?;
  let stored = remote.upsert(table, values, "id").await?;
  Ok(stored.len())
}

pub fn write_file(path: &Path, export: &UserExport) -> Result<()> {
  let json = serde_json::to_string_pretty(export).map_err(|e| eyre!("Failed to serialize export: {}", e))?;
  std::fs::write(path, json).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
}

pub fn read_file(path: &Path) -> Result<UserExport> {
  let raw = std::fs::read_to_string(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&raw).map_err(|e| eyre!("{} is not a vitals export: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryTables;
  use crate::backend::UserRole;
  use crate::error::ErrorKind;
  use crate::models::{Intensity, MetricDraft, MetricType, WorkoutDraft};
  use chrono::{Duration, NaiveDate};

  async fn seeded_remote() -> MemoryTables {
    let remote = MemoryTables::new();
    let mut p = Profile::empty("u1", "ann@example.com");
    p.full_name = Some("Ann".into());
    p.height_cm = Some(170.0);
    p.weight_kg = Some(62.5);
    p.date_of_birth = NaiveDate::from_ymd_opt(1990, 4, 2);
    p.fitness_goal = Some("10k under 50 minutes".into());
    profile::upsert_profile(&remote, "u1", &p).await.into_result().unwrap();

    let draft = WorkoutDraft {
      workout_type: "Run".into(),
      duration_minutes: 42,
      calories_burned: Some(400),
      intensity: Intensity::High,
      notes: Some("tempo".into()),
      performed_at: Utc::now() - Duration::days(1),
    };
    workouts::create_workout(&remote, "u1", draft).await.into_result().unwrap();

    let draft = MetricDraft {
      metric_type: MetricType::Sleep,
      value: 7.25,
      notes: None,
      recorded_at: Utc::now(),
    };
    metrics::record_metric(&remote, "u1", draft).await.into_result().unwrap();
    remote
  }

  fn bob() -> AuthUser {
    AuthUser {
      id: "u2".into(),
      email: "bob@example.com".into(),
      role: UserRole::User,
      full_name: None,
    }
  }

  #[tokio::test]
  async fn test_import_keeps_the_importers_email() {
    let source = seeded_remote().await;
    let export = export_user(&source, "u1").await.unwrap();

    let target = MemoryTables::with_actor("u2");
    let own = Profile::empty("u2", "bob@example.com");
    profile::upsert_profile(&target, "u2", &own).await.into_result().unwrap();

    import_user(&target, &bob(), export).await.unwrap();
    let restored = profile::get_profile(&target, "u2")
      .await
      .into_result()
      .unwrap()
      .unwrap();
    assert_eq!(restored.email, "bob@example.com");
    assert_eq!(restored.full_name.as_deref(), Some("Ann"));
  }

  #[tokio::test]
  async fn test_round_trip_restores_profile_into_other_account() {
    let source = seeded_remote().await;
    let export = export_user(&source, "u1").await.unwrap();
    assert_eq!(export.manifest.tables[tables::WORKOUTS].count, 1);
    export.verify().unwrap();

    let target = MemoryTables::with_actor("u2");
    let report = import_user(&target, &bob(), export.clone()).await.unwrap();
    assert_eq!(
      report,
      ImportReport {
        profile: true,
        workouts: 1,
        plans: 0,
        metrics: 1,
        activities: 0
      }
    );

    let restored = profile::get_profile(&target, "u2")
      .await
      .into_result()
      .unwrap()
      .unwrap();
    let original = export.data.profile.unwrap();
    assert_eq!(restored.id, "u2");
    assert_eq!(restored.full_name, original.full_name);
    assert_eq!(restored.height_cm, original.height_cm);
    assert_eq!(restored.weight_kg, original.weight_kg);
    assert_eq!(restored.date_of_birth, original.date_of_birth);
    assert_eq!(restored.fitness_goal, original.fitness_goal);

    let imported = workouts::list_workouts(&target, "u2", None)
      .await
      .into_result()
      .unwrap();
    assert_eq!(imported[0].user_id, "u2");
    assert_eq!(imported[0].notes.as_deref(), Some("tempo"));
  }

  #[tokio::test]
  async fn test_reimport_does_not_duplicate() {
    let source = seeded_remote().await;
    let export = export_user(&source, "u1").await.unwrap();
    let target = MemoryTables::with_actor("u2");
    import_user(&target, &bob(), export.clone()).await.unwrap();
    import_user(&target, &bob(), export).await.unwrap();
    assert_eq!(target.rows(tables::WORKOUTS).len(), 1);
  }

  #[tokio::test]
  async fn test_tampered_export_is_rejected() {
    let source = seeded_remote().await;
    let mut export = export_user(&source, "u1").await.unwrap();
    export.data.workouts[0].duration_minutes = 420;

    let target = MemoryTables::with_actor("u2");
    let err = import_user(&target, &bob(), export).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(target.total_calls(), 0);
  }

  #[test]
  fn test_unknown_version_is_rejected() {
    let mut export = UserExport::new(ExportData::default()).unwrap();
    export.manifest.format_version = 99;
    assert!(export.verify().unwrap_err().message.contains("99"));
  }

  #[tokio::test]
  async fn test_file_round_trip_keeps_checksum_valid() {
    let source = seeded_remote().await;
    let export = export_user(&source, "u1").await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");

    write_file(&path, &export).unwrap();
    let back = read_file(&path).unwrap();
    back.verify().unwrap();
    assert_eq!(back, export);
  }
}
