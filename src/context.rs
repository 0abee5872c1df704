//! The explicitly owned application context shared by the CLI and the TUI.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::sync::Arc;

use crate::auth::AuthStore;
use crate::backend::{
  tables, FileStorage, HttpAuthApi, HttpBase, HttpFileStorage, RemoteTable, RestClient,
};
use crate::cache::{CacheResult, QueryCache, QueryKey};
use crate::config::Config;
use crate::data::{activities, metrics, plans, workouts, DateRange};
use crate::error::ApiError;
use crate::load::{profile_loader, BoundedLoader, RetryPolicy};
use crate::models::{HealthActivity, HealthMetric, Profile, Workout, WorkoutPlan};
use crate::reminders::{Notifier, PollerSettings, ReminderPoller};
use crate::stats::DashboardSummary;
use crate::store::{LocalStore, MemoryStore, SqliteStore};

/// Days of history loaded for the dashboard (enough for a streak to show).
const DASHBOARD_DAYS: u32 = 30;

pub struct AppContext {
  pub config: Config,
  pub store: Arc<dyn LocalStore>,
  pub auth: Arc<AuthStore>,
  pub remote: Arc<dyn RemoteTable>,
  pub files: Arc<dyn FileStorage>,
  pub cache: QueryCache,
}

impl AppContext {
  /// Wire the HTTP clients and local storage described by `config`.
  pub fn from_config(config: Config) -> Result<Self> {
    let store: Arc<dyn LocalStore> = if config.storage.ephemeral {
      Arc::new(MemoryStore::new())
    } else {
      match &config.storage.path {
        Some(path) => Arc::new(SqliteStore::open_at(path)?),
        None => Arc::new(SqliteStore::open()?),
      }
    };

    let base = HttpBase::new(&config)?;
    let auth = Arc::new(AuthStore::new(
      Arc::new(HttpAuthApi::new(base.clone())),
      store.clone(),
    ));
    let remote: Arc<dyn RemoteTable> = Arc::new(RestClient::new(base.clone(), auth.clone()));
    let files: Arc<dyn FileStorage> = Arc::new(HttpFileStorage::new(base, auth.clone()));

    Ok(Self::from_parts(config, store, auth, remote, files))
  }

  pub fn from_parts(
    config: Config,
    store: Arc<dyn LocalStore>,
    auth: Arc<AuthStore>,
    remote: Arc<dyn RemoteTable>,
    files: Arc<dyn FileStorage>,
  ) -> Self {
    let cache = QueryCache::new(config.cache.stale_time());
    Self {
      config,
      store,
      auth,
      remote,
      files,
      cache,
    }
  }

  pub fn user_id(&self) -> Result<String, ApiError> {
    self.auth.require_user().map(|u| u.id)
  }

  pub async fn workouts(&self, range: DateRange) -> Result<CacheResult<Vec<Workout>>, ApiError> {
    let user_id = self.user_id()?;
    let key = QueryKey::new(tables::WORKOUTS, &user_id).with_range(range);
    let remote = self.remote.clone();
    self
      .cache
      .fetch(
        &key,
        move || async move {
          workouts::list_workouts(remote.as_ref(), &user_id, Some(range))
            .await
            .into_result()
        },
        self.cache.stale_time(),
      )
      .await
  }

  pub async fn plans(&self) -> Result<CacheResult<Vec<WorkoutPlan>>, ApiError> {
    let user_id = self.user_id()?;
    let key = QueryKey::new(tables::WORKOUT_PLANS, &user_id);
    let remote = self.remote.clone();
    self
      .cache
      .fetch(
        &key,
        move || async move { plans::list_plans(remote.as_ref(), &user_id).await.into_result() },
        self.cache.stale_time(),
      )
      .await
  }

  /// Metrics of every type in `range`; views filter by type.
  pub async fn metrics(&self, range: DateRange) -> Result<CacheResult<Vec<HealthMetric>>, ApiError> {
    let user_id = self.user_id()?;
    let key = QueryKey::new(tables::HEALTH_METRICS, &user_id).with_range(range);
    let remote = self.remote.clone();
    self
      .cache
      .fetch(
        &key,
        move || async move {
          metrics::list_metrics(remote.as_ref(), &user_id, None, Some(range))
            .await
            .into_result()
        },
        self.cache.stale_time(),
      )
      .await
  }

  pub async fn activities(
    &self,
    range: DateRange,
  ) -> Result<CacheResult<Vec<HealthActivity>>, ApiError> {
    let user_id = self.user_id()?;
    let key = QueryKey::new(tables::HEALTH_ACTIVITIES, &user_id).with_range(range);
    let remote = self.remote.clone();
    self
      .cache
      .fetch(
        &key,
        move || async move {
          activities::list_activities(remote.as_ref(), &user_id, Some(range))
            .await
            .into_result()
        },
        self.cache.stale_time(),
      )
      .await
  }

  /// Dashboard numbers; the three loads run concurrently.
  pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardSummary, ApiError> {
    let (history, upcoming) = dashboard_ranges(now);
    let (w, m, a) = futures::try_join!(
      self.workouts(history),
      self.metrics(history),
      self.activities(upcoming),
    )?;
    Ok(DashboardSummary::build(&w.data, &m.data, &a.data, now))
  }

  /// Warm the dashboard queries without waiting for them.
  pub fn prefetch_dashboard(&self, now: DateTime<Utc>) {
    let Ok(user_id) = self.user_id() else {
      return;
    };
    let (history, upcoming) = dashboard_ranges(now);
    let stale = self.cache.stale_time();

    let remote = self.remote.clone();
    let uid = user_id.clone();
    self.cache.prefetch(
      &QueryKey::new(tables::WORKOUTS, &user_id).with_range(history),
      move || async move {
        workouts::list_workouts(remote.as_ref(), &uid, Some(history))
          .await
          .into_result()
      },
      stale,
    );

    let remote = self.remote.clone();
    let uid = user_id.clone();
    self.cache.prefetch(
      &QueryKey::new(tables::HEALTH_METRICS, &user_id).with_range(history),
      move || async move {
        metrics::list_metrics(remote.as_ref(), &uid, None, Some(history))
          .await
          .into_result()
      },
      stale,
    );

    let remote = self.remote.clone();
    let uid = user_id.clone();
    self.cache.prefetch(
      &QueryKey::new(tables::HEALTH_ACTIVITIES, &user_id).with_range(upcoming),
      move || async move {
        activities::list_activities(remote.as_ref(), &uid, Some(upcoming))
          .await
          .into_result()
      },
      stale,
    );
  }

  /// Drop cached results for `table` after a write.
  pub fn invalidate(&self, table: &str) {
    if let Ok(user_id) = self.user_id() {
      self.cache.invalidate_entity(table, &user_id);
    }
  }

  pub fn profile_loader(&self) -> Result<BoundedLoader<Option<Profile>>, ApiError> {
    Ok(profile_loader(
      self.remote.clone(),
      self.store.clone(),
      self.user_id()?,
      RetryPolicy::from(&self.config.profile),
    ))
  }

  pub fn reminder_poller(&self, notifier: Arc<dyn Notifier>) -> Result<ReminderPoller, ApiError> {
    Ok(ReminderPoller::new(
      self.remote.clone(),
      notifier,
      self.user_id()?,
      PollerSettings::from(&self.config.reminders),
    ))
  }
}

/// Past-month history and the coming week.
fn dashboard_ranges(now: DateTime<Utc>) -> (DateRange, DateRange) {
  let today = now.date_naive();
  (
    DateRange::last_days(DASHBOARD_DAYS, today),
    DateRange::new(today, today + Duration::days(7)),
  )
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::backend::memory::{CallKind, MemoryAuth, MemoryFiles, MemoryTables};
  use crate::backend::UserRole;
  use crate::cache::CacheSource;
  use crate::models::{Intensity, WorkoutDraft};

  pub(crate) struct Harness {
    pub ctx: Arc<AppContext>,
    pub remote: Arc<MemoryTables>,
  }

  /// Context over in-memory fakes with `ann@example.com` / `secret123` (u1) registered.
  pub(crate) fn harness() -> Harness {
    let config = Config::parse("backend:\n  url: https://demo.supabase.co\n").unwrap();
    let api = Arc::new(MemoryAuth::new());
    api.add_account("ann@example.com", "secret123", "u1", UserRole::User);
    let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
    let auth = Arc::new(AuthStore::new(api, store.clone()));
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let ctx = AppContext::from_parts(
      config,
      store,
      auth,
      remote.clone(),
      Arc::new(MemoryFiles::default()),
    );
    Harness {
      ctx: Arc::new(ctx),
      remote,
    }
  }

  #[tokio::test]
  async fn test_queries_require_sign_in() {
    let h = harness();
    let range = DateRange::last_days(7, Utc::now().date_naive());
    let err = h.ctx.workouts(range).await.unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Unauthorized);
    assert_eq!(h.remote.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_second_fetch_is_served_from_cache() {
    let h = harness();
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    let range = DateRange::last_days(7, Utc::now().date_naive());

    let first = h.ctx.workouts(range).await.unwrap();
    let second = h.ctx.workouts(range).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(h.remote.calls(CallKind::Select, tables::WORKOUTS), 1);
  }

  #[tokio::test]
  async fn test_invalidate_after_write_refetches() {
    let h = harness();
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    let now = Utc::now();
    let range = DateRange::last_days(7, now.date_naive());
    assert!(h.ctx.workouts(range).await.unwrap().data.is_empty());

    let draft = WorkoutDraft {
      workout_type: "Swim".into(),
      duration_minutes: 30,
      calories_burned: None,
      intensity: Intensity::Low,
      notes: None,
      performed_at: now,
    };
    workouts::create_workout(h.ctx.remote.as_ref(), "u1", draft)
      .await
      .into_result()
      .unwrap();
    h.ctx.invalidate(tables::WORKOUTS);

    let after = h.ctx.workouts(range).await.unwrap();
    assert_eq!(after.data.len(), 1);
    assert_eq!(h.remote.calls(CallKind::Select, tables::WORKOUTS), 2);
  }

  #[tokio::test]
  async fn test_dashboard_after_prefetch_uses_warm_entries() {
    let h = harness();
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    let now = Utc::now();
    h.ctx.prefetch_dashboard(now);

    let summary = h.ctx.dashboard(now).await.unwrap();
    assert_eq!(summary.workouts_this_week, 0);
    assert_eq!(h.remote.calls(CallKind::Select, tables::WORKOUTS), 1);
    assert_eq!(h.remote.calls(CallKind::Select, tables::HEALTH_METRICS), 1);
    assert_eq!(h.remote.calls(CallKind::Select, tables::HEALTH_ACTIVITIES), 1);
  }
}
