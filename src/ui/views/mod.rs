mod activities;
mod auth;
mod dashboard;
mod metrics;
mod plans;
mod profile;
mod signups;
mod workouts;

pub use activities::ActivitiesView;
pub use auth::{SignInView, SignUpView};
pub use dashboard::DashboardView;
pub use metrics::MetricsView;
pub use plans::PlansView;
pub use profile::ProfileView;
pub use signups::SignupsView;
pub use workouts::WorkoutsView;

use crate::cache::{CacheResult, CacheSource};
use crate::error::ApiError;
use crate::query::Query;
use crate::ui::renderfns::utils::local_time;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// Delay before re-reading an entry that was served stale
const RECHECK_AFTER: Duration = Duration::from_secs(2);
/// Longest wait between re-reads while revalidation keeps failing
const MAX_RECHECK: Duration = Duration::from_secs(5 * 60);

/// A query served through the cache.
///
/// A stale answer is shown immediately while the cache revalidates in the
/// background; the view re-reads the entry shortly after to pick up the
/// fresh value. When the cache reports that revalidation failed, re-reads
/// back off exponentially until a fresh answer or a manual refetch.
pub struct CachedQuery<T> {
  query: Query<CacheResult<T>>,
  recheck_at: Option<Instant>,
  backoff: Duration,
}

impl<T: Clone + Send + 'static> CachedQuery<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CacheResult<T>, ApiError>> + Send + 'static,
  {
    let mut query = Query::new(move || {
      let fut = fetcher();
      async move { fut.await.map_err(|e| e.to_string()) }
    });
    query.fetch();
    Self {
      query,
      recheck_at: None,
      backoff: RECHECK_AFTER,
    }
  }

  pub fn query(&self) -> &Query<CacheResult<T>> {
    &self.query
  }

  pub fn data(&self) -> Option<&T> {
    self.query.data().map(|r| &r.data)
  }

  pub fn refetch(&mut self) {
    self.recheck_at = None;
    self.backoff = RECHECK_AFTER;
    self.query.refetch();
  }

  pub fn tick(&mut self) {
    if self.query.poll() {
      self.recheck_at = match self.query.data() {
        Some(r) if r.is_stale() => {
          let wait = if r.revalidation_error.is_some() {
            self.backoff = (self.backoff * 2).min(MAX_RECHECK);
            self.backoff
          } else {
            RECHECK_AFTER
          };
          Some(Instant::now() + wait)
        }
        _ => {
          self.backoff = RECHECK_AFTER;
          None
        }
      };
    }
    if self.recheck_at.is_some_and(|at| Instant::now() >= at) {
      self.recheck_at = None;
      self.query.refetch();
    }
  }

  /// Suffix for titles while showing cached data that is being refreshed
  pub fn freshness(&self) -> String {
    let Some(result) = self.query.data() else {
      return String::new();
    };
    match (result.source, &result.revalidation_error) {
      (CacheSource::CacheStale, Some(e)) => {
        format!(" · from {}, refresh failed: {}", local_time(result.fetched_at), e.message)
      }
      (CacheSource::CacheStale, None) => " · refreshing".to_string(),
      _ => String::new(),
    }
  }
}

/// Empty input means "not given"
fn opt_parse<T: FromStr>(raw: &str, what: &str) -> Result<Option<T>, String> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(None);
  }
  raw
    .parse()
    .map(Some)
    .map_err(|_| format!("{} must be a number", what))
}

fn required<T: FromStr>(raw: &str, what: &str) -> Result<T, String> {
  opt_parse(raw, what)?.ok_or_else(|| format!("{} is required", what))
}

fn opt_text(raw: &str) -> Option<String> {
  let raw = raw.trim();
  (!raw.is_empty()).then(|| raw.to_string())
}
