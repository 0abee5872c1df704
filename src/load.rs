//! Bounded retry for the initial load of a resource.
//!
//! A load goes `Idle -> Loading{attempt} -> Loaded | Failed`. Failures are
//! retried automatically a fixed number of times with a fixed delay; after
//! that the loader stays `Failed` until someone calls [`BoundedLoader::retry`].

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::backend::RemoteTable;
use crate::config::ProfileConfig;
use crate::data::profile::get_profile;
use crate::error::ApiError;
use crate::models::Profile;
use crate::store::{keys, LocalStore};

pub const MAX_LOAD_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
  Idle,
  Loading { attempt: u32 },
  Loaded(T),
  Failed { attempts: u32, error: ApiError },
}

impl<T> LoadState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading { .. })
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      LoadState::Loaded(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      LoadState::Failed { error, .. } => Some(error),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: MAX_LOAD_ATTEMPTS,
      delay: RETRY_DELAY,
    }
  }
}

impl From<&ProfileConfig> for RetryPolicy {
  fn from(config: &ProfileConfig) -> Self {
    Self {
      max_attempts: config.max_load_attempts.max(1),
      delay: Duration::from_millis(config.retry_delay_ms),
    }
  }
}

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Runs a fetcher with bounded retries and publishes its state.
pub struct BoundedLoader<T> {
  fetcher: FetcherFn<T>,
  policy: RetryPolicy,
  state: watch::Sender<LoadState<T>>,
  attempted: AtomicBool,
  running: Mutex<()>,
}

impl<T: Clone + Send + Sync + 'static> BoundedLoader<T> {
  pub fn new<F, Fut>(policy: RetryPolicy, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let (state, _) = watch::channel(LoadState::Idle);
    Self {
      fetcher: Box::new(move || Box::pin(fetcher())),
      policy,
      state,
      attempted: AtomicBool::new(false),
      running: Mutex::new(()),
    }
  }

  pub fn state(&self) -> LoadState<T> {
    self.state.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<LoadState<T>> {
    self.state.subscribe()
  }

  /// Start the initial load. Only the first call does anything; later calls
  /// return the current state.
  pub async fn load(&self) -> LoadState<T> {
    if self.attempted.swap(true, Ordering::SeqCst) {
      return self.state();
    }
    self.run().await
  }

  /// Load again regardless of earlier attempts.
  pub async fn refresh(&self) -> LoadState<T> {
    self.attempted.store(true, Ordering::SeqCst);
    self.run().await
  }

  /// Manual retry once automatic retries are exhausted. Does nothing unless
  /// the loader is `Failed`.
  pub async fn retry(&self) -> LoadState<T> {
    if !matches!(self.state(), LoadState::Failed { .. }) {
      return self.state();
    }
    self.refresh().await
  }

  async fn run(&self) -> LoadState<T> {
    let _running = self.running.lock().await;
    let mut attempt = 1;
    loop {
      self.state.send_replace(LoadState::Loading { attempt });
      match (self.fetcher)().await {
        Ok(data) => {
          let state = LoadState::Loaded(data);
          self.state.send_replace(state.clone());
          return state;
        }
        Err(error) if attempt >= self.policy.max_attempts => {
          tracing::warn!(attempts = attempt, error = %error, "load failed, giving up");
          let state = LoadState::Failed {
            attempts: attempt,
            error,
          };
          self.state.send_replace(state.clone());
          return state;
        }
        Err(error) => {
          tracing::debug!(attempt, error = %error, "load failed, retrying");
          tokio::time::sleep(self.policy.delay).await;
          attempt += 1;
        }
      }
    }
  }
}

/// Loader for the signed-in user's profile.
///
/// A user without a profile row loads as `Loaded(None)`. Each successful load
/// is written to local storage so [`cached_profile`] can stand in when the
/// backend is unreachable.
pub fn profile_loader(
  remote: Arc<dyn RemoteTable>,
  store: Arc<dyn LocalStore>,
  user_id: String,
  policy: RetryPolicy,
) -> BoundedLoader<Option<Profile>> {
  BoundedLoader::new(policy, move || {
    let remote = Arc::clone(&remote);
    let store = Arc::clone(&store);
    let user_id = user_id.clone();
    async move {
      let profile = get_profile(remote.as_ref(), &user_id).await.into_result()?;
      if let Some(profile) = &profile {
        if let Err(e) = store.set_json(&keys::profile_cache(&user_id), profile) {
          tracing::warn!(error = %e, "failed to cache profile");
        }
      }
      Ok(profile)
    }
  })
}

/// Last profile written by [`profile_loader`] for this user.
pub fn cached_profile(store: &dyn LocalStore, user_id: &str) -> Option<Profile> {
  store
    .get_json(&keys::profile_cache(user_id))
    .unwrap_or_else(|e| {
      tracing::warn!(error = %e, "failed to read cached profile");
      None
    })
}
