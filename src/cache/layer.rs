//! Process-wide query cache with stale-while-revalidate.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::key::QueryKey;
use super::result::CacheResult;
use crate::error::ApiError;

type Value = Arc<dyn Any + Send + Sync>;
type Loaded = Result<(Value, DateTime<Utc>), ApiError>;
type SharedLoad = Shared<BoxFuture<'static, Loaded>>;

struct Entry {
  data: Value,
  fetched_at: DateTime<Utc>,
  stale_at: Instant,
}

#[derive(Default)]
struct Slot {
  entry: Option<Entry>,
  /// Load id and handle of the load currently running for this key
  inflight: Option<(u64, SharedLoad)>,
  error: Option<ApiError>,
}

#[derive(Default)]
struct Inner {
  slots: HashMap<QueryKey, Slot>,
  next_load: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
  inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache of query results keyed by [`QueryKey`].
///
/// The map lock is never held across an await. Every load runs on its own
/// spawned task and is shared between concurrent callers of the same key,
/// so the loader runs once no matter how many callers are waiting.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Mutex<Inner>>,
  stale_time: Duration,
}

impl QueryCache {
  pub fn new(stale_time: Duration) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner::default())),
      stale_time,
    }
  }

  /// Default stale time for callers without a more specific one.
  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  /// Fetch a query through the cache.
  ///
  /// 1. Fresh entry: return it, the loader is not called
  /// 2. Stale entry: return it and start one background revalidation
  /// 3. Missing entry: join the running load for this key, or start one
  pub async fn fetch<T, F, Fut>(
    &self,
    key: &QueryKey,
    loader: F,
    stale_time: Duration,
  ) -> Result<CacheResult<T>, ApiError>
  where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let load = {
      let mut inner = lock(&self.inner);
      let now = Instant::now();
      let cached = inner.slots.get(key).and_then(|slot| {
        let entry = slot.entry.as_ref()?;
        let data = entry.data.downcast_ref::<T>()?.clone();
        Some((data, entry.fetched_at, now >= entry.stale_at, slot.error.clone()))
      });

      match cached {
        Some((data, fetched_at, false, _)) => {
          return Ok(CacheResult::from_cache(data, fetched_at, false));
        }
        Some((data, fetched_at, true, failed)) => {
          if !Self::loading(&inner, key) {
            tracing::debug!(key = %key, "revalidating stale entry");
            let _ = self.start(&mut inner, key, loader, stale_time);
          }
          return Ok(CacheResult::from_cache(data, fetched_at, true).with_revalidation_error(failed));
        }
        None => {
          let running = inner
            .slots
            .get(key)
            .and_then(|slot| slot.inflight.as_ref())
            .map(|(_, load)| load.clone());
          match running {
            Some(load) => load,
            None => self.start(&mut inner, key, loader, stale_time),
          }
        }
      }
    };

    let (data, fetched_at) = load.await?;
    let data = data
      .downcast_ref::<T>()
      .cloned()
      .ok_or_else(|| ApiError::unexpected(format!("Cached value for {} has another type", key)))?;
    Ok(CacheResult::from_network(data, fetched_at))
  }

  /// Warm an entry in the background. Returns `false` without doing anything
  /// when the entry is fresh or a load is already running.
  pub fn prefetch<T, F, Fut>(&self, key: &QueryKey, loader: F, stale_time: Duration) -> bool
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let mut inner = lock(&self.inner);
    let now = Instant::now();
    if let Some(slot) = inner.slots.get(key) {
      let fresh = slot.entry.as_ref().is_some_and(|e| now < e.stale_at);
      if fresh || slot.inflight.is_some() {
        return false;
      }
    }
    tracing::debug!(key = %key, "prefetching");
    let _ = self.start(&mut inner, key, loader, stale_time);
    true
  }

  #[cfg(test)]
  /// Cached data for `key` without loading anything.
  pub fn peek<T: Clone + 'static>(&self, key: &QueryKey) -> Option<CacheResult<T>> {
    let inner = lock(&self.inner);
    let entry = inner.slots.get(key)?.entry.as_ref()?;
    let data = entry.data.downcast_ref::<T>()?.clone();
    Some(CacheResult::from_cache(
      data,
      entry.fetched_at,
      Instant::now() >= entry.stale_at,
    ))
  }

  #[cfg(test)]
  /// Error from the most recent failed load of `key`, cleared by the next success.
  pub fn last_error(&self, key: &QueryKey) -> Option<ApiError> {
    lock(&self.inner).slots.get(key)?.error.clone()
  }

  #[cfg(test)]
  pub fn is_loading(&self, key: &QueryKey) -> bool {
    Self::loading(&lock(&self.inner), key)
  }

  #[cfg(test)]
  /// Drop one entry. A load still running for it finishes but is not stored.
  pub fn invalidate(&self, key: &QueryKey) {
    lock(&self.inner).slots.remove(key);
  }

  /// Drop every entry of `entity` for `scope`, across all ranges.
  pub fn invalidate_entity(&self, entity: &str, scope: &str) {
    let mut inner = lock(&self.inner);
    let before = inner.slots.len();
    inner.slots.retain(|key, _| !key.is_entity(entity, scope));
    tracing::debug!(entity, scope, dropped = before - inner.slots.len(), "invalidated");
  }

  pub fn clear(&self) {
    lock(&self.inner).slots.clear();
  }

  fn loading(inner: &Inner, key: &QueryKey) -> bool {
    inner
      .slots
      .get(key)
      .is_some_and(|slot| slot.inflight.is_some())
  }

  /// Register and spawn a load for `key`. The caller holds the map lock.
  fn start<T, F, Fut>(
    &self,
    inner: &mut Inner,
    key: &QueryKey,
    loader: F,
    stale_time: Duration,
  ) -> SharedLoad
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    inner.next_load += 1;
    let id = inner.next_load;
    let state = Arc::clone(&self.inner);
    let slot_key = key.clone();
    let fut = loader();

    let load = async move {
      let result = fut.await;
      let fetched_at = Utc::now();
      let mut inner = lock(&state);
      // Only the load registered for this slot may write it; an invalidated
      // or replaced slot keeps its own state.
      let slot = inner
        .slots
        .get_mut(&slot_key)
        .filter(|slot| slot.inflight.as_ref().map(|(current, _)| *current) == Some(id));
      match result {
        Ok(data) => {
          let data: Value = Arc::new(data);
          if let Some(slot) = slot {
            slot.inflight = None;
            slot.error = None;
            slot.entry = Some(Entry {
              data: Arc::clone(&data),
              fetched_at,
              stale_at: Instant::now() + stale_time,
            });
          }
          Ok((data, fetched_at))
        }
        Err(error) => {
          tracing::warn!(key = %slot_key, kind = error.kind.as_str(), error = %error.message, "cache load failed");
          if let Some(slot) = slot {
            slot.inflight = None;
            slot.error = Some(error.clone());
          }
          Err(error)
        }
      }
    }
    .boxed()
    .shared();

    inner.slots.entry(key.clone()).or_default().inflight = Some((id, load.clone()));
    tokio::spawn(load.clone());
    load
  }
}
