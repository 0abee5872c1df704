//! Background fetches polled from the UI tick.
//!
//! A view owns a `Query<T>` per remote read (or write, see
//! [`crate::ui::mutation`]). `fetch` spawns the future on the runtime and
//! `poll` picks up the result without blocking the render loop. Freshness
//! lives in [`crate::cache::QueryCache`]; this type only tracks one
//! in-flight request at a time.

use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  Idle,
  Loading,
  Success(T),
  /// User-facing message
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

struct InFlight<T> {
  rx: oneshot::Receiver<Result<T, String>>,
  task: JoinHandle<()>,
}

/// One remote request and its last outcome.
///
/// While a refetch is loading, the previous data stays visible: `data()`
/// keeps returning the last success until the new result lands.
pub struct Query<T> {
  state: QueryState<T>,
  last: Option<T>,
  fetcher: FetcherFn<T>,
  in_flight: Option<InFlight<T>>,
}

impl<T> Query<T> {
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Latest successful result, including while a refetch is loading.
  pub fn data(&self) -> Option<&T> {
    self.state.data().or(self.last.as_ref())
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }
}

impl<T: Clone + Send + 'static> Query<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      last: None,
      fetcher: Box::new(move || Box::pin(fetcher())),
      in_flight: None,
    }
  }

  /// Start a request unless one is already running.
  pub fn fetch(&mut self) {
    if self.in_flight.is_none() {
      self.start();
    }
  }

  /// Abort any running request and start over. Dropping a query leaves its
  /// request running, so a write started from a closed view still lands.
  pub fn refetch(&mut self) {
    if let Some(old) = self.in_flight.take() {
      old.task.abort();
    }
    self.start();
  }

  /// Collect a finished request. Returns true when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(in_flight) = &mut self.in_flight else {
      return false;
    };
    let outcome = match in_flight.rx.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => Err("Request was cancelled".to_string()),
    };
    self.in_flight = None;
    self.state = match outcome {
      Ok(data) => {
        self.last = Some(data.clone());
        QueryState::Success(data)
      }
      Err(e) => {
        tracing::debug!(error = %e, "query failed");
        QueryState::Error(e)
      }
    };
    true
  }

  fn start(&mut self) {
    let (tx, rx) = oneshot::channel();
    if let QueryState::Success(data) = std::mem::replace(&mut self.state, QueryState::Loading) {
      self.last = Some(data);
    }
    let future = (self.fetcher)();
    let task = tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    self.in_flight = Some(InFlight { rx, task });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("in_flight", &self.in_flight.is_some())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn settle<T: Clone + Send + 'static>(query: &mut Query<T>) {
    for _ in 0..20 {
      tokio::task::yield_now().await;
      if query.poll() {
        return;
      }
    }
  }

  #[tokio::test]
  async fn test_result_arrives_on_poll() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec!["Run", "Swim"]) });
    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());
    settle(&mut query).await;
    assert_eq!(query.data(), Some(&vec!["Run", "Swim"]));
  }

  #[tokio::test]
  async fn test_error_message_is_kept() {
    let mut query: Query<u32> = Query::new(|| async { Err("Network error".to_string()) });
    query.fetch();
    settle(&mut query).await;
    assert!(query.is_error());
    assert!(matches!(query.state(), QueryState::Error(e) if e == "Network error"));
  }

  #[tokio::test]
  async fn test_previous_data_visible_during_refetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) }
    });
    query.fetch();
    settle(&mut query).await;

    query.refetch();
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&0));
    settle(&mut query).await;
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_refetch_aborts_running_request() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(n)
      }
    });

    query.fetch();
    query.fetch();
    tokio::task::yield_now().await;
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
