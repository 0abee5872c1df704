//! Cache results and where they came from.

use crate::error::ApiError;
use chrono::{DateTime, Utc};

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the backend
  pub fetched_at: DateTime<Utc>,
  /// Set on a stale result when the previous revalidation of this entry failed
  pub revalidation_error: Option<ApiError>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from data that was just loaded.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
      revalidation_error: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, fetched_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      fetched_at,
      revalidation_error: None,
    }
  }

  pub fn with_revalidation_error(mut self, error: Option<ApiError>) -> Self {
    self.revalidation_error = error;
    self
  }

  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::CacheStale
  }

}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Loaded from the backend for this request
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache past its stale time; a revalidation is running
  CacheStale,
}
