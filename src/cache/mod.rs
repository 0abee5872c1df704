//! Query cache shared by every view and command.
//!
//! - Entries are keyed by entity, user scope and optional date range
//! - Fresh entries are served without touching the backend
//! - Stale entries are served immediately while one revalidation runs
//! - Concurrent requests for the same key share a single load

mod key;
mod layer;
mod result;

pub use key::QueryKey;
pub use layer::QueryCache;
pub use result::{CacheResult, CacheSource};
