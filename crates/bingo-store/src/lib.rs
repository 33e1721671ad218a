//! Key-value persistence for game configs, game state, and service health.
//!
//! Values are opaque strings (JSON blobs written by higher layers) with no
//! versioning. The [`StateStore`] trait is the only thing the session engine
//! depends on, so the truth can live in a shared external store while any
//! engine process hosts the in-memory session.
//!
//! [`MemoryStore`] is the in-process implementation used by the bundled
//! binary and by tests.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use std::future::Future;
use std::time::Duration;

/// Blob storage keyed by string.
///
/// Implementations must be cheap to share behind an `Arc`; every session
/// and the service heartbeat hold a reference to the same store.
pub trait StateStore: Send + Sync + 'static {
    /// Returns the value at `key`, or `None` if it is absent or expired.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Writes `value` at `key`, replacing any previous value.
    ///
    /// With `ttl` set the key disappears after that long; without it the
    /// key lives until deleted.
    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes every key in `keys`, returning how many existed.
    fn delete(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
