//! Service liveness reporting.
//!
//! A running engine rewrites `service-health:{service_name}` in the state
//! store on a fixed interval. Other services (and the health endpoint of
//! the web app) read it back with [`check_health`] to decide whether the
//! engine is up. The record carries a TTL of twice the interval, so a dead
//! process disappears from the store on its own.

use std::sync::Arc;
use std::time::Duration;

use bingo_protocol::{Codec, JsonCodec, ProtocolError};
use bingo_store::StateStore;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::BingoError;

/// How old a record may be before [`check_health`] calls it stale.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(90);

/// The stored liveness record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub iso_timestamp: String,
    pub process_id: u32,
    pub service_name: String,
}

/// Store key for a service's liveness record.
pub fn health_key(service_name: &str) -> String {
    format!("service-health:{service_name}")
}

/// Periodically writes this process's [`HealthRecord`].
pub struct ServiceHeartbeat<S> {
    store: Arc<S>,
    service_name: String,
    interval: Duration,
}

impl<S: StateStore> ServiceHeartbeat<S> {
    pub fn new(
        store: Arc<S>,
        service_name: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            service_name: service_name.into(),
            interval,
        }
    }

    /// Writes one record stamped with the current time.
    pub async fn beat(&self) -> Result<(), BingoError> {
        let record = HealthRecord {
            iso_timestamp: Utc::now()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            process_id: std::process::id(),
            service_name: self.service_name.clone(),
        };
        let value = JsonCodec.encode(&record)?;
        self.store
            .set(&health_key(&self.service_name), value, Some(self.interval * 2))
            .await?;
        Ok(())
    }

    /// Beats immediately and then once per interval until the task is
    /// aborted. A failed write is logged and retried on the next tick.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            tracing::info!(
                service = %self.service_name,
                interval = ?self.interval,
                "service heartbeat started"
            );
            loop {
                ticker.tick().await;
                match self.beat().await {
                    Ok(()) => tracing::trace!(service = %self.service_name, "heartbeat written"),
                    Err(err) => tracing::error!(
                        service = %self.service_name,
                        error = %err,
                        "failed to write service heartbeat"
                    ),
                }
            }
        })
    }
}

/// What [`check_health`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy { age: Duration },
    /// A record exists but is older than the allowed delay.
    Stale { age: Duration },
    /// No record: never started, or its TTL ran out.
    Missing,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

/// Reads a service's liveness record and judges its age against
/// `max_delay`.
///
/// A record stamped in the future (clock skew between hosts) counts as age
/// zero.
pub async fn check_health<S: StateStore>(
    store: &S,
    service_name: &str,
    max_delay: Duration,
) -> Result<HealthStatus, BingoError> {
    let Some(raw) = store.get(&health_key(service_name)).await? else {
        return Ok(HealthStatus::Missing);
    };
    let record: HealthRecord = JsonCodec.decode(raw.as_bytes())?;
    let stamped = DateTime::parse_from_rfc3339(&record.iso_timestamp)
        .map_err(|e| {
            ProtocolError::InvalidMessage(format!(
                "bad heartbeat timestamp {:?}: {e}",
                record.iso_timestamp
            ))
        })?;
    let age = Utc::now()
        .signed_duration_since(stamped)
        .to_std()
        .unwrap_or(Duration::ZERO);

    if age > max_delay {
        Ok(HealthStatus::Stale { age })
    } else {
        Ok(HealthStatus::Healthy { age })
    }
}

#[cfg(test)]
mod tests {
    use bingo_store::MemoryStore;

    use super::*;

    async fn write_record(store: &MemoryStore, name: &str, at: DateTime<Utc>) {
        let record = HealthRecord {
            iso_timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            process_id: 1,
            service_name: name.into(),
        };
        store
            .set(&health_key(name), JsonCodec.encode(&record).unwrap(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_beat_writes_record_under_service_key() {
        let store = Arc::new(MemoryStore::new());
        let heartbeat = ServiceHeartbeat::new(
            Arc::clone(&store),
            "game-service",
            Duration::from_secs(30),
        );
        heartbeat.beat().await.unwrap();

        let raw = store.get("service-health:game-service").await.unwrap().unwrap();
        let record: HealthRecord = JsonCodec.decode(raw.as_bytes()).unwrap();
        assert_eq!(record.service_name, "game-service");
        assert_eq!(record.process_id, std::process::id());
        assert!(raw.contains("isoTimestamp"));
    }

    #[tokio::test]
    async fn test_check_health_fresh_record_is_healthy() {
        let store = Arc::new(MemoryStore::new());
        ServiceHeartbeat::new(Arc::clone(&store), "svc", Duration::from_secs(30))
            .beat()
            .await
            .unwrap();

        let status = check_health(store.as_ref(), "svc", DEFAULT_MAX_DELAY)
            .await
            .unwrap();
        assert!(status.is_healthy());
    }

    #[tokio::test]
    async fn test_check_health_old_record_is_stale() {
        let store = MemoryStore::new();
        write_record(&store, "svc", Utc::now() - chrono::Duration::seconds(120)).await;

        let status = check_health(&store, "svc", DEFAULT_MAX_DELAY).await.unwrap();
        assert!(matches!(status, HealthStatus::Stale { age } if age >= Duration::from_secs(119)));
    }

    #[tokio::test]
    async fn test_check_health_future_record_is_healthy() {
        let store = MemoryStore::new();
        write_record(&store, "svc", Utc::now() + chrono::Duration::seconds(30)).await;

        let status = check_health(&store, "svc", DEFAULT_MAX_DELAY).await.unwrap();
        assert_eq!(status, HealthStatus::Healthy { age: Duration::ZERO });
    }

    #[tokio::test]
    async fn test_check_health_no_record_is_missing() {
        let store = MemoryStore::new();
        let status = check_health(&store, "nobody", DEFAULT_MAX_DELAY).await.unwrap();
        assert_eq!(status, HealthStatus::Missing);
    }

    #[tokio::test]
    async fn test_check_health_garbage_record_is_error() {
        let store = MemoryStore::new();
        store
            .set(&health_key("svc"), "not json".into(), None)
            .await
            .unwrap();
        let result = check_health(&store, "svc", DEFAULT_MAX_DELAY).await;
        assert!(matches!(result, Err(BingoError::Protocol(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_record_expires_without_beats() {
        let store = Arc::new(MemoryStore::new());
        let interval = Duration::from_secs(30);
        ServiceHeartbeat::new(Arc::clone(&store), "svc", interval)
            .beat()
            .await
            .unwrap();

        tokio::time::advance(interval * 2 + Duration::from_secs(1)).await;
        let status = check_health(store.as_ref(), "svc", DEFAULT_MAX_DELAY)
            .await
            .unwrap();
        assert_eq!(status, HealthStatus::Missing);
    }
}
