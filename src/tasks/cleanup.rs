//! Expired Entry Sweeper
//!
//! Background task that periodically drops entries which expired longer ago
//! than the engine's stale retention, so stale values kept around for
//! stale-while-revalidate do not pile up.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheEngine, CacheValue, FetchError};

/// Spawns a background task that periodically purges long-expired entries.
///
/// # Arguments
/// * `engine` - Handle to the engine to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let engine: CacheEngine<Issue, SharedError> = CacheEngine::new(EngineConfig::default());
/// let cleanup_handle = spawn_cleanup_task(engine.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V, E>(engine: CacheEngine<V, E>, interval: Duration) -> JoinHandle<()>
where
    V: CacheValue,
    E: FetchError,
{
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting expired entry sweeper"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = engine.purge_expired();
            if removed > 0 {
                info!("Sweep removed {} expired entries", removed);
            } else {
                debug!("Sweep found no expired entries");
            }
        }
    })
}

/// Starts the sweeper if the engine config sets `cleanup_interval`.
pub fn spawn_configured_cleanup<V, E>(engine: &CacheEngine<V, E>) -> Option<JoinHandle<()>>
where
    V: CacheValue,
    E: FetchError,
{
    engine
        .config()
        .cleanup_interval
        .map(|interval| spawn_cleanup_task(engine.clone(), interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, EngineConfig};
    use crate::error::SharedError;

    type Engine = CacheEngine<String, SharedError>;

    fn engine(cleanup_interval: Option<Duration>) -> Engine {
        CacheEngine::new(EngineConfig {
            cleanup_interval,
            stale_retention: Duration::ZERO,
            ..EngineConfig::default()
        })
    }

    async fn store(engine: &Engine, key: &str, ttl: Duration) {
        let config = CacheConfig::default().with_ttl(ttl);
        engine
            .get_with_config(key, &config, || async {
                Ok::<_, SharedError>("value".to_string())
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let engine = engine(None);
        store(&engine, "expire_soon", Duration::from_secs(1)).await;

        let handle = spawn_cleanup_task(engine.clone(), Duration::from_secs(1));

        // Paused clock auto-advances through the sweeps
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(engine.is_empty(), "Expired entry should have been swept");
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let engine = engine(None);
        store(&engine, "long_lived", Duration::from_secs(3600)).await;

        let handle = spawn_cleanup_task(engine.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(engine.has("long_lived"), "Valid entry should not be removed");
        handle.abort();
    }

    #[tokio::test]
    async fn test_configured_cleanup() {
        assert!(spawn_configured_cleanup(&engine(None)).is_none());

        let handle = spawn_configured_cleanup(&engine(Some(Duration::from_secs(1))))
            .expect("sweeper should start when an interval is configured");
        handle.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
