//! In-memory execution context store
//!
//! Volatile by design: contexts live for the process lifetime at most,
//! with a TTL sweep reclaiming idle runs. Each context sits behind its
//! own mutex so step submissions for one run serialize while separate
//! runs proceed independently.

use chrono::{Duration as TtlDuration, Utc};
use dashmap::DashMap;
use reelcheck_common::{Error, ExecutionContext, Result, RunSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone)]
pub struct ContextStore {
    runs: Arc<DashMap<String, Arc<Mutex<ExecutionContext>>>>,
    ttl: TtlDuration,
}

impl ContextStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            runs: Arc::new(DashMap::new()),
            ttl: TtlDuration::from_std(ttl).unwrap_or_else(|_| TtlDuration::hours(1)),
        }
    }

    /// Insert a freshly created context keyed by its run id. A repeated
    /// start within the same second hashes to the same id and resets
    /// the run.
    pub fn create(&self, ctx: ExecutionContext) -> Arc<Mutex<ExecutionContext>> {
        let run_id = ctx.run_id.clone();
        let handle = Arc::new(Mutex::new(ctx));
        self.runs.insert(run_id, handle.clone());
        handle
    }

    /// Look up a run, failing with `UnknownRun` when absent.
    pub fn get(&self, run_id: &str) -> Result<Arc<Mutex<ExecutionContext>>> {
        self.runs
            .get(run_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownRun(run_id.to_string()))
    }

    /// Read-only snapshot of a run at any lifecycle point.
    pub async fn snapshot(&self, run_id: &str) -> Result<RunSnapshot> {
        let handle = self.get(run_id)?;
        let mut ctx = handle.lock().await;
        ctx.touch();
        Ok(ctx.snapshot())
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Drop contexts idle past the TTL. A context whose mutex is held
    /// is in active use and survives the sweep.
    pub fn evict_expired(&self) -> usize {
        let before = self.runs.len();
        let ttl = self.ttl;
        self.runs.retain(|_, handle| match handle.try_lock() {
            Ok(ctx) => Utc::now().signed_duration_since(ctx.last_touched) < ttl,
            Err(_) => true,
        });
        let evicted = before - self.runs.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.runs.len(), "evicted idle runs");
        }
        evicted
    }

    /// Spawn the background eviction sweep.
    pub fn spawn_eviction(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.evict_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(run_id: &str) -> ExecutionContext {
        ExecutionContext::new(
            run_id.to_string(),
            "Banking".to_string(),
            "https://example.test/game".to_string(),
            vec![9, 7, 6],
        )
    }

    #[tokio::test]
    async fn create_then_get_and_snapshot() {
        let store = ContextStore::new(Duration::from_secs(3600));
        store.create(context("banking_abc"));

        let handle = store.get("banking_abc").unwrap();
        assert_eq!(handle.lock().await.cursor, 0);

        let snap = store.snapshot("banking_abc").await.unwrap();
        assert_eq!(snap.flow, vec![9, 7, 6]);
    }

    #[tokio::test]
    async fn unknown_run_is_an_error() {
        let store = ContextStore::new(Duration::from_secs(3600));
        assert!(matches!(
            store.get("missing"),
            Err(Error::UnknownRun(_))
        ));
        assert!(matches!(
            store.snapshot("missing").await,
            Err(Error::UnknownRun(_))
        ));
    }

    #[tokio::test]
    async fn eviction_drops_only_idle_runs() {
        let store = ContextStore::new(Duration::from_millis(10));
        store.create(context("old_run"));
        store.create(context("fresh_run"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        // Touch one run so it stays within the TTL.
        store.snapshot("fresh_run").await.unwrap();

        let evicted = store.evict_expired();
        assert_eq!(evicted, 1);
        assert!(store.get("old_run").is_err());
        assert!(store.get("fresh_run").is_ok());
    }

    #[tokio::test]
    async fn locked_contexts_survive_eviction() {
        let store = ContextStore::new(Duration::from_millis(1));
        store.create(context("busy_run"));
        let handle = store.get("busy_run").unwrap();
        let _guard = handle.lock().await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.evict_expired(), 0);
        assert!(store.get("busy_run").is_ok());
    }
}
