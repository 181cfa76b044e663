//! TTL cache entry for expensive diagnostic results.
//!
//! States: Empty → (refresh ok) → Fresh → (TTL elapsed) → Stale → (refresh ok) → Fresh.
//! A failed refresh changes nothing: the previous value stays readable and the
//! timestamp stays where it was, so the next access retries straight away.
//!
//! The slot mutex is held across the refresh. Concurrent readers of a stale
//! entry queue behind one refresh instead of each spawning a process, and
//! find the entry fresh once they get the lock.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No refresh has succeeded yet
    Empty,
    Fresh,
    /// Holds a value older than the TTL
    Stale,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    refreshed_at: Option<Instant>,
}

impl<T> Slot<T> {
    fn freshness(&self, ttl: Duration) -> Freshness {
        match self.refreshed_at {
            None => Freshness::Empty,
            Some(at) if at.elapsed() <= ttl => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }
}

/// One cached value with a fixed time-to-live.
#[derive(Debug)]
pub struct CacheEntry<T> {
    name: String,
    ttl: Duration,
    slot: Mutex<Slot<T>>,
}

impl<T: Clone> CacheEntry<T> {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
            slot: Mutex::new(Slot {
                value: None,
                refreshed_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, running `refresh` first when the entry is
    /// empty or stale.
    ///
    /// Refresh errors are logged and swallowed; the result is then whatever
    /// the entry held before, which is `None` only if no refresh ever worked.
    pub async fn get<F, Fut, E>(&self, refresh: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut slot = self.slot.lock().await;

        let state = slot.freshness(self.ttl);
        if state == Freshness::Fresh {
            return slot.value.clone();
        }

        debug!("{}: {:?}, refreshing", self.name, state);
        match refresh().await {
            Ok(value) => {
                slot.value = Some(value);
                slot.refreshed_at = Some(Instant::now());
            }
            Err(e) => {
                warn!("{}: refresh failed: {}", self.name, e);
            }
        }

        slot.value.clone()
    }

    /// Current value without triggering a refresh.
    pub async fn peek(&self) -> Option<T> {
        self.slot.lock().await.value.clone()
    }

    pub async fn last_refresh(&self) -> Option<Instant> {
        self.slot.lock().await.refreshed_at
    }

    pub async fn freshness(&self) -> Freshness {
        self.slot.lock().await.freshness(self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(60);

    async fn ok(calls: &AtomicUsize, value: &str) -> Result<String, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value.to_string())
    }

    async fn fail(calls: &AtomicUsize) -> Result<String, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err("qmicli exploded".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_then_fresh() {
        let entry = CacheEntry::new("test", TTL);
        let calls = AtomicUsize::new(0);

        assert_eq!(entry.freshness().await, Freshness::Empty);
        assert_eq!(entry.get(|| ok(&calls, "a")).await.as_deref(), Some("a"));
        assert_eq!(entry.freshness().await, Freshness::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_ttl_no_refresh() {
        let entry = CacheEntry::new("test", TTL);
        let calls = AtomicUsize::new(0);

        entry.get(|| ok(&calls, "a")).await;
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(entry.get(|| ok(&calls, "b")).await.as_deref(), Some("a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refreshes() {
        let entry = CacheEntry::new("test", TTL);
        let calls = AtomicUsize::new(0);

        entry.get(|| ok(&calls, "a")).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(entry.freshness().await, Freshness::Stale);
        assert_eq!(entry.get(|| ok(&calls, "b")).await.as_deref(), Some("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_value_and_timestamp() {
        let entry = CacheEntry::new("test", TTL);
        let calls = AtomicUsize::new(0);

        entry.get(|| ok(&calls, "a")).await;
        let stamp = entry.last_refresh().await;
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(entry.get(|| fail(&calls)).await.as_deref(), Some("a"));
        assert_eq!(entry.last_refresh().await, stamp);
        assert_eq!(entry.freshness().await, Freshness::Stale);

        // No TTL wait after a failure: the very next access retries.
        assert_eq!(entry.get(|| ok(&calls, "c")).await.as_deref(), Some("c"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_while_empty_stays_empty_and_retries() {
        let entry: CacheEntry<String> = CacheEntry::new("test", TTL);
        let calls = AtomicUsize::new(0);

        assert_eq!(entry.get(|| fail(&calls)).await, None);
        assert_eq!(entry.get(|| fail(&calls)).await, None);
        assert_eq!(entry.freshness().await, Freshness::Empty);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_regresses_to_absent() {
        let entry = CacheEntry::new("test", TTL);
        let calls = AtomicUsize::new(0);

        entry.get(|| ok(&calls, "a")).await;
        for _ in 0..20 {
            tokio::time::advance(Duration::from_secs(90)).await;
            assert!(entry.get(|| fail(&calls)).await.is_some());
        }
        assert_eq!(entry.peek().await.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_readers_share_one_refresh() {
        let entry = Arc::new(CacheEntry::new("test", TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let entry = Arc::clone(&entry);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                entry
                    .get(|| async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>("shared".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("shared"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
