//! In-memory provider response cache with TTL and single-flight coalescing.
//!
//! Keyed by (zone, horizon, hourly time bucket) so all waypoints and users
//! sharing a zone share one upstream fetch. Each key owns its own slot lock:
//! the first caller fetches while concurrent callers for the same key await
//! the slot and then read the stored result, so one network call is issued
//! per key per TTL. Errors are never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::services::providers::{Horizon, RawForecast};

/// Cache key: zone id + horizon + the hour bucket of the request time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub zone: String,
    pub horizon: Horizon,
    /// Request time in whole hours since the Unix epoch.
    pub bucket: i64,
}

impl CacheKey {
    pub fn new(zone: &str, horizon: Horizon, now: DateTime<Utc>) -> Self {
        Self {
            zone: zone.to_string(),
            horizon,
            bucket: now.timestamp().div_euclid(3600),
        }
    }
}

#[derive(Default)]
struct Slot {
    value: Option<(Arc<RawForecast>, Instant)>,
}

/// Shared forecast cache. Owned by the provider router; the slot map mutex is
/// held only long enough to clone a slot handle, never across a fetch.
pub struct ForecastCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Arc<Mutex<Slot>>>>,
}

impl ForecastCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached forecast for `key`, or run `fetch` to produce it.
    ///
    /// Concurrent callers with the same key are coalesced: they queue on the
    /// per-key slot lock and observe the first caller's result instead of
    /// issuing their own fetch. A failed fetch leaves the slot empty, so the
    /// next caller retries.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> Result<Arc<RawForecast>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawForecast, AppError>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key).or_default().clone()
        };

        let mut guard = slot.lock().await;
        if let Some((value, stored_at)) = &guard.value {
            if stored_at.elapsed() < self.ttl {
                return Ok(value.clone());
            }
        }

        let fresh = Arc::new(fetch().await?);
        guard.value = Some((fresh.clone(), Instant::now()));
        Ok(fresh)
    }

    /// Drop expired entries. Called opportunistically from the severe-weather
    /// poll so stale hour buckets don't accumulate over a long trip season.
    pub async fn prune_expired(&self) {
        let mut slots = self.slots.lock().await;
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(guard) => matches!(
                &guard.value,
                Some((_, stored_at)) if stored_at.elapsed() < self.ttl
            ),
            // Slot is mid-fetch — keep it.
            Err(_) => true,
        });
    }

    /// Number of keys currently held (including expired, not yet pruned).
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
