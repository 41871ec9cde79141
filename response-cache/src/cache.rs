use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::metrics_defs::{CACHE_HIT, CACHE_KEYS, CACHE_MISS, CACHE_SET};
use moka::Expiry;
use moka::sync::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{counter, gauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const WEATHER_TTL: Duration = Duration::from_secs(30 * 60);
pub const SATELLITE_TTL: Duration = Duration::from_secs(60 * 60);
pub const AI_TTL: Duration = Duration::from_secs(120 * 60);
pub const DROPDOWN_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Debug)]
struct Entry {
    value: Arc<Value>,
    // None means the entry never expires.
    ttl: Option<Duration>,
    expires_at: Option<Instant>,
}

/// Lets moka drop each entry once its own TTL has passed.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub keys: u64,
}

struct Inner {
    entries: Cache<String, Entry>,
    default_ttl: Duration,
    check_period: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

/// Key to JSON value store with per-entry time-to-live.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = Cache::builder().expire_after(PerEntryTtl).build();

        ResponseCache {
            inner: Arc::new(Inner {
                entries,
                default_ttl: config.default_ttl(),
                check_period: config.check_period(),
                clock,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                sets: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let live = self.inner.entries.get(key).filter(|entry| {
            let expired = entry
                .expires_at
                .is_some_and(|expires_at| self.inner.clock.now() >= expires_at);
            if expired {
                self.inner.entries.invalidate(key);
            }
            !expired
        });

        match live {
            Some(entry) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                counter!(CACHE_HIT).increment(1);
                debug!(key, "cache hit");
                Some((*entry.value).clone())
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                counter!(CACHE_MISS).increment(1);
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Reads an entry back as `T`. An entry that no longer matches `T` is
    /// treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                warn!(key, error = %err, "cached value has an unexpected shape");
                None
            }
        }
    }

    /// Stores `value` under `key`. `ttl` of `None` applies the configured
    /// default; a zero TTL keeps the entry until it is deleted or flushed.
    /// Returns false if the value cannot be represented as JSON.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "value is not cacheable");
                return false;
            }
        };

        let ttl = Some(ttl.unwrap_or(self.inner.default_ttl)).filter(|ttl| !ttl.is_zero());
        let entry = Entry {
            value: Arc::new(value),
            ttl,
            expires_at: ttl.map(|ttl| self.inner.clock.now() + ttl),
        };

        self.inner.entries.insert(key.to_string(), entry);
        self.inner.sets.fetch_add(1, Ordering::Relaxed);
        counter!(CACHE_SET).increment(1);
        debug!(key, ttl_secs = ttl.map(|ttl| ttl.as_secs()), "cache set");
        true
    }

    /// Returns the number of entries removed (0 or 1).
    pub fn delete(&self, key: &str) -> usize {
        match self.inner.entries.remove(key) {
            Some(_) => {
                debug!(key, "cache deleted");
                1
            }
            None => 0,
        }
    }

    pub fn flush(&self) {
        self.inner.entries.invalidate_all();
        self.inner.entries.run_pending_tasks();
        debug!("cache flushed");
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.entries.run_pending_tasks();
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            sets: self.inner.sets.load(Ordering::Relaxed),
            keys: self.inner.entries.entry_count(),
        }
    }

    pub fn get_weather_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_as(key)
    }

    pub fn set_weather_data<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl: Option<Duration>) -> bool {
        self.set(key, data, Some(ttl.unwrap_or(WEATHER_TTL)))
    }

    pub fn get_satellite_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_as(key)
    }

    pub fn set_satellite_data<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl: Option<Duration>) -> bool {
        self.set(key, data, Some(ttl.unwrap_or(SATELLITE_TTL)))
    }

    pub fn get_ai_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_as(key)
    }

    pub fn set_ai_data<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl: Option<Duration>) -> bool {
        self.set(key, data, Some(ttl.unwrap_or(AI_TTL)))
    }

    pub fn get_dropdown_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_as(key)
    }

    pub fn set_dropdown_data<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl: Option<Duration>) -> bool {
        self.set(key, data, Some(ttl.unwrap_or(DROPDOWN_TTL)))
    }

    /// Runs moka maintenance every check period so expired entries are
    /// dropped even when nobody reads them. The task lives until aborted.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cache.inner.check_period);
            loop {
                interval.tick().await;
                cache.inner.entries.run_pending_tasks();
                gauge!(CACHE_KEYS).set(cache.inner.entries.entry_count() as f64);
            }
        })
    }
}
