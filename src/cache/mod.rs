//! Response cache for serialized endpoint bodies.
//!
//! Two independent instances back the HTTP layer: a larger short-TTL pool
//! for light endpoints and a smaller long-TTL pool for heavy analytics.
//! Size-bounded with LRU eviction; entries expire lazily on read. The
//! cache is advisory: a miss is never an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

/// A serialized response body with its entity-tag, replayed on hits.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Arc<String>,
    pub etag: String,
}

struct Entry {
    value: CachedResponse,
    cached_at: Instant,
    ttl: Duration,
}

struct State {
    entries: HashMap<String, Entry>,
    access_order: Vec<String>,
}

pub struct ResponseCache {
    state: RwLock<State>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
    #[serde(rename = "hitRate")]
    pub hit_rate: f64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: RwLock::new(State {
                entries: HashMap::new(),
                access_order: Vec::new(),
            }),
            capacity,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get an entry, promoting it to most-recently-used. An expired entry
    /// is deleted and counted as a miss.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut state = self.state.write().await;

        match state.entries.get(key) {
            Some(entry) if entry.cached_at.elapsed() < entry.ttl => {
                let value = entry.value.clone();
                promote(&mut state.access_order, key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(_) => {
                state.entries.remove(key);
                if let Some(pos) = state.access_order.iter().position(|k| k == key) {
                    state.access_order.remove(pos);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert with the pool's default TTL.
    pub async fn put(&self, key: String, value: CachedResponse) {
        self.put_with_ttl(key, value, self.ttl).await;
    }

    /// Insert with an explicit TTL, evicting the least-recently-used entry
    /// at capacity. A duplicate put refreshes the entry and is idempotent.
    pub async fn put_with_ttl(&self, key: String, value: CachedResponse, ttl: Duration) {
        let mut state = self.state.write().await;

        if state.entries.contains_key(&key) {
            promote(&mut state.access_order, &key);
        } else {
            while state.entries.len() >= self.capacity {
                let Some(oldest) = state.access_order.first().cloned() else {
                    break;
                };
                state.entries.remove(&oldest);
                state.access_order.remove(0);
            }
            state.access_order.push(key.clone());
        }

        state.entries.insert(
            key,
            Entry {
                value,
                cached_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove every entry whose key contains the given substring.
    pub async fn invalidate(&self, fragment: &str) -> usize {
        let mut state = self.state.write().await;
        let keys: Vec<String> = state
            .entries
            .keys()
            .filter(|k| k.contains(fragment))
            .cloned()
            .collect();
        for key in &keys {
            state.entries.remove(key);
            if let Some(pos) = state.access_order.iter().position(|k| k == key) {
                state.access_order.remove(pos);
            }
        }
        keys.len()
    }

    pub async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let cleared = state.entries.len();
        state.entries.clear();
        state.access_order.clear();
        cleared
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            (hits as f64 * 1000.0 / lookups as f64).round() / 10.0
        };
        CacheStats {
            hits,
            misses,
            size: state.entries.len(),
            capacity: self.capacity,
            hit_rate,
        }
    }
}

fn promote(access_order: &mut Vec<String>, key: &str) {
    if let Some(pos) = access_order.iter().position(|k| k == key) {
        access_order.remove(pos);
    }
    access_order.push(key.to_string());
}
