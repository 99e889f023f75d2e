//! Short-lived cache for the stable prompt part.

use std::time::{Duration, Instant};

use crate::modules::OperatingMode;

/// 31-multiplier polynomial hash over the bytes of `text`.
pub fn rolling_hash(text: &str) -> u64 {
    text.bytes()
        .fold(0u64, |hash, byte| hash.wrapping_mul(31).wrapping_add(u64::from(byte)))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    hash: u64,
    built_at: Instant,
    mode: OperatingMode,
    memory_hash: u64,
}

/// A single-entry cache valid for a fixed TTL.
///
/// The key is the operating mode plus the hash of the memory slice the
/// entry was built with, so a turn whose question selects different
/// memory sections misses.
#[derive(Debug, Clone)]
pub struct StableCache {
    ttl: Duration,
    entry: Option<CacheEntry>,
}

impl StableCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached text and hash, if built for `mode` and `memory_hash` within
    /// the TTL.
    pub fn get(&self, mode: OperatingMode, memory_hash: u64) -> Option<(&str, u64)> {
        self.entry
            .as_ref()
            .filter(|e| {
                e.mode == mode && e.memory_hash == memory_hash && e.built_at.elapsed() < self.ttl
            })
            .map(|e| (e.text.as_str(), e.hash))
    }

    /// Replace the entry. Returns the text's hash.
    pub fn store(&mut self, mode: OperatingMode, memory_hash: u64, text: String) -> u64 {
        let hash = rolling_hash(&text);
        self.entry = Some(CacheEntry {
            text,
            hash,
            built_at: Instant::now(),
            mode,
            memory_hash,
        });
        hash
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}
