//! Read-through cache for per-card spend totals
//!
//! The spending-limit stage of authorization consults this cache before the
//! transaction store. Entries are keyed `card:{card_id}` and expire after a
//! short TTL; settlement invalidates the card's entry so the next
//! authorization re-reads fresh counters.
//!
//! A miss (absent or expired) is never an error: the caller falls through to
//! the store and repopulates.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::traits::SpendingTotals;

/// Default entry lifetime
const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A cached totals snapshot with its insertion time
#[derive(Debug, Clone, Copy)]
pub struct CachedTotals {
    /// The cached daily/monthly totals
    pub totals: SpendingTotals,
    inserted_at: Instant,
}

/// Concurrent TTL cache of per-card spend totals
#[derive(Debug)]
pub struct SpendingCache {
    entries: DashMap<String, CachedTotals>,
    ttl: Duration,
}

impl SpendingCache {
    /// Create a cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache whose entries expire after `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn key(card_id: &str) -> String {
        format!("card:{card_id}")
    }

    /// Fetch the cached totals for a card, if present and fresh
    pub fn get(&self, card_id: &str) -> Option<SpendingTotals> {
        let key = Self::key(card_id);
        // Copy out before any removal; holding a map guard across remove
        // would deadlock on the same shard.
        let cached = self.entries.get(&key).map(|entry| *entry);
        match cached {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                debug!(card_id, "spending cache hit");
                Some(entry.totals)
            }
            Some(_) => {
                self.entries.remove(&key);
                debug!(card_id, "spending cache expired");
                None
            }
            None => {
                debug!(card_id, "spending cache miss");
                None
            }
        }
    }

    /// Store fresh totals for a card
    pub fn put(&self, card_id: &str, totals: SpendingTotals) {
        self.entries.insert(
            Self::key(card_id),
            CachedTotals {
                totals,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop the cached entry for a card
    ///
    /// Called after settlement so stale totals never mask a limit breach.
    pub fn invalidate(&self, card_id: &str) {
        self.entries.remove(&Self::key(card_id));
    }
}

impl Default for SpendingCache {
    fn default() -> Self {
        Self::new()
    }
}
