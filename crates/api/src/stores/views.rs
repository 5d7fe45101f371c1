//! View-count deduplication.
//!
//! Remembers when each (viewer, article) pair was last counted so that
//! refreshing a page does not inflate the article's view counter.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{clock::Clock, config::Config};

/// In-memory record of the last counted view per `identity:content_id`.
pub struct ViewGuard {
    records: DashMap<String, DateTime<Utc>>,
    window: TimeDelta,
    high_water_mark: usize,
    clock: Arc<dyn Clock>,
}

impl ViewGuard {
    pub fn new(window: TimeDelta, high_water_mark: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            window,
            high_water_mark,
            clock,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.view_window(), config.view_high_water_mark, clock)
    }

    fn record_key(identity: &str, content_id: &str) -> String {
        format!("{}:{}", identity, content_id)
    }

    /// Returns true if this view should be counted, recording it as the most
    /// recent counted view for the pair.
    ///
    /// The read and the update happen under the same shard lock, so two
    /// concurrent first views of a pair can never both be counted.
    pub fn can_count_view(&self, identity: &str, content_id: &str) -> bool {
        let now = self.clock.now();

        let counted = match self.records.entry(Self::record_key(identity, content_id)) {
            Entry::Occupied(mut entry) => {
                if now - *entry.get() > self.window {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };

        if !counted {
            tracing::debug!(identity, content_id, "view suppressed within window");
            return false;
        }

        tracing::debug!(identity, content_id, "view counted");

        // The entry lock is released above; retain() takes every shard lock.
        if self.records.len() > self.high_water_mark {
            let removed = self.sweep_expired(now);
            tracing::info!(
                removed,
                remaining = self.records.len(),
                "view records over high-water mark, swept"
            );
        }

        true
    }

    /// Drops every record older than the window. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.records.retain(|_, last_counted| {
            let keep = now - *last_counted <= self.window;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
