// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity statistics weighted toward recent samples, and exception
//! statistics per category.
//!
//! Callers pass `now` explicitly so the numbers are deterministic under test.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Number of samples the recent-weighted averages are spread over.
pub const RECENT_SIZE: f64 = 10.0;

/// Counts actions per kind and tracks recent-weighted duration and rate.
#[derive(Debug, Clone)]
pub struct ActivityStats {
    measure_rate: bool,
    /// Recent-weighted seconds between consecutive starts
    interval: f64,
    last_start: Instant,
    /// Recent-weighted seconds per action
    avg_duration: f64,
    total: u64,
    count_per_kind: BTreeMap<String, u64>,
}

impl ActivityStats {
    pub fn new(now: Instant, measure_rate: bool) -> Self {
        Self {
            measure_rate,
            interval: 0.0,
            last_start: now,
            avg_duration: 0.0,
            total: 0,
            count_per_kind: BTreeMap::new(),
        }
    }

    /// Mark the start of an action.
    pub fn update(&mut self, now: Instant, kind: Option<&str>) -> Instant {
        if self.measure_rate {
            let since = now.saturating_duration_since(self.last_start).as_secs_f64();
            self.interval = (self.interval * (RECENT_SIZE - 1.0) + since) / RECENT_SIZE;
        }
        self.last_start = now;
        self.total += 1;
        if let Some(kind) = kind {
            *self.count_per_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
        now
    }

    /// Mark the end of an action started at `start` (defaults to the last start).
    pub fn finish(&mut self, now: Instant, start: Option<Instant>) -> Instant {
        let start = start.unwrap_or(self.last_start);
        let took = now.saturating_duration_since(start).as_secs_f64();
        self.avg_duration = (self.avg_duration * (RECENT_SIZE - 1.0) + took) / RECENT_SIZE;
        now
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.count_per_kind.get(kind).copied().unwrap_or(0)
    }

    pub fn avg_duration(&self) -> Duration {
        Duration::from_secs_f64(self.avg_duration)
    }

    /// Recent actions per second, 0 until two starts have been seen.
    pub fn avg_rate(&self) -> f64 {
        if self.interval == 0.0 {
            0.0
        } else {
            1.0 / self.interval
        }
    }

    /// Time since the last start, `None` before any action.
    pub fn last(&self, now: Instant) -> Option<Duration> {
        (self.total > 0).then(|| now.saturating_duration_since(self.last_start))
    }

    /// Share of each kind as a percentage of all typed actions.
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        let typed: u64 = self.count_per_kind.values().sum();
        if typed == 0 {
            return BTreeMap::new();
        }
        self.count_per_kind
            .iter()
            .map(|(kind, count)| (kind.clone(), *count as f64 * 100.0 / typed as f64))
            .collect()
    }
}

/// Number of distinct recent exceptions kept per category.
pub const MAX_RECENT_EXCEPTIONS: usize = 10;

/// One entry in a category's recent history. Consecutive repeats of the
/// same kind and message collapse into a single entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentException {
    pub count: u64,
    /// When this entry last occurred
    pub when: Instant,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionCategory {
    pub total: u64,
    /// Oldest first, at most [`MAX_RECENT_EXCEPTIONS`] entries
    pub recent: Vec<RecentException>,
}

/// Counts exceptions per category and keeps the most recent ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionStats {
    categories: BTreeMap<String, ExceptionCategory>,
}

impl ExceptionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, now: Instant, category: &str, kind: &str, message: &str) {
        let entry = self.categories.entry(category.to_string()).or_default();
        entry.total += 1;
        if let Some(last) = entry.recent.last_mut() {
            if last.kind == kind && last.message == message {
                last.count += 1;
                last.when = now;
                return;
            }
        }
        if entry.recent.len() >= MAX_RECENT_EXCEPTIONS {
            entry.recent.remove(0);
        }
        entry.recent.push(RecentException {
            count: 1,
            when: now,
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    pub fn total(&self, category: &str) -> u64 {
        self.categories.get(category).map_or(0, |c| c.total)
    }

    pub fn recent(&self, category: &str) -> &[RecentException] {
        self.categories.get(category).map(|c| c.recent.as_slice()).unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &ExceptionCategory)> {
        self.categories.iter().map(|(name, category)| (name.as_str(), category))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
