//! Bounded per-replica sample history.
//!
//! # Responsibilities
//! - Keep the most recent samples of every replica for trend charts
//! - Evict oldest-first once a replica reaches capacity
//! - Hand out copies so readers never observe later appends
//!
//! # Design Decisions
//! - `VecDeque` ring buffer per replica, O(1) append and eviction
//! - Ordering is the store-wide `seq` counter; wall-clock time is kept for
//!   display only and may go backwards if the host clock is adjusted

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::telemetry::record::ReplicaId;

/// Default number of samples kept per replica.
pub const MAX_SAMPLES: usize = 60;

/// One recorded observation of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    /// Store-wide append index; authoritative ordering.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub latency: f64,
    pub error_rate: f64,
    pub alive: bool,
}

/// Ring buffers of recent samples keyed by replica id.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    series: HashMap<ReplicaId, VecDeque<MetricSample>>,
    max_samples: usize,
    next_seq: u64,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(MAX_SAMPLES)
    }
}

impl HistoryStore {
    /// Create an empty store. A zero capacity is treated as one.
    pub fn new(max_samples: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_samples: max_samples.max(1),
            next_seq: 0,
        }
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Record a sample stamped with the current time.
    pub fn append(&mut self, id: ReplicaId, latency: f64, error_rate: f64, alive: bool) {
        self.append_at(id, Utc::now(), latency, error_rate, alive);
    }

    /// Record a sample with an explicit timestamp.
    pub fn append_at(
        &mut self,
        id: ReplicaId,
        timestamp: DateTime<Utc>,
        latency: f64,
        error_rate: f64,
        alive: bool,
    ) {
        let sample = MetricSample {
            seq: self.next_seq,
            timestamp,
            latency,
            error_rate,
            alive,
        };
        self.next_seq += 1;

        let max = self.max_samples;
        let series = self
            .series
            .entry(id)
            .or_insert_with(|| VecDeque::with_capacity(max));
        if series.len() >= max {
            series.pop_front();
        }
        series.push_back(sample);
    }

    /// Copy of the samples recorded for `id`, oldest first.
    pub fn query(&self, id: ReplicaId) -> Vec<MetricSample> {
        self.series
            .get(&id)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of samples currently held for `id`.
    pub fn len(&self, id: ReplicaId) -> usize {
        self.series.get(&id).map_or(0, VecDeque::len)
    }

    /// Replica ids with at least one sample, ascending.
    pub fn tracked_ids(&self) -> Vec<ReplicaId> {
        let mut ids: Vec<_> = self.series.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Keep only the series whose id satisfies `keep`.
    pub fn retain<F: FnMut(ReplicaId) -> bool>(&mut self, mut keep: F) {
        self.series.retain(|&id, _| keep(id));
    }

    /// Drop every series. The sequence counter keeps counting.
    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Aggregate view of the samples held for `id`.
    pub fn summary(&self, id: ReplicaId) -> Option<HistorySummary> {
        self.series.get(&id).and_then(HistorySummary::from_samples)
    }
}

/// Trend figures over one replica's retained samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistorySummary {
    pub samples: usize,
    pub min_latency: f64,
    pub max_latency: f64,
    pub mean_latency: f64,
    pub latest_error_rate: f64,
    /// Share of samples that reported the replica alive.
    pub availability: f64,
}

impl HistorySummary {
    fn from_samples<'a, I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MetricSample>,
    {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut alive = 0usize;
        let mut latest_error_rate = 0.0;

        for sample in samples {
            count += 1;
            min = min.min(sample.latency);
            max = max.max(sample.latency);
            sum += sample.latency;
            if sample.alive {
                alive += 1;
            }
            latest_error_rate = sample.error_rate;
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            samples: count,
            min_latency: min,
            max_latency: max,
            mean_latency: sum / count as f64,
            latest_error_rate,
            availability: alive as f64 / count as f64,
        })
    }
}
