//! Session-scoped telemetry context.
//!
//! # Ownership
//! ```text
//! Dashboard (orchestrator)
//!     └── Arc<Session>
//!           ├── Mutex<{ LiveRegistry, HistoryStore }>  written by the stream client only
//!           ├── ArcSwap<published registry>            read by presentation
//!           └── AggregateStats                         written by the poller only
//! ```
//!
//! A message's registry merge and its history append happen under one lock,
//! so no reader ever observes one without the other. Once the session is
//! retired every later write is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use uuid::Uuid;

use crate::observability::metrics;
use crate::polling::stats::AggregateStats;
use crate::telemetry::{
    decode, Applied, DecodeError, HistoryStore, HistorySummary, LiveRegistry, Message,
    MetricSample, ReplicaId, ReplicaRecord,
};

struct SessionState {
    registry: LiveRegistry,
    history: HistoryStore,
}

/// Everything one viewing session knows about the fleet.
pub struct Session {
    id: Uuid,
    state: Mutex<SessionState>,
    published: ArcSwap<Vec<ReplicaRecord>>,
    aggregates: AggregateStats,
    generation: AtomicU64,
    retired: AtomicBool,
}

impl Session {
    /// Create an empty session keeping `history_capacity` samples per replica.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState {
                registry: LiveRegistry::new(),
                history: HistoryStore::new(history_capacity),
            }),
            published: ArcSwap::from_pointee(Vec::new()),
            aggregates: AggregateStats::new(),
            generation: AtomicU64::new(0),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Decode one stream payload and fold it in.
    ///
    /// Returns `Ok(None)` when the session is already retired.
    pub fn ingest_text(&self, text: &str) -> Result<Option<Applied>, DecodeError> {
        let message = decode(text)?;
        Ok(self.apply(message))
    }

    /// Fold a decoded message into the registry and record history for the
    /// record a delta touched. Snapshots do not produce samples; they drop
    /// the history of replicas they no longer list.
    pub fn apply(&self, message: Message) -> Option<Applied> {
        let mut state = self.state.lock().expect("session state mutex poisoned");
        if self.retired.load(Ordering::Acquire) {
            return None;
        }

        let applied = state.registry.apply(message);
        if let Applied::Replaced { .. } = applied {
            let SessionState { registry, history } = &mut *state;
            history.retain(|id| registry.get(id).is_some());
        }
        if let Some(record) = applied.record() {
            state
                .history
                .append(record.id, record.ema_ms, record.error_rate, record.alive);
        }

        self.published.store(state.registry.snapshot());
        metrics::record_registry_size(state.registry.len());
        Some(applied)
    }

    /// Current replica set, in registry order.
    pub fn registry_snapshot(&self) -> Arc<Vec<ReplicaRecord>> {
        self.published.load_full()
    }

    /// Copy of the samples recorded for one replica.
    pub fn history(&self, id: ReplicaId) -> Vec<MetricSample> {
        self.state
            .lock()
            .expect("session state mutex poisoned")
            .history
            .query(id)
    }

    pub fn history_summary(&self, id: ReplicaId) -> Option<HistorySummary> {
        self.state
            .lock()
            .expect("session state mutex poisoned")
            .history
            .summary(id)
    }

    pub fn clear_history(&self) {
        self.state
            .lock()
            .expect("session state mutex poisoned")
            .history
            .clear();
    }

    pub fn aggregates(&self) -> &AggregateStats {
        &self.aggregates
    }

    /// Run `store` against the aggregates if work started under `generation`
    /// is still current. The check and the write hold the state lock, so a
    /// concurrent `retire` lands either before both or after both.
    pub fn store_aggregate<F>(&self, generation: u64, store: F) -> bool
    where
        F: FnOnce(&AggregateStats),
    {
        let _state = self.state.lock().expect("session state mutex poisoned");
        if !self.is_current(generation) {
            return false;
        }
        store(&self.aggregates);
        true
    }

    /// Token handed to asynchronous work started now.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether work started under `generation` may still write.
    pub fn is_current(&self, generation: u64) -> bool {
        !self.is_retired() && self.generation() == generation
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Stop accepting writes. Idempotent.
    pub fn retire(&self) {
        let _state = self.state.lock().expect("session state mutex poisoned");
        if !self.retired.swap(true, Ordering::AcqRel) {
            self.generation.fetch_add(1, Ordering::AcqRel);
            tracing::debug!(session = %self.id, "Session retired");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("replicas", &self.published.load().len())
            .field("generation", &self.generation())
            .field("retired", &self.is_retired())
            .finish()
    }
}
