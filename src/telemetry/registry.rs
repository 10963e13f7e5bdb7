//! Live replica registry.
//!
//! # Merge rules
//! ```text
//! Snapshot(records) → registry := records, server order
//! Delta(record)     → id known:   replace fields in place, position kept
//!                     id unknown: append at the end
//! ```
//!
//! The reducer performs no I/O and cannot fail: malformed payloads are
//! rejected by `protocol::decode` before they get here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::telemetry::protocol::Message;
use crate::telemetry::record::{ReplicaId, ReplicaRecord};

/// Outcome of folding one message into the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The whole set was replaced.
    Replaced { count: usize },
    /// An existing replica changed in place.
    Updated(ReplicaRecord),
    /// A previously unseen replica was appended.
    Inserted(ReplicaRecord),
}

impl Applied {
    /// Kind of message that produced this outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Applied::Replaced { .. } => "snapshot",
            Applied::Updated(_) | Applied::Inserted(_) => "delta",
        }
    }

    /// The single record a delta touched, if any.
    pub fn record(&self) -> Option<&ReplicaRecord> {
        match self {
            Applied::Replaced { .. } => None,
            Applied::Updated(record) | Applied::Inserted(record) => Some(record),
        }
    }
}

/// Ordered set of replica records, unique by id.
#[derive(Debug, Clone, Default)]
pub struct LiveRegistry {
    records: Vec<ReplicaRecord>,
    /// id -> position in `records`.
    index: HashMap<ReplicaId, usize>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one message into the registry.
    pub fn apply(&mut self, message: Message) -> Applied {
        match message {
            Message::Snapshot(records) => {
                self.index = records
                    .iter()
                    .enumerate()
                    .map(|(pos, record)| (record.id, pos))
                    .collect();
                self.records = records;
                Applied::Replaced {
                    count: self.records.len(),
                }
            }
            Message::Delta(record) => match self.index.get(&record.id) {
                Some(&pos) => {
                    self.records[pos] = record.clone();
                    Applied::Updated(record)
                }
                None => {
                    self.index.insert(record.id, self.records.len());
                    self.records.push(record.clone());
                    Applied::Inserted(record)
                }
            },
        }
    }

    pub fn records(&self) -> &[ReplicaRecord] {
        &self.records
    }

    pub fn get(&self, id: ReplicaId) -> Option<&ReplicaRecord> {
        self.index.get(&id).map(|&pos| &self.records[pos])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of replicas currently reported alive.
    pub fn alive_count(&self) -> usize {
        self.records.iter().filter(|r| r.alive).count()
    }

    /// Immutable copy for readers.
    pub fn snapshot(&self) -> Arc<Vec<ReplicaRecord>> {
        Arc::new(self.records.clone())
    }
}
