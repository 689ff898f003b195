//! Bounded, append-only record of inbound messages.

use crate::types::{UpsertType, WebMessageInfo};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of envelopes kept.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Shared handle: the session loop writes, HTTP handlers read snapshots.
pub type SharedMirror = Arc<RwLock<Mirror>>;

/// Ring buffer of inbound envelopes, oldest first. When full, the oldest entry is evicted.
#[derive(Debug)]
pub struct Mirror {
    entries: VecDeque<WebMessageInfo>,
    capacity: usize,
    first_only: bool,
    evicted: u64,
}

impl Mirror {
    /// `first_only` keeps only the first envelope of each upsert batch.
    pub fn new(capacity: usize, first_only: bool) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            first_only,
            evicted: 0,
        }
    }

    pub fn shared(self) -> SharedMirror {
        Arc::new(RwLock::new(self))
    }

    /// Apply one `messages.upsert` batch. Envelopes sent by the local account are skipped.
    /// Returns how many envelopes were appended.
    pub fn record_upsert(&mut self, messages: &[WebMessageInfo], kind: UpsertType) -> usize {
        let candidates = if self.first_only {
            &messages[..messages.len().min(1)]
        } else {
            messages
        };
        let mut appended = 0;
        for msg in candidates.iter().filter(|m| !m.key.from_me) {
            self.push(msg.clone());
            appended += 1;
        }
        if appended > 0 {
            tracing::trace!(appended, ?kind, len = self.entries.len(), "mirror updated");
        }
        appended
    }

    fn push(&mut self, msg: WebMessageInfo) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(msg);
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<WebMessageInfo> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
