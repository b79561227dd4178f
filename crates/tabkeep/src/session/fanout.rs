use crate::model::{Document, DocumentId};
use std::time::{Duration, Instant};

/// Restored documents waiting for a window. Entries are handed out strictly in
/// order through a cursor that only moves forward; each entry goes out once.
#[derive(Default)]
pub struct FanOutQueue {
    entries: Vec<Option<Document>>,
    cursor: usize,
}

impl FanOutQueue {
    pub fn fill(&mut self, documents: Vec<Document>) {
        self.entries = documents.into_iter().map(Some).collect();
        self.cursor = 0;
    }

    /// Takes the next unclaimed entry. The queue is cleared once the cursor
    /// reaches the end.
    pub fn claim_next(&mut self) -> Option<Document> {
        while self.cursor < self.entries.len() {
            let entry = self.entries[self.cursor].take();
            self.cursor += 1;
            if entry.is_some() {
                if self.cursor == self.entries.len() {
                    self.clear();
                }
                return entry;
            }
        }
        self.clear();
        None
    }

    pub fn remaining(&self) -> usize {
        self.entries[self.cursor.min(self.entries.len())..]
            .iter()
            .filter(|e| e.is_some())
            .count()
    }

    pub fn remaining_ids(&self) -> Vec<DocumentId> {
        self.entries[self.cursor.min(self.entries.len())..]
            .iter()
            .flatten()
            .map(|d| d.id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

/// Bounded retry schedule for spawning windows before a base window exists.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    max_attempts: u32,
    delay: Duration,
    attempts: u32,
    next_at: Option<Instant>,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            attempts: 0,
            next_at: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_at.map_or(true, |at| now >= at)
    }

    /// Records a failed attempt. Returns false once the budget is spent.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.attempts += 1;
        self.next_at = Some(now + self.delay);
        self.attempts < self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next_at = None;
    }
}
