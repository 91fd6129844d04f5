//! Bounded, most-recent-first list of completed translations with
//! cursor-based browsing. Every push persists the truncated list before
//! returning, so writes never interleave.

use std::sync::Arc;

use crate::domain::error::Result;
use crate::domain::translation::HistoryEntry;
use crate::infrastructure::storage::HistoryPersistence;

pub const HISTORY_MAX_SIZE: usize = 20;

pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    persistence: Arc<dyn HistoryPersistence>,
}

impl HistoryStore {
    pub async fn load(persistence: Arc<dyn HistoryPersistence>) -> Result<Self> {
        let mut entries = persistence.load().await?;
        entries.truncate(HISTORY_MAX_SIZE);
        Ok(Self {
            entries,
            cursor: 0,
            persistence,
        })
    }

    #[cfg(test)]
    fn empty(persistence: Arc<dyn HistoryPersistence>) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            persistence,
        }
    }

    /// Prepends the entry, evicts anything past the bound and persists the
    /// result. The cursor snaps back to the newest entry.
    pub async fn push(&mut self, entry: HistoryEntry) -> Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_MAX_SIZE);
        self.cursor = 0;
        self.persistence.save(&self.entries).await
    }

    /// Most recent first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    /// Moves toward older entries; a no-op at the oldest.
    pub fn prev(&mut self) -> Option<&HistoryEntry> {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Moves toward newer entries; a no-op at the newest.
    pub fn next(&mut self) -> Option<&HistoryEntry> {
        self.cursor = self.cursor.saturating_sub(1);
        self.current()
    }

    /// Out-of-range indices are ignored.
    pub fn set_cursor(&mut self, index: usize) {
        if index < self.entries.len() {
            self.cursor = index;
        }
    }
}
