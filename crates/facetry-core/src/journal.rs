//! # Undo Journal
//!
//! Every state change made during an external call is recorded here as the
//! inverse operation. A failing call (or nested call) reverts back to the
//! checkpoint taken when it started; a successful outermost call discards
//! the journal.

use crate::{FacetHandle, InstanceId, InterfaceId, Selector};

/// Position in the journal to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint(usize);

/// The inverse of one recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UndoEntry {
    /// Restore a selector mapping.
    Table {
        instance: InstanceId,
        selector: Selector,
        previous: Option<FacetHandle>,
    },
    /// Restore an interface overlay entry.
    Interface {
        instance: InstanceId,
        id: InterfaceId,
        previous: Option<bool>,
    },
    /// Restore a storage slot.
    Storage {
        instance: InstanceId,
        key: Vec<u8>,
        previous: Option<Vec<u8>>,
    },
    /// Drop the most recently created instance.
    InstanceCreated,
    /// Drop the most recently emitted event.
    EventEmitted,
}

/// Append-only undo log.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<UndoEntry>,
}

impl Journal {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.entries.len())
    }

    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    /// Remove every entry recorded after `checkpoint`, newest first.
    pub fn unwind(&mut self, checkpoint: Checkpoint) -> Vec<UndoEntry> {
        let start = checkpoint.0.min(self.entries.len());
        let mut undone: Vec<UndoEntry> = self.entries.drain(start..).collect();
        undone.reverse();
        undone
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwind_returns_newest_first() {
        let mut journal = Journal::default();
        journal.record(UndoEntry::EventEmitted);
        let cp = journal.checkpoint();
        journal.record(UndoEntry::InstanceCreated);
        journal.record(UndoEntry::EventEmitted);

        let undone = journal.unwind(cp);
        assert_eq!(undone, vec![UndoEntry::EventEmitted, UndoEntry::InstanceCreated]);
        assert_eq!(journal.unwind(Checkpoint(0)), vec![UndoEntry::EventEmitted]);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut journal = Journal::default();
        assert!(journal.is_empty());
        journal.record(UndoEntry::InstanceCreated);
        assert!(!journal.is_empty());
        journal.clear();
        assert!(journal.is_empty());
    }
}
