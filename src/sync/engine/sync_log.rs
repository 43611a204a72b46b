//! Append-only change log with a queue of not yet confirmed local changes.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::model::address::{XAddress, XId};
use crate::model::command::{CommandResult, Revision, XCommand};
use crate::model::event::XEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncLogError {
    #[error("expected revision {expected}, got {actual}")]
    NonContiguous { expected: Revision, actual: Revision },

    #[error("cannot truncate to {requested}, log starts after {base}")]
    TruncateBelowBase { requested: Revision, base: Revision },

    #[error("synchronized revision {requested} is beyond current revision {current}")]
    SyncRevisionAhead { requested: Revision, current: Revision },
}

/// Completion callback of a locally submitted command.
pub trait CommandCallback: Send + Sync {
    /// The command was applied (`Applied(revision)`) or found redundant (`NoChange`).
    fn on_success(&self, result: CommandResult);

    /// The command conflicted with the server state and was discarded.
    fn on_failure(&self);
}

/// A command that was applied locally but not yet confirmed by the server.
#[derive(Clone)]
pub struct LocalChange {
    pub actor: XId,
    pub command: XCommand,
    /// The event the command produced on the local replica.
    pub event: XEvent,
    pub callback: Option<Arc<dyn CommandCallback>>,
}

impl fmt::Debug for LocalChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChange")
            .field("actor", &self.actor)
            .field("command", &self.command)
            .field("revision", &self.event.revision)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogEntry {
    pub event: XEvent,
    /// The command that produced the event, if it originated locally.
    pub command: Option<XCommand>,
}

/// Log of one synchronized model.
///
/// Holds every event from `first_revision()` on without gaps, plus the local
/// changes the server has not confirmed yet. Entries up to
/// `synchronized_revision()` are known to match the server.
#[derive(Debug)]
pub struct SyncLog {
    address: XAddress,
    /// Revision of the state the log starts from; the first entry is `base + 1`.
    base_revision: Revision,
    entries: Vec<SyncLogEntry>,
    synchronized_revision: Revision,
    local_changes: Vec<LocalChange>,
}

impl SyncLog {
    /// Creates an empty log.
    ///
    /// # Arguments
    /// * `address` - The model this log belongs to.
    /// * `base_revision` - Revision of the state the log starts from; it also
    ///   becomes the synchronized revision.
    pub fn new(address: XAddress, base_revision: Revision) -> Self {
        Self {
            address,
            base_revision,
            entries: Vec::new(),
            synchronized_revision: base_revision,
            local_changes: Vec::new(),
        }
    }

    pub fn address(&self) -> &XAddress {
        &self.address
    }

    /// Revision of the first entry the log can hold.
    pub fn first_revision(&self) -> Revision {
        self.base_revision + 1
    }

    /// Revision of the newest entry, or the base revision while empty.
    pub fn current_revision(&self) -> Revision {
        self.base_revision + self.entries.len() as Revision
    }

    /// Highest revision confirmed by the server.
    pub fn synchronized_revision(&self) -> Revision {
        self.synchronized_revision
    }

    /// Fails if `revision` lies beyond the current revision.
    pub fn set_synchronized_revision(&mut self, revision: Revision) -> Result<(), SyncLogError> {
        let current = self.current_revision();
        if revision > current {
            return Err(SyncLogError::SyncRevisionAhead {
                requested: revision,
                current,
            });
        }
        self.synchronized_revision = revision;
        Ok(())
    }

    /// Appends the entry for the next revision.
    ///
    /// The event must carry exactly `current_revision() + 1`; anything else is
    /// rejected with [`SyncLogError::NonContiguous`] and the log is unchanged.
    pub fn append_entry(&mut self, entry: SyncLogEntry) -> Result<(), SyncLogError> {
        let expected = self.current_revision() + 1;
        if entry.event.revision != expected {
            return Err(SyncLogError::NonContiguous {
                expected,
                actual: entry.event.revision,
            });
        }
        log::trace!("[SYNCLOG] {} append r{}", self.address, expected);
        self.entries.push(entry);
        Ok(())
    }

    pub fn entry_at(&self, revision: Revision) -> Option<&SyncLogEntry> {
        let index = revision.checked_sub(self.first_revision())?;
        self.entries.get(usize::try_from(index).ok()?)
    }

    /// Entries with `begin <= revision <= end` (`end` unbounded if `None`).
    pub fn entries_between(
        &self,
        begin: Revision,
        end: Option<Revision>,
    ) -> impl Iterator<Item = &SyncLogEntry> {
        self.entries.iter().filter(move |e| {
            e.event.revision >= begin && end.map_or(true, |end| e.event.revision <= end)
        })
    }

    /// Like [`SyncLog::entries_between`], events only.
    pub fn events_between(
        &self,
        begin: Revision,
        end: Option<Revision>,
    ) -> impl Iterator<Item = &XEvent> {
        self.entries_between(begin, end).map(|e| &e.event)
    }

    /// Drops every entry above `revision`.
    pub fn truncate_to_revision(&mut self, revision: Revision) -> Result<(), SyncLogError> {
        if revision < self.base_revision {
            return Err(SyncLogError::TruncateBelowBase {
                requested: revision,
                base: self.base_revision,
            });
        }
        let keep = usize::try_from(revision - self.base_revision).unwrap_or(usize::MAX);
        if keep < self.entries.len() {
            log::debug!(
                "[SYNCLOG] {} truncate r{} -> r{}",
                self.address,
                self.current_revision(),
                revision
            );
            self.entries.truncate(keep);
        }
        Ok(())
    }

    // ================================
    // Local changes
    // ================================

    /// Queues a change that was applied locally and awaits the server.
    pub fn append_local_change(&mut self, change: LocalChange) {
        self.local_changes.push(change);
    }

    /// Pending changes in submission order.
    pub fn local_changes(&self) -> &[LocalChange] {
        &self.local_changes
    }

    /// Removes the change at `index`, `None` if out of range.
    pub fn remove_local_change(&mut self, index: usize) -> Option<LocalChange> {
        (index < self.local_changes.len()).then(|| self.local_changes.remove(index))
    }

    /// Empties the queue and hands back what was in it.
    pub fn clear_local_changes(&mut self) -> Vec<LocalChange> {
        std::mem::take(&mut self.local_changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::EventKind;

    fn event(revision: Revision) -> XEvent {
        XEvent {
            actor: XId::new("alice").unwrap(),
            target: format!("/r/m/o{}", revision).parse().unwrap(),
            revision,
            old_model_revision: revision - 1,
            old_object_revision: None,
            old_field_revision: None,
            implied: false,
            kind: EventKind::ObjectAdded,
        }
    }

    fn entry(revision: Revision) -> SyncLogEntry {
        SyncLogEntry {
            event: event(revision),
            command: None,
        }
    }

    fn log_at(base: Revision) -> SyncLog {
        SyncLog::new("/r/m".parse().unwrap(), base)
    }

    #[test]
    fn append_requires_next_revision() {
        let mut log = log_at(3);
        assert_eq!(log.first_revision(), 4);

        log.append_entry(entry(4)).unwrap();
        assert_eq!(
            log.append_entry(entry(6)),
            Err(SyncLogError::NonContiguous {
                expected: 5,
                actual: 6
            })
        );
        assert_eq!(log.current_revision(), 4);
    }

    #[test]
    fn truncate_then_reappend_stays_contiguous() {
        let mut log = log_at(0);
        for r in 1..=5 {
            log.append_entry(entry(r)).unwrap();
        }

        log.truncate_to_revision(2).unwrap();
        assert_eq!(log.current_revision(), 2);
        assert!(log.entry_at(3).is_none());

        log.append_entry(entry(3)).unwrap();
        let revisions: Vec<Revision> = log.entries_between(1, None).map(|e| e.event.revision).collect();
        assert_eq!(revisions, vec![1, 2, 3]);

        assert!(log.truncate_to_revision(7).is_ok());
        assert_eq!(log.current_revision(), 3);
    }

    #[test]
    fn truncate_below_base_is_rejected() {
        let mut log = log_at(5);
        assert!(log.truncate_to_revision(4).is_err());
        assert!(log.truncate_to_revision(5).is_ok());
    }

    #[test]
    fn sync_revision_cannot_pass_current() {
        let mut log = log_at(0);
        log.append_entry(entry(1)).unwrap();
        assert!(log.set_synchronized_revision(2).is_err());
        log.set_synchronized_revision(1).unwrap();
        assert_eq!(log.synchronized_revision(), 1);
    }

    #[test]
    fn entry_lookup_and_range() {
        let mut log = log_at(10);
        for r in 11..=14 {
            log.append_entry(entry(r)).unwrap();
        }
        assert_eq!(log.entry_at(12).unwrap().event.revision, 12);
        assert!(log.entry_at(10).is_none());
        assert_eq!(log.entries_between(12, Some(13)).count(), 2);
        let tail: Vec<Revision> = log.events_between(14, None).map(|e| e.revision).collect();
        assert_eq!(tail, vec![14]);
    }
}
