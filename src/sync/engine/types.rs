use serde::Serialize;
use thiserror::Error;

use crate::model::command::{CommandResult, Revision, XCommand};
use crate::sync::engine::delta::ChangeNotification;
use crate::sync::engine::sync_log::{LocalChange, SyncLogError};

/// How a single event fared in a round, as seen by sync listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    /// A server event, now part of the confirmed history.
    Confirmed,
    /// A local event that no server event confirmed.
    Rejected,
}

/// What a round sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRequest {
    /// Pending commands at round start, in submission order.
    pub commands: Vec<XCommand>,
    /// First revision the replica has not seen confirmed yet.
    pub begin_revision: Revision,
}

/// Summary of one completed round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub applied: usize,
    pub no_change: usize,
    pub failed: usize,
    pub server_events: usize,
    pub synchronized_revision: Revision,
    /// A command failed although the server returned no events.
    pub sync_lost: bool,
    /// Local changes submitted during the round and replayed on the new state.
    pub rebased: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("server returned {actual} results for {expected} commands")]
    ResultCount { expected: usize, actual: usize },

    #[error("batch of {batch} commands exceeds {pending} pending changes")]
    BatchTooLarge { batch: usize, pending: usize },

    #[error("server event at position {index} has revision {actual}, expected {expected}")]
    EventGap {
        index: usize,
        expected: Revision,
        actual: Revision,
    },

    #[error(transparent)]
    Log(#[from] SyncLogError),
}

/// Everything the shell has to deliver once the model is unlocked.
#[derive(Debug, Default)]
pub struct RoundOutcome {
    /// Batch commands with their server result, in removal (reverse) order.
    pub completed: Vec<(LocalChange, CommandResult)>,
    /// Changes that no longer apply after replaying them on the new state.
    pub dropped: Vec<(LocalChange, CommandResult)>,
    pub changes: Vec<ChangeNotification>,
    pub report: SyncReport,
}
