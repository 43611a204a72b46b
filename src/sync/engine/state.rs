use std::sync::Arc;

use crate::model::address::{XAddress, XId};
use crate::model::command::{CommandResult, Revision, XCommand};
use crate::model::snapshot::ModelSnapshot;
use crate::sync::engine::sync_log::{CommandCallback, LocalChange, SyncLog, SyncLogEntry, SyncLogError};

/// Local replica of one model: the writable snapshot plus its change log.
///
/// The snapshot always reflects the confirmed history with the pending
/// local changes applied on top, so `snapshot.revision()` equals
/// `sync_log.current_revision()`.
#[derive(Debug)]
pub struct SynchronizedModel {
    pub(crate) snapshot: ModelSnapshot,
    pub(crate) sync_log: SyncLog,
}

impl SynchronizedModel {
    /// Starts from `snapshot`, which is taken to be confirmed by the server.
    pub fn new(snapshot: ModelSnapshot) -> Self {
        let sync_log = SyncLog::new(snapshot.address().clone(), snapshot.revision());
        Self { snapshot, sync_log }
    }

    pub fn address(&self) -> &XAddress {
        self.snapshot.address()
    }

    pub fn snapshot(&self) -> &ModelSnapshot {
        &self.snapshot
    }

    pub fn sync_log(&self) -> &SyncLog {
        &self.sync_log
    }

    /// Local revision, ahead of the synchronized one while changes are pending.
    pub fn revision(&self) -> Revision {
        self.snapshot.revision()
    }

    /// Last revision known to match the server.
    pub fn synchronized_revision(&self) -> Revision {
        self.sync_log.synchronized_revision()
    }

    pub fn pending_count(&self) -> usize {
        self.sync_log.local_changes().len()
    }

    /// Executes `command` at the next local revision.
    ///
    /// Only commands that changed the snapshot are queued for the server;
    /// the callback of a `Failed` or `NoChange` command is handed back to
    /// the caller.
    pub fn execute_local(
        &mut self,
        actor: &XId,
        command: XCommand,
        callback: Option<Arc<dyn CommandCallback>>,
    ) -> Result<(CommandResult, Option<Arc<dyn CommandCallback>>), SyncLogError> {
        let (result, event) = self.snapshot.execute(actor, &command);
        let Some(event) = event else {
            return Ok((result, callback));
        };

        self.sync_log.append_entry(SyncLogEntry {
            event: event.clone(),
            command: Some(command.clone()),
        })?;
        self.sync_log.append_local_change(LocalChange {
            actor: actor.clone(),
            command,
            event,
            callback,
        });
        Ok((result, None))
    }
}
