use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::address::{XAddress, XId};
use crate::model::command::{CommandResult, XCommand};
use crate::model::snapshot::ModelSnapshot;
use crate::sync::engine::{CommandCallback, SyncLogError, SynchronizedModel};

/// Shared handle to a locally replicated model.
///
/// Cloning is cheap; all clones see the same state. Readers get consistent
/// copies between rounds but are never blocked for longer than one command
/// or one round's atomic section.
#[derive(Clone)]
pub struct Replica {
    inner: Arc<Mutex<SynchronizedModel>>,
}

impl Replica {
    /// Wraps `snapshot`, taken to be the server state at its revision.
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SynchronizedModel::new(snapshot))),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SynchronizedModel> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `command` locally and queues it for the next round.
    ///
    /// `Failed` and `NoChange` are final right away: the callback fires
    /// before this returns. Otherwise it fires once a round settles the
    /// command.
    pub fn execute_command(
        &self,
        actor: &XId,
        command: XCommand,
        callback: Option<Arc<dyn CommandCallback>>,
    ) -> Result<CommandResult, SyncLogError> {
        let (result, unqueued) = self.lock().execute_local(actor, command, callback)?;

        match (result, unqueued) {
            (CommandResult::Failed, Some(cb)) => cb.on_failure(),
            (result, Some(cb)) => cb.on_success(result),
            _ => {}
        }
        log::trace!("[REPLICA] {} local command: {:?}", actor, result);
        Ok(result)
    }

    /// Runs `f` against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&SynchronizedModel) -> T) -> T {
        f(&self.lock())
    }

    pub fn address(&self) -> XAddress {
        self.read(|m| m.address().clone())
    }

    /// Copy of the current state, pending local changes included.
    pub fn snapshot(&self) -> ModelSnapshot {
        self.read(|m| m.snapshot().clone())
    }

    pub fn revision(&self) -> u64 {
        self.read(|m| m.revision())
    }

    /// Number of local commands not yet confirmed by the server.
    pub fn pending_count(&self) -> usize {
        self.read(|m| m.pending_count())
    }
}
