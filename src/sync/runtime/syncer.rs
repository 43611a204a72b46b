use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::config::SyncConfig;
use crate::listeners::{ListenerId, ListenerRegistry};
use crate::model::address::{AddressError, XId};
use crate::model::command::CommandResult;
use crate::model::event::XEvent;
use crate::sync::engine::{
    ChangeNotification, EventMapper, LocalChange, RoundError, SyncOutcome, SyncReport,
};
use crate::sync::remote::{BatchResponse, Credentials, GetEventsRequest, RemoteError, RemoteStore};
use crate::sync::runtime::replica::Replica;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("a synchronization round is already running")]
    AlreadySyncing,

    #[error("remote store did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("expected {expected} event lists, got {actual}")]
    MalformedResponse { expected: usize, actual: usize },

    #[error("server response rejected: {0}")]
    Round(#[from] RoundError),
}

/// Completion of one round.
pub trait SyncCallback: Send + Sync {
    fn on_success(&self, report: &SyncReport);
    fn on_request_error(&self, error: &SyncError);
}

/// Observer of a replica's synchronization.
pub trait SyncListener: Send + Sync {
    /// Called inside the round's atomic section, before the replica changes.
    /// Must not call back into the replica or the syncer.
    fn on_sync_result(&self, _event: &XEvent, _outcome: SyncOutcome) {}

    /// Called after the round, once per visible change of the replica.
    fn on_change(&self, _change: &ChangeNotification) {}
}

/// **Syncer**
///
/// Imperative shell around a [`Replica`]:
/// 1. Sends the pending commands and an event request in one remote call.
/// 2. Feeds the answer to the engine inside the replica lock.
/// 3. Delivers command callbacks and change notifications after unlocking.
///
/// At most one round runs at a time; a concurrent attempt fails fast.
pub struct Syncer<R> {
    remote: Arc<R>,
    replica: Replica,
    mapper: Box<dyn EventMapper>,
    credentials: Credentials,
    round_timeout: Duration,
    round: tokio::sync::Mutex<()>,
    listeners: Mutex<ListenerRegistry<dyn SyncListener>>,
}

impl<R: RemoteStore> Syncer<R> {
    /// Creates a syncer for `replica`.
    ///
    /// # Arguments
    /// * `remote` - Server the rounds talk to.
    /// * `replica` - Local model; clone it first to keep a handle for the app.
    /// * `mapper` - Decides which server events confirm which local events.
    /// * `config` - Actor, credentials and round timeout.
    ///
    /// Fails if `config.actor` is not a valid id.
    pub fn new(
        remote: Arc<R>,
        replica: Replica,
        mapper: Box<dyn EventMapper>,
        config: &SyncConfig,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            remote,
            replica,
            mapper,
            credentials: Credentials {
                actor: XId::new(&config.actor)?,
                password_hash: config.password_hash.clone(),
            },
            round_timeout: config.round_timeout(),
            round: tokio::sync::Mutex::new(()),
            listeners: Mutex::new(ListenerRegistry::new()),
        })
    }

    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    pub fn actor(&self) -> &XId {
        &self.credentials.actor
    }

    /// Registers a listener that sees every round's result inside its atomic
    /// section. Listeners must not call back into the replica.
    pub fn add_listener(&self, listener: Arc<dyn SyncListener>) -> ListenerId {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Runs one round and reports its end to `callback` as well.
    pub async fn start_sync(
        &self,
        callback: Option<&dyn SyncCallback>,
    ) -> Result<SyncReport, SyncError> {
        let result = self.run_round().await;
        if let Some(cb) = callback {
            match &result {
                Ok(report) => cb.on_success(report),
                Err(err) => cb.on_request_error(err),
            }
        }
        result
    }

    /// Runs one round: sends the pending commands, merges the answer and
    /// settles every command callback.
    ///
    /// Fails with [`SyncError::AlreadySyncing`] while another round is in
    /// flight. On any other error the pending commands stay queued.
    pub async fn synchronize(&self) -> Result<SyncReport, SyncError> {
        self.start_sync(None).await
    }

    async fn run_round(&self) -> Result<SyncReport, SyncError> {
        let address = self.replica.address();
        let Ok(_round) = self.round.try_lock() else {
            log::warn!("[SYNCER] {} round already in flight, not starting another", address);
            return Err(SyncError::AlreadySyncing);
        };

        let request = self.replica.lock().start_round();
        let events_request = GetEventsRequest {
            address,
            begin_revision: request.begin_revision,
            end_revision: None,
        };
        log::info!(
            "[SYNCER] {} sending {} commands, asking for events from r{}",
            events_request.address,
            request.commands.len(),
            request.begin_revision
        );

        let call = self.remote.execute_commands_and_get_events(
            &self.credentials,
            &request.commands,
            std::slice::from_ref(&events_request),
        );
        let response = match tokio::time::timeout(self.round_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(self.on_server_failure(err.into())),
            Err(_) => return Err(self.on_server_failure(SyncError::Timeout(self.round_timeout))),
        };

        self.continue_sync(request.commands.len(), response)
    }

    fn continue_sync(&self, batch_len: usize, response: BatchResponse) -> Result<SyncReport, SyncError> {
        let BatchResponse {
            command_results,
            events,
        } = response;
        if events.len() != 1 {
            return Err(self.on_server_failure(SyncError::MalformedResponse {
                expected: 1,
                actual: events.len(),
            }));
        }
        let events = events.into_iter().flatten().collect::<Vec<_>>();

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();

        let round = self.replica.lock().continue_sync(
            batch_len,
            &command_results,
            &events,
            self.mapper.as_ref(),
            &mut |event, outcome| {
                for listener in &listeners {
                    listener.on_sync_result(event, outcome);
                }
            },
        );
        let outcome = round.map_err(|err| self.on_server_failure(err.into()))?;

        for change in &outcome.changes {
            for listener in &listeners {
                listener.on_change(change);
            }
        }
        for (change, result) in outcome.completed.iter().chain(&outcome.dropped) {
            settle(change, *result);
        }

        let report = outcome.report;
        log::info!(
            "[SYNCER] {} at r{}: {} applied, {} no-change, {} failed, {} server events",
            self.replica.address(),
            report.synchronized_revision,
            report.applied,
            report.no_change,
            report.failed,
            report.server_events
        );
        Ok(report)
    }

    /// Aborts the round; pending changes stay queued for the next one.
    fn on_server_failure(&self, err: SyncError) -> SyncError {
        log::warn!(
            "[SYNCER] {} round aborted, {} changes stay pending: {}",
            self.replica.address(),
            self.replica.pending_count(),
            err
        );
        err
    }
}

fn settle(change: &LocalChange, result: CommandResult) {
    let Some(cb) = &change.callback else {
        return;
    };
    match result {
        CommandResult::Failed => cb.on_failure(),
        result => cb.on_success(result),
    }
}
