use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authorisation::AccessError;
use crate::model::address::{XAddress, XId};
use crate::model::command::{CommandResult, Revision, XCommand};
use crate::model::event::XEvent;
use crate::model::snapshot::ModelSnapshot;

/// Identifies the caller of a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub actor: XId,
    pub password_hash: String,
}

/// Events of one model with `begin <= revision <= end` (`end` open if `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventsRequest {
    pub address: XAddress,
    pub begin_revision: Revision,
    pub end_revision: Option<Revision>,
}

/// Answer to one batched call: one result per command, one event list per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub command_results: Vec<CommandResult>,
    pub events: Vec<Vec<XEvent>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    AccessDenied(#[from] AccessError),

    #[error("unknown model {0}")]
    UnknownModel(XAddress),
}

/// Server side of the synchronization protocol.
///
/// Commands are executed in order, each independently of the others; the
/// event requests are served after all commands ran, so they include the
/// events the commands produced.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn execute_commands_and_get_events(
        &self,
        credentials: &Credentials,
        commands: &[XCommand],
        requests: &[GetEventsRequest],
    ) -> Result<BatchResponse, RemoteError>;
}

/// Authoritative storage behind a remote store.
pub trait Persistence: Send + Sync {
    fn execute_command(&self, actor: &XId, command: &XCommand) -> CommandResult;

    /// Events of `address` in `begin..=end`; empty for unknown models.
    fn get_events(&self, address: &XAddress, begin: Revision, end: Option<Revision>) -> Vec<XEvent>;

    fn get_model_snapshot(&self, address: &XAddress) -> Option<ModelSnapshot>;
}
