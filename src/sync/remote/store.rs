use std::sync::Arc;

use async_trait::async_trait;

use crate::authorisation::{AuthorisationArm, MemoryAuthorisationManager};
use crate::model::command::{CommandResult, XCommand};
use crate::sync::remote::api::{
    BatchResponse, Credentials, GetEventsRequest, Persistence, RemoteError, RemoteStore,
};

/// In-process [`RemoteStore`] over a [`Persistence`], optionally guarded by
/// an authorisation manager.
pub struct PersistenceRemoteStore<P> {
    persistence: Arc<P>,
    access: Option<Arc<MemoryAuthorisationManager>>,
}

impl<P: Persistence> PersistenceRemoteStore<P> {
    pub fn new(persistence: Arc<P>) -> Self {
        Self {
            persistence,
            access: None,
        }
    }

    /// Commands the caller may not write become `Failed`, event requests it
    /// may not read fail the whole call.
    pub fn with_access_control(mut self, manager: Arc<MemoryAuthorisationManager>) -> Self {
        self.access = Some(manager);
        self
    }

    pub fn persistence(&self) -> &Arc<P> {
        &self.persistence
    }

    fn arm(&self, credentials: &Credentials) -> Option<AuthorisationArm> {
        self.access
            .as_ref()
            .map(|m| AuthorisationArm::new(m.clone(), credentials.actor.clone()))
    }
}

#[async_trait]
impl<P: Persistence> RemoteStore for PersistenceRemoteStore<P> {
    async fn execute_commands_and_get_events(
        &self,
        credentials: &Credentials,
        commands: &[XCommand],
        requests: &[GetEventsRequest],
    ) -> Result<BatchResponse, RemoteError> {
        let arm = self.arm(credentials);

        if let Some(arm) = &arm {
            for request in requests {
                arm.ensure_read(&request.address)?;
            }
        }

        let command_results = commands
            .iter()
            .map(|command| {
                if let Some(arm) = &arm {
                    if arm.ensure_write(&command.target()).is_err() {
                        return CommandResult::Failed;
                    }
                }
                self.persistence.execute_command(&credentials.actor, command)
            })
            .collect();

        let events = requests
            .iter()
            .map(|r| {
                self.persistence
                    .get_events(&r.address, r.begin_revision, r.end_revision)
            })
            .collect();

        log::debug!(
            "[REMOTE] {}: {} commands, {} event requests",
            credentials.actor,
            commands.len(),
            requests.len()
        );
        Ok(BatchResponse {
            command_results,
            events,
        })
    }
}
