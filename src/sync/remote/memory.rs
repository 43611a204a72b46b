use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::model::address::{AddressError, XAddress, XId};
use crate::model::command::{CommandResult, Revision, XCommand};
use crate::model::event::XEvent;
use crate::model::snapshot::ModelSnapshot;
use crate::sync::remote::api::Persistence;

struct StoredModel {
    snapshot: ModelSnapshot,
    events: Vec<XEvent>,
}

/// Pure in-memory persistence for tests and the demo.
#[derive(Default)]
pub struct MemoryPersistence {
    models: Mutex<HashMap<XAddress, StoredModel>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty model; does nothing if it exists.
    pub fn create_model(&self, address: XAddress) -> Result<(), AddressError> {
        let snapshot = ModelSnapshot::new(address.clone())?;
        let mut models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        models.entry(address).or_insert_with(|| StoredModel {
            snapshot,
            events: Vec::new(),
        });
        Ok(())
    }
}

impl Persistence for MemoryPersistence {
    fn execute_command(&self, actor: &XId, command: &XCommand) -> CommandResult {
        let Some(address) = command.target().model_address() else {
            return CommandResult::Failed;
        };
        let mut models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(model) = models.get_mut(&address) else {
            log::debug!("[PERSISTENCE] command for unknown model {}", address);
            return CommandResult::Failed;
        };

        let (result, event) = model.snapshot.execute(actor, command);
        if let Some(event) = event {
            log::trace!("[PERSISTENCE] {} r{} by {}", address, event.revision, actor);
            model.events.push(event);
        }
        result
    }

    fn get_events(&self, address: &XAddress, begin: Revision, end: Option<Revision>) -> Vec<XEvent> {
        let models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(model) = models.get(address) else {
            return Vec::new();
        };
        model
            .events
            .iter()
            .filter(|e| e.revision >= begin && end.map_or(true, |end| e.revision <= end))
            .cloned()
            .collect()
    }

    fn get_model_snapshot(&self, address: &XAddress) -> Option<ModelSnapshot> {
        let models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        models.get(address).map(|m| m.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_append_events_in_revision_order() {
        let persistence = MemoryPersistence::new();
        let model: XAddress = "/r/m".parse().unwrap();
        let bob = XId::new("bob").unwrap();
        persistence.create_model(model.clone()).unwrap();

        let add = XCommand::add_object(&model, XId::new("x").unwrap());
        assert_eq!(persistence.execute_command(&bob, &add), CommandResult::Applied(1));
        assert_eq!(persistence.execute_command(&bob, &add), CommandResult::NoChange);
        let add_y = XCommand::add_object(&model, XId::new("y").unwrap());
        assert_eq!(persistence.execute_command(&bob, &add_y), CommandResult::Applied(2));

        let revisions: Vec<_> = persistence.get_events(&model, 2, None).iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![2]);
        assert_eq!(persistence.get_events(&model, 1, Some(1)).len(), 1);
        assert_eq!(persistence.get_model_snapshot(&model).unwrap().revision(), 2);
    }

    #[test]
    fn unknown_model_fails_quietly() {
        let persistence = MemoryPersistence::new();
        let model: XAddress = "/r/missing".parse().unwrap();
        let cmd = XCommand::add_object(&model, XId::new("x").unwrap());

        assert_eq!(persistence.execute_command(&XId::new("bob").unwrap(), &cmd), CommandResult::Failed);
        assert!(persistence.get_events(&model, 1, None).is_empty());
        assert!(persistence.get_model_snapshot(&model).is_none());
    }
}
