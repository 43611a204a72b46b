use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::address::{XAddress, XId};

/// Revision number of a model, object or field.
pub type Revision = u64;

/// Outcome of executing one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandResult {
    /// The command conflicts with the current state and was rejected.
    Failed,
    /// The command was valid but the state already matched it.
    NoChange,
    /// The command was applied and produced this revision.
    Applied(Revision),
}

impl CommandResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, CommandResult::Failed)
    }

    pub fn revision(&self) -> Option<Revision> {
        match self {
            CommandResult::Applied(r) => Some(*r),
            _ => None,
        }
    }
}

/// How strictly a command checks the state it was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Brings the entity into the requested state; already being there is `NoChange`.
    Forced,
    /// Fails unless the entity is in the expected state.
    ///
    /// For additions the entity must not exist yet; for removals and value
    /// changes it must exist with exactly this revision.
    Safe(Revision),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XCommand {
    AddObject {
        model: XAddress,
        object: XId,
        intent: Intent,
    },
    RemoveObject {
        object: XAddress,
        intent: Intent,
    },
    AddField {
        object: XAddress,
        field: XId,
        intent: Intent,
    },
    RemoveField {
        field: XAddress,
        intent: Intent,
    },
    /// Adds, changes (`Some`) or removes (`None`) the value of a field.
    SetValue {
        field: XAddress,
        value: Option<Value>,
        intent: Intent,
    },
    /// Executed atomically: either every command applies or none does.
    Transaction {
        target: XAddress,
        commands: Vec<XCommand>,
    },
}

/// Constructors build forced commands; use [`XCommand::with_intent`] for a
/// safe one.
impl XCommand {
    pub fn add_object(model: &XAddress, object: XId) -> Self {
        XCommand::AddObject {
            model: model.clone(),
            object,
            intent: Intent::Forced,
        }
    }

    pub fn remove_object(object: &XAddress) -> Self {
        XCommand::RemoveObject {
            object: object.clone(),
            intent: Intent::Forced,
        }
    }

    pub fn add_field(object: &XAddress, field: XId) -> Self {
        XCommand::AddField {
            object: object.clone(),
            field,
            intent: Intent::Forced,
        }
    }

    pub fn remove_field(field: &XAddress) -> Self {
        XCommand::RemoveField {
            field: field.clone(),
            intent: Intent::Forced,
        }
    }

    pub fn set_value(field: &XAddress, value: Option<Value>) -> Self {
        XCommand::SetValue {
            field: field.clone(),
            value,
            intent: Intent::Forced,
        }
    }

    /// Replaces the intent of a non-transaction command.
    pub fn with_intent(mut self, new_intent: Intent) -> Self {
        match &mut self {
            XCommand::AddObject { intent, .. }
            | XCommand::RemoveObject { intent, .. }
            | XCommand::AddField { intent, .. }
            | XCommand::RemoveField { intent, .. }
            | XCommand::SetValue { intent, .. } => *intent = new_intent,
            XCommand::Transaction { .. } => {}
        }
        self
    }

    /// The entity this command changes (or, for a transaction, its scope).
    pub fn target(&self) -> XAddress {
        match self {
            XCommand::AddObject { model, object, .. } => model
                .child(object.clone())
                .unwrap_or_else(|| model.clone()),
            XCommand::AddField { object, field, .. } => object
                .child(field.clone())
                .unwrap_or_else(|| object.clone()),
            XCommand::RemoveObject { object, .. } => object.clone(),
            XCommand::RemoveField { field, .. } | XCommand::SetValue { field, .. } => {
                field.clone()
            }
            XCommand::Transaction { target, .. } => target.clone(),
        }
    }
}
