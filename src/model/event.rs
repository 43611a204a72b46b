use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::address::{XAddress, XId};
use crate::model::command::Revision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    ObjectAdded,
    ObjectRemoved,
    FieldAdded,
    FieldRemoved,
    ValueAdded { value: Value },
    ValueChanged { old: Value, new: Value },
    ValueRemoved { old: Value },
    Transaction(Vec<XEvent>),
}

/// A change that happened to a model, as recorded in the change log.
///
/// `target` is the changed entity (the added object, the field whose value
/// changed, ...) except for transactions, where it is the transaction scope.
/// The `old_*` revisions describe the entity chain before the change and are
/// what allows undoing a local event without consulting the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XEvent {
    pub actor: XId,
    pub target: XAddress,
    pub revision: Revision,
    pub old_model_revision: Revision,
    pub old_object_revision: Option<Revision>,
    pub old_field_revision: Option<Revision>,
    /// Side effect of another change in the same transaction (e.g. a field
    /// removed because its object was removed).
    pub implied: bool,
    pub kind: EventKind,
}

impl XEvent {
    pub fn is_transaction(&self) -> bool {
        matches!(self.kind, EventKind::Transaction(_))
    }

    /// Visits all non-transaction events in application order.
    pub fn atomic_events(&self) -> Vec<&XEvent> {
        let mut out = Vec::new();
        self.collect_atomic(&mut out);
        out
    }

    fn collect_atomic<'a>(&'a self, out: &mut Vec<&'a XEvent>) {
        match &self.kind {
            EventKind::Transaction(events) => {
                for e in events {
                    e.collect_atomic(out);
                }
            }
            _ => out.push(self),
        }
    }

    /// The event that undoes this one.
    ///
    /// Additions become removals and the other way round, value changes swap
    /// their old and new values and transactions undo their members in
    /// reverse order. Actor and revisions are kept, so the `old_*` revisions
    /// name the state the inverse goes back to.
    pub fn inverse(&self) -> XEvent {
        let kind = match &self.kind {
            EventKind::ObjectAdded => EventKind::ObjectRemoved,
            EventKind::ObjectRemoved => EventKind::ObjectAdded,
            EventKind::FieldAdded => EventKind::FieldRemoved,
            EventKind::FieldRemoved => EventKind::FieldAdded,
            EventKind::ValueAdded { value } => EventKind::ValueRemoved { old: value.clone() },
            EventKind::ValueChanged { old, new } => EventKind::ValueChanged {
                old: new.clone(),
                new: old.clone(),
            },
            EventKind::ValueRemoved { old } => EventKind::ValueAdded { value: old.clone() },
            EventKind::Transaction(events) => {
                EventKind::Transaction(events.iter().rev().map(XEvent::inverse).collect())
            }
        };
        XEvent {
            kind,
            ..self.clone()
        }
    }

    /// Same change, regardless of who made it and at which revision.
    pub fn is_equivalent(&self, other: &XEvent) -> bool {
        if self.target != other.target {
            return false;
        }
        match (&self.kind, &other.kind) {
            (EventKind::Transaction(a), EventKind::Transaction(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_equivalent(y))
            }
            (a, b) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::command::XCommand;
    use crate::model::snapshot::ModelSnapshot;

    fn id(s: &str) -> XId {
        XId::new(s).unwrap()
    }

    fn addr(s: &str) -> XAddress {
        s.parse().unwrap()
    }

    fn populated() -> ModelSnapshot {
        let mut m = ModelSnapshot::new(addr("/r/m")).unwrap();
        for cmd in [
            XCommand::add_object(&addr("/r/m"), id("o")),
            XCommand::add_field(&addr("/r/m/o"), id("f")),
            XCommand::set_value(&addr("/r/m/o/f"), Some(json!("v"))),
        ] {
            m.execute(&id("a"), &cmd);
        }
        m
    }

    #[test]
    fn inverse_of_removal_adds_back_in_reverse_order() {
        let mut m = populated();
        let removal = m.execute(&id("a"), &XCommand::remove_object(&addr("/r/m/o"))).1.unwrap();

        let undo = removal.inverse();
        let kinds: Vec<&EventKind> = undo.atomic_events().into_iter().map(|e| &e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &EventKind::ObjectAdded,
                &EventKind::FieldAdded,
                &EventKind::ValueAdded { value: json!("v") },
            ]
        );
        assert_eq!(undo.revision, removal.revision);
        assert!(undo.inverse().is_equivalent(&removal));
    }

    #[test]
    fn inverse_swaps_changed_values() {
        let mut m = populated();
        let change = m
            .execute(&id("a"), &XCommand::set_value(&addr("/r/m/o/f"), Some(json!("w"))))
            .1
            .unwrap();

        let undo = change.inverse();
        assert_eq!(
            undo.kind,
            EventKind::ValueChanged {
                old: json!("w"),
                new: json!("v"),
            }
        );
        assert!(!undo.is_equivalent(&change));
        assert!(undo.inverse().is_equivalent(&change));
    }
}
