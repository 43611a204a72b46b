//! Writable in-memory state of one model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::address::{AddressError, AddressType, XAddress, XId};
use crate::model::command::{CommandResult, Intent, Revision, XCommand};
use crate::model::event::{EventKind, XEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub revision: Revision,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub revision: Revision,
    pub fields: BTreeMap<XId, FieldSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    address: XAddress,
    revision: Revision,
    objects: BTreeMap<XId, ObjectSnapshot>,
}

type Planned = Result<Option<XEvent>, &'static str>;

impl ModelSnapshot {
    /// An empty model at revision 0.
    pub fn new(address: XAddress) -> Result<Self, AddressError> {
        if address.address_type() != AddressType::Model {
            return Err(AddressError::NotAModel(address.to_string()));
        }
        Ok(Self {
            address,
            revision: 0,
            objects: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> &XAddress {
        &self.address
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }

    pub fn objects(&self) -> &BTreeMap<XId, ObjectSnapshot> {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut BTreeMap<XId, ObjectSnapshot> {
        &mut self.objects
    }

    pub fn object(&self, object: &XId) -> Option<&ObjectSnapshot> {
        self.objects.get(object)
    }

    pub fn field(&self, object: &XId, field: &XId) -> Option<&FieldSnapshot> {
        self.objects.get(object)?.fields.get(field)
    }

    pub fn value(&self, object: &XId, field: &XId) -> Option<&Value> {
        self.field(object, field)?.value.as_ref()
    }

    /// Validates and applies one command at `revision + 1`.
    ///
    /// A failed command leaves the snapshot untouched, including for
    /// transactions, which are planned against a scratch copy first.
    pub fn execute(&mut self, actor: &XId, command: &XCommand) -> (CommandResult, Option<XEvent>) {
        let revision = self.revision + 1;

        match self.plan(actor, command, revision) {
            Err(reason) => {
                log::debug!(
                    "[MODEL] {} rejected command on {}: {}",
                    actor,
                    command.target(),
                    reason
                );
                (CommandResult::Failed, None)
            }
            Ok(None) => (CommandResult::NoChange, None),
            Ok(Some(event)) => {
                self.apply_event(&event);
                (CommandResult::Applied(revision), Some(event))
            }
        }
    }

    /// Replays an event that was produced against an equivalent state.
    pub fn apply_event(&mut self, event: &XEvent) {
        let rev = event.revision;
        self.revision = rev;

        let object_id = event.target.object_id();
        let field_id = event.target.field_id();

        match &event.kind {
            EventKind::Transaction(events) => {
                for e in events {
                    self.apply_event(e);
                }
            }
            EventKind::ObjectAdded => {
                if let Some(o) = object_id {
                    self.objects.insert(
                        o.clone(),
                        ObjectSnapshot {
                            revision: rev,
                            fields: BTreeMap::new(),
                        },
                    );
                }
            }
            EventKind::ObjectRemoved => {
                if let Some(o) = object_id {
                    self.objects.remove(o);
                }
            }
            kind => {
                let (Some(o), Some(f)) = (object_id, field_id) else {
                    return;
                };
                let Some(object) = self.objects.get_mut(o) else {
                    return;
                };
                object.revision = rev;

                match kind {
                    EventKind::FieldAdded => {
                        object.fields.insert(
                            f.clone(),
                            FieldSnapshot {
                                revision: rev,
                                value: None,
                            },
                        );
                    }
                    EventKind::FieldRemoved => {
                        object.fields.remove(f);
                    }
                    EventKind::ValueAdded { value } | EventKind::ValueChanged { new: value, .. } => {
                        if let Some(field) = object.fields.get_mut(f) {
                            field.value = Some(value.clone());
                            field.revision = rev;
                        }
                    }
                    EventKind::ValueRemoved { .. } => {
                        if let Some(field) = object.fields.get_mut(f) {
                            field.value = None;
                            field.revision = rev;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Stamps the revision of `event` on the model and on every entity
    /// along the changed-entity path that still exists.
    pub(crate) fn propagate_revision(&mut self, event: &XEvent) {
        let rev = event.revision;
        self.revision = rev;

        for atomic in event.atomic_events() {
            let Some(o) = atomic.target.object_id() else {
                continue;
            };
            let Some(object) = self.objects.get_mut(o) else {
                continue;
            };
            object.revision = rev;

            if let Some(field) = atomic.target.field_id().and_then(|f| object.fields.get_mut(f)) {
                field.revision = rev;
            }
        }
    }

    fn owns(&self, address: &XAddress) -> bool {
        address.model_address().as_ref() == Some(&self.address)
    }

    fn event(
        &self,
        actor: &XId,
        target: XAddress,
        revision: Revision,
        implied: bool,
        kind: EventKind,
    ) -> XEvent {
        let object = target.object_id().and_then(|o| self.objects.get(o));
        let field = target
            .field_id()
            .and_then(|f| object.and_then(|o| o.fields.get(f)));

        XEvent {
            actor: actor.clone(),
            target,
            revision,
            old_model_revision: self.revision,
            old_object_revision: object.map(|o| o.revision),
            old_field_revision: field.map(|f| f.revision),
            implied,
            kind,
        }
    }

    fn plan(&self, actor: &XId, command: &XCommand, revision: Revision) -> Planned {
        match command {
            XCommand::AddObject {
                model,
                object,
                intent,
            } => {
                if model != &self.address {
                    return Err("command targets another model");
                }
                if self.objects.contains_key(object) {
                    return match intent {
                        Intent::Forced => Ok(None),
                        Intent::Safe(_) => Err("object already exists"),
                    };
                }
                let target = command.target();
                Ok(Some(self.event(actor, target, revision, false, EventKind::ObjectAdded)))
            }

            XCommand::RemoveObject { object, intent } => {
                if !self.owns(object) || object.address_type() != AddressType::Object {
                    return Err("not an object of this model");
                }
                let Some(id) = object.object_id() else {
                    return Err("not an object address");
                };
                let Some(current) = self.objects.get(id) else {
                    return match intent {
                        Intent::Forced => Ok(None),
                        Intent::Safe(_) => Err("object does not exist"),
                    };
                };
                if let Intent::Safe(expected) = intent {
                    if current.revision != *expected {
                        return Err("object revision mismatch");
                    }
                }

                let mut events = Vec::new();
                for (field_id, field) in &current.fields {
                    let Some(field_address) = object.child(field_id.clone()) else {
                        continue;
                    };
                    if let Some(old) = &field.value {
                        events.push(self.event(
                            actor,
                            field_address.clone(),
                            revision,
                            true,
                            EventKind::ValueRemoved { old: old.clone() },
                        ));
                    }
                    events.push(self.event(
                        actor,
                        field_address,
                        revision,
                        true,
                        EventKind::FieldRemoved,
                    ));
                }
                events.push(self.event(
                    actor,
                    object.clone(),
                    revision,
                    false,
                    EventKind::ObjectRemoved,
                ));

                Ok(Some(self.wrap(actor, self.address.clone(), revision, events)))
            }

            XCommand::AddField {
                object,
                field,
                intent,
            } => {
                if !self.owns(object) || object.address_type() != AddressType::Object {
                    return Err("not an object of this model");
                }
                let Some(current) = object.object_id().and_then(|o| self.objects.get(o)) else {
                    return Err("object does not exist");
                };
                if current.fields.contains_key(field) {
                    return match intent {
                        Intent::Forced => Ok(None),
                        Intent::Safe(_) => Err("field already exists"),
                    };
                }
                let target = command.target();
                Ok(Some(self.event(actor, target, revision, false, EventKind::FieldAdded)))
            }

            XCommand::RemoveField { field, intent } => {
                let Some(object_address) = self.object_of(field) else {
                    return Err("not a field of this model");
                };
                let (Some(o), Some(f)) = (field.object_id(), field.field_id()) else {
                    return Err("not a field address");
                };
                if !self.objects.contains_key(o) {
                    return Err("object does not exist");
                }
                let Some(current) = self.field(o, f) else {
                    return match intent {
                        Intent::Forced => Ok(None),
                        Intent::Safe(_) => Err("field does not exist"),
                    };
                };
                if let Intent::Safe(expected) = intent {
                    if current.revision != *expected {
                        return Err("field revision mismatch");
                    }
                }

                let mut events = Vec::new();
                if let Some(old) = &current.value {
                    events.push(self.event(
                        actor,
                        field.clone(),
                        revision,
                        true,
                        EventKind::ValueRemoved { old: old.clone() },
                    ));
                }
                events.push(self.event(actor, field.clone(), revision, false, EventKind::FieldRemoved));

                Ok(Some(self.wrap(actor, object_address, revision, events)))
            }

            XCommand::SetValue {
                field,
                value,
                intent,
            } => {
                if self.object_of(field).is_none() {
                    return Err("not a field of this model");
                }
                let (Some(o), Some(f)) = (field.object_id(), field.field_id()) else {
                    return Err("not a field address");
                };
                let Some(current) = self.field(o, f) else {
                    return Err("field does not exist");
                };
                if let Intent::Safe(expected) = intent {
                    if current.revision != *expected {
                        return Err("field revision mismatch");
                    }
                }

                let kind = match (&current.value, value) {
                    (None, None) => return Ok(None),
                    (Some(old), Some(new)) if old == new => return Ok(None),
                    (None, Some(new)) => EventKind::ValueAdded { value: new.clone() },
                    (Some(old), Some(new)) => EventKind::ValueChanged {
                        old: old.clone(),
                        new: new.clone(),
                    },
                    (Some(old), None) => EventKind::ValueRemoved { old: old.clone() },
                };
                Ok(Some(self.event(actor, field.clone(), revision, false, kind)))
            }

            XCommand::Transaction { target, commands } => {
                if !self.owns(target) {
                    return Err("transaction targets another model");
                }
                let mut scratch = self.clone();
                let mut events = Vec::new();
                for c in commands {
                    if let Some(e) = scratch.plan(actor, c, revision)? {
                        scratch.apply_event(&e);
                        events.push(e);
                    }
                }
                if events.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.wrap(actor, target.clone(), revision, events)))
            }
        }
    }

    fn object_of(&self, field: &XAddress) -> Option<XAddress> {
        if !self.owns(field) || field.address_type() != AddressType::Field {
            return None;
        }
        field.parent()
    }

    /// Collapses a single event, wraps several into a transaction.
    fn wrap(&self, actor: &XId, target: XAddress, revision: Revision, mut events: Vec<XEvent>) -> XEvent {
        if events.len() == 1 {
            if let Some(e) = events.pop() {
                return e;
            }
        }
        self.event(actor, target, revision, false, EventKind::Transaction(events))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(s: &str) -> XId {
        XId::new(s).unwrap()
    }

    fn model() -> ModelSnapshot {
        ModelSnapshot::new("/repo/model".parse().unwrap()).unwrap()
    }

    fn object_address(o: &str) -> XAddress {
        format!("/repo/model/{}", o).parse().unwrap()
    }

    fn field_address(o: &str, f: &str) -> XAddress {
        format!("/repo/model/{}/{}", o, f).parse().unwrap()
    }

    #[test]
    fn add_object_forced_and_safe() {
        let mut m = model();
        let actor = id("alice");
        let cmd = XCommand::add_object(m.address(), id("x"));

        let (res, ev) = m.execute(&actor, &cmd);
        assert_eq!(res, CommandResult::Applied(1));
        assert_eq!(ev.unwrap().kind, EventKind::ObjectAdded);

        let (res, ev) = m.execute(&actor, &cmd);
        assert_eq!(res, CommandResult::NoChange);
        assert!(ev.is_none());

        let (res, _) = m.execute(&actor, &cmd.clone().with_intent(Intent::Safe(0)));
        assert_eq!(res, CommandResult::Failed);
        assert_eq!(m.revision(), 1);
    }

    #[test]
    fn value_lifecycle_produces_matching_events() {
        let mut m = model();
        let actor = id("alice");
        m.execute(&actor, &XCommand::add_object(m.address(), id("x")));
        m.execute(&actor, &XCommand::add_field(&object_address("x"), id("f")));

        let f = field_address("x", "f");
        let (_, e1) = m.execute(&actor, &XCommand::set_value(&f, Some(json!(1))));
        let (_, e2) = m.execute(&actor, &XCommand::set_value(&f, Some(json!(2))));
        let (_, e3) = m.execute(&actor, &XCommand::set_value(&f, None));

        assert_eq!(e1.unwrap().kind, EventKind::ValueAdded { value: json!(1) });
        assert_eq!(
            e2.unwrap().kind,
            EventKind::ValueChanged {
                old: json!(1),
                new: json!(2)
            }
        );
        let e3 = e3.unwrap();
        assert_eq!(e3.kind, EventKind::ValueRemoved { old: json!(2) });
        assert_eq!(e3.old_field_revision, Some(4));
        assert_eq!(m.field(&id("x"), &id("f")).unwrap().revision, 5);
    }

    #[test]
    fn removing_populated_object_emits_implied_events() {
        let mut m = model();
        let actor = id("alice");
        m.execute(&actor, &XCommand::add_object(m.address(), id("x")));
        m.execute(&actor, &XCommand::add_field(&object_address("x"), id("f")));
        m.execute(&actor, &XCommand::set_value(&field_address("x", "f"), Some(json!("v"))));

        let (res, ev) = m.execute(&actor, &XCommand::remove_object(&object_address("x")));
        assert_eq!(res, CommandResult::Applied(4));

        let ev = ev.unwrap();
        assert!(ev.is_transaction());
        let atomic = ev.atomic_events();
        assert_eq!(atomic.len(), 3);
        assert!(atomic[0].implied && atomic[1].implied && !atomic[2].implied);
        assert!(m.object(&id("x")).is_none());
    }

    #[test]
    fn failed_transaction_leaves_state_untouched() {
        let mut m = model();
        let actor = id("alice");
        let before = m.clone();

        let tx = XCommand::Transaction {
            target: m.address().clone(),
            commands: vec![
                XCommand::add_object(m.address(), id("x")),
                XCommand::set_value(&field_address("x", "missing"), Some(json!(1))),
            ],
        };
        let (res, ev) = m.execute(&actor, &tx);

        assert_eq!(res, CommandResult::Failed);
        assert!(ev.is_none());
        assert_eq!(m, before);
    }

    #[test]
    fn safe_value_change_checks_revision() {
        let mut m = model();
        let actor = id("alice");
        m.execute(&actor, &XCommand::add_object(m.address(), id("x")));
        m.execute(&actor, &XCommand::add_field(&object_address("x"), id("f")));

        let f = field_address("x", "f");
        let stale = XCommand::set_value(&f, Some(json!(1))).with_intent(Intent::Safe(1));
        assert_eq!(m.execute(&actor, &stale).0, CommandResult::Failed);

        let fresh = XCommand::set_value(&f, Some(json!(1))).with_intent(Intent::Safe(2));
        assert_eq!(m.execute(&actor, &fresh).0, CommandResult::Applied(3));
    }

    #[test]
    fn foreign_model_is_rejected() {
        let mut m = model();
        let other: XAddress = "/repo/other".parse().unwrap();
        let (res, _) = m.execute(&id("alice"), &XCommand::add_object(&other, id("x")));
        assert_eq!(res, CommandResult::Failed);
    }
}
