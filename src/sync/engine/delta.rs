//! Net state change of one synchronization round.
//!
//! Server events are folded as they are, pending local events through their
//! [`XEvent::inverse`]. The result, applied to the local replica (which
//! already contains the local events), yields the state the server reached. Folding is order-insensitive
//! between the two groups: entity existence is a signed counter and a value
//! set by the server always wins over a value restored by undoing a local
//! change.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::address::{XAddress, XId};
use crate::model::command::Revision;
use crate::model::event::{EventKind, XEvent};
use crate::model::snapshot::{FieldSnapshot, ModelSnapshot, ObjectSnapshot};

/// Change visible to observers after a delta was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification {
    ObjectAdded(XAddress),
    ObjectRemoved(XAddress),
    FieldAdded(XAddress),
    FieldRemoved(XAddress),
    ValueChanged {
        field: XAddress,
        old: Option<Value>,
        new: Option<Value>,
    },
}

impl ChangeNotification {
    /// Notifications for an event applied directly to a snapshot.
    pub fn for_event(event: &XEvent) -> Vec<ChangeNotification> {
        event
            .atomic_events()
            .into_iter()
            .filter_map(|e| {
                let target = e.target.clone();
                let change = match &e.kind {
                    EventKind::ObjectAdded => ChangeNotification::ObjectAdded(target),
                    EventKind::ObjectRemoved => ChangeNotification::ObjectRemoved(target),
                    EventKind::FieldAdded => ChangeNotification::FieldAdded(target),
                    EventKind::FieldRemoved => ChangeNotification::FieldRemoved(target),
                    EventKind::ValueAdded { value } => ChangeNotification::ValueChanged {
                        field: target,
                        old: None,
                        new: Some(value.clone()),
                    },
                    EventKind::ValueChanged { old, new } => ChangeNotification::ValueChanged {
                        field: target,
                        old: Some(old.clone()),
                        new: Some(new.clone()),
                    },
                    EventKind::ValueRemoved { old } => ChangeNotification::ValueChanged {
                        field: target,
                        old: Some(old.clone()),
                        new: None,
                    },
                    EventKind::Transaction(_) => return None,
                };
                Some(change)
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
struct EntityDelta {
    /// Net additions minus removals.
    count: i64,
    /// Revision of the latest forward event touching the entity.
    server_revision: Option<Revision>,
    /// Revision before the earliest undone local event.
    restore_revision: Option<Revision>,
}

/// Where a folded event comes from.
#[derive(Debug, Clone, Copy)]
enum Side {
    Server,
    /// Inverse of a pending local event.
    Undo,
}

impl EntityDelta {
    fn touch(&mut self, side: Side, revision: Revision, old_revision: Option<Revision>) {
        match side {
            Side::Server => self.server_revision = Some(revision),
            Side::Undo => {
                if let Some(r) = old_revision {
                    self.restore_revision = Some(r);
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ValueDelta {
    server: Option<Option<Value>>,
    reverted: Option<Option<Value>>,
}

impl ValueDelta {
    fn target(&self) -> Option<&Option<Value>> {
        self.server.as_ref().or(self.reverted.as_ref())
    }
}

type FieldKey = (XId, XId);

#[derive(Debug, Default)]
pub struct EventDelta {
    objects: BTreeMap<XId, EntityDelta>,
    fields: BTreeMap<FieldKey, EntityDelta>,
    values: BTreeMap<FieldKey, ValueDelta>,
}

impl EventDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.values().all(|d| d.count == 0 && d.restore_revision.is_none())
            && self.fields.values().all(|d| d.count == 0 && d.restore_revision.is_none())
            && self.values.is_empty()
    }

    /// Folds a server event forward.
    pub fn add_event(&mut self, event: &XEvent) {
        for e in event.atomic_events() {
            self.fold(e, event.revision, Side::Server);
        }
    }

    /// Folds the inverse of a pending local event. Call newest first.
    pub fn add_inverse_event(&mut self, event: &XEvent) {
        let undo = event.inverse();
        for e in undo.atomic_events() {
            self.fold(e, undo.revision, Side::Undo);
        }
    }

    fn fold(&mut self, e: &XEvent, revision: Revision, side: Side) {
        let Some(object) = e.target.object_id().cloned() else {
            return;
        };

        let object_delta = self.objects.entry(object.clone()).or_default();
        object_delta.touch(side, revision, e.old_object_revision);

        let field = match &e.kind {
            EventKind::ObjectAdded => {
                object_delta.count += 1;
                return;
            }
            EventKind::ObjectRemoved => {
                object_delta.count -= 1;
                return;
            }
            _ => match e.target.field_id() {
                Some(field) => field.clone(),
                None => return,
            },
        };
        let key = (object, field);

        let field_delta = self.fields.entry(key.clone()).or_default();
        field_delta.touch(side, revision, e.old_field_revision);

        // value the field holds once this event is applied
        let value = match &e.kind {
            EventKind::FieldAdded => {
                field_delta.count += 1;
                return;
            }
            EventKind::FieldRemoved => {
                field_delta.count -= 1;
                return;
            }
            EventKind::ValueAdded { value } | EventKind::ValueChanged { new: value, .. } => {
                Some(value.clone())
            }
            EventKind::ValueRemoved { .. } => None,
            EventKind::ObjectAdded | EventKind::ObjectRemoved | EventKind::Transaction(_) => return,
        };

        let value_delta = self.values.entry(key).or_default();
        match side {
            Side::Server => value_delta.server = Some(value),
            Side::Undo => value_delta.reverted = Some(value),
        }
    }

    /// Applies the net change and reports what observers should see.
    pub fn apply_to(&self, model: &mut ModelSnapshot) -> Vec<ChangeNotification> {
        let model_address = model.address().clone();
        let mut changes = Vec::new();
        let objects = model.objects_mut();

        let object_address = |o: &XId| model_address.child(o.clone());
        let field_address = |o: &XId, f: &XId| object_address(o).and_then(|a| a.child(f.clone()));

        for (id, delta) in &self.objects {
            if delta.count > 0 && !objects.contains_key(id) {
                let revision = delta.server_revision.or(delta.restore_revision).unwrap_or_default();
                objects.insert(
                    id.clone(),
                    ObjectSnapshot {
                        revision,
                        fields: BTreeMap::new(),
                    },
                );
                changes.extend(object_address(id).map(ChangeNotification::ObjectAdded));
            }
        }

        for ((o, f), delta) in &self.fields {
            let Some(object) = objects.get_mut(o) else {
                continue;
            };
            if delta.count > 0 && !object.fields.contains_key(f) {
                let revision = delta.server_revision.or(delta.restore_revision).unwrap_or_default();
                object.fields.insert(
                    f.clone(),
                    FieldSnapshot {
                        revision,
                        value: None,
                    },
                );
                changes.extend(field_address(o, f).map(ChangeNotification::FieldAdded));
            } else if delta.count < 0 && object.fields.remove(f).is_some() {
                changes.extend(field_address(o, f).map(ChangeNotification::FieldRemoved));
            }
        }

        for ((o, f), delta) in &self.values {
            let Some(target) = delta.target() else {
                continue;
            };
            let Some(field) = objects.get_mut(o).and_then(|obj| obj.fields.get_mut(f)) else {
                continue;
            };
            if &field.value != target {
                let old = std::mem::replace(&mut field.value, target.clone());
                if let Some(address) = field_address(o, f) {
                    changes.push(ChangeNotification::ValueChanged {
                        field: address,
                        old,
                        new: target.clone(),
                    });
                }
            }
        }

        for (id, delta) in &self.objects {
            if delta.count < 0 && objects.remove(id).is_some() {
                changes.extend(object_address(id).map(ChangeNotification::ObjectRemoved));
            }
        }

        // revisions of entities only touched locally go back to their pre-change values
        for ((o, f), delta) in &self.fields {
            if let (Some(r), Some(field)) = (
                delta.restore_revision,
                objects.get_mut(o).and_then(|obj| obj.fields.get_mut(f)),
            ) {
                field.revision = r;
            }
        }
        for (id, delta) in &self.objects {
            if let (Some(r), Some(object)) = (delta.restore_revision, objects.get_mut(id)) {
                object.revision = r;
            }
        }

        changes
    }
}
