//! Permission tuples: (access type, resource, actor-or-group) → allowed.

use std::collections::BTreeMap;

use crate::authorisation::types::{AccessDefinition, AccessValue, AuthorisationEvent, ChangeType};
use crate::model::address::{XAddress, XId};

/// Plain storage of permission tuples. Mutations report the transition they
/// caused so the owner can notify listeners.
#[derive(Debug, Clone, Default)]
pub struct AccessStore {
    /// access type -> resource -> actor or group -> allowed
    rights: BTreeMap<XId, BTreeMap<XAddress, BTreeMap<XId, bool>>>,
}

impl AccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a tuple. Returns `None` if the value did not change.
    pub fn set_access(
        &mut self,
        actor: &XId,
        resource: &XAddress,
        access: &XId,
        allowed: bool,
    ) -> Option<AuthorisationEvent> {
        let slot = self
            .rights
            .entry(access.clone())
            .or_default()
            .entry(resource.clone())
            .or_default();

        let old = slot.insert(actor.clone(), allowed);
        if old == Some(allowed) {
            return None;
        }

        Some(AuthorisationEvent {
            change: if old.is_some() {
                ChangeType::Change
            } else {
                ChangeType::Add
            },
            actor: actor.clone(),
            resource: resource.clone(),
            access: access.clone(),
            old_value: AccessValue::from_option(old),
            new_value: AccessValue::from_bool(allowed),
        })
    }

    /// Deletes a tuple. Returns `None` if it was not defined.
    pub fn reset_access(
        &mut self,
        actor: &XId,
        resource: &XAddress,
        access: &XId,
    ) -> Option<AuthorisationEvent> {
        let by_resource = self.rights.get_mut(access)?;
        let by_actor = by_resource.get_mut(resource)?;
        let old = by_actor.remove(actor)?;

        if by_actor.is_empty() {
            by_resource.remove(resource);
        }
        if by_resource.is_empty() {
            self.rights.remove(access);
        }

        Some(AuthorisationEvent {
            change: ChangeType::Remove,
            actor: actor.clone(),
            resource: resource.clone(),
            access: access.clone(),
            old_value: AccessValue::from_bool(old),
            new_value: AccessValue::Undefined,
        })
    }

    pub fn get(&self, actor: &XId, resource: &XAddress, access: &XId) -> Option<bool> {
        self.rights.get(access)?.get(resource)?.get(actor).copied()
    }

    pub fn get_access_definition(&self, actor: &XId, resource: &XAddress, access: &XId) -> AccessValue {
        AccessValue::from_option(self.get(actor, resource, access))
    }

    pub fn is_access_defined(&self, actor: &XId, resource: &XAddress, access: &XId) -> bool {
        self.get(actor, resource, access).is_some()
    }

    /// All (actor-or-group, allowed) tuples at exactly `resource`.
    pub fn entries_at<'a>(
        &'a self,
        access: &XId,
        resource: &XAddress,
    ) -> impl Iterator<Item = (&'a XId, bool)> + 'a {
        self.rights
            .get(access)
            .and_then(|by_resource| by_resource.get(resource))
            .into_iter()
            .flat_map(|by_actor| by_actor.iter().map(|(id, allowed)| (id, *allowed)))
    }

    /// All tuples at `root` or any resource below it.
    pub fn entries_under<'a>(
        &'a self,
        access: &XId,
        root: &'a XAddress,
    ) -> impl Iterator<Item = (&'a XAddress, &'a XId, bool)> + 'a {
        self.rights
            .get(access)
            .into_iter()
            .flat_map(move |by_resource| {
                // addresses sort parent-first, so a subtree is one contiguous range
                by_resource
                    .range(root.clone()..)
                    .take_while(move |(resource, _)| root.equals_or_contains(resource))
            })
            .flat_map(|(resource, by_actor)| {
                by_actor
                    .iter()
                    .map(move |(id, allowed)| (resource, id, *allowed))
            })
    }

    /// Every access type that has at least one tuple.
    pub fn access_types(&self) -> impl Iterator<Item = &XId> {
        self.rights.keys()
    }

    /// Every tuple, ordered by access type, then resource, then actor.
    pub fn definitions(&self) -> Vec<AccessDefinition> {
        self.rights
            .iter()
            .flat_map(|(access, by_resource)| {
                by_resource.iter().flat_map(move |(resource, by_actor)| {
                    by_actor.iter().map(move |(actor, allowed)| AccessDefinition {
                        actor: actor.clone(),
                        resource: resource.clone(),
                        access: access.clone(),
                        allowed: *allowed,
                    })
                })
            })
            .collect()
    }
}
