use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use crate::authorisation::types::all_actors;
use crate::model::address::XId;

/// Membership lookup used by the resolver.
pub trait GroupDatabase: Send + Sync {
    /// Whether `actor` belongs to `group`. Every actor is in the all-actors group.
    fn has_group(&self, actor: &XId, group: &XId) -> bool;

    /// Explicit memberships of `actor` (the implicit all-actors group is not listed).
    fn groups_of(&self, actor: &XId) -> BTreeSet<XId>;
}

#[derive(Debug, Default)]
pub struct MemoryGroupDatabase {
    memberships: RwLock<BTreeMap<XId, BTreeSet<XId>>>,
}

impl MemoryGroupDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `actor` to `group`, creating the group on first use.
    pub fn add_to_group(&self, actor: XId, group: XId) {
        log::debug!("[GROUPS] {} joins {}", actor, group);
        self.memberships
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(actor)
            .or_default()
            .insert(group);
    }

    pub fn remove_from_group(&self, actor: &XId, group: &XId) {
        let mut memberships = self.memberships.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(groups) = memberships.get_mut(actor) {
            groups.remove(group);
            if groups.is_empty() {
                memberships.remove(actor);
            }
        }
    }

    pub fn members_of(&self, group: &XId) -> BTreeSet<XId> {
        self.memberships
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, groups)| groups.contains(group))
            .map(|(actor, _)| actor.clone())
            .collect()
    }
}

impl GroupDatabase for MemoryGroupDatabase {
    fn has_group(&self, actor: &XId, group: &XId) -> bool {
        if *group == all_actors() {
            return true;
        }
        self.memberships
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(actor)
            .is_some_and(|groups| groups.contains(group))
    }

    fn groups_of(&self, actor: &XId) -> BTreeSet<XId> {
        self.memberships
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(actor)
            .cloned()
            .unwrap_or_default()
    }
}
