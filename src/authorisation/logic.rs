//! Permission resolution over the resource hierarchy.
//!
//! Pure functions over an [`AccessStore`] and a [`GroupDatabase`]. Locking is
//! the caller's concern; see `MemoryAuthorisationManager`.

use std::collections::BTreeSet;

use crate::authorisation::groups::GroupDatabase;
use crate::authorisation::store::AccessStore;
use crate::authorisation::types::{all_actors, AccessValue, PermissionSets};
use crate::model::address::{XAddress, XId};

/// Verdict at exactly `resource`, without looking at ancestors.
///
/// An explicit entry for the actor wins, whatever its value. Otherwise any
/// group the actor belongs to that is allowed grants access. Group denials are
/// not consulted here.
pub fn access_for_resource(
    store: &AccessStore,
    groups: &dyn GroupDatabase,
    actor: &XId,
    resource: &XAddress,
    access: &XId,
) -> AccessValue {
    if let Some(allowed) = store.get(actor, resource, access) {
        return AccessValue::from_bool(allowed);
    }

    let granted = store
        .entries_at(access, resource)
        .any(|(id, allowed)| allowed && groups.has_group(actor, id));

    if granted {
        AccessValue::Allowed
    } else {
        AccessValue::Undefined
    }
}

/// Effective verdict for `actor` at `resource`.
///
/// Walks from `resource` towards the repository. The first node with a
/// verdict for the actor decides. A denial for all actors at a node stops
/// inheritance from above it.
pub fn has_access(
    store: &AccessStore,
    groups: &dyn GroupDatabase,
    actor: &XId,
    resource: &XAddress,
    access: &XId,
) -> AccessValue {
    let all = all_actors();

    for node in resource.ancestors() {
        let local = access_for_resource(store, groups, actor, &node, access);
        if local.is_defined() {
            return local;
        }
        if store.get(&all, &node, access) == Some(false) {
            return AccessValue::Denied;
        }
    }

    AccessValue::Undefined
}

/// Actors and groups allowed or denied at `resource`, ancestors included.
pub fn actors_with_permission(
    store: &AccessStore,
    groups: &dyn GroupDatabase,
    resource: &XAddress,
    access: &XId,
) -> PermissionSets {
    let chain: Vec<XAddress> = resource.ancestors().collect();
    let mut inherited = PermissionSets::default();

    // repository first, so each level folds in the already-resolved parent
    for node in chain.iter().rev() {
        let mut local = PermissionSets::default();
        for (id, allowed) in store.entries_at(access, node) {
            if allowed {
                local.allowed.insert(id.clone());
            } else {
                local.denied.insert(id.clone());
            }
        }

        for id in inherited.denied {
            let overridden = local.allowed.contains(&id)
                || local.allowed.iter().any(|group| groups.has_group(&id, group));
            if !overridden {
                local.denied.insert(id);
            }
        }

        // allowances always propagate, even next to a local denial
        local.allowed.extend(inherited.allowed);

        inherited = local;
    }

    inherited
}

/// Access types the actor is allowed or denied at `resource`.
pub fn permissions(
    store: &AccessStore,
    groups: &dyn GroupDatabase,
    actor: &XId,
    resource: &XAddress,
) -> PermissionSets {
    let mut result = PermissionSets::default();
    let access_types: BTreeSet<XId> = store.access_types().cloned().collect();

    for access in access_types {
        match has_access(store, groups, actor, resource, &access) {
            AccessValue::Allowed => {
                result.allowed.insert(access);
            }
            AccessValue::Denied => {
                result.denied.insert(access);
            }
            AccessValue::Undefined => {}
        }
    }

    result
}

/// Whether access is guaranteed everywhere below `root`.
///
/// Denied if the root itself is denied, if the actor is explicitly denied
/// anywhere in the subtree, or if the subtree contains an all-actors reset
/// that the actor is not explicitly allowed past.
pub fn access_to_subtree(
    store: &AccessStore,
    groups: &dyn GroupDatabase,
    actor: &XId,
    root: &XAddress,
    access: &XId,
) -> AccessValue {
    let at_root = has_access(store, groups, actor, root, access);
    if at_root.is_denied() {
        return at_root;
    }

    let all = all_actors();
    for (node, id, allowed) in store.entries_under(access, root) {
        if allowed {
            continue;
        }
        if id == actor {
            return AccessValue::Denied;
        }
        if *id == all && !access_for_resource(store, groups, actor, node, access).is_allowed() {
            return AccessValue::Denied;
        }
    }

    at_root
}

/// Whether access is granted somewhere below `root`.
pub fn access_to_subresource(
    store: &AccessStore,
    groups: &dyn GroupDatabase,
    actor: &XId,
    root: &XAddress,
    access: &XId,
) -> AccessValue {
    let at_root = has_access(store, groups, actor, root, access);
    if at_root.is_allowed() {
        return at_root;
    }

    let granted = store
        .entries_under(access, root)
        .filter(|(node, _, allowed)| *allowed && *node != root)
        .any(|(node, id, _)| {
            (id == actor || groups.has_group(actor, id))
                && store.get(actor, node, access) != Some(false)
        });

    if granted {
        AccessValue::Allowed
    } else {
        at_root
    }
}
