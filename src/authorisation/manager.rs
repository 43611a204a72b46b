use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::authorisation::groups::GroupDatabase;
use crate::authorisation::logic;
use crate::authorisation::store::AccessStore;
use crate::authorisation::types::{
    access_read, access_write, AccessDefinition, AccessListener, AccessValue,
    AuthorisationEvent, PermissionSets,
};
use crate::listeners::{ListenerId, ListenerRegistry};
use crate::model::address::{XAddress, XId};

/// In-memory authorisation manager.
///
/// Every public method takes one instance-wide lock, so each call is atomic
/// with respect to the others. Sequences of calls are not, and separate
/// instances share no consistency guarantees.
pub struct MemoryAuthorisationManager {
    store: Mutex<AccessStore>,
    groups: Arc<dyn GroupDatabase>,
    listeners: Mutex<ListenerRegistry<dyn AccessListener>>,
}

impl MemoryAuthorisationManager {
    /// Creates a manager with an empty store.
    ///
    /// # Arguments
    /// * `groups` - Membership lookup used when resolving group grants and denials.
    pub fn new(groups: Arc<dyn GroupDatabase>) -> Self {
        Self {
            store: Mutex::new(AccessStore::new()),
            groups,
            listeners: Mutex::new(ListenerRegistry::new()),
        }
    }

    fn store(&self) -> MutexGuard<'_, AccessStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ================================
    // Store
    // ================================

    /// Records an explicit allow or deny for `actor` (an actor or a group).
    ///
    /// Listeners hear about it only if the stored value actually changed.
    ///
    /// # Arguments
    /// * `actor` - Actor or group id the rule applies to.
    /// * `resource` - Address the rule is attached to; it applies to the whole subtree.
    /// * `access` - Access type, e.g. `read` or `write`.
    /// * `allowed` - `true` grants, `false` denies.
    pub fn set_access(&self, actor: &XId, resource: &XAddress, access: &XId, allowed: bool) {
        let event = self.store().set_access(actor, resource, access, allowed);
        self.dispatch(event);
    }

    /// Removes the explicit rule, if any. Inherited rules are untouched.
    pub fn reset_access(&self, actor: &XId, resource: &XAddress, access: &XId) {
        let event = self.store().reset_access(actor, resource, access);
        self.dispatch(event);
    }

    /// The rule stored at exactly `resource`, `Undefined` if there is none.
    pub fn get_access_definition(&self, actor: &XId, resource: &XAddress, access: &XId) -> AccessValue {
        self.store().get_access_definition(actor, resource, access)
    }

    pub fn is_access_defined(&self, actor: &XId, resource: &XAddress, access: &XId) -> bool {
        self.store().is_access_defined(actor, resource, access)
    }

    /// Every stored rule, ordered by access type, resource and actor.
    pub fn definitions(&self) -> Vec<AccessDefinition> {
        self.store().definitions()
    }

    /// Registers a listener for store changes. Keep the id to remove it again.
    pub fn add_listener(&self, listener: Arc<dyn AccessListener>) -> ListenerId {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(listener)
    }

    /// Returns `false` if the id was unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Delivers to listeners after the store lock is released, so a listener
    /// may query the manager.
    fn dispatch(&self, event: Option<AuthorisationEvent>) {
        let Some(event) = event else {
            return;
        };
        log::debug!(
            "[AUTH] {:?} {} {} on {}: {} -> {}",
            event.change,
            event.actor,
            event.access,
            event.resource,
            event.old_value,
            event.new_value
        );

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        for listener in listeners {
            listener.on_access_event(&event);
        }
    }

    // ================================
    // Resolver
    // ================================

    /// Verdict at exactly `resource`: the actor's own rule, else any allowed group.
    pub fn access_for_resource(&self, actor: &XId, resource: &XAddress, access: &XId) -> AccessValue {
        logic::access_for_resource(&self.store(), self.groups.as_ref(), actor, resource, access)
    }

    /// Effective verdict for `actor`, walking from `resource` up to the repository.
    ///
    /// The closest node with a verdict decides. A denial for all actors cuts
    /// off anything inherited from above it. `Undefined` means no rule applies
    /// anywhere; callers treat it as denied.
    pub fn has_access(&self, actor: &XId, resource: &XAddress, access: &XId) -> AccessValue {
        let verdict = logic::has_access(&self.store(), self.groups.as_ref(), actor, resource, access);
        log::trace!("[AUTH] has_access({}, {}, {}) = {}", actor, resource, access, verdict);
        verdict
    }

    /// Ids allowed and denied `access` at `resource`, ancestors included.
    ///
    /// Allowances from parent levels always carry down, so an id can appear
    /// in both sets. Inherited denials are lifted by a local allowance for the
    /// id or one of its groups.
    pub fn get_actors_with_permission(&self, resource: &XAddress, access: &XId) -> PermissionSets {
        logic::actors_with_permission(&self.store(), self.groups.as_ref(), resource, access)
    }

    /// Access types `actor` is allowed or denied at `resource`.
    pub fn get_permissions(&self, actor: &XId, resource: &XAddress) -> PermissionSets {
        logic::permissions(&self.store(), self.groups.as_ref(), actor, resource)
    }

    /// Whether `actor` is guaranteed `access` everywhere in the subtree at `root`.
    ///
    /// # Arguments
    /// * `root` - Top of the subtree.
    /// * `access` - Access type to check.
    pub fn has_access_to_subtree(&self, actor: &XId, root: &XAddress, access: &XId) -> AccessValue {
        logic::access_to_subtree(&self.store(), self.groups.as_ref(), actor, root, access)
    }

    /// Whether `actor` has `access` at `root` or at any node below it.
    pub fn has_access_to_subresource(&self, actor: &XId, root: &XAddress, access: &XId) -> AccessValue {
        logic::access_to_subresource(&self.store(), self.groups.as_ref(), actor, root, access)
    }

    // ================================
    // Enforcement helpers
    // ================================

    /// Shorthand for `has_access(.., read).is_allowed()`.
    pub fn can_read(&self, actor: &XId, resource: &XAddress) -> bool {
        self.has_access(actor, resource, &access_read()).is_allowed()
    }

    pub fn can_write(&self, actor: &XId, resource: &XAddress) -> bool {
        self.has_access(actor, resource, &access_write()).is_allowed()
    }

    /// Whether the actor may learn that `resource` exists, i.e. can read it
    /// or something below it.
    pub fn can_know_about(&self, actor: &XId, resource: &XAddress) -> bool {
        self.has_access_to_subresource(actor, resource, &access_read())
            .is_allowed()
    }
}
