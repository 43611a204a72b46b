use std::sync::{Arc, Mutex};

use crate::authorisation::{
    access_read, access_write, all_actors, AccessListener, AccessValue, AuthorisationArm,
    AuthorisationEvent, ChangeType, MemoryAuthorisationManager, MemoryGroupDatabase,
};
use crate::model::address::{XAddress, XId};

// =========================================================================
// Helpers
// =========================================================================

fn id(s: &str) -> XId {
    XId::new(s).unwrap()
}

fn addr(s: &str) -> XAddress {
    s.parse().unwrap()
}

fn setup() -> (Arc<MemoryGroupDatabase>, MemoryAuthorisationManager) {
    let groups = Arc::new(MemoryGroupDatabase::new());
    let manager = MemoryAuthorisationManager::new(groups.clone());
    (groups, manager)
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<AuthorisationEvent>>,
}

impl AccessListener for Recorder {
    fn on_access_event(&self, event: &AuthorisationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// =========================================================================
// Store contract
// =========================================================================

#[test]
fn repeated_set_emits_one_event() {
    let (_, manager) = setup();
    let recorder = Arc::new(Recorder::default());
    manager.add_listener(recorder.clone());

    let (bob, r, w) = (id("bob"), addr("/repo1/modelA"), access_write());
    manager.set_access(&bob, &r, &w, true);
    manager.set_access(&bob, &r, &w, true);

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change, ChangeType::Add);
}

#[test]
fn reset_of_undefined_tuple_is_silent() {
    let (_, manager) = setup();
    let recorder = Arc::new(Recorder::default());
    manager.add_listener(recorder.clone());

    let (bob, r, w) = (id("bob"), addr("/repo1/modelA"), access_write());
    manager.reset_access(&bob, &r, &w);

    assert!(recorder.events.lock().unwrap().is_empty());
    assert!(manager.definitions().is_empty());
    assert_eq!(manager.get_access_definition(&bob, &r, &w), AccessValue::Undefined);
}

#[test]
fn removed_listener_is_not_notified() {
    let (_, manager) = setup();
    let recorder = Arc::new(Recorder::default());
    let handle = manager.add_listener(recorder.clone());
    assert!(manager.remove_listener(handle));

    manager.set_access(&id("bob"), &addr("/r"), &access_read(), true);
    assert!(recorder.events.lock().unwrap().is_empty());
}

#[test]
fn listener_can_query_manager_during_notification() {
    struct Reentrant {
        manager: Mutex<Option<Arc<MemoryAuthorisationManager>>>,
        seen: Mutex<Vec<AccessValue>>,
    }

    impl AccessListener for Reentrant {
        fn on_access_event(&self, event: &AuthorisationEvent) {
            if let Some(m) = self.manager.lock().unwrap().as_ref() {
                let v = m.get_access_definition(&event.actor, &event.resource, &event.access);
                self.seen.lock().unwrap().push(v);
            }
        }
    }

    let groups = Arc::new(MemoryGroupDatabase::new());
    let manager = Arc::new(MemoryAuthorisationManager::new(groups));
    let listener = Arc::new(Reentrant {
        manager: Mutex::new(Some(manager.clone())),
        seen: Mutex::new(Vec::new()),
    });
    manager.add_listener(listener.clone());

    manager.set_access(&id("bob"), &addr("/r/m"), &access_read(), false);

    assert_eq!(*listener.seen.lock().unwrap(), vec![AccessValue::Denied]);
    listener.manager.lock().unwrap().take();
}

// =========================================================================
// Resolver
// =========================================================================

#[test]
fn group_grant_is_overridden_by_explicit_deny() {
    let (groups, manager) = setup();
    let (bob, editors, r, w) = (id("bob"), id("editors"), addr("/repo1/modelA"), access_write());
    groups.add_to_group(bob.clone(), editors.clone());

    manager.set_access(&editors, &r, &w, true);
    assert_eq!(manager.has_access(&bob, &r, &w), AccessValue::Allowed);

    manager.set_access(&bob, &r, &w, false);
    assert_eq!(manager.has_access(&bob, &r, &w), AccessValue::Denied);
}

#[test]
fn nothing_defined_is_undefined() {
    let (_, manager) = setup();
    let field = addr("/r/m/o/f");

    assert_eq!(manager.has_access(&id("bob"), &field, &access_read()), AccessValue::Undefined);
    assert!(!manager.can_read(&id("bob"), &field));
}

#[test]
fn ancestor_grant_is_inherited() {
    let (_, manager) = setup();
    let bob = id("bob");
    manager.set_access(&bob, &addr("/r"), &access_read(), true);

    for resource in ["/r/m", "/r/m/o", "/r/m/o/f"] {
        assert_eq!(
            manager.has_access(&bob, &addr(resource), &access_read()),
            AccessValue::Allowed,
            "{}",
            resource
        );
    }
    assert_eq!(manager.has_access(&id("eve"), &addr("/r/m"), &access_read()), AccessValue::Undefined);
}

#[test]
fn reset_blocks_inheritance_and_local_allow_overrides_it() {
    let (_, manager) = setup();
    let (bob, r) = (id("bob"), access_read());
    let model = addr("/r/m");
    let object = addr("/r/m/secret");

    manager.set_access(&all_actors(), &model, &r, true);
    assert_eq!(manager.has_access(&bob, &object, &r), AccessValue::Allowed);

    manager.set_access(&all_actors(), &object, &r, false);
    assert_eq!(manager.has_access(&bob, &object, &r), AccessValue::Denied);
    assert_eq!(manager.has_access(&bob, &addr("/r/m/secret/f"), &r), AccessValue::Denied);
    assert_eq!(manager.has_access(&bob, &addr("/r/m/public"), &r), AccessValue::Allowed);

    manager.set_access(&bob, &object, &r, true);
    assert_eq!(manager.has_access(&bob, &object, &r), AccessValue::Allowed);
}

#[test]
fn local_deny_does_not_leak_to_parent() {
    let (_, manager) = setup();
    let (bob, r) = (id("bob"), access_read());
    manager.set_access(&bob, &addr("/r"), &r, true);
    manager.set_access(&bob, &addr("/r/m/o"), &r, false);

    assert_eq!(manager.has_access(&bob, &addr("/r/m"), &r), AccessValue::Allowed);
    assert_eq!(manager.has_access(&bob, &addr("/r/m/o/f"), &r), AccessValue::Denied);
}

#[test]
fn group_deny_is_not_a_verdict() {
    let (groups, manager) = setup();
    let (bob, r) = (id("bob"), access_read());
    groups.add_to_group(bob.clone(), id("guests"));

    manager.set_access(&bob, &addr("/r"), &r, true);
    manager.set_access(&id("guests"), &addr("/r/m"), &r, false);

    assert_eq!(manager.has_access(&bob, &addr("/r/m"), &r), AccessValue::Allowed);
}

#[test]
fn permissions_cover_every_known_access_type() {
    let (_, manager) = setup();
    let bob = id("bob");
    let admin = id("admin");
    manager.set_access(&bob, &addr("/r"), &access_read(), true);
    manager.set_access(&bob, &addr("/r/m"), &access_write(), false);
    manager.set_access(&id("alice"), &addr("/r"), &admin, true);

    let perms = manager.get_permissions(&bob, &addr("/r/m/o"));
    assert!(perms.allowed.contains(&access_read()));
    assert!(perms.denied.contains(&access_write()));
    assert!(!perms.allowed.contains(&admin) && !perms.denied.contains(&admin));
}

#[test]
fn actors_with_permission_folds_parent_levels() {
    let (groups, manager) = setup();
    let r = access_read();
    groups.add_to_group(id("carol"), id("staff"));

    manager.set_access(&id("alice"), &addr("/r"), &r, true);
    manager.set_access(&id("carol"), &addr("/r"), &r, false);
    manager.set_access(&id("dave"), &addr("/r"), &r, false);
    manager.set_access(&id("staff"), &addr("/r/m"), &r, true);
    manager.set_access(&id("alice"), &addr("/r/m/o"), &r, false);

    let at_model = manager.get_actors_with_permission(&addr("/r/m"), &r);
    assert!(at_model.allowed.contains(&id("alice")));
    assert!(at_model.allowed.contains(&id("staff")));
    // carol's denial is lifted by her group's grant at this level, dave's is not
    assert!(!at_model.denied.contains(&id("carol")));
    assert!(at_model.denied.contains(&id("dave")));

    let at_object = manager.get_actors_with_permission(&addr("/r/m/o"), &r);
    assert!(at_object.denied.contains(&id("alice")));
    assert!(at_object.allowed.contains(&id("alice")));
    assert!(at_object.allowed.contains(&id("staff")));
}

#[test]
fn parent_allowance_reaches_locally_denied_actor() {
    let (_, manager) = setup();
    let r = access_read();
    manager.set_access(&id("alice"), &addr("/r"), &r, true);
    manager.set_access(&id("alice"), &addr("/r/m"), &r, false);

    let sets = manager.get_actors_with_permission(&addr("/r/m"), &r);
    assert!(sets.allowed.contains(&id("alice")));
    assert!(sets.denied.contains(&id("alice")));

    // the resolver still honours the closer denial
    assert_eq!(manager.has_access(&id("alice"), &addr("/r/m"), &r), AccessValue::Denied);
}

#[test]
fn subtree_access_requires_every_node() {
    let (_, manager) = setup();
    let (bob, r) = (id("bob"), access_read());
    let model = addr("/r/m");
    manager.set_access(&bob, &model, &r, true);

    assert_eq!(manager.has_access_to_subtree(&bob, &model, &r), AccessValue::Allowed);

    manager.set_access(&bob, &addr("/r/m/o/f"), &r, false);
    assert_eq!(manager.has_access_to_subtree(&bob, &model, &r), AccessValue::Denied);

    manager.reset_access(&bob, &addr("/r/m/o/f"), &r);
    manager.set_access(&all_actors(), &addr("/r/m/p"), &r, false);
    assert_eq!(manager.has_access_to_subtree(&bob, &model, &r), AccessValue::Denied);

    // an explicit allow at the reset node lets bob through again
    manager.set_access(&bob, &addr("/r/m/p"), &r, true);
    assert_eq!(manager.has_access_to_subtree(&bob, &model, &r), AccessValue::Allowed);
}

#[test]
fn subtree_of_undefined_root_stays_undefined() {
    let (_, manager) = setup();
    let (bob, r) = (id("bob"), access_read());
    manager.set_access(&bob, &addr("/r/m/o"), &r, true);

    assert_eq!(manager.has_access_to_subtree(&bob, &addr("/r/m"), &r), AccessValue::Undefined);
}

#[test]
fn subresource_access_finds_deep_grants() {
    let (groups, manager) = setup();
    let (bob, r) = (id("bob"), access_read());
    let model = addr("/r/m");
    groups.add_to_group(bob.clone(), id("editors"));

    assert_eq!(manager.has_access_to_subresource(&bob, &model, &r), AccessValue::Undefined);
    assert!(!manager.can_know_about(&bob, &model));

    manager.set_access(&id("editors"), &addr("/r/m/o/f"), &r, true);
    assert_eq!(manager.has_access_to_subresource(&bob, &model, &r), AccessValue::Allowed);
    assert!(manager.can_know_about(&bob, &model));

    manager.set_access(&bob, &addr("/r/m/o/f"), &r, false);
    assert_eq!(manager.has_access_to_subresource(&bob, &model, &r), AccessValue::Undefined);
}

// =========================================================================
// Enforcement
// =========================================================================

#[test]
fn arm_reports_actor_and_resource_on_denial() {
    let (_, manager) = setup();
    let manager = Arc::new(manager);
    let model = addr("/r/m");
    manager.set_access(&id("bob"), &model, &access_read(), true);

    let arm = AuthorisationArm::new(manager, id("bob"));
    assert!(arm.ensure_read(&model).is_ok());

    let err = arm.ensure_write(&model).unwrap_err();
    assert_eq!(
        err.to_string(),
        "actor bob has no write access to /r/m"
    );
}
