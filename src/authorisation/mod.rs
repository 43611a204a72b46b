//! Hierarchical, group-aware access control.
//!
//! Permissions are stored as (access type, resource, actor-or-group) tuples
//! with allow / deny values and resolved by walking from a resource up to its
//! repository:
//! - An explicit entry for the actor always wins over group grants.
//! - Any allowed group the actor belongs to grants access.
//! - A denial for all actors at a node ("reset") blocks what is granted above.
//! - No entry anywhere on the path is `Undefined`, distinct from a denial.

pub mod arm;
pub mod groups;
mod logic;
pub mod manager;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use arm::{AccessError, AuthorisationArm};
pub use groups::{GroupDatabase, MemoryGroupDatabase};
pub use manager::MemoryAuthorisationManager;
pub use store::AccessStore;
pub use types::{
    access_read, access_write, all_actors, AccessDefinition, AccessListener, AccessValue,
    AuthorisationEvent, ChangeType, PermissionSets,
};
