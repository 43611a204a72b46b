use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::address::{XAddress, XId};

/// Group every actor implicitly belongs to.
pub fn all_actors() -> XId {
    XId::from_static("allActors")
}

/// Access type checked before reading an entity.
pub fn access_read() -> XId {
    XId::from_static("read")
}

/// Access type checked before changing an entity.
pub fn access_write() -> XId {
    XId::from_static("write")
}

/// Three-valued verdict of a permission lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessValue {
    Allowed,
    Denied,
    Undefined,
}

impl AccessValue {
    pub fn from_bool(allowed: bool) -> Self {
        if allowed {
            AccessValue::Allowed
        } else {
            AccessValue::Denied
        }
    }

    pub fn from_option(value: Option<bool>) -> Self {
        value.map_or(AccessValue::Undefined, Self::from_bool)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AccessValue::Allowed => Some(true),
            AccessValue::Denied => Some(false),
            AccessValue::Undefined => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessValue::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessValue::Denied)
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, AccessValue::Undefined)
    }
}

impl fmt::Display for AccessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessValue::Allowed => "allowed",
            AccessValue::Denied => "denied",
            AccessValue::Undefined => "undefined",
        };
        f.write_str(s)
    }
}

/// One stored permission tuple, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDefinition {
    pub actor: XId,
    pub resource: XAddress,
    pub access: XId,
    pub allowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Add,
    Change,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorisationEvent {
    pub change: ChangeType,
    pub actor: XId,
    pub resource: XAddress,
    pub access: XId,
    pub old_value: AccessValue,
    pub new_value: AccessValue,
}

pub trait AccessListener: Send + Sync {
    fn on_access_event(&self, event: &AuthorisationEvent);
}

/// Permissions split by verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSets {
    pub allowed: std::collections::BTreeSet<XId>,
    pub denied: std::collections::BTreeSet<XId>,
}
