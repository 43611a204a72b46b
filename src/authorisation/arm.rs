use std::sync::Arc;

use thiserror::Error;

use crate::authorisation::manager::MemoryAuthorisationManager;
use crate::authorisation::types::{access_read, access_write};
use crate::model::address::{XAddress, XId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("actor {actor} has no {access} access to {resource}")]
    Denied {
        actor: XId,
        resource: XAddress,
        access: XId,
    },
}

/// Binds an actor to a manager for checks at an API boundary.
#[derive(Clone)]
pub struct AuthorisationArm {
    manager: Arc<MemoryAuthorisationManager>,
    actor: XId,
}

impl AuthorisationArm {
    pub fn new(manager: Arc<MemoryAuthorisationManager>, actor: XId) -> Self {
        Self { manager, actor }
    }

    pub fn actor(&self) -> &XId {
        &self.actor
    }

    pub fn can_read(&self, resource: &XAddress) -> bool {
        self.manager.can_read(&self.actor, resource)
    }

    pub fn can_write(&self, resource: &XAddress) -> bool {
        self.manager.can_write(&self.actor, resource)
    }

    pub fn can_know_about(&self, resource: &XAddress) -> bool {
        self.manager.can_know_about(&self.actor, resource)
    }

    pub fn ensure_read(&self, resource: &XAddress) -> Result<(), AccessError> {
        self.ensure(resource, access_read())
    }

    pub fn ensure_write(&self, resource: &XAddress) -> Result<(), AccessError> {
        self.ensure(resource, access_write())
    }

    /// Anything but an explicit allow is a denial.
    pub fn ensure(&self, resource: &XAddress, access: XId) -> Result<(), AccessError> {
        if self.manager.has_access(&self.actor, resource, &access).is_allowed() {
            return Ok(());
        }
        log::info!("[AUTH] denied {} {} on {}", self.actor, access, resource);
        Err(AccessError::Denied {
            actor: self.actor.clone(),
            resource: resource.clone(),
            access,
        })
    }
}
