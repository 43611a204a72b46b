//! Hierarchical addresses (repository / model / object / field).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("identifier must not contain '/': {0}")]
    InvalidId(String),

    #[error("address component {0} is set but a lower level component is missing")]
    MissingParent(&'static str),

    #[error("address must contain at least a repository: {0:?}")]
    Empty(String),

    #[error("address has too many components: {0}")]
    TooDeep(String),

    #[error("expected a model address, got {0}")]
    NotAModel(String),
}

/// Opaque identifier of an actor, group, access type or entity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XId(Arc<str>);

impl XId {
    pub fn new(id: impl AsRef<str>) -> Result<Self, AddressError> {
        let id = id.as_ref();
        if id.is_empty() {
            return Err(AddressError::EmptyId);
        }
        if id.contains('/') {
            return Err(AddressError::InvalidId(id.to_string()));
        }
        Ok(Self(Arc::from(id)))
    }

    /// For well-known identifiers baked into the crate.
    pub(crate) fn from_static(id: &'static str) -> Self {
        debug_assert!(!id.is_empty() && !id.contains('/'));
        Self(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for XId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for XId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl FromStr for XId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for XId {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<XId> for String {
    fn from(value: XId) -> Self {
        value.0.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressType {
    Repository,
    Model,
    Object,
    Field,
}

/// A node in the repository → model → object → field tree.
///
/// Ordering is lexicographic over the components, so a `BTreeMap` keyed by
/// address keeps every subtree contiguous and parents before children.
/// Serialized as its `/`-separated string form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XAddress {
    repository: XId,
    model: Option<XId>,
    object: Option<XId>,
    field: Option<XId>,
}

impl XAddress {
    /// Builds an address, rejecting gaps in the hierarchy.
    pub fn new(
        repository: XId,
        model: Option<XId>,
        object: Option<XId>,
        field: Option<XId>,
    ) -> Result<Self, AddressError> {
        if field.is_some() && object.is_none() {
            return Err(AddressError::MissingParent("field"));
        }
        if object.is_some() && model.is_none() {
            return Err(AddressError::MissingParent("object"));
        }
        Ok(Self {
            repository,
            model,
            object,
            field,
        })
    }

    pub fn repository(repository: XId) -> Self {
        Self {
            repository,
            model: None,
            object: None,
            field: None,
        }
    }

    pub fn repository_id(&self) -> &XId {
        &self.repository
    }

    pub fn model_id(&self) -> Option<&XId> {
        self.model.as_ref()
    }

    pub fn object_id(&self) -> Option<&XId> {
        self.object.as_ref()
    }

    pub fn field_id(&self) -> Option<&XId> {
        self.field.as_ref()
    }

    pub fn address_type(&self) -> AddressType {
        match (&self.model, &self.object, &self.field) {
            (None, _, _) => AddressType::Repository,
            (Some(_), None, _) => AddressType::Model,
            (Some(_), Some(_), None) => AddressType::Object,
            (Some(_), Some(_), Some(_)) => AddressType::Field,
        }
    }

    /// The address one level up, `None` for a repository.
    pub fn parent(&self) -> Option<XAddress> {
        let mut parent = self.clone();
        if parent.field.take().is_some()
            || parent.object.take().is_some()
            || parent.model.take().is_some()
        {
            Some(parent)
        } else {
            None
        }
    }

    /// Address of a child one level below, `None` below field level.
    pub fn child(&self, id: XId) -> Option<XAddress> {
        let mut child = self.clone();
        match self.address_type() {
            AddressType::Repository => child.model = Some(id),
            AddressType::Model => child.object = Some(id),
            AddressType::Object => child.field = Some(id),
            AddressType::Field => return None,
        }
        Some(child)
    }

    /// The enclosing model address, `None` for a repository.
    pub fn model_address(&self) -> Option<XAddress> {
        self.model.as_ref()?;
        Some(XAddress {
            repository: self.repository.clone(),
            model: self.model.clone(),
            object: None,
            field: None,
        })
    }

    /// Strict ancestor relation.
    pub fn contains(&self, other: &XAddress) -> bool {
        self != other && self.equals_or_contains(other)
    }

    pub fn equals_or_contains(&self, other: &XAddress) -> bool {
        fn covers(mine: &Option<XId>, theirs: &Option<XId>) -> bool {
            match mine {
                None => true,
                Some(id) => theirs.as_ref() == Some(id),
            }
        }

        self.repository == other.repository
            && covers(&self.model, &other.model)
            && covers(&self.object, &other.object)
            && covers(&self.field, &other.field)
    }

    /// Iterates from this address up to its repository, inclusive.
    pub fn ancestors(&self) -> impl Iterator<Item = XAddress> {
        std::iter::successors(Some(self.clone()), |a| a.parent())
    }
}

impl fmt::Display for XAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.repository)?;
        for id in [&self.model, &self.object, &self.field].into_iter().flatten() {
            write!(f, "/{}", id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for XAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XAddress({})", self)
    }
}

impl FromStr for XAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() > 4 {
            return Err(AddressError::TooDeep(s.to_string()));
        }

        let mut ids = parts.into_iter().map(XId::new);
        let repository = ids
            .next()
            .ok_or_else(|| AddressError::Empty(s.to_string()))??;
        let model = ids.next().transpose()?;
        let object = ids.next().transpose()?;
        let field = ids.next().transpose()?;

        XAddress::new(repository, model, object, field)
    }
}

impl TryFrom<String> for XAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<XAddress> for String {
    fn from(value: XAddress) -> Self {
        value.to_string()
    }
}
