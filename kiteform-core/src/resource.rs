//! Resource - Representing resources and their state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource type (e.g., "buildkite_pipeline")
    pub resource_type: String,
    /// Resource name (the key used in configuration)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Desired state declared in configuration
///
/// `A` is the provider's typed view of the resource's configured attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<A> {
    pub id: ResourceId,
    pub attributes: A,
}

impl<A> Resource<A> {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>, attributes: A) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes,
        }
    }
}

/// Current state fetched from the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct State<A> {
    pub id: ResourceId,
    /// Remote identifier (e.g., a pipeline slug)
    pub identifier: Option<String>,
    /// Observed attributes, `None` when the resource does not exist
    pub attributes: Option<A>,
}

impl<A> State<A> {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: None,
        }
    }

    pub fn existing(id: ResourceId, attributes: A) -> Self {
        Self {
            id,
            identifier: None,
            attributes: Some(attributes),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Whether this state exists
    pub fn exists(&self) -> bool {
        self.attributes.is_some()
    }
}
