//! Effect - A single side effect a Plan will perform

use crate::resource::{Resource, ResourceId, State};

/// A side effect against a remote service, held as a value until applied
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<D, O> {
    /// Create a resource that does not exist yet
    Create(Resource<D>),
    /// Update an existing resource in place
    Update {
        id: ResourceId,
        from: State<O>,
        to: Resource<D>,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource that is no longer declared
    Delete { id: ResourceId, identifier: String },
}

impl<D, O> Effect<D, O> {
    /// The resource this effect targets
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } => id,
            Effect::Delete { id, .. } => id,
        }
    }

    /// Short verb describing the effect
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Delete { .. } => "delete",
        }
    }
}
