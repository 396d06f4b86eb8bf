//! State file structures

use kiteform_core::resource::ResourceId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Everything kiteform manages, as last written by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// Format version
    pub version: u32,
    /// Bumped on every write
    pub serial: u64,
    /// Identifies one state history across writes
    pub lineage: String,
    /// kiteform version that last wrote this file
    pub kiteform_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            kiteform_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.kiteform_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.matches(id))
    }

    /// Insert a resource, replacing any entry with the same type and name
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        let id = resource.resource_id();
        match self.resources.iter_mut().find(|r| r.matches(&id)) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<ResourceState> {
        let pos = self.resources.iter().position(|r| r.matches(id))?;
        Some(self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// One managed resource
///
/// `attributes` holds the provider's observed state as JSON; the provider
/// crate owns its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub name: String,
    pub provider: String,
    /// Remote identifier (a pipeline slug)
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl ResourceState {
    pub fn new(id: &ResourceId, provider: impl Into<String>) -> Self {
        Self {
            resource_type: id.resource_type.clone(),
            name: id.name.clone(),
            provider: provider.into(),
            identifier: None,
            attributes: serde_json::Value::Null,
        }
    }

    pub fn with_identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_attributes<T: Serialize>(mut self, attributes: &T) -> serde_json::Result<Self> {
        self.attributes = serde_json::to_value(attributes)?;
        Ok(self)
    }

    /// Decode the stored attributes into the provider's state type
    pub fn attributes_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.attributes)
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    fn matches(&self, id: &ResourceId) -> bool {
        self.resource_type == id.resource_type && self.name == id.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pipeline_id(name: &str) -> ResourceId {
        ResourceId::new("buildkite_pipeline", name)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Observed {
        slug: String,
        web_url: String,
    }

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_increment_serial() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
        assert_eq!(state.kiteform_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_upsert_replaces_same_resource() {
        let mut state = StateFile::new();
        let id = pipeline_id("app");

        state.upsert_resource(
            ResourceState::new(&id, "buildkite").with_identifier(Some("app".to_string())),
        );
        state.upsert_resource(
            ResourceState::new(&id, "buildkite").with_identifier(Some("app-v2".to_string())),
        );
        state.upsert_resource(ResourceState::new(&pipeline_id("docs"), "buildkite"));

        assert_eq!(state.resources.len(), 2);
        assert_eq!(
            state.find_resource(&id).unwrap().identifier.as_deref(),
            Some("app-v2")
        );
    }

    #[test]
    fn test_remove_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new(&pipeline_id("app"), "buildkite"));

        assert!(state.remove_resource(&pipeline_id("app")).is_some());
        assert!(state.remove_resource(&pipeline_id("app")).is_none());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_typed_attributes() {
        let observed = Observed {
            slug: "app".to_string(),
            web_url: "https://buildkite.com/acme/app".to_string(),
        };
        let resource = ResourceState::new(&pipeline_id("app"), "buildkite")
            .with_attributes(&observed)
            .unwrap();

        assert_eq!(resource.attributes["slug"], json!("app"));
        assert_eq!(resource.attributes_as::<Observed>().unwrap(), observed);
    }

    #[test]
    fn test_state_file_json_layout() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new(&pipeline_id("app"), "buildkite")
                .with_identifier(Some("app".to_string())),
        );

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["version"], json!(1));
        assert_eq!(json["resources"][0]["resource_type"], json!("buildkite_pipeline"));
        assert_eq!(json["resources"][0]["identifier"], json!("app"));

        let decoded: StateFile = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, state);
    }
}
