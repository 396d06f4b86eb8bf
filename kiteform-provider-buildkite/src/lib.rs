//! Kiteform Buildkite Provider
//!
//! Manages Buildkite pipelines through the Buildkite REST API.
//!
//! ## Module Structure
//!
//! - `api` - Wire payloads exchanged with the API
//! - `client` - HTTP client and the `PipelineApi` seam
//! - `config` - Provider and pipeline configuration
//! - `diff` - Drift detection between configuration and state
//! - `mapper` - Configuration to request, response to state
//! - `provider` - BuildkiteProvider implementation
//! - `settings` - Repository provider settings
//! - `state` - Observed pipeline state

pub mod api;
pub mod client;
pub mod config;
pub mod diff;
pub mod mapper;
pub mod provider;
pub mod settings;
pub mod state;

// Re-export main types
pub use client::{ApiError, BuildkiteClient, PipelineApi};
pub use config::{PipelineConfig, ProviderConfig, ResolvedProviderConfig, StepConfig};
pub use provider::{BuildkiteProvider, PIPELINE_RESOURCE_TYPE};
pub use state::PipelineState;

use kiteform_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use kiteform_core::resource::{Resource, ResourceId, State};

pub struct PipelineType;

impl ResourceType for PipelineType {
    fn name(&self) -> &'static str {
        PIPELINE_RESOURCE_TYPE
    }
}

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<C: PipelineApi> Provider for BuildkiteProvider<C> {
    type Desired = PipelineConfig;
    type Observed = PipelineState;

    fn name(&self) -> &'static str {
        "buildkite"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(PipelineType)]
    }

    fn read<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        prior: Option<&'a PipelineState>,
    ) -> BoxFuture<'a, ProviderResult<State<PipelineState>>> {
        Box::pin(self.read_pipeline(id, identifier, prior))
    }

    fn create<'a>(
        &'a self,
        resource: &'a Resource<PipelineConfig>,
    ) -> BoxFuture<'a, ProviderResult<State<PipelineState>>> {
        Box::pin(self.create_pipeline(resource))
    }

    fn update<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
        from: &'a State<PipelineState>,
        to: &'a Resource<PipelineConfig>,
    ) -> BoxFuture<'a, ProviderResult<State<PipelineState>>> {
        Box::pin(self.update_pipeline(id, identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.delete_pipeline(id, identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::{FakeApi, pipeline_resource};

    #[test]
    fn provider_exposes_pipeline_type() {
        let provider = BuildkiteProvider::with_api(FakeApi::default());
        assert_eq!(provider.name(), "buildkite");

        let types: Vec<&str> = provider.resource_types().iter().map(|t| t.name()).collect();
        assert_eq!(types, vec!["buildkite_pipeline"]);
    }

    #[tokio::test]
    async fn boxed_provider_drives_lifecycle() {
        let provider: Box<BuildkiteProvider<FakeApi>> =
            Box::new(BuildkiteProvider::with_api(FakeApi::default()));
        let resource = pipeline_resource("app");

        let state = provider.create(&resource).await.unwrap();
        let slug = state.identifier.clone().unwrap();

        let read = provider.read(&resource.id, &slug, None).await.unwrap();
        assert!(read.exists());

        provider.delete(&resource.id, &slug).await.unwrap();
        assert!(!provider.read(&resource.id, &slug, None).await.unwrap().exists());
    }
}
