//! Buildkite Provider implementation
//!
//! This module drives the pipeline lifecycle against the Buildkite REST API.
//! Every operation maps the response into a fresh `PipelineState`; nothing is
//! produced unless the API call and the mapping both succeed.

use kiteform_core::provider::{ProviderError, ProviderResult};
use kiteform_core::resource::{Resource, ResourceId, State};
use log::{trace, warn};

use crate::api::PipelinePayload;
use crate::client::{ApiError, ApiToken, BuildkiteClient, PipelineApi};
use crate::config::{PipelineConfig, ResolvedProviderConfig};
use crate::mapper::{from_response, to_request};
use crate::state::PipelineState;

/// Resource type name for pipelines
pub const PIPELINE_RESOURCE_TYPE: &str = "buildkite_pipeline";

/// Buildkite Provider
pub struct BuildkiteProvider<C = BuildkiteClient> {
    api: C,
}

impl BuildkiteProvider<BuildkiteClient> {
    /// Create a provider talking to the real API
    pub fn new(config: &ResolvedProviderConfig) -> ProviderResult<Self> {
        let client = BuildkiteClient::new(
            &config.base_url,
            &config.organization,
            ApiToken::from(config.api_token.as_str()),
        )
        .map_err(|e| ProviderError::new("Failed to configure Buildkite client").with_cause(e))?;

        Ok(Self::with_api(client))
    }
}

impl<C: PipelineApi> BuildkiteProvider<C> {
    pub fn with_api(api: C) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Create a pipeline
    pub async fn create_pipeline(
        &self,
        resource: &Resource<PipelineConfig>,
    ) -> ProviderResult<State<PipelineState>> {
        trace!("buildkite: create pipeline {}", resource.id);

        let request = to_request(&resource.attributes);
        let response = self
            .api
            .create_pipeline(&request)
            .await
            .map_err(|e| api_error("Failed to create pipeline", e, &resource.id))?;

        map_response(&resource.id, &response, None)
    }

    /// Read a pipeline by slug
    ///
    /// A pipeline that no longer exists is reported as `State::not_found`.
    pub async fn read_pipeline(
        &self,
        id: &ResourceId,
        slug: &str,
        prior: Option<&PipelineState>,
    ) -> ProviderResult<State<PipelineState>> {
        trace!("buildkite: read pipeline {} ({})", id, slug);

        match self.api.get_pipeline(slug).await {
            Ok(response) => map_response(id, &response, prior),
            Err(ApiError::NotFound(_)) => {
                warn!("buildkite: pipeline {} no longer exists, treating as removed", slug);
                Ok(State::not_found(id.clone()))
            }
            Err(e) => Err(api_error("Failed to read pipeline", e, id)),
        }
    }

    /// Update a pipeline in place with the full desired payload
    pub async fn update_pipeline(
        &self,
        id: &ResourceId,
        slug: &str,
        from: &State<PipelineState>,
        to: &Resource<PipelineConfig>,
    ) -> ProviderResult<State<PipelineState>> {
        trace!("buildkite: update pipeline {} ({})", id, slug);

        let request = to_request(&to.attributes);
        let response = self
            .api
            .update_pipeline(slug, &request)
            .await
            .map_err(|e| api_error("Failed to update pipeline", e, id))?;

        map_response(id, &response, from.attributes.as_ref())
    }

    /// Delete a pipeline
    ///
    /// Deleting a pipeline that is already gone succeeds.
    pub async fn delete_pipeline(&self, id: &ResourceId, slug: &str) -> ProviderResult<()> {
        trace!("buildkite: delete pipeline {} ({})", id, slug);

        match self.api.delete_pipeline(slug).await {
            Ok(()) => Ok(()),
            Err(ApiError::NotFound(_)) => {
                warn!("buildkite: pipeline {} was already deleted", slug);
                Ok(())
            }
            Err(e) => Err(api_error("Failed to delete pipeline", e, id)),
        }
    }

    /// Adopt an existing pipeline by slug
    ///
    /// Unlike a refresh, a missing pipeline is an error here.
    pub async fn import_pipeline(
        &self,
        id: &ResourceId,
        slug: &str,
    ) -> ProviderResult<State<PipelineState>> {
        let state = self.read_pipeline(id, slug, None).await?;
        if !state.exists() {
            return Err(
                ProviderError::new(format!("Cannot import non-existent pipeline: {}", slug))
                    .for_resource(id.clone()),
            );
        }
        Ok(state)
    }
}

fn api_error(message: &str, error: ApiError, id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("{}: {}", message, error))
        .for_resource(id.clone())
        .with_cause(error)
}

fn map_response(
    id: &ResourceId,
    payload: &PipelinePayload,
    prior: Option<&PipelineState>,
) -> ProviderResult<State<PipelineState>> {
    let state = from_response(payload, prior).map_err(|e| {
        ProviderError::new(format!("Failed to map pipeline response: {}", e))
            .for_resource(id.clone())
            .with_cause(e)
    })?;

    let slug = state.slug.clone();
    Ok(State::existing(id.clone(), state).with_identifier(slug))
}
