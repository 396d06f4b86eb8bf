//! Mapping between typed pipeline configuration and API payloads
//!
//! `to_request` builds the body for create and update calls. `from_response`
//! turns whatever the API returned into a complete `PipelineState`; it either
//! succeeds as a whole or fails without producing anything.

use log::{debug, info};
use thiserror::Error;

use crate::api::{EnvMap, PipelinePayload, ProviderPayload, StepPayload};
use crate::config::{PipelineConfig, StepConfig};
use crate::settings::{RepositoryProvider, explicit_settings};
use crate::state::{PipelineState, StepState};

#[derive(Error, Debug)]
pub enum MapError {
    #[error("invalid {provider} settings: {source}")]
    Settings {
        provider: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Build the request payload for a pipeline configuration
///
/// Computed attributes are never part of a request. Provider settings carry
/// only the keys that were set explicitly.
pub fn to_request(config: &PipelineConfig) -> PipelinePayload {
    let provider = if let Some(settings) = &config.github_settings {
        Some(ProviderPayload::new("github", explicit_settings(settings)))
    } else {
        config
            .bitbucket_settings
            .as_ref()
            .map(|settings| ProviderPayload::new("bitbucket", explicit_settings(settings)))
    };

    PipelinePayload {
        env: EnvMap::from(config.env.clone()),
        slug: config.slug.clone().unwrap_or_default(),
        default_branch: config.default_branch.clone(),
        repository: config.repository.clone(),
        name: config.name.clone(),
        description: config.description.clone(),
        branch_configuration: config.branch_configuration.clone(),
        skip_queued_branch_builds: config.skip_queued_branch_builds,
        skip_queued_branch_builds_filter: config.skip_queued_branch_builds_filter.clone(),
        cancel_running_branch_builds: config.cancel_running_branch_builds,
        cancel_running_branch_builds_filter: config.cancel_running_branch_builds_filter.clone(),
        provider,
        steps: config.steps.iter().map(step_request).collect(),
        ..Default::default()
    }
}

fn step_request(step: &StepConfig) -> StepPayload {
    StepPayload {
        step_type: step.step_type.clone(),
        name: step.name.clone(),
        label: step.label.clone(),
        command: step.command.clone(),
        env: EnvMap::from(step.env.clone()),
        timeout_in_minutes: step.timeout_in_minutes,
        agent_query_rules: step.agent_query_rules.clone(),
        branch_configuration: step.branch_configuration.clone(),
        artifact_paths: step.artifact_paths.clone(),
        concurrency: step.concurrency,
        parallelism: step.parallelism,
    }
}

/// Build the observed state from an API response
///
/// `prior` only matters when the response names no known provider: the
/// previously observed `webhook_url` is kept in that case.
pub fn from_response(
    payload: &PipelinePayload,
    prior: Option<&PipelineState>,
) -> Result<PipelineState, MapError> {
    info!("buildkite: pipeline slug: {}", payload.slug);

    let mut state = PipelineState {
        id: payload.id.clone(),
        slug: payload.slug.clone(),
        name: payload.name.clone(),
        description: payload.description.clone(),
        repository: payload.repository.clone(),
        branch_configuration: payload.branch_configuration.clone(),
        default_branch: payload.default_branch.clone(),
        env: payload.env.0.clone(),
        skip_queued_branch_builds: payload.skip_queued_branch_builds,
        skip_queued_branch_builds_filter: payload.skip_queued_branch_builds_filter.clone(),
        cancel_running_branch_builds: payload.cancel_running_branch_builds,
        cancel_running_branch_builds_filter: payload.cancel_running_branch_builds_filter.clone(),
        web_url: payload.web_url.clone(),
        builds_url: payload.builds_url.clone(),
        url: payload.url.clone(),
        badge_url: payload.badge_url.clone(),
        created_at: payload.created_at.clone(),
        webhook_url: prior.map(|p| p.webhook_url.clone()).unwrap_or_default(),
        steps: payload.steps.iter().map(step_state).collect(),
        github_settings: Vec::new(),
        bitbucket_settings: Vec::new(),
    };

    let Some(wire) = &payload.provider else {
        return Ok(state);
    };

    info!("buildkite: repository provider: {}", wire.id);

    let provider = RepositoryProvider::from_payload(wire).map_err(|source| MapError::Settings {
        provider: wire.id.clone(),
        source,
    })?;

    match provider {
        RepositoryProvider::GitHub {
            webhook_url,
            settings,
        } => {
            debug!("buildkite: github settings: {:?}", settings);
            state.webhook_url = webhook_url;
            state.github_settings = vec![settings];
        }
        RepositoryProvider::Bitbucket {
            webhook_url,
            settings,
        } => {
            debug!("buildkite: bitbucket settings: {:?}", settings);
            state.webhook_url = webhook_url;
            state.bitbucket_settings = vec![settings];
        }
        RepositoryProvider::GitLab { webhook_url }
        | RepositoryProvider::Beanstalk { webhook_url } => {
            state.webhook_url = webhook_url;
        }
        RepositoryProvider::Unknown { .. } => {}
    }

    Ok(state)
}

fn step_state(step: &StepPayload) -> StepState {
    StepState {
        step_type: step.step_type.clone(),
        label: step.label.clone(),
        name: step.name.clone(),
        command: step.command.clone(),
        env: step.env.0.clone(),
        timeout_in_minutes: step.timeout_in_minutes,
        agent_query_rules: step.agent_query_rules.clone(),
        branch_configuration: step.branch_configuration.clone(),
        artifact_paths: step.artifact_paths.clone(),
        concurrency: step.concurrency,
        parallelism: step.parallelism,
    }
}
