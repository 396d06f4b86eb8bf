//! Typed configuration for the Buildkite provider and its pipelines
//!
//! Configuration is decoded with serde and checked by `validate()` before any
//! API call is made, so the mapper can rely on well-formed input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::DEFAULT_BASE_URL;
use crate::settings::{BitbucketSettings, GithubSettings};

pub const ORGANIZATION_ENV: &str = "BUILDKITE_ORGANIZATION";
pub const API_TOKEN_ENV: &str = "BUILDKITE_API_TOKEN";

/// Errors found while validating configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required attribute `{0}`")]
    MissingAttribute(&'static str),

    #[error("at least one `step` is required")]
    NoSteps,

    #[error("step {index}: missing required attribute `type`")]
    MissingStepType { index: usize },

    #[error("`github_settings` conflicts with `bitbucket_settings`; configure at most one")]
    ConflictingSettings,

    #[error("missing provider setting `{attribute}` (or the {env} environment variable)")]
    MissingProviderSetting {
        attribute: &'static str,
        env: &'static str,
    },
}

/// `[provider.buildkite]` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Provider configuration with every value filled in
#[derive(Clone, PartialEq)]
pub struct ResolvedProviderConfig {
    pub organization: String,
    pub api_token: String,
    pub base_url: String,
}

impl std::fmt::Debug for ResolvedProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProviderConfig")
            .field("organization", &self.organization)
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    /// Fill missing values from the process environment
    pub fn resolve(&self) -> Result<ResolvedProviderConfig, ConfigError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Fill missing values from `lookup`
    pub fn resolve_with<F>(&self, lookup: F) -> Result<ResolvedProviderConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let organization = self
            .organization
            .clone()
            .or_else(|| lookup(ORGANIZATION_ENV))
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingProviderSetting {
                attribute: "organization",
                env: ORGANIZATION_ENV,
            })?;

        let api_token = self
            .api_token
            .clone()
            .or_else(|| lookup(API_TOKEN_ENV))
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingProviderSetting {
                attribute: "api_token",
                env: API_TOKEN_ENV,
            })?;

        Ok(ResolvedProviderConfig {
            organization,
            api_token,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

fn default_branch() -> String {
    "master".to_string()
}

/// `[pipeline.<name>]` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Requested slug; the server picks one when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub repository: String,
    #[serde(default)]
    pub branch_configuration: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub skip_queued_branch_builds: bool,
    #[serde(default)]
    pub skip_queued_branch_builds_filter: String,
    #[serde(default)]
    pub cancel_running_branch_builds: bool,
    #[serde(default)]
    pub cancel_running_branch_builds_filter: String,
    #[serde(rename = "step", default)]
    pub steps: Vec<StepConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_settings: Option<GithubSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitbucket_settings: Option<BitbucketSettings>,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            slug: None,
            name: name.into(),
            description: String::new(),
            repository: repository.into(),
            branch_configuration: String::new(),
            default_branch: default_branch(),
            env: BTreeMap::new(),
            skip_queued_branch_builds: false,
            skip_queued_branch_builds_filter: String::new(),
            cancel_running_branch_builds: false,
            cancel_running_branch_builds_filter: String::new(),
            steps: Vec::new(),
            github_settings: None,
            bitbucket_settings: None,
        }
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.steps.push(step);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingAttribute("name"));
        }
        if self.repository.trim().is_empty() {
            return Err(ConfigError::MissingAttribute("repository"));
        }
        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }
        if let Some(index) = self.steps.iter().position(|s| s.step_type.trim().is_empty()) {
            return Err(ConfigError::MissingStepType { index });
        }
        if self.github_settings.is_some() && self.bitbucket_settings.is_some() {
            return Err(ConfigError::ConflictingSettings);
        }
        Ok(())
    }
}

/// `[[pipeline.<name>.step]]` entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_in_minutes: u32,
    #[serde(default)]
    pub agent_query_rules: Vec<String>,
    #[serde(default)]
    pub branch_configuration: String,
    #[serde(default)]
    pub artifact_paths: String,
    #[serde(default)]
    pub concurrency: u32,
    #[serde(default)]
    pub parallelism: u32,
}

impl StepConfig {
    pub fn new(step_type: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            ..Default::default()
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}
