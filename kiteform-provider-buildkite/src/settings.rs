//! Repository provider settings
//!
//! Each source-control provider supports its own set of settings. Every field
//! is optional: `Some` means the value was set explicitly, and only explicit
//! values are ever sent to the API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::ProviderPayload;

/// When GitHub should trigger builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    Code,
    Deployment,
    Fork,
    None,
}

/// Settings for a pipeline whose repository lives on GitHub
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<TriggerMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_pull_requests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_branch_filter_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_branch_filter_configuration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_pull_request_builds_for_existing_commits: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separate_pull_request_statuses: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_builds_for_existing_commits: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_pull_request_forks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_pull_request_fork_branch_names: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_tags: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_commit_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_commit_status_per_step: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_blocked_as_pending: Option<bool>,
}

impl GithubSettings {
    pub const FIELDS: &'static [&'static str] = &[
        "trigger_mode",
        "build_pull_requests",
        "pull_request_branch_filter_enabled",
        "pull_request_branch_filter_configuration",
        "skip_pull_request_builds_for_existing_commits",
        "separate_pull_request_statuses",
        "skip_builds_for_existing_commits",
        "filter_enabled",
        "build_pull_request_forks",
        "prefix_pull_request_fork_branch_names",
        "build_tags",
        "publish_commit_status",
        "publish_commit_status_per_step",
        "publish_blocked_as_pending",
    ];
}

/// Settings for a pipeline whose repository lives on Bitbucket
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BitbucketSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_pull_requests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_branch_filter_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_branch_filter_configuration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_pull_request_builds_for_existing_commits: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_tags: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_commit_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_commit_status_per_step: Option<bool>,
}

impl BitbucketSettings {
    pub const FIELDS: &'static [&'static str] = &[
        "build_pull_requests",
        "pull_request_branch_filter_enabled",
        "pull_request_branch_filter_configuration",
        "skip_pull_request_builds_for_existing_commits",
        "build_tags",
        "publish_commit_status",
        "publish_commit_status_per_step",
    ];
}

/// The source-control integration a pipeline is linked to
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryProvider {
    GitHub {
        webhook_url: String,
        settings: GithubSettings,
    },
    Bitbucket {
        webhook_url: String,
        settings: BitbucketSettings,
    },
    GitLab {
        webhook_url: String,
    },
    Beanstalk {
        webhook_url: String,
    },
    Unknown {
        id: String,
    },
}

impl RepositoryProvider {
    /// Provider tag as used by the API
    pub fn id(&self) -> &str {
        match self {
            RepositoryProvider::GitHub { .. } => "github",
            RepositoryProvider::Bitbucket { .. } => "bitbucket",
            RepositoryProvider::GitLab { .. } => "gitlab",
            RepositoryProvider::Beanstalk { .. } => "beanstalk",
            RepositoryProvider::Unknown { id } => id,
        }
    }

    /// Decode the typed provider from its wire form
    ///
    /// Settings keys the typed block does not model are ignored; a modeled
    /// key with a value of the wrong type is an error.
    pub fn from_payload(payload: &ProviderPayload) -> Result<Self, serde_json::Error> {
        let webhook_url = payload.webhook_url.clone().unwrap_or_default();

        let provider = match payload.id.as_str() {
            "github" => RepositoryProvider::GitHub {
                webhook_url,
                settings: decode_settings(&payload.settings, GithubSettings::FIELDS)?,
            },
            "bitbucket" => RepositoryProvider::Bitbucket {
                webhook_url,
                settings: decode_settings(&payload.settings, BitbucketSettings::FIELDS)?,
            },
            "gitlab" => RepositoryProvider::GitLab { webhook_url },
            "beanstalk" => RepositoryProvider::Beanstalk { webhook_url },
            other => RepositoryProvider::Unknown {
                id: other.to_string(),
            },
        };

        Ok(provider)
    }
}

/// Explicitly set settings as a JSON object
pub fn explicit_settings<T: Serialize>(settings: &T) -> Map<String, Value> {
    match serde_json::to_value(settings) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn decode_settings<T>(settings: &Map<String, Value>, fields: &[&str]) -> Result<T, serde_json::Error>
where
    T: serde::de::DeserializeOwned,
{
    let known: Map<String, Value> = settings
        .iter()
        .filter(|(key, _)| fields.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    serde_json::from_value(Value::Object(known))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(id: &str, settings: Value) -> ProviderPayload {
        let mut payload = ProviderPayload::new(id, settings.as_object().cloned().unwrap_or_default());
        payload.webhook_url = Some("https://webhook.buildkite.com/deliver/abc".to_string());
        payload
    }

    #[test]
    fn explicit_settings_contain_only_set_keys() {
        let settings = GithubSettings {
            trigger_mode: Some(TriggerMode::Code),
            build_tags: Some(false),
            ..Default::default()
        };

        let map = explicit_settings(&settings);
        assert_eq!(
            Value::Object(map),
            json!({"trigger_mode": "code", "build_tags": false})
        );
    }

    #[test]
    fn github_payload_ignores_unmodeled_keys() {
        let provider = RepositoryProvider::from_payload(&payload(
            "github",
            json!({"trigger_mode": "deployment", "pull_request_branch_filter_configuration": null, "some_new_flag": true}),
        ))
        .unwrap();

        match provider {
            RepositoryProvider::GitHub {
                webhook_url,
                settings,
            } => {
                assert_eq!(webhook_url, "https://webhook.buildkite.com/deliver/abc");
                assert_eq!(settings.trigger_mode, Some(TriggerMode::Deployment));
                assert_eq!(settings.pull_request_branch_filter_configuration, None);
            }
            other => panic!("Expected GitHub, got {:?}", other),
        }
    }

    #[test]
    fn bitbucket_payload_with_wrong_type_is_an_error() {
        let result =
            RepositoryProvider::from_payload(&payload("bitbucket", json!({"build_tags": "yes"})));
        assert!(result.is_err());
    }

    #[test]
    fn settingless_and_unknown_providers() {
        let gitlab = RepositoryProvider::from_payload(&payload("gitlab", json!({"x": 1}))).unwrap();
        assert!(matches!(gitlab, RepositoryProvider::GitLab { .. }));
        assert_eq!(gitlab.id(), "gitlab");

        let other = RepositoryProvider::from_payload(&payload("private", json!({}))).unwrap();
        assert_eq!(other.id(), "private");
    }
}
