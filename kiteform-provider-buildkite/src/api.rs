//! Wire payloads for the Buildkite REST API
//!
//! These types mirror the JSON the API sends and accepts. Optional fields
//! tolerate explicit `null`s and decode to their zero values.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// Settings keys owned by the server; never kept from a response.
pub const EXCLUDED_SETTINGS: [&str; 4] = [
    "repository",
    "account",
    "commit_status_404s",
    "commit_status_error",
];

/// A pipeline as sent to and returned by the API
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelinePayload {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub env: EnvMap,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub web_url: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub builds_url: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub default_branch: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub badge_url: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub branch_configuration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skip_queued_branch_builds: bool,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub skip_queued_branch_builds_filter: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cancel_running_branch_builds: bool,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub cancel_running_branch_builds_filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderPayload>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<StepPayload>,
}

/// One step of a pipeline on the wire
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepPayload {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default)]
    pub env: EnvMap,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub timeout_in_minutes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agent_query_rules: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub branch_configuration: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub artifact_paths: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub concurrency: u32,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub parallelism: u32,
}

/// Repository provider association on the wire
///
/// Server-owned settings keys are removed while decoding, so they can never
/// travel back in a later request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderPayload {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_settings")]
    pub settings: Map<String, Value>,
}

impl ProviderPayload {
    pub fn new(id: impl Into<String>, settings: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            webhook_url: None,
            settings,
        }
    }
}

/// Environment variables with every value normalized to a string
///
/// Numbers keep their literal JSON text, booleans become `"true"`/`"false"`.
/// Other JSON kinds are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct EnvMap(pub BTreeMap<String, String>);

impl EnvMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl From<BTreeMap<String, String>> for EnvMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<'de> Deserialize<'de> for EnvMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<BTreeMap<String, Box<RawValue>>> = Option::deserialize(deserializer)?;
        let mut env = BTreeMap::new();

        for (key, value) in raw.unwrap_or_default() {
            let text = value.get().trim();
            let normalized = match text.as_bytes().first().copied() {
                Some(b'"') => Some(serde_json::from_str::<String>(text).map_err(D::Error::custom)?),
                Some(b't' | b'f' | b'-' | b'0'..=b'9') => Some(text.to_string()),
                _ => None,
            };
            if let Some(v) = normalized {
                env.insert(key, v);
            }
        }

        Ok(Self(env))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_settings<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut settings: Map<String, Value> = null_as_default(deserializer)?;
    for key in EXCLUDED_SETTINGS {
        settings.remove(key);
    }
    Ok(settings)
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}
