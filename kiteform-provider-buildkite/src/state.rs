//! Observed pipeline state
//!
//! Every attribute is always present, with zero values standing in for
//! anything the API left out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::settings::{BitbucketSettings, GithubSettings};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// Server generated id
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub repository: String,
    pub branch_configuration: String,
    pub default_branch: String,
    pub env: BTreeMap<String, String>,
    pub skip_queued_branch_builds: bool,
    pub skip_queued_branch_builds_filter: String,
    pub cancel_running_branch_builds: bool,
    pub cancel_running_branch_builds_filter: String,
    pub web_url: String,
    pub builds_url: String,
    pub url: String,
    pub badge_url: String,
    pub created_at: String,
    pub webhook_url: String,
    #[serde(rename = "step")]
    pub steps: Vec<StepState>,
    /// Zero or one element
    pub github_settings: Vec<GithubSettings>,
    /// Zero or one element
    pub bitbucket_settings: Vec<BitbucketSettings>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepState {
    #[serde(rename = "type")]
    pub step_type: String,
    pub label: String,
    pub name: String,
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub timeout_in_minutes: u32,
    pub agent_query_rules: Vec<String>,
    pub branch_configuration: String,
    pub artifact_paths: String,
    pub concurrency: u32,
    pub parallelism: u32,
}
