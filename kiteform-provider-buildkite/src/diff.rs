//! Drift detection between a pipeline's configuration and its observed state

use kiteform_core::differ::Reconcile;
use serde::Serialize;

use crate::config::{PipelineConfig, StepConfig};
use crate::settings::explicit_settings;
use crate::state::{PipelineState, StepState};

impl Reconcile<PipelineState> for PipelineConfig {
    fn changed_attributes(&self, current: &PipelineState) -> Vec<String> {
        let mut changed = Vec::new();
        let mut check = |name: &str, same: bool| {
            if !same {
                changed.push(name.to_string());
            }
        };

        check(
            "slug",
            self.slug.as_ref().is_none_or(|slug| *slug == current.slug),
        );
        check("name", self.name == current.name);
        check("description", self.description == current.description);
        check("repository", self.repository == current.repository);
        check(
            "branch_configuration",
            self.branch_configuration == current.branch_configuration,
        );
        check("default_branch", self.default_branch == current.default_branch);
        check("env", self.env == current.env);
        check(
            "skip_queued_branch_builds",
            self.skip_queued_branch_builds == current.skip_queued_branch_builds,
        );
        check(
            "skip_queued_branch_builds_filter",
            self.skip_queued_branch_builds_filter == current.skip_queued_branch_builds_filter,
        );
        check(
            "cancel_running_branch_builds",
            self.cancel_running_branch_builds == current.cancel_running_branch_builds,
        );
        check(
            "cancel_running_branch_builds_filter",
            self.cancel_running_branch_builds_filter == current.cancel_running_branch_builds_filter,
        );
        check(
            "step",
            self.steps.len() == current.steps.len()
                && self
                    .steps
                    .iter()
                    .zip(&current.steps)
                    .all(|(desired, observed)| step_matches(desired, observed)),
        );
        check(
            "github_settings",
            settings_match(self.github_settings.as_ref(), current.github_settings.first()),
        );
        check(
            "bitbucket_settings",
            settings_match(
                self.bitbucket_settings.as_ref(),
                current.bitbucket_settings.first(),
            ),
        );

        changed
    }
}

fn step_matches(desired: &StepConfig, observed: &StepState) -> bool {
    desired.step_type == observed.step_type
        && desired.label == observed.label
        && desired.name == observed.name
        && desired.command == observed.command
        && desired.env == observed.env
        && desired.timeout_in_minutes == observed.timeout_in_minutes
        && desired.agent_query_rules == observed.agent_query_rules
        && desired.branch_configuration == observed.branch_configuration
        && desired.artifact_paths == observed.artifact_paths
        && desired.concurrency == observed.concurrency
        && desired.parallelism == observed.parallelism
}

/// Only explicitly configured keys take part in the comparison. A block the
/// configuration leaves out never counts as drift.
fn settings_match<T: Serialize>(desired: Option<&T>, observed: Option<&T>) -> bool {
    let Some(desired) = desired else {
        return true;
    };
    let Some(observed) = observed else {
        return false;
    };

    let observed = explicit_settings(observed);
    explicit_settings(desired)
        .iter()
        .all(|(key, value)| observed.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{from_response, to_request};
    use crate::settings::{BitbucketSettings, GithubSettings, TriggerMode};

    fn config() -> PipelineConfig {
        PipelineConfig::new("Deploy", "git@github.com:acme/deploy.git")
            .with_step(StepConfig::new("script").with_command("make"))
    }

    /// What the API would echo back for a request, plus server-side values
    fn observed(config: &PipelineConfig) -> PipelineState {
        let mut payload = to_request(config);
        payload.id = "0182".to_string();
        payload.slug = "deploy".to_string();
        payload.web_url = "https://buildkite.com/acme/deploy".to_string();
        from_response(&payload, None).unwrap()
    }

    #[test]
    fn unchanged_pipeline_has_no_drift() {
        let config = config();
        assert!(config.changed_attributes(&observed(&config)).is_empty());
    }

    #[test]
    fn scalar_and_step_changes_are_reported() {
        let config = config();
        let mut current = observed(&config);
        current.description = "edited in the UI".to_string();
        current.steps[0].command = "make all".to_string();

        assert_eq!(
            config.changed_attributes(&current),
            vec!["description".to_string(), "step".to_string()]
        );
    }

    #[test]
    fn slug_only_compared_when_configured() {
        let mut config = config();
        let current = observed(&config);
        assert!(config.changed_attributes(&current).is_empty());

        config.slug = Some("deploy-v2".to_string());
        assert_eq!(config.changed_attributes(&current), vec!["slug".to_string()]);
    }

    #[test]
    fn settings_compare_explicit_keys_only() {
        let mut config = config();
        config.github_settings = Some(GithubSettings {
            trigger_mode: Some(TriggerMode::Code),
            ..Default::default()
        });

        let mut current = observed(&config);
        current.github_settings = vec![GithubSettings {
            trigger_mode: Some(TriggerMode::Code),
            build_tags: Some(true),
            publish_commit_status: Some(true),
            ..Default::default()
        }];
        assert!(config.changed_attributes(&current).is_empty());

        current.github_settings[0].trigger_mode = Some(TriggerMode::Deployment);
        assert_eq!(
            config.changed_attributes(&current),
            vec!["github_settings".to_string()]
        );
    }

    #[test]
    fn switching_provider_is_drift() {
        let mut config = config();
        config.bitbucket_settings = Some(BitbucketSettings::default());

        let mut current = observed(&config);
        current.bitbucket_settings.clear();
        current.github_settings = vec![GithubSettings::default()];

        assert_eq!(
            config.changed_attributes(&current),
            vec!["bitbucket_settings".to_string()]
        );
    }
}
