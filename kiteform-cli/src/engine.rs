//! Refreshing state and applying plans

use std::collections::HashMap;

use colored::Colorize;
use log::warn;

use kiteform_core::effect::Effect;
use kiteform_core::provider::{Provider, ProviderError, ProviderResult};
use kiteform_core::resource::{ResourceId, State};
use kiteform_provider_buildkite::{PIPELINE_RESOURCE_TYPE, PipelineConfig, PipelineState};
use kiteform_state::{ResourceState, StateBackend, StateFile};

use crate::display::{PipelinePlan, format_effect};

pub type CurrentStates = HashMap<ResourceId, State<PipelineState>>;

/// Outcome of applying a plan
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Read every tracked pipeline back from the remote API
pub async fn refresh<P>(provider: &P, state: &StateFile) -> Result<CurrentStates, String>
where
    P: Provider<Desired = PipelineConfig, Observed = PipelineState>,
{
    let mut current = HashMap::new();

    for entry in &state.resources {
        let id = entry.resource_id();
        if entry.resource_type != PIPELINE_RESOURCE_TYPE {
            warn!("skipping {}: unsupported resource type", id);
            continue;
        }
        let Some(identifier) = entry.identifier.as_deref() else {
            warn!("skipping {}: no remote identifier recorded", id);
            continue;
        };

        let prior = match entry.attributes_as::<PipelineState>() {
            Ok(prior) => Some(prior),
            Err(e) => {
                warn!("ignoring unreadable attributes of {}: {}", id, e);
                None
            }
        };

        let observed = provider
            .read(&id, identifier, prior.as_ref())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        current.insert(id, observed);
    }

    Ok(current)
}

/// Record a freshly observed state, dropping resources that no longer exist
pub fn record_state(
    state_file: &mut StateFile,
    provider: &str,
    id: &ResourceId,
    observed: &State<PipelineState>,
) -> Result<(), String> {
    match &observed.attributes {
        Some(attributes) => {
            let entry = ResourceState::new(id, provider)
                .with_identifier(observed.identifier.clone())
                .with_attributes(attributes)
                .map_err(|e| format!("Failed to encode state of {}: {}", id, e))?;
            state_file.upsert_resource(entry);
        }
        None => {
            state_file.remove_resource(id);
        }
    }
    Ok(())
}

pub async fn persist(backend: &dyn StateBackend, state_file: &mut StateFile) -> Result<(), String> {
    state_file.increment_serial();
    backend
        .write_state(state_file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

/// Plan deleting every pipeline that still exists, ordered by resource id
pub fn destroy_plan(current: &CurrentStates) -> PipelinePlan {
    let mut targets: Vec<(&ResourceId, &str)> = current
        .iter()
        .filter(|(_, state)| state.exists())
        .filter_map(|(id, state)| state.identifier.as_deref().map(|slug| (id, slug)))
        .collect();
    targets.sort();

    let mut plan = PipelinePlan::new();
    for (id, identifier) in targets {
        plan.add(Effect::Delete {
            id: id.clone(),
            identifier: identifier.to_string(),
        });
    }
    plan
}

/// Apply each effect in order, writing state after every success
///
/// A failed effect is reported and leaves that resource's state untouched;
/// the remaining effects still run. Failing to write state aborts.
pub async fn apply_plan<P>(
    provider: &P,
    plan: &PipelinePlan,
    backend: &dyn StateBackend,
    state_file: &mut StateFile,
) -> Result<ApplyReport, String>
where
    P: Provider<Desired = PipelineConfig, Observed = PipelineState>,
{
    let mut report = ApplyReport::default();

    for effect in plan.effects() {
        match execute(provider, effect).await {
            Ok(observed) => {
                println!("  {} {}", "✓".green(), format_effect(effect));
                report.succeeded += 1;
                record_state(state_file, provider.name(), effect.resource_id(), &observed)?;
                persist(backend, state_file).await?;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn execute<P>(
    provider: &P,
    effect: &Effect<PipelineConfig, PipelineState>,
) -> ProviderResult<State<PipelineState>>
where
    P: Provider<Desired = PipelineConfig, Observed = PipelineState>,
{
    match effect {
        Effect::Create(resource) => provider.create(resource).await,
        Effect::Update { id, from, to, .. } => {
            let identifier = from.identifier.as_deref().ok_or_else(|| {
                ProviderError::new("No remote identifier recorded")
                    .for_resource(id.clone())
            })?;
            provider.update(id, identifier, from, to).await
        }
        Effect::Delete { id, identifier } => {
            provider.delete(id, identifier).await?;
            Ok(State::not_found(id.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiteform_core::differ::create_plan;
    use kiteform_core::provider::{BoxFuture, ResourceType};
    use kiteform_core::resource::Resource;
    use kiteform_provider_buildkite::StepConfig;
    use kiteform_provider_buildkite::mapper::{from_response, to_request};
    use kiteform_state::LocalBackend;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Keeps pipelines in memory, echoing requests the way the API does
    #[derive(Default)]
    struct MemoryProvider {
        pipelines: Mutex<HashMap<String, PipelineState>>,
    }

    impl MemoryProvider {
        fn store(&self, slug: &str, config: &PipelineConfig) -> ProviderResult<PipelineState> {
            if config.name.contains("broken") {
                return Err(ProviderError::new("API request failed with status 422"));
            }
            let mut payload = to_request(config);
            payload.slug = slug.to_string();
            payload.id = format!("id-{}", slug);
            let state = from_response(&payload, None).map_err(|e| ProviderError::new(e.to_string()))?;
            self.pipelines
                .lock()
                .unwrap()
                .insert(slug.to_string(), state.clone());
            Ok(state)
        }
    }

    impl Provider for MemoryProvider {
        type Desired = PipelineConfig;
        type Observed = PipelineState;

        fn name(&self) -> &'static str {
            "buildkite"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read<'a>(
            &'a self,
            id: &'a ResourceId,
            identifier: &'a str,
            _prior: Option<&'a PipelineState>,
        ) -> BoxFuture<'a, ProviderResult<State<PipelineState>>> {
            Box::pin(async move {
                Ok(match self.pipelines.lock().unwrap().get(identifier) {
                    Some(state) => {
                        State::existing(id.clone(), state.clone()).with_identifier(identifier)
                    }
                    None => State::not_found(id.clone()),
                })
            })
        }

        fn create<'a>(
            &'a self,
            resource: &'a Resource<PipelineConfig>,
        ) -> BoxFuture<'a, ProviderResult<State<PipelineState>>> {
            Box::pin(async move {
                let slug = resource.attributes.name.to_lowercase();
                let state = self.store(&slug, &resource.attributes)?;
                Ok(State::existing(resource.id.clone(), state).with_identifier(slug))
            })
        }

        fn update<'a>(
            &'a self,
            id: &'a ResourceId,
            identifier: &'a str,
            _from: &'a State<PipelineState>,
            to: &'a Resource<PipelineConfig>,
        ) -> BoxFuture<'a, ProviderResult<State<PipelineState>>> {
            Box::pin(async move {
                let state = self.store(identifier, &to.attributes)?;
                Ok(State::existing(id.clone(), state).with_identifier(identifier))
            })
        }

        fn delete<'a>(
            &'a self,
            _id: &'a ResourceId,
            identifier: &'a str,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async move {
                self.pipelines.lock().unwrap().remove(identifier);
                Ok(())
            })
        }
    }

    fn pipeline(name: &str, pipeline_name: &str) -> Resource<PipelineConfig> {
        Resource::new(
            PIPELINE_RESOURCE_TYPE,
            name,
            PipelineConfig::new(pipeline_name, "git@github.com:acme/app.git")
                .with_step(StepConfig::new("script").with_command("make")),
        )
    }

    #[tokio::test]
    async fn apply_then_replan_is_empty() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("kiteform.state.json"));
        let provider = MemoryProvider::default();
        let desired = vec![pipeline("app", "App"), pipeline("docs", "Docs")];

        let mut state_file = StateFile::new();
        let current = refresh(&provider, &state_file).await.unwrap();
        let plan = create_plan(&desired, &current);
        assert_eq!(plan.summary().create, 2);

        let report = apply_plan(&provider, &plan, &backend, &mut state_file)
            .await
            .unwrap();
        assert_eq!(report, ApplyReport { succeeded: 2, failed: 0 });

        let stored = backend.read_state().await.unwrap().unwrap();
        assert_eq!(stored.serial, 2);
        assert_eq!(stored.resources.len(), 2);
        let app = stored
            .find_resource(&ResourceId::new(PIPELINE_RESOURCE_TYPE, "app"))
            .unwrap();
        assert_eq!(app.identifier.as_deref(), Some("app"));

        let current = refresh(&provider, &stored).await.unwrap();
        assert!(create_plan(&desired, &current).is_empty());
    }

    #[tokio::test]
    async fn drift_and_removal_are_planned() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("kiteform.state.json"));
        let provider = MemoryProvider::default();

        let mut state_file = StateFile::new();
        let plan = create_plan(
            &[pipeline("app", "App"), pipeline("docs", "Docs")],
            &CurrentStates::new(),
        );
        apply_plan(&provider, &plan, &backend, &mut state_file)
            .await
            .unwrap();

        let mut changed = pipeline("app", "App");
        changed.attributes.description = "Builds the app".to_string();

        let current = refresh(&provider, &state_file).await.unwrap();
        let plan = create_plan(&[changed], &current);
        let kinds: Vec<&str> = plan.effects().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["update", "delete"]);

        let report = apply_plan(&provider, &plan, &backend, &mut state_file)
            .await
            .unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(state_file.resources.len(), 1);

        let app: PipelineState = state_file.resources[0].attributes_as().unwrap();
        assert_eq!(app.description, "Builds the app");
    }

    #[tokio::test]
    async fn failed_effect_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("kiteform.state.json"));
        let provider = MemoryProvider::default();

        let mut state_file = StateFile::new();
        let plan = create_plan(
            &[pipeline("app", "App"), pipeline("bad", "broken")],
            &CurrentStates::new(),
        );
        let report = apply_plan(&provider, &plan, &backend, &mut state_file)
            .await
            .unwrap();

        assert_eq!(report, ApplyReport { succeeded: 1, failed: 1 });
        assert_eq!(state_file.resources.len(), 1);
        assert!(
            state_file
                .find_resource(&ResourceId::new(PIPELINE_RESOURCE_TYPE, "bad"))
                .is_none()
        );
    }

    #[tokio::test]
    async fn refresh_drops_pipelines_deleted_remotely() {
        let provider = MemoryProvider::default();
        let mut state_file = StateFile::new();
        let id = ResourceId::new(PIPELINE_RESOURCE_TYPE, "gone");
        state_file.upsert_resource(
            ResourceState::new(&id, "buildkite").with_identifier(Some("gone".to_string())),
        );

        let current = refresh(&provider, &state_file).await.unwrap();
        assert!(!current[&id].exists());

        record_state(&mut state_file, "buildkite", &id, &current[&id]).unwrap();
        assert!(state_file.resources.is_empty());
    }

    #[tokio::test]
    async fn destroy_plan_targets_existing_pipelines() {
        let provider = MemoryProvider::default();
        let mut current = CurrentStates::new();
        for name in ["b", "a"] {
            let resource = pipeline(name, name);
            current.insert(resource.id.clone(), provider.create(&resource).await.unwrap());
        }
        let missing = ResourceId::new(PIPELINE_RESOURCE_TYPE, "c");
        current.insert(missing.clone(), State::not_found(missing));

        let plan = destroy_plan(&current);
        let targets: Vec<String> = plan.effects().iter().map(format_effect).collect();
        assert_eq!(
            targets,
            vec![
                "Delete buildkite_pipeline.a (a)",
                "Delete buildkite_pipeline.b (b)"
            ]
        );
    }
}
