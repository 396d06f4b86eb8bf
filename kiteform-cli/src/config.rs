//! Configuration file loading

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use kiteform_core::resource::Resource;
use kiteform_provider_buildkite::{PIPELINE_RESOURCE_TYPE, PipelineConfig, ProviderConfig};
use kiteform_state::BackendConfig;

/// Contents of `main.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KiteformConfig {
    #[serde(default)]
    pub provider: ProviderBlocks,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default, rename = "pipeline")]
    pub pipelines: BTreeMap<String, PipelineConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBlocks {
    #[serde(default)]
    pub buildkite: ProviderConfig,
}

impl KiteformConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    /// Parse and validate every declared pipeline
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

        let errors: Vec<String> = config
            .pipelines
            .iter()
            .filter_map(|(name, pipeline)| {
                pipeline
                    .validate()
                    .err()
                    .map(|e| format!("{}.{}: {}", PIPELINE_RESOURCE_TYPE, name, e))
            })
            .collect();

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Declared pipelines as resources, ordered by name
    pub fn resources(&self) -> Vec<Resource<PipelineConfig>> {
        self.pipelines
            .iter()
            .map(|(name, pipeline)| Resource::new(PIPELINE_RESOURCE_TYPE, name, pipeline.clone()))
            .collect()
    }
}
