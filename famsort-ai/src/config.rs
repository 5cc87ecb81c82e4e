//! Run configuration for famsort-ai
//!
//! Turns the bootstrap TOML plus command-line overrides into the values one
//! pipeline run needs. Nothing here is global: every run gets its own
//! [`PipelineConfig`] and its own oracle client.

use crate::services::classifier::CoordinatorConfig;
use crate::services::openai_client::OpenAiClient;
use crate::services::pii_redactor::PiiRedactor;
use famsort_common::config::{resolve_api_key, OracleConfig, PipelineSettings, TomlConfig};
use famsort_common::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub settings: PipelineSettings,
    /// Parent directory of this run's `<run_id>/` map folder
    pub artifact_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_settings(settings: PipelineSettings) -> Result<Self> {
        settings.validate()?;
        let artifact_dir = settings.effective_artifact_dir();
        Ok(Self {
            settings,
            artifact_dir,
        })
    }

    /// Override the artifact directory (tests, `--artifact-dir`)
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn redactor(&self) -> PiiRedactor {
        PiiRedactor::from_settings(&self.settings)
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            batch_size: self.settings.batch_size,
            default_group_count: self.settings.default_group_count,
        }
    }

    /// Instruction actually used for a run
    ///
    /// A blank instruction falls back to the configured default.
    pub fn effective_instruction(&self, instruction: Option<&str>) -> String {
        match instruction.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                info!("No instruction given, using default");
                self.settings.default_instruction.clone()
            }
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        let artifact_dir = settings.effective_artifact_dir();
        Self {
            settings,
            artifact_dir,
        }
    }
}

/// Build the oracle client for a run
///
/// **Key priority:** CLI → `FAMSORT_API_KEY` → `OPENAI_API_KEY` → TOML
pub fn build_oracle_client(config: &OracleConfig, cli_key: Option<&str>) -> Result<OpenAiClient> {
    let api_key = resolve_api_key(cli_key, config)?;
    let client = OpenAiClient::new(config, api_key)
        .map_err(|e| Error::Config(format!("Unable to build oracle client: {}", e)))?;
    info!(
        endpoint = %config.endpoint,
        summary_model = %config.summary_model,
        classification_model = %config.classification_model,
        "Oracle client ready"
    );
    Ok(client)
}

/// Run configuration resolved from TOML and the command line
pub fn resolve_pipeline_config(
    toml_config: &TomlConfig,
    artifact_dir_override: Option<PathBuf>,
) -> Result<PipelineConfig> {
    let config = PipelineConfig::from_settings(toml_config.pipeline.clone())?;
    Ok(match artifact_dir_override {
        Some(dir) => config.with_artifact_dir(dir),
        None => config,
    })
}
