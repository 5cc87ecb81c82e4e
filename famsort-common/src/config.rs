//! Configuration loading and resolution
//!
//! Bootstrap settings come from a TOML file found by priority:
//! 1. Command-line argument (highest priority)
//! 2. `FAMSORT_CONFIG` environment variable
//! 3. Platform config file (`~/.config/famsort/config.toml` on Linux)
//! 4. Built-in defaults (fallback)
//!
//! Every field has a default, so an empty or missing file is a valid config.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Column holding the timestamp of each form submission
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Column holding the respondent's own name
pub const IDENTITY_COLUMN: &str = "First and Last Name";

/// Column inserted by pseudonymization
pub const USER_ID_COLUMN: &str = "user_id";

/// Form question listing who a respondent wants to be grouped with
///
/// The typo is part of the deployed form and must match it exactly.
pub const PAIRING_COLUMN: &str =
    "Who you you want to be paired with? (You can list multiple names, just remember to put first and last)";

/// Closing open-ended form question, vaulted rather than name-translated
pub const FREE_TEXT_COLUMN: &str =
    "Is there anything else you want us to know? (This is the end of the form!)";

/// Keywords marking a column as personally identifying
pub const DEFAULT_PII_KEYWORDS: &[&str] = &[
    "name",
    "email",
    "phone",
    "number",
    "contact",
    "student_id",
    "netid",
    "username",
    "discord",
    "social_media",
    "messenger",
    "instagram",
];

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FAMSORT_CONFIG";

/// Default reference (list-of-names) columns
pub fn default_reference_columns() -> Vec<String> {
    vec![
        "preferred_friends".to_string(),
        "want_to_be_with".to_string(),
        "roommate".to_string(),
        PAIRING_COLUMN.to_string(),
    ]
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// External language-model service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,
    pub api_key: Option<String>,
    pub summary_model: String,
    pub classification_model: String,
    pub summary_temperature: f32,
    pub classification_temperature: f32,
    pub timeout_secs: u64,
    /// Minimum spacing between consecutive requests (0 = unthrottled)
    pub min_interval_ms: u64,
    /// Extra attempts after a transport or 5xx failure
    ///
    /// Retried classification calls are not guaranteed to return the same
    /// grouping, so this defaults to 0.
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            summary_model: "gpt-3.5-turbo".to_string(),
            classification_model: "gpt-4o".to_string(),
            summary_temperature: 0.5,
            classification_temperature: 0.4,
            timeout_secs: 60,
            min_interval_ms: 0,
            max_retries: 0,
        }
    }
}

/// Pipeline column names and batching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub identity_column: String,
    pub timestamp_column: String,
    /// Comma-separated name-reference columns
    pub reference_columns: Vec<String>,
    /// Open-ended column vaulted as whole-cell manual identifiers
    pub free_text_column: String,
    /// Columns never suppressed, whatever keywords they contain
    ///
    /// Empty means `user_id` + reference columns + free-text column.
    pub preserved_columns: Vec<String>,
    pub pii_keywords: Vec<String>,
    pub batch_size: usize,
    pub default_group_count: usize,
    /// Parent directory of per-run identifier map folders
    pub artifact_dir: Option<PathBuf>,
    pub default_instruction: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            identity_column: IDENTITY_COLUMN.to_string(),
            timestamp_column: TIMESTAMP_COLUMN.to_string(),
            reference_columns: default_reference_columns(),
            free_text_column: FREE_TEXT_COLUMN.to_string(),
            preserved_columns: Vec::new(),
            pii_keywords: DEFAULT_PII_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            batch_size: 40,
            default_group_count: 5,
            artifact_dir: None,
            default_instruction: "Group people by similar vibes, energy, or common interests."
                .to_string(),
        }
    }
}

impl PipelineSettings {
    /// Allow-list handed to the PII redactor
    pub fn effective_preserved_columns(&self) -> Vec<String> {
        if !self.preserved_columns.is_empty() {
            return self.preserved_columns.clone();
        }
        let mut columns = vec![USER_ID_COLUMN.to_string()];
        columns.extend(self.reference_columns.iter().cloned());
        columns.push(self.free_text_column.clone());
        columns
    }

    /// Artifact directory, falling back to the platform data dir
    pub fn effective_artifact_dir(&self) -> PathBuf {
        match &self.artifact_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .map(|d| d.join("famsort").join("runs"))
                .unwrap_or_else(|| PathBuf::from("./famsort_runs")),
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.default_group_count == 0 || self.default_group_count > 26 {
            return Err(Error::Config(
                "default_group_count must be between 1 and 26".to_string(),
            ));
        }
        if self.identity_column.trim().is_empty() || self.timestamp_column.trim().is_empty() {
            return Err(Error::Config(
                "identity_column and timestamp_column must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the config file following the documented priority order
///
/// Returns `None` when no file applies and built-in defaults should be used.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file, only if it exists
    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/famsort/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("famsort").join("config.toml"))
}

/// Load configuration, falling back to defaults when no file applies
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = read_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            #[cfg(unix)]
            {
                if check_toml_permissions_loose(&path)? {
                    warn!(
                        "Config file {} is readable by group or others and may hold an API key; \
                         restrict it with chmod 600",
                        path.display()
                    );
                }
            }
            Ok(config)
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.pipeline.validate()?;
    Ok(config)
}

/// Write config atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 because it may carry an API key.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }
    Ok(())
}

/// True when a config file is readable by group or others
#[cfg(unix)]
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}

/// Environment variables consulted for the API key, highest priority first
pub const API_KEY_ENV_VARS: &[&str] = &["FAMSORT_API_KEY", "OPENAI_API_KEY"];

/// Resolve the oracle API key
///
/// **Priority:** CLI → `FAMSORT_API_KEY` → `OPENAI_API_KEY` → TOML
pub fn resolve_api_key(cli_key: Option<&str>, config: &OracleConfig) -> Result<String> {
    let mut candidates: Vec<(&str, String)> = Vec::new();

    if let Some(key) = cli_key {
        candidates.push(("command line", key.to_string()));
    }
    for var in API_KEY_ENV_VARS {
        if let Ok(key) = std::env::var(var) {
            candidates.push((var, key));
        }
    }
    if let Some(key) = &config.api_key {
        candidates.push(("TOML", key.clone()));
    }

    candidates.retain(|(_, key)| is_valid_key(key));

    if candidates.len() > 1 {
        let sources: Vec<&str> = candidates.iter().map(|(source, _)| *source).collect();
        warn!(
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match candidates.into_iter().next() {
        Some((source, key)) => {
            info!("API key loaded from {}", source);
            Ok(key)
        }
        None => Err(Error::Config(
            "API key not configured. Please configure using one of:\n\
             1. Command line: --api-key your-key\n\
             2. Environment: FAMSORT_API_KEY=your-key (or OPENAI_API_KEY)\n\
             3. TOML config: [oracle] api_key = \"your-key\""
                .to_string(),
        )),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
