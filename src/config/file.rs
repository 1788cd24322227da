//! TOML configuration file loading
//!
//! Supports `~/.config/fleet-dispatch/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct FleetConfigFile {
    /// Status polling
    #[serde(default)]
    pub poll: PollFileConfig,

    /// AWS CLI invocation
    #[serde(default)]
    pub aws: AwsFileConfig,

    /// Interactive session defaults
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Prompt defaults
    #[serde(default)]
    pub prompt: PromptFileConfig,

    /// Deploy recipe
    #[serde(default)]
    pub deploy: DeployFileConfig,
}

/// Polling configuration
#[derive(Debug, Default, Deserialize)]
pub struct PollFileConfig {
    /// Seconds between status queries
    pub interval_secs: Option<u64>,

    /// Give up waiting after this many seconds
    pub max_wait_secs: Option<u64>,
}

/// AWS CLI configuration
#[derive(Debug, Default, Deserialize)]
pub struct AwsFileConfig {
    /// Path or name of the `aws` executable
    pub cli_path: Option<String>,
    pub profile: Option<String>,
    pub region: Option<String>,
    /// SSM document used for command batches (e.g. "AWS-RunShellScript")
    pub document_name: Option<String>,
}

/// Port-forward defaults
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub remote_port: Option<u16>,
    pub local_port: Option<u16>,
}

/// Prompt defaults
#[derive(Debug, Default, Deserialize)]
pub struct PromptFileConfig {
    /// Seconds before the start gate proceeds on its own
    pub keypress_timeout_secs: Option<u64>,
    /// Default user for public key installation
    pub default_user: Option<String>,
    /// Default public key path
    pub default_key_path: Option<String>,
}

/// Deploy recipe
#[derive(Debug, Default, Deserialize)]
pub struct DeployFileConfig {
    /// Command template; `{version}`, `{repo_url}` and `{deploy_dir}` are substituted
    pub commands: Option<Vec<String>>,
}

/// Load the TOML config file from the standard path
///
/// Returns `FleetConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> FleetConfigFile {
    let Some(path) = config_file_path() else {
        return FleetConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_config_file_from(path: &Path) -> FleetConfigFile {
    if !path.exists() {
        return FleetConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                FleetConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            FleetConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/fleet-dispatch/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("fleet-dispatch").join("config.toml"))
}
