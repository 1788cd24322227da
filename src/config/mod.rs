//! Configuration management for fleet dispatch
//!
//! Layering: built-in defaults, then the optional TOML file, then
//! environment variables. CLI flags are applied last by the binary.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};
use file::FleetConfigFile;

/// Default seconds between status queries
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// Default seconds the start gate waits for a keypress
pub const DEFAULT_KEYPRESS_TIMEOUT_SECS: u64 = 10;

/// Default deploy recipe, run line by line in one shell on each node
pub const DEFAULT_DEPLOY_COMMANDS: &[&str] = &[
    "cd /opt/deployed",
    "sudo -u deploy git clone {repo_url} {deploy_dir}",
    "cd {deploy_dir}",
    "sudo -u deploy git checkout {version}",
    "sudo -u deploy cp ../current/config/database.yml ./config/database.yml",
    "sudo -u deploy cp ../current/config/application.yml ./config/application.yml",
    "sudo -u deploy bundle install",
    "sudo -u deploy bundle binstubs puma --path ./sbin",
];

/// Fleet dispatch configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub poll: PollConfig,
    pub aws: AwsConfig,
    pub session: SessionConfig,
    pub prompt: PromptConfig,
    pub deploy: DeployConfig,
}

/// Status polling configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed wait before each status query
    pub interval: Duration,

    /// Upper bound on total polling time; `None` waits indefinitely
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: None,
        }
    }
}

/// AWS CLI configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// `aws` executable (name on PATH or absolute path)
    pub cli_path: PathBuf,
    pub profile: Option<String>,
    pub region: Option<String>,
    /// SSM document for command batches
    pub document_name: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("aws"),
            profile: None,
            region: None,
            document_name: "AWS-RunShellScript".to_string(),
        }
    }
}

impl AwsConfig {
    /// Resolve `cli_path` against PATH
    ///
    /// # Errors
    ///
    /// Returns error if the executable cannot be found
    pub fn resolve_cli(&mut self) -> Result<()> {
        let resolved = which::which(&self.cli_path).map_err(|e| {
            Error::Config(format!(
                "aws CLI not found ({}): {e}",
                self.cli_path.display()
            ))
        })?;
        tracing::debug!(path = %resolved.display(), "resolved aws cli");
        self.cli_path = resolved;
        Ok(())
    }
}

/// Port-forward session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub remote_port: u16,
    pub local_port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_port: 22,
            local_port: 9999,
        }
    }
}

/// Interactive prompt defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub keypress_timeout: Duration,
    pub default_user: String,
    pub default_key_path: PathBuf,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let default_key_path = directories::BaseDirs::new().map_or_else(
            || PathBuf::from("~/.ssh/id_rsa.pub"),
            |d| d.home_dir().join(".ssh").join("id_rsa.pub"),
        );

        Self {
            keypress_timeout: Duration::from_secs(DEFAULT_KEYPRESS_TIMEOUT_SECS),
            default_user: "ubuntu".to_string(),
            default_key_path,
        }
    }
}

/// Deploy recipe configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub commands: Vec<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            commands: DEFAULT_DEPLOY_COMMANDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn load() -> Result<Self> {
        let file = file::load_config_file();
        let mut config = Self::from_file(file);
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay a parsed config file onto the defaults
    #[must_use]
    pub fn from_file(file: FleetConfigFile) -> Self {
        let mut config = Self::default();

        match file.poll.interval_secs {
            Some(0) => tracing::warn!("poll.interval_secs must be at least 1, using default"),
            Some(secs) => config.poll.interval = Duration::from_secs(secs),
            None => {}
        }
        match file.poll.max_wait_secs {
            Some(0) => tracing::warn!("poll.max_wait_secs must be at least 1, ignoring"),
            Some(secs) => config.poll.max_wait = Some(Duration::from_secs(secs)),
            None => {}
        }

        if let Some(path) = file.aws.cli_path {
            config.aws.cli_path = PathBuf::from(path);
        }
        config.aws.profile = file.aws.profile.or(config.aws.profile);
        config.aws.region = file.aws.region.or(config.aws.region);
        if let Some(doc) = file.aws.document_name {
            config.aws.document_name = doc;
        }

        if let Some(port) = file.session.remote_port {
            config.session.remote_port = port;
        }
        if let Some(port) = file.session.local_port {
            config.session.local_port = port;
        }

        if let Some(secs) = file.prompt.keypress_timeout_secs {
            config.prompt.keypress_timeout = Duration::from_secs(secs);
        }
        if let Some(user) = file.prompt.default_user {
            config.prompt.default_user = user;
        }
        if let Some(path) = file.prompt.default_key_path {
            config.prompt.default_key_path = PathBuf::from(path);
        }

        if let Some(commands) = file.deploy.commands {
            config.deploy.commands = commands;
        }

        config
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// Returns error if a numeric override does not parse
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FLEET_POLL_INTERVAL_SECS") {
            self.poll.interval = Duration::from_secs(parse_secs("FLEET_POLL_INTERVAL_SECS", &v)?);
        }
        if let Some(v) = lookup("FLEET_MAX_WAIT_SECS") {
            self.poll.max_wait = Some(Duration::from_secs(parse_secs("FLEET_MAX_WAIT_SECS", &v)?));
        }
        if let Some(v) = lookup("FLEET_AWS_CLI") {
            self.aws.cli_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("AWS_PROFILE") {
            self.aws.profile = Some(v);
        }
        if let Some(v) = lookup("AWS_REGION") {
            self.aws.region = Some(v);
        }
        Ok(())
    }
}

/// Parse a positive whole number of seconds
fn parse_secs(key: &str, value: &str) -> Result<u64> {
    match value.trim().parse() {
        Ok(0) => Err(Error::Config(format!("{key} must be at least 1 second"))),
        Ok(secs) => Ok(secs),
        Err(_) => Err(Error::Config(format!(
            "{key} must be a whole number of seconds, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_interactive_tool() {
        let config = Config::default();
        assert_eq!(config.poll.interval, Duration::from_secs(3));
        assert!(config.poll.max_wait.is_none());
        assert_eq!(config.aws.document_name, "AWS-RunShellScript");
        assert_eq!(config.session.remote_port, 22);
        assert_eq!(config.session.local_port, 9999);
        assert_eq!(config.prompt.default_user, "ubuntu");
    }

    #[test]
    fn file_overlays_defaults() {
        let mut file = FleetConfigFile::default();
        file.poll.max_wait_secs = Some(600);
        file.session.local_port = Some(2222);
        file.aws.region = Some("us-east-2".into());

        let config = Config::from_file(file);
        assert_eq!(config.poll.max_wait, Some(Duration::from_secs(600)));
        assert_eq!(config.poll.interval, Duration::from_secs(3));
        assert_eq!(config.session.local_port, 2222);
        assert_eq!(config.aws.region.as_deref(), Some("us-east-2"));
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> =
            HashMap::from([("FLEET_POLL_INTERVAL_SECS", "1"), ("AWS_PROFILE", "prod")]);

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.poll.interval, Duration::from_secs(1));
        assert_eq!(config.aws.profile.as_deref(), Some("prod"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "FLEET_POLL_INTERVAL_SECS").then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(config.poll.interval, Duration::from_secs(3));

        let mut file = FleetConfigFile::default();
        file.poll.interval_secs = Some(0);
        file.poll.max_wait_secs = Some(0);
        let config = Config::from_file(file);
        assert_eq!(config.poll.interval, Duration::from_secs(3));
        assert!(config.poll.max_wait.is_none());
    }

    #[test]
    fn bad_env_number_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "FLEET_MAX_WAIT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
