//! Interactive session launching
//!
//! Sessions replace the current process with `aws ssm start-session` and
//! never return on success.

use std::process::Command;

use crate::config::AwsConfig;
use crate::{Error, Result};

/// SSM document used for port forwarding
const PORT_FORWARD_DOCUMENT: &str = "AWS-StartPortForwardingSession";

/// Interactive session to start on one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    Shell {
        node_id: String,
    },
    PortForward {
        node_id: String,
        remote_port: u16,
        local_port: u16,
    },
}

impl SessionRequest {
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::Shell { node_id } | Self::PortForward { node_id, .. } => node_id,
        }
    }
}

/// Starts interactive sessions
pub trait SessionLauncher: Send + Sync {
    /// Start the session
    ///
    /// A process-replacing launcher only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns error if the session tool cannot be started
    fn launch(&self, request: &SessionRequest) -> Result<()>;
}

/// Launches sessions through `aws ssm start-session`
#[derive(Debug, Clone)]
pub struct AwsSessionLauncher {
    config: AwsConfig,
}

impl AwsSessionLauncher {
    #[must_use]
    pub const fn new(config: AwsConfig) -> Self {
        Self { config }
    }

    /// Arguments for `aws ssm start-session`
    #[must_use]
    pub fn args(&self, request: &SessionRequest) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(profile) = &self.config.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        if let Some(region) = &self.config.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        args.extend([
            "ssm".to_string(),
            "start-session".to_string(),
            "--target".to_string(),
            request.node_id().to_string(),
        ]);

        if let SessionRequest::PortForward {
            remote_port,
            local_port,
            ..
        } = request
        {
            let parameters = serde_json::json!({
                "portNumber": [remote_port.to_string()],
                "localPortNumber": [local_port.to_string()],
            });
            args.extend([
                "--document-name".to_string(),
                PORT_FORWARD_DOCUMENT.to_string(),
                "--parameters".to_string(),
                parameters.to_string(),
            ]);
        }
        args
    }
}

impl SessionLauncher for AwsSessionLauncher {
    fn launch(&self, request: &SessionRequest) -> Result<()> {
        let args = self.args(request);
        tracing::info!(node_id = %request.node_id(), "starting session");

        let mut command = Command::new(&self.config.cli_path);
        command.args(&args);
        replace_process(&mut command)
    }
}

#[cfg(unix)]
fn replace_process(command: &mut Command) -> Result<()> {
    use std::os::unix::process::CommandExt;

    // exec only returns on failure
    let err = command.exec();
    Err(Error::Session(format!("failed to start session: {err}")))
}

#[cfg(not(unix))]
fn replace_process(command: &mut Command) -> Result<()> {
    let status = command
        .status()
        .map_err(|e| Error::Session(format!("failed to start session: {e}")))?;
    std::process::exit(status.code().unwrap_or(1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_session_args() {
        let launcher = AwsSessionLauncher::new(AwsConfig::default());
        let args = launcher.args(&SessionRequest::Shell {
            node_id: "i-1".into(),
        });
        assert_eq!(args, ["ssm", "start-session", "--target", "i-1"]);
    }

    #[test]
    fn port_forward_args_use_document() {
        let launcher = AwsSessionLauncher::new(AwsConfig {
            profile: Some("ops".into()),
            ..AwsConfig::default()
        });
        let args = launcher.args(&SessionRequest::PortForward {
            node_id: "i-1".into(),
            remote_port: 22,
            local_port: 9999,
        });
        assert_eq!(&args[..2], ["--profile", "ops"]);
        assert_eq!(args[6], "--document-name");
        assert_eq!(args[7], PORT_FORWARD_DOCUMENT);
        let params: serde_json::Value = serde_json::from_str(&args[9]).unwrap();
        assert_eq!(params["portNumber"][0], "22");
        assert_eq!(params["localPortNumber"][0], "9999");
    }
}
