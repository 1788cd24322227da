//! Operations a user can run against the fleet
//!
//! Each [`Operation`] maps to a [`Plan`]: either a command batch that goes
//! through dispatch and reconciliation, or a session launch that bypasses it.

pub mod batch;
pub mod git;
pub mod recipe;

use std::fmt;

pub use batch::CommandBatch;
pub use recipe::DeployParams;

use crate::Result;
use crate::nodes::Selection;
use crate::session::SessionRequest;

/// Menu choice before any parameters are known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    InteractiveSsh,
    PortForward,
    RunCommands,
    InstallPublicKey,
    DeployOrHotfix,
    Exit,
}

impl OperationKind {
    /// Menu order
    pub const ALL: [Self; 6] = [
        Self::InteractiveSsh,
        Self::PortForward,
        Self::RunCommands,
        Self::InstallPublicKey,
        Self::DeployOrHotfix,
        Self::Exit,
    ];

    /// Interactive sessions take exactly one node
    #[must_use]
    pub const fn is_single_target(self) -> bool {
        matches!(self, Self::InteractiveSsh | Self::PortForward)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InteractiveSsh => "Start SSH session (via SSM)",
            Self::PortForward => "Start port-forwarding session (via SSM)",
            Self::RunCommands => "Run custom command(s)",
            Self::InstallPublicKey => "Install public key",
            Self::DeployOrHotfix => "Deploy / hotfix",
            Self::Exit => "Exit",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fully parameterized operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    InteractiveSsh {
        node_id: String,
    },
    PortForward {
        node_id: String,
        remote_port: u16,
        local_port: u16,
    },
    RunCommands(CommandBatch),
    InstallPublicKey {
        user: String,
        public_key: String,
    },
    DeployOrHotfix {
        template: Vec<String>,
        params: DeployParams,
    },
}

/// What to do for an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Submit as one job and reconcile
    Dispatch(CommandBatch),
    /// Replace the process with an interactive session
    Session(SessionRequest),
}

impl Operation {
    /// Interactive shell on the first selected node
    #[must_use]
    pub fn interactive_ssh(selection: &Selection) -> Option<Self> {
        selection.first().map(|id| Self::InteractiveSsh {
            node_id: id.to_string(),
        })
    }

    /// Port-forward to the first selected node
    #[must_use]
    pub fn port_forward(selection: &Selection, remote_port: u16, local_port: u16) -> Option<Self> {
        selection.first().map(|id| Self::PortForward {
            node_id: id.to_string(),
            remote_port,
            local_port,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::InteractiveSsh { .. } => OperationKind::InteractiveSsh,
            Self::PortForward { .. } => OperationKind::PortForward,
            Self::RunCommands(_) => OperationKind::RunCommands,
            Self::InstallPublicKey { .. } => OperationKind::InstallPublicKey,
            Self::DeployOrHotfix { .. } => OperationKind::DeployOrHotfix,
        }
    }

    /// Map the operation to a dispatch batch or a session launch
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmptyCommandBatch`] if a recipe renders to nothing
    pub fn plan(&self) -> Result<Plan> {
        match self {
            Self::InteractiveSsh { node_id } => Ok(Plan::Session(SessionRequest::Shell {
                node_id: node_id.clone(),
            })),
            Self::PortForward {
                node_id,
                remote_port,
                local_port,
            } => Ok(Plan::Session(SessionRequest::PortForward {
                node_id: node_id.clone(),
                remote_port: *remote_port,
                local_port: *local_port,
            })),
            Self::RunCommands(batch) => Ok(Plan::Dispatch(batch.clone())),
            Self::InstallPublicKey { user, public_key } => {
                recipe::install_public_key(user, public_key).map(Plan::Dispatch)
            }
            Self::DeployOrHotfix { template, params } => {
                recipe::deploy(template, params).map(Plan::Dispatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_kinds_are_single_target() {
        assert!(OperationKind::InteractiveSsh.is_single_target());
        assert!(OperationKind::PortForward.is_single_target());
        assert!(!OperationKind::RunCommands.is_single_target());
        assert!(!OperationKind::DeployOrHotfix.is_single_target());
    }

    #[test]
    fn interactive_ssh_collapses_to_first_node() {
        let sel = Selection::new(["i-1", "i-2"]);
        let op = Operation::interactive_ssh(&sel).unwrap();
        assert_eq!(
            op.plan().unwrap(),
            Plan::Session(SessionRequest::Shell {
                node_id: "i-1".into()
            })
        );
    }

    #[test]
    fn port_forward_carries_ports() {
        let sel = Selection::new(["i-7"]);
        let op = Operation::port_forward(&sel, 22, 9999).unwrap();
        assert_eq!(op.kind(), OperationKind::PortForward);
        assert_eq!(
            op.plan().unwrap(),
            Plan::Session(SessionRequest::PortForward {
                node_id: "i-7".into(),
                remote_port: 22,
                local_port: 9999,
            })
        );
    }

    #[test]
    fn empty_selection_has_no_session_target() {
        assert!(Operation::interactive_ssh(&Selection::default()).is_none());
    }

    #[test]
    fn run_commands_dispatches_batch_as_is() {
        let batch = CommandBatch::new(["echo hi"]).unwrap();
        let op = Operation::RunCommands(batch.clone());
        assert_eq!(op.plan().unwrap(), Plan::Dispatch(batch));
    }

    #[test]
    fn install_key_dispatches() {
        let op = Operation::InstallPublicKey {
            user: "deploy".into(),
            public_key: "ssh-rsa AAA".into(),
        };
        let Plan::Dispatch(batch) = op.plan().unwrap() else {
            panic!("expected dispatch");
        };
        assert!(batch.lines()[1].contains("/home/deploy/.ssh/authorized_keys"));
    }
}
