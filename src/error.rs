//! Error types for fleet dispatch

use thiserror::Error;

/// Result type alias for fleet dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while selecting, dispatching, or reporting
#[derive(Debug, Error)]
pub enum Error {
    /// No nodes were selected for the operation
    #[error("no nodes selected")]
    SelectionEmpty,

    /// The command batch had no runnable lines
    #[error("no commands to run")]
    EmptyCommandBatch,

    /// The job provider rejected the submit request
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// A job provider call failed after dispatch
    #[error("provider error: {0}")]
    Provider(String),

    /// Fetching stdout/stderr for one node failed
    #[error("detail query failed for {node_id}: {message}")]
    DetailQueryFailed { node_id: String, message: String },

    /// Node inventory lookup failed
    #[error("inventory error: {0}")]
    Inventory(String),

    /// Interactive session could not be started
    #[error("session error: {0}")]
    Session(String),

    /// Prompt UI failure
    #[error("prompt error: {0}")]
    Prompt(String),

    /// User interrupted the program
    #[error("interrupted")]
    Interrupted,

    /// User declined a confirmation prompt
    #[error("declined by user")]
    Declined,

    /// Reconciliation was cancelled by the caller
    #[error("reconciliation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error means the user asked to stop rather than something failing
    #[must_use]
    pub const fn is_user_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Declined)
    }
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                Self::Interrupted
            }
            dialoguer::Error::IO(e) => Self::Prompt(e.to_string()),
        }
    }
}
