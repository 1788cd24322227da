//! Remote job execution provider
//!
//! The provider runs a command batch on a set of nodes and reports one
//! invocation per node. This crate only submits and observes; it never
//! mutates invocation state.

pub mod aws;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use aws::AwsCliProvider;

/// Status of one node's invocation as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvocationStatus {
    Pending,
    InProgress,
    Success,
    Cancelled,
    TimedOut,
    Failed,
    /// Any other value; always terminal
    Other(String),
}

impl InvocationStatus {
    /// Only `Pending` and `InProgress` are non-terminal
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InProgress)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Literal status string as the provider spells it
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Success => "Success",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
            Self::Failed => "Failed",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for InvocationStatus {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "InProgress" => Self::InProgress,
            "Success" => Self::Success,
            "Cancelled" => Self::Cancelled,
            "TimedOut" => Self::TimedOut,
            "Failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for InvocationStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<InvocationStatus> for String {
    fn from(status: InvocationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a job's invocation list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSummary {
    pub node_id: String,
    pub status: InvocationStatus,
}

impl InvocationSummary {
    #[must_use]
    pub fn new(node_id: impl Into<String>, status: impl Into<InvocationStatus>) -> Self {
        Self {
            node_id: node_id.into(),
            status: status.into(),
        }
    }
}

/// Final status and captured output of one node's invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationDetail {
    pub status: Option<InvocationStatus>,
    pub stdout: String,
    pub stderr: String,
}

/// External job execution and status service
#[async_trait]
pub trait JobProvider: Send + Sync {
    /// Submit `commands` to run sequentially on every node in `node_ids`
    ///
    /// Returns the provider-issued job id. Rejections map to
    /// [`crate::Error::DispatchFailed`].
    async fn submit(&self, node_ids: &[String], commands: &[String]) -> Result<String>;

    /// List the per-node invocations of a job, in provider order
    async fn list_invocations(&self, job_id: &str) -> Result<Vec<InvocationSummary>>;

    /// Fetch status and captured output for one node
    async fn get_invocation_detail(&self, job_id: &str, node_id: &str)
        -> Result<InvocationDetail>;
}
