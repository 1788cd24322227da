//! Fleet dispatch - run commands and sessions across managed nodes
//!
//! This library provides the dispatch and status-reconciliation engine
//! behind the `fleet` CLI:
//! - Node inventory snapshot and selection
//! - One-shot job submission to a remote execution provider
//! - Fixed-interval status polling until every node is terminal
//! - Live per-node progress and a final report with captured output
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   selection   ┌──────────────┐   job id   ┌──────────────────┐
//! │ NodeRegistry │──────────────►│DispatchEngine│───────────►│ StatusReconciler │
//! └──────────────┘               └──────────────┘            └────────┬─────────┘
//!                                                       snapshots     │
//!                                      ┌──────────────────────────────┤
//!                                      ▼                              ▼ final
//!                              ┌──────────────────┐         ┌──────────────────┐
//!                              │ ProgressReporter │         │ ResultAggregator │
//!                              └──────────────────┘         └──────────────────┘
//! ```
//!
//! Interactive sessions (SSH, port forwarding) bypass the pipeline and
//! replace the process with the provider's session tool.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod nodes;
pub mod operation;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod session;

pub use config::Config;
pub use dispatch::{DispatchEngine, Job};
pub use error::{Error, Result};
pub use nodes::{Node, NodeInventory, NodeRegistry, Selection};
pub use operation::{CommandBatch, Operation, OperationKind, Plan};
pub use progress::{NullProgress, ProgressReporter, ProgressSink, ProgressState, TerminalProgress};
pub use prompt::{DialoguerPrompter, Prompter};
pub use provider::{AwsCliProvider, InvocationDetail, InvocationStatus, InvocationSummary, JobProvider};
pub use reconcile::{Completion, Invocation, Reconciliation, Snapshot, StatusReconciler};
pub use report::{EntryOutput, Report, ReportEntry, ResultAggregator};
pub use runner::{Outcome, RunOptions, Runner};
pub use session::{AwsSessionLauncher, SessionLauncher, SessionRequest};
