//! Final per-node report
//!
//! After reconciliation, each reported node gets one detail query for its
//! captured output. A failed query only affects that node's entry.

use std::io::{self, Write};
use std::sync::Arc;

use colored::Colorize;

use crate::Error;
use crate::dispatch::Job;
use crate::nodes::{Node, NodeRegistry};
use crate::provider::{InvocationDetail, InvocationStatus, JobProvider};
use crate::reconcile::{Completion, Reconciliation};

/// What is known about one node's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutput {
    /// Detail query succeeded
    Captured { stdout: String, stderr: String },
    /// Detail query failed
    Unavailable(String),
    /// The provider never reported this node
    NotReported,
}

/// One node's line in the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub node: Node,
    /// Status from the detail query, else from the last snapshot; `None` if never reported
    pub status: Option<InvocationStatus>,
    pub output: EntryOutput,
}

impl ReportEntry {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status.as_ref().is_some_and(InvocationStatus::is_success)
    }
}

/// Final report for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub job_id: String,
    pub completion: Completion,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.succeeded()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    #[must_use]
    pub fn entry(&self, node_id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.node.id == node_id)
    }
}

/// Collects final status and output for every node of a job
pub struct ResultAggregator {
    provider: Arc<dyn JobProvider>,
}

impl ResultAggregator {
    #[must_use]
    pub fn new(provider: Arc<dyn JobProvider>) -> Self {
        Self { provider }
    }

    /// Build the report: snapshot nodes in provider order, then nodes never reported
    pub async fn collect(
        &self,
        job: &Job,
        reconciliation: &Reconciliation,
        registry: &NodeRegistry,
    ) -> Report {
        let snapshot = &reconciliation.snapshot;
        let mut entries = Vec::with_capacity(job.selection.len());

        for invocation in &snapshot.invocations {
            let mut status = invocation.status.clone();
            let output = match self
                .provider
                .get_invocation_detail(&job.id, &invocation.node.id)
                .await
            {
                Ok(InvocationDetail {
                    status: detail_status,
                    stdout,
                    stderr,
                }) => {
                    if let Some(detail_status) = detail_status
                        && detail_status != status
                    {
                        tracing::debug!(
                            node_id = %invocation.node.id,
                            listed = %status,
                            detail = %detail_status,
                            "detail query reports a newer status"
                        );
                        status = detail_status;
                    }
                    EntryOutput::Captured { stdout, stderr }
                }
                Err(e) => {
                    let err = Error::DetailQueryFailed {
                        node_id: invocation.node.id.clone(),
                        message: e.to_string(),
                    };
                    tracing::warn!(job_id = %job.id, error = %err, "could not fetch output");
                    EntryOutput::Unavailable(e.to_string())
                }
            };

            entries.push(ReportEntry {
                node: invocation.node.clone(),
                status: Some(status),
                output,
            });
        }

        for id in &snapshot.missing {
            let node = registry
                .get(id)
                .cloned()
                .unwrap_or_else(|| Node::new(id.clone(), id.clone()));
            entries.push(ReportEntry {
                node,
                status: None,
                output: EntryOutput::NotReported,
            });
        }

        Report {
            job_id: job.id.clone(),
            completion: reconciliation.completion,
            entries,
        }
    }
}

/// Render a report for a terminal
///
/// # Errors
///
/// Returns error if writing to `out` fails
pub fn render<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    writeln!(out)?;

    for entry in &report.entries {
        let status = match &entry.status {
            Some(s) if s.is_success() => s.as_str().green(),
            Some(s) if s.is_terminal() => s.as_str().red(),
            Some(s) => format!("{s} (still running)").yellow(),
            None => "not reported".red(),
        };
        writeln!(out, "{}: {status}", entry.node.name.cyan())?;

        match &entry.output {
            EntryOutput::Captured { stdout, stderr } => {
                if !stdout.is_empty() {
                    writeln!(out, "{}", "STDOUT:".white().underline())?;
                    writeln!(out)?;
                    writeln!(out, "{}", stdout.trim_end().bright_white())?;
                }
                if !stderr.is_empty() {
                    writeln!(out, "{}", "STDERR:".red().underline())?;
                    writeln!(out)?;
                    writeln!(out, "{}", stderr.trim_end().bright_red())?;
                }
            }
            EntryOutput::Unavailable(message) => {
                writeln!(out, "{}", format!("could not fetch output: {message}").red())?;
            }
            EntryOutput::NotReported => {}
        }
    }

    writeln!(out)?;
    let summary = format!(
        "{} node(s): {} succeeded, {} failed",
        report.entries.len(),
        report.succeeded(),
        report.failed()
    );
    if report.completion == Completion::TimedOut {
        writeln!(out, "{summary} {}", "(stopped waiting)".yellow())?;
    } else {
        writeln!(out, "{summary}")?;
    }
    Ok(())
}
