//! Live per-node progress
//!
//! Progress lives in a side-table keyed by node id. Transitions only go from
//! running to a terminal state; terminal states never change again.

use std::collections::BTreeMap;
use std::io::Write;

use colored::Colorize;

use crate::nodes::{Node, NodeRegistry, Selection};
use crate::reconcile::{Invocation, Snapshot};

/// Display state of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressState {
    Running,
    Succeeded,
    /// Terminal non-success; carries the literal provider status
    Failed(String),
}

impl ProgressState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Renders progress transitions
pub trait ProgressSink {
    /// A node started running
    fn started(&mut self, node: &Node);

    /// A node reached a terminal state
    fn finished(&mut self, node: &Node, state: &ProgressState);
}

/// Sink that renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn started(&mut self, _node: &Node) {}

    fn finished(&mut self, _node: &Node, _state: &ProgressState) {}
}

/// Prints one colored line per node as it starts and finishes
///
/// Write errors never interrupt reconciliation; the first one is logged.
pub struct TerminalProgress<W: Write> {
    out: W,
    write_failed: bool,
}

impl<W: Write> TerminalProgress<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out,
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        let result = writeln!(self.out, "{line}").and_then(|()| self.out.flush());
        if let Err(e) = result
            && !self.write_failed
        {
            self.write_failed = true;
            tracing::debug!(error = %e, "failed to write progress line");
        }
    }
}

impl TerminalProgress<std::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ProgressSink for TerminalProgress<W> {
    fn started(&mut self, node: &Node) {
        self.emit(&format!("[{}] {}", "…".yellow(), node.name.cyan()));
    }

    fn finished(&mut self, node: &Node, state: &ProgressState) {
        let line = match state {
            ProgressState::Running => return,
            ProgressState::Succeeded => format!("[{}] {}", "✔".green(), node.name.cyan()),
            ProgressState::Failed(reason) => {
                format!("[{}] {} {}", "✖".red(), node.name.cyan(), reason.red())
            }
        };
        self.emit(&line);
    }
}

/// Tracks and renders per-node progress for one job
pub struct ProgressReporter<S: ProgressSink> {
    states: BTreeMap<String, ProgressState>,
    sink: S,
}

impl<S: ProgressSink> ProgressReporter<S> {
    pub const fn new(sink: S) -> Self {
        Self {
            states: BTreeMap::new(),
            sink,
        }
    }

    /// Mark every selected node as running
    pub fn start(&mut self, selection: &Selection, registry: &NodeRegistry) {
        for id in selection.ids() {
            self.states.insert(id.clone(), ProgressState::Running);
            let node = registry
                .get(id)
                .cloned()
                .unwrap_or_else(|| Node::new(id.clone(), id.clone()));
            self.sink.started(&node);
        }
    }

    /// Apply one invocation; returns true if the node's state changed
    pub fn on_invocation(&mut self, invocation: &Invocation) -> bool {
        let Some(current) = self.states.get_mut(&invocation.node.id) else {
            tracing::debug!(node_id = %invocation.node.id, "invocation for unselected node");
            return false;
        };

        if current.is_terminal() || !invocation.status.is_terminal() {
            return false;
        }

        let next = if invocation.status.is_success() {
            ProgressState::Succeeded
        } else {
            ProgressState::Failed(invocation.status.to_string())
        };

        self.sink.finished(&invocation.node, &next);
        *current = next;
        true
    }

    /// Apply every invocation of a snapshot, in order
    pub fn observe(&mut self, snapshot: &Snapshot) {
        for invocation in &snapshot.invocations {
            self.on_invocation(invocation);
        }
    }

    #[must_use]
    pub fn state(&self, node_id: &str) -> Option<&ProgressState> {
        self.states.get(node_id)
    }

    #[must_use]
    pub const fn states(&self) -> &BTreeMap<String, ProgressState> {
        &self.states
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
