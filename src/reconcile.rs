//! Status reconciliation
//!
//! Polls the job provider at a fixed interval until every selected node has
//! a terminal status. Each poll produces a [`Snapshot`] mapped onto the local
//! node registry.
//!
//! ```text
//!  sleep(interval) ──► list_invocations(job) ──► Snapshot ──► settled? ──► done
//!        ▲                                                      │ no
//!        └──────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt, stream};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::PollConfig;
use crate::dispatch::Job;
use crate::nodes::{Node, NodeRegistry, Selection};
use crate::provider::{InvocationStatus, InvocationSummary, JobProvider};
use crate::{Error, Result};

/// One node's invocation as seen in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub node: Node,
    pub status: InvocationStatus,
}

/// Result of one status query, mapped onto known nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// 1-based poll count; 0 for the placeholder built before any poll
    pub iteration: u32,
    /// Invocations for known nodes, in provider order
    pub invocations: Vec<Invocation>,
    /// Invocations whose node id is not in the registry
    pub unknown: Vec<InvocationSummary>,
    /// Invocations for known nodes outside the job's selection
    pub unselected: Vec<InvocationSummary>,
    /// Selected node ids the provider did not report
    pub missing: Vec<String>,
}

impl Snapshot {
    /// Map provider summaries onto the registry and the job's selection
    ///
    /// Only selected nodes become invocations. A node listed twice keeps its
    /// first position and its last status.
    #[must_use]
    pub fn build(
        iteration: u32,
        summaries: Vec<InvocationSummary>,
        registry: &NodeRegistry,
        selection: &Selection,
    ) -> Self {
        let mut invocations: Vec<Invocation> = Vec::with_capacity(summaries.len());
        let mut unknown = Vec::new();
        let mut unselected = Vec::new();

        for summary in summaries {
            let Some(node) = registry.get(&summary.node_id) else {
                unknown.push(summary);
                continue;
            };
            if !selection.contains(&node.id) {
                unselected.push(summary);
                continue;
            }

            match invocations.iter_mut().find(|inv| inv.node.id == node.id) {
                Some(existing) => existing.status = summary.status,
                None => invocations.push(Invocation {
                    node: node.clone(),
                    status: summary.status,
                }),
            }
        }

        let missing = selection
            .ids()
            .iter()
            .filter(|id| !invocations.iter().any(|inv| &inv.node.id == *id))
            .cloned()
            .collect();

        Self {
            iteration,
            invocations,
            unknown,
            unselected,
            missing,
        }
    }

    /// Placeholder used when no poll completed; every selected node is missing
    #[must_use]
    pub fn empty(selection: &Selection) -> Self {
        Self {
            iteration: 0,
            invocations: Vec::new(),
            unknown: Vec::new(),
            unselected: Vec::new(),
            missing: selection.ids().to_vec(),
        }
    }

    /// Every selected node reported, and none is `Pending` or `InProgress`
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.missing.is_empty() && self.invocations.iter().all(|i| i.status.is_terminal())
    }

    /// Latest status for a node id
    #[must_use]
    pub fn status_of(&self, node_id: &str) -> Option<&InvocationStatus> {
        self.invocations
            .iter()
            .find(|i| i.node.id == node_id)
            .map(|i| &i.status)
    }
}

/// How reconciliation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every node reached a terminal status
    Settled,
    /// `max_wait` elapsed first
    TimedOut,
}

/// Final state handed to the result aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: Snapshot,
    pub completion: Completion,
}

/// Polls a job until all of its nodes are terminal
pub struct StatusReconciler<'a> {
    provider: Arc<dyn JobProvider>,
    registry: &'a NodeRegistry,
    poll: PollConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a> StatusReconciler<'a> {
    #[must_use]
    pub fn new(provider: Arc<dyn JobProvider>, registry: &'a NodeRegistry, poll: PollConfig) -> Self {
        Self {
            provider,
            registry,
            poll,
            cancel: None,
        }
    }

    /// Abort polling once `cancel` turns true
    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Lazy stream of snapshots for `job`
    ///
    /// Ends after the first settled snapshot. A failed status query yields an
    /// error item and polling continues; cancellation yields
    /// [`Error::Cancelled`] and ends the stream.
    pub fn snapshots<'s>(&'s self, job: &'s Job) -> impl Stream<Item = Result<Snapshot>> + 's {
        let init = PollState {
            iteration: 0,
            done: false,
            cancel: self.cancel.clone(),
        };

        stream::unfold(init, move |mut state| async move {
            if state.done {
                return None;
            }

            if sleep_or_cancel(self.poll.interval, state.cancel.as_mut()).await {
                tracing::info!(job_id = %job.id, "reconciliation cancelled");
                state.done = true;
                return Some((Err(Error::Cancelled), state));
            }

            state.iteration += 1;
            match self.provider.list_invocations(&job.id).await {
                Ok(summaries) => {
                    let snapshot =
                        Snapshot::build(state.iteration, summaries, self.registry, &job.selection);
                    log_snapshot(&job.id, &snapshot);
                    state.done = snapshot.is_settled();
                    Some((Ok(snapshot), state))
                }
                Err(e) => Some((Err(e), state)),
            }
        })
    }

    /// Drive the snapshot stream to completion, feeding each snapshot to `on_snapshot`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the cancel signal fires. Failed status
    /// queries are logged and do not end reconciliation.
    pub async fn run<F>(&self, job: &Job, mut on_snapshot: F) -> Result<Reconciliation>
    where
        F: FnMut(&Snapshot),
    {
        let deadline = self.poll.max_wait.map(|wait| Instant::now() + wait);
        let snapshots = self.snapshots(job);
        futures::pin_mut!(snapshots);

        let mut last: Option<Snapshot> = None;

        loop {
            let next = match deadline {
                Some(deadline) => {
                    if let Ok(item) = tokio::time::timeout_at(deadline, snapshots.next()).await {
                        item
                    } else {
                        tracing::warn!(
                            job_id = %job.id,
                            max_wait = ?self.poll.max_wait,
                            "gave up waiting for terminal statuses"
                        );
                        return Ok(Reconciliation {
                            snapshot: last.unwrap_or_else(|| Snapshot::empty(&job.selection)),
                            completion: Completion::TimedOut,
                        });
                    }
                }
                None => snapshots.next().await,
            };

            match next {
                Some(Ok(snapshot)) => {
                    on_snapshot(&snapshot);
                    let settled = snapshot.is_settled();
                    last = Some(snapshot);
                    if settled {
                        break;
                    }
                }
                Some(Err(Error::Cancelled)) => return Err(Error::Cancelled),
                Some(Err(e)) => {
                    tracing::warn!(job_id = %job.id, error = %e, "status query failed, polling again");
                }
                None => break,
            }
        }

        Ok(Reconciliation {
            snapshot: last.unwrap_or_else(|| Snapshot::empty(&job.selection)),
            completion: Completion::Settled,
        })
    }
}

struct PollState {
    iteration: u32,
    done: bool,
    cancel: Option<watch::Receiver<bool>>,
}

/// Sleep for `interval`; returns true if cancelled first
async fn sleep_or_cancel(interval: Duration, cancel: Option<&mut watch::Receiver<bool>>) -> bool {
    let Some(rx) = cancel else {
        tokio::time::sleep(interval).await;
        return false;
    };

    if *rx.borrow() {
        return true;
    }

    tokio::select! {
        () = tokio::time::sleep(interval) => false,
        Ok(_) = rx.wait_for(|cancelled| *cancelled) => true,
    }
}

fn log_snapshot(job_id: &str, snapshot: &Snapshot) {
    for summary in &snapshot.unknown {
        tracing::warn!(
            job_id = %job_id,
            node_id = %summary.node_id,
            status = %summary.status,
            "invocation for unknown node, skipping"
        );
    }

    for summary in &snapshot.unselected {
        tracing::warn!(
            job_id = %job_id,
            node_id = %summary.node_id,
            status = %summary.status,
            "invocation for node outside the selection, skipping"
        );
    }

    if !snapshot.missing.is_empty() {
        tracing::warn!(
            job_id = %job_id,
            iteration = snapshot.iteration,
            missing = ?snapshot.missing,
            "selected nodes not reported yet"
        );
    }

    tracing::debug!(
        job_id = %job_id,
        iteration = snapshot.iteration,
        reported = snapshot.invocations.len(),
        settled = snapshot.is_settled(),
        "status snapshot"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NodeRegistry {
        NodeRegistry::from_nodes(vec![Node::new("a", "i-a"), Node::new("b", "i-b")])
    }

    #[test]
    fn build_splits_known_unknown_and_missing() {
        let reg = registry();
        let sel = Selection::new(["i-a", "i-b"]);
        let snap = Snapshot::build(
            1,
            vec![
                InvocationSummary::new("i-x", "Success"),
                InvocationSummary::new("i-a", "Success"),
            ],
            &reg,
            &sel,
        );

        assert_eq!(snap.invocations.len(), 1);
        assert_eq!(snap.invocations[0].node.name, "a");
        assert_eq!(snap.unknown[0].node_id, "i-x");
        assert_eq!(snap.missing, ["i-b"]);
        assert!(!snap.is_settled());
    }

    #[test]
    fn settled_requires_all_terminal() {
        let reg = registry();
        let sel = Selection::new(["i-a", "i-b"]);
        let live = Snapshot::build(
            1,
            vec![
                InvocationSummary::new("i-a", "Pending"),
                InvocationSummary::new("i-b", "Failed"),
            ],
            &reg,
            &sel,
        );
        assert!(!live.is_settled());

        let done = Snapshot::build(
            2,
            vec![
                InvocationSummary::new("i-a", "Cancelled"),
                InvocationSummary::new("i-b", "Failed"),
            ],
            &reg,
            &sel,
        );
        assert!(done.is_settled());
        assert_eq!(done.status_of("i-a"), Some(&InvocationStatus::Cancelled));
    }

    #[test]
    fn known_but_unselected_nodes_are_set_aside() {
        let reg = registry();
        let sel = Selection::new(["i-a"]);
        let snap = Snapshot::build(
            1,
            vec![
                InvocationSummary::new("i-a", "Success"),
                InvocationSummary::new("i-b", "InProgress"),
            ],
            &reg,
            &sel,
        );

        assert_eq!(snap.invocations.len(), 1);
        assert_eq!(snap.unselected[0].node_id, "i-b");
        assert!(snap.unknown.is_empty());
        assert!(snap.is_settled());
    }

    #[test]
    fn repeated_node_keeps_first_position_and_last_status() {
        let reg = registry();
        let sel = Selection::new(["i-a", "i-b"]);
        let snap = Snapshot::build(
            1,
            vec![
                InvocationSummary::new("i-b", "InProgress"),
                InvocationSummary::new("i-a", "Success"),
                InvocationSummary::new("i-b", "Failed"),
            ],
            &reg,
            &sel,
        );

        let ids: Vec<_> = snap.invocations.iter().map(|i| i.node.id.as_str()).collect();
        assert_eq!(ids, ["i-b", "i-a"]);
        assert_eq!(snap.status_of("i-b"), Some(&InvocationStatus::Failed));
        assert!(snap.is_settled());
    }

    #[test]
    fn empty_snapshot_marks_all_missing() {
        let snap = Snapshot::empty(&Selection::new(["i-a", "i-b"]));
        assert_eq!(snap.missing.len(), 2);
        assert!(!snap.is_settled());
    }

    #[tokio::test]
    async fn sleep_without_cancel_is_not_cancelled() {
        assert!(!sleep_or_cancel(Duration::from_millis(1), None).await);
    }

    #[tokio::test]
    async fn sleep_sees_prior_cancel() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(sleep_or_cancel(Duration::from_secs(60), Some(&mut rx)).await);
    }

    #[tokio::test]
    async fn dropped_sender_does_not_cancel() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(!sleep_or_cancel(Duration::from_millis(1), Some(&mut rx)).await);
    }
}
