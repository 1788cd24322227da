//! Job submission

use std::sync::Arc;

use crate::nodes::Selection;
use crate::operation::CommandBatch;
use crate::provider::JobProvider;
use crate::{Error, Result};

/// A submitted job; immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub selection: Selection,
}

/// Submits command batches as one remote job per run
pub struct DispatchEngine {
    provider: Arc<dyn JobProvider>,
}

impl DispatchEngine {
    #[must_use]
    pub fn new(provider: Arc<dyn JobProvider>) -> Self {
        Self { provider }
    }

    /// Submit `batch` to run sequentially on every node in `selection`
    ///
    /// Issues exactly one provider request; there is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelectionEmpty`] without contacting the provider if
    /// nothing is selected, and [`Error::DispatchFailed`] if the provider
    /// rejects the request
    pub async fn submit(&self, selection: &Selection, batch: &CommandBatch) -> Result<Job> {
        if selection.is_empty() {
            return Err(Error::SelectionEmpty);
        }

        tracing::info!(
            nodes = selection.len(),
            commands = batch.len(),
            "dispatching command batch"
        );

        let id = self
            .provider
            .submit(selection.ids(), batch.lines())
            .await
            .map_err(|e| match e {
                Error::DispatchFailed(msg) => Error::DispatchFailed(msg),
                other => Error::DispatchFailed(other.to_string()),
            })?;

        tracing::info!(job_id = %id, "job submitted");

        Ok(Job {
            id,
            selection: selection.clone(),
        })
    }
}
