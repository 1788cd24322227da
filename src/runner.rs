//! One invocation of the tool, from operation choice to final report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::dispatch::DispatchEngine;
use crate::nodes::{NodeRegistry, Selection};
use crate::operation::{CommandBatch, DeployParams, Operation, OperationKind, Plan, git};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::prompt::Prompter;
use crate::provider::JobProvider;
use crate::reconcile::StatusReconciler;
use crate::report::{Report, ResultAggregator};
use crate::session::SessionLauncher;
use crate::{Error, Result};

/// Non-interactive inputs, usually from CLI flags or piped stdin
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Node names to target instead of prompting
    pub instances: Option<Vec<String>>,
    /// Commands to run; implies the run-commands operation and skips the start gate
    pub commands: Option<CommandBatch>,
    /// Branch or tag to deploy
    pub deploy_ref: Option<String>,
    pub repo_url: Option<String>,
    /// Public key to install
    pub key_file: Option<PathBuf>,
    /// User to install the key for
    pub user: Option<String>,
}

/// How a run ended
#[derive(Debug)]
pub enum Outcome {
    /// User picked "Exit"
    Exited,
    /// Session launcher returned control (only non-replacing launchers do)
    SessionEnded,
    /// A job ran to the end of reconciliation
    Reported(Report),
}

/// Wires selection, dispatch, reconciliation, and reporting together
pub struct Runner<'a, S: ProgressSink> {
    config: &'a Config,
    registry: &'a NodeRegistry,
    provider: Arc<dyn JobProvider>,
    launcher: &'a dyn SessionLauncher,
    prompter: &'a dyn Prompter,
    progress: ProgressReporter<S>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, S: ProgressSink> Runner<'a, S> {
    pub fn new(
        config: &'a Config,
        registry: &'a NodeRegistry,
        provider: Arc<dyn JobProvider>,
        launcher: &'a dyn SessionLauncher,
        prompter: &'a dyn Prompter,
        sink: S,
    ) -> Self {
        Self {
            config,
            registry,
            provider,
            launcher,
            prompter,
            progress: ProgressReporter::new(sink),
            cancel: None,
        }
    }

    /// Abort reconciliation once `cancel` turns true
    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Progress of the last dispatched job
    #[must_use]
    pub const fn progress(&self) -> &ProgressReporter<S> {
        &self.progress
    }

    /// Run once
    ///
    /// # Errors
    ///
    /// Fails fast on anything before dispatch ([`Error::SelectionEmpty`],
    /// prompt errors, user cancellation) and on [`Error::DispatchFailed`].
    /// Per-node failures after dispatch end up in the report instead.
    pub async fn run(&mut self, options: &RunOptions) -> Result<Outcome> {
        let kind = if options.commands.is_some() {
            OperationKind::RunCommands
        } else {
            self.prompter.choose_operation()?
        };

        if kind == OperationKind::Exit {
            return Ok(Outcome::Exited);
        }

        let selection = self.select(kind, options)?;
        if selection.is_empty() {
            return Err(Error::SelectionEmpty);
        }
        tracing::debug!(operation = ?kind, nodes = ?selection.ids(), "selection made");

        let operation = self.build_operation(kind, &selection, options).await?;
        tracing::info!(operation = %operation.kind(), nodes = selection.len(), "running operation");

        match operation.plan()? {
            Plan::Session(request) => {
                self.launcher.launch(&request)?;
                Ok(Outcome::SessionEnded)
            }
            Plan::Dispatch(batch) => {
                if options.commands.is_none() {
                    println!();
                    self.prompter
                        .keypress_gate("Press any key to start", self.config.prompt.keypress_timeout)?;
                }
                self.dispatch(&selection, &batch).await.map(Outcome::Reported)
            }
        }
    }

    /// Submit, reconcile, and collect the report for one batch
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatchFailed`] if submission is rejected, or
    /// [`Error::Cancelled`] if the cancel signal fires while polling
    pub async fn dispatch(&mut self, selection: &Selection, batch: &CommandBatch) -> Result<Report> {
        let engine = DispatchEngine::new(Arc::clone(&self.provider));
        let job = engine.submit(selection, batch).await?;

        self.progress.start(&job.selection, self.registry);

        let mut reconciler =
            StatusReconciler::new(Arc::clone(&self.provider), self.registry, self.config.poll.clone());
        if let Some(cancel) = &self.cancel {
            reconciler = reconciler.with_cancel(cancel.clone());
        }

        let progress = &mut self.progress;
        let reconciliation = reconciler.run(&job, |snapshot| progress.observe(snapshot)).await?;

        let aggregator = ResultAggregator::new(Arc::clone(&self.provider));
        Ok(aggregator.collect(&job, &reconciliation, self.registry).await)
    }

    fn select(&self, kind: OperationKind, options: &RunOptions) -> Result<Selection> {
        let selection = match &options.instances {
            Some(names) => self.registry.select_by_names(names),
            None => self
                .prompter
                .select_nodes(self.registry.nodes(), kind.is_single_target())?,
        };
        Ok(selection)
    }

    async fn build_operation(
        &self,
        kind: OperationKind,
        selection: &Selection,
        options: &RunOptions,
    ) -> Result<Operation> {
        let operation = match kind {
            OperationKind::InteractiveSsh => Operation::interactive_ssh(selection),
            OperationKind::PortForward => Operation::port_forward(
                selection,
                self.config.session.remote_port,
                self.config.session.local_port,
            ),
            OperationKind::RunCommands => {
                let batch = match &options.commands {
                    Some(batch) => batch.clone(),
                    None => CommandBatch::from_text(&self.prompter.multiline("Enter commands")?)?,
                };
                Some(Operation::RunCommands(batch))
            }
            OperationKind::InstallPublicKey => {
                let public_key = self.public_key(options).await?;
                let user = self.key_user(options)?;
                Some(Operation::InstallPublicKey { user, public_key })
            }
            OperationKind::DeployOrHotfix => Some(self.deploy(selection, options).await?),
            OperationKind::Exit => None,
        };

        operation.ok_or(Error::SelectionEmpty)
    }

    async fn public_key(&self, options: &RunOptions) -> Result<String> {
        if let Some(path) = &options.key_file {
            return Ok(tokio::fs::read_to_string(path).await?);
        }

        let default = self.config.prompt.default_key_path.display().to_string();
        loop {
            let path = self.prompter.input("Path of public key", &default)?;
            if Path::new(&path).is_file() {
                return Ok(tokio::fs::read_to_string(&path).await?);
            }
            eprintln!("Invalid path to public key");
        }
    }

    fn key_user(&self, options: &RunOptions) -> Result<String> {
        if let Some(user) = &options.user {
            return Ok(user.clone());
        }

        loop {
            let user = self
                .prompter
                .input("User to install for", &self.config.prompt.default_user)?;
            let user = user.trim();
            if !user.is_empty() {
                return Ok(user.to_string());
            }
            eprintln!("Invalid user");
        }
    }

    async fn deploy(&self, selection: &Selection, options: &RunOptions) -> Result<Operation> {
        let version = match &options.deploy_ref {
            Some(v) => v.clone(),
            None => {
                let branch = git::current_branch().await.unwrap_or_default();
                self.prompter.input("Version to deploy", &branch)?
            }
        };

        let repo_url = match &options.repo_url {
            Some(url) => url.clone(),
            None => match git::remote_origin_url().await {
                Some(url) => url,
                None => self.prompter.input("Repository URL", "")?,
            },
        };

        if version.trim().is_empty() || repo_url.trim().is_empty() {
            return Err(Error::Config("deploy needs a version and a repository URL".to_string()));
        }

        let prompt = format!("Deploy {version} to {} node(s)?", selection.len());
        if !self.prompter.confirm(&prompt, true)? {
            return Err(Error::Declined);
        }

        Ok(Operation::DeployOrHotfix {
            template: self.config.deploy.commands.clone(),
            params: DeployParams::new(version.trim(), repo_url.trim()),
        })
    }
}
