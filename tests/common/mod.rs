//! Shared test utilities: scripted provider, prompter, launcher, and progress sink

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fleet_dispatch::config::PollConfig;
use fleet_dispatch::{
    Config, Error, InvocationDetail, InvocationStatus, InvocationSummary, JobProvider, Node,
    NodeRegistry, OperationKind, ProgressSink, ProgressState, Prompter, Result, Selection,
    SessionLauncher, SessionRequest,
};

pub const JOB_ID: &str = "cmd-0001";

/// Three-node fleet: n1/i-1, n2/i-2, n3/i-3
#[must_use]
pub fn registry() -> NodeRegistry {
    NodeRegistry::from_nodes(vec![
        Node::new("n3", "i-3"),
        Node::new("n1", "i-1"),
        Node::new("n2", "i-2"),
    ])
}

/// Config that polls every millisecond
#[must_use]
pub fn fast_config() -> Config {
    Config {
        poll: PollConfig {
            interval: Duration::from_millis(1),
            max_wait: None,
        },
        ..Config::default()
    }
}

type Round = std::result::Result<Vec<InvocationSummary>, String>;

#[derive(Debug, Default)]
pub struct Calls {
    pub submits: Vec<(Vec<String>, Vec<String>)>,
    pub lists: u32,
    pub details: Vec<String>,
}

/// Job provider that replays scripted status rounds
///
/// Each list call consumes one round; once exhausted the last successful
/// round repeats.
#[derive(Default)]
pub struct ScriptedProvider {
    rounds: Mutex<VecDeque<Round>>,
    last: Mutex<Vec<InvocationSummary>>,
    details: HashMap<String, std::result::Result<InvocationDetail, String>>,
    submit_error: Option<String>,
    calls: Mutex<Calls>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn round(self, statuses: &[(&str, &str)]) -> Self {
        let round = statuses
            .iter()
            .map(|(id, status)| InvocationSummary::new(*id, *status))
            .collect();
        self.rounds.lock().unwrap().push_back(Ok(round));
        self
    }

    #[must_use]
    pub fn failing_round(self, message: &str) -> Self {
        self.rounds.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    #[must_use]
    pub fn detail(mut self, node_id: &str, stdout: &str, stderr: &str) -> Self {
        self.details.insert(
            node_id.to_string(),
            Ok(InvocationDetail {
                status: None,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        );
        self
    }

    #[must_use]
    pub fn detail_with_status(mut self, node_id: &str, status: &str, stdout: &str, stderr: &str) -> Self {
        self.details.insert(
            node_id.to_string(),
            Ok(InvocationDetail {
                status: Some(InvocationStatus::from(status)),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        );
        self
    }

    #[must_use]
    pub fn detail_error(mut self, node_id: &str, message: &str) -> Self {
        self.details.insert(node_id.to_string(), Err(message.to_string()));
        self
    }

    #[must_use]
    pub fn reject_submit(mut self, message: &str) -> Self {
        self.submit_error = Some(message.to_string());
        self
    }

    pub fn lists(&self) -> u32 {
        self.calls.lock().unwrap().lists
    }

    pub fn submits(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.calls.lock().unwrap().submits.clone()
    }

    pub fn details(&self) -> Vec<String> {
        self.calls.lock().unwrap().details.clone()
    }
}

#[async_trait]
impl JobProvider for ScriptedProvider {
    async fn submit(&self, node_ids: &[String], commands: &[String]) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .submits
            .push((node_ids.to_vec(), commands.to_vec()));

        match &self.submit_error {
            Some(message) => Err(Error::DispatchFailed(message.clone())),
            None => Ok(JOB_ID.to_string()),
        }
    }

    async fn list_invocations(&self, job_id: &str) -> Result<Vec<InvocationSummary>> {
        assert_eq!(job_id, JOB_ID);
        self.calls.lock().unwrap().lists += 1;

        let next = self.rounds.lock().unwrap().pop_front();
        match next {
            Some(Ok(round)) => {
                *self.last.lock().unwrap() = round.clone();
                Ok(round)
            }
            Some(Err(message)) => Err(Error::Provider(message)),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn get_invocation_detail(&self, job_id: &str, node_id: &str) -> Result<InvocationDetail> {
        assert_eq!(job_id, JOB_ID);
        self.calls.lock().unwrap().details.push(node_id.to_string());

        match self.details.get(node_id) {
            Some(Ok(detail)) => Ok(detail.clone()),
            Some(Err(message)) => Err(Error::Provider(message.clone())),
            None => Ok(InvocationDetail::default()),
        }
    }
}

/// Prompter with canned answers
pub struct ScriptedPrompter {
    pub operation: OperationKind,
    pub selection: Vec<String>,
    pub inputs: Mutex<VecDeque<String>>,
    pub multiline: String,
    pub confirm: bool,
    pub gates: Mutex<u32>,
    pub single_requested: Mutex<Option<bool>>,
}

impl ScriptedPrompter {
    #[must_use]
    pub fn new(operation: OperationKind, selection: &[&str]) -> Self {
        Self {
            operation,
            selection: selection.iter().map(ToString::to_string).collect(),
            inputs: Mutex::new(VecDeque::new()),
            multiline: String::new(),
            confirm: true,
            gates: Mutex::new(0),
            single_requested: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_inputs(self, inputs: &[&str]) -> Self {
        self.inputs
            .lock()
            .unwrap()
            .extend(inputs.iter().map(ToString::to_string));
        self
    }

    #[must_use]
    pub fn with_multiline(mut self, text: &str) -> Self {
        self.multiline = text.to_string();
        self
    }

    #[must_use]
    pub const fn declining(mut self) -> Self {
        self.confirm = false;
        self
    }

    pub fn gates(&self) -> u32 {
        *self.gates.lock().unwrap()
    }
}

impl Prompter for ScriptedPrompter {
    fn choose_operation(&self) -> Result<OperationKind> {
        Ok(self.operation)
    }

    fn select_nodes(&self, _nodes: &[Node], single: bool) -> Result<Selection> {
        *self.single_requested.lock().unwrap() = Some(single);
        Ok(Selection::new(self.selection.clone()))
    }

    fn input(&self, _prompt: &str, default: &str) -> Result<String> {
        Ok(self
            .inputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| default.to_string()))
    }

    fn multiline(&self, _prompt: &str) -> Result<String> {
        Ok(self.multiline.clone())
    }

    fn keypress_gate(&self, _message: &str, _timeout: Duration) -> Result<()> {
        *self.gates.lock().unwrap() += 1;
        Ok(())
    }

    fn confirm(&self, _prompt: &str, _default: bool) -> Result<bool> {
        Ok(self.confirm)
    }
}

/// Launcher that records requests and returns
#[derive(Default)]
pub struct RecordingLauncher {
    pub launched: Mutex<Vec<SessionRequest>>,
}

impl SessionLauncher for RecordingLauncher {
    fn launch(&self, request: &SessionRequest) -> Result<()> {
        self.launched.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Progress sink that records every transition
#[derive(Default)]
pub struct RecordingSink {
    pub started: Vec<String>,
    pub finished: Vec<(String, ProgressState)>,
}

impl ProgressSink for RecordingSink {
    fn started(&mut self, node: &Node) {
        self.started.push(node.id.clone());
    }

    fn finished(&mut self, node: &Node, state: &ProgressState) {
        self.finished.push((node.id.clone(), state.clone()));
    }
}

/// Shorthand for a parsed status
#[must_use]
pub fn status(s: &str) -> InvocationStatus {
    InvocationStatus::from(s)
}
