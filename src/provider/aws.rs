//! AWS Systems Manager adapter
//!
//! Drives the `aws` CLI and parses its JSON output. Covers both the job
//! provider (`ssm send-command` and friends) and the node inventory
//! (`ssm describe-instance-information` + `ec2 describe-instances`).

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{InvocationDetail, InvocationStatus, InvocationSummary, JobProvider};
use crate::config::AwsConfig;
use crate::nodes::{Node, NodeInventory};
use crate::{Error, Result};

/// Tag holding a node's display name
const NAME_TAG: &str = "Name";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendCommandResponse {
    command: SentCommand,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentCommand {
    command_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListInvocationsResponse {
    #[serde(default)]
    command_invocations: Vec<CommandInvocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandInvocation {
    instance_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetInvocationResponse {
    status: Option<String>,
    #[serde(default)]
    standard_output_content: String,
    #[serde(default)]
    standard_error_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInformationResponse {
    #[serde(default)]
    instance_information_list: Vec<InstanceInformation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInformation {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_id: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

/// Job provider and node inventory backed by the `aws` CLI
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    config: AwsConfig,
}

impl AwsCliProvider {
    #[must_use]
    pub const fn new(config: AwsConfig) -> Self {
        Self { config }
    }

    /// Arguments shared by every invocation: JSON output plus profile/region
    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--output".to_string(), "json".to_string()];
        if let Some(profile) = &self.config.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if let Some(region) = &self.config.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args
    }

    /// Run the CLI and deserialize stdout
    ///
    /// Errors are returned as the CLI's own message so callers can wrap them
    /// in the variant that fits the call site
    async fn run_json<T: DeserializeOwned>(&self, args: Vec<String>) -> std::result::Result<T, String> {
        let mut full = self.base_args();
        full.extend(args);

        tracing::debug!(cli = %self.config.cli_path.display(), args = ?full, "running aws cli");

        let output = Command::new(&self.config.cli_path)
            .args(&full)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.config.cli_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.is_empty() {
                let code = output.status.code().unwrap_or(-1);
                return Err(format!("aws cli exited with code {code}"));
            }
            return Err(stderr);
        }

        serde_json::from_slice(&output.stdout).map_err(|e| format!("unexpected aws cli output: {e}"))
    }
}

/// Arguments for `aws ssm send-command`
pub(crate) fn send_command_args(
    document_name: &str,
    node_ids: &[String],
    commands: &[String],
) -> Vec<String> {
    let parameters = serde_json::json!({ "commands": commands });

    let mut args = vec![
        "ssm".to_string(),
        "send-command".to_string(),
        "--document-name".to_string(),
        document_name.to_string(),
        "--instance-ids".to_string(),
    ];
    args.extend(node_ids.iter().cloned());
    args.push("--parameters".to_string());
    args.push(parameters.to_string());
    args
}

fn summaries_from(response: ListInvocationsResponse) -> Vec<InvocationSummary> {
    response
        .command_invocations
        .into_iter()
        .map(|ci| InvocationSummary::new(ci.instance_id, ci.status))
        .collect()
}

fn detail_from(response: GetInvocationResponse) -> InvocationDetail {
    InvocationDetail {
        status: response.status.map(InvocationStatus::from),
        stdout: response.standard_output_content,
        stderr: response.standard_error_content,
    }
}

/// Keep only instances that carry a `Name` tag
fn nodes_from(response: DescribeInstancesResponse) -> Vec<Node> {
    response
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .filter_map(|instance| {
            let name = instance
                .tags
                .into_iter()
                .find(|t| t.key == NAME_TAG)?
                .value;
            Some(Node::new(name, instance.instance_id))
        })
        .collect()
}

#[async_trait]
impl JobProvider for AwsCliProvider {
    async fn submit(&self, node_ids: &[String], commands: &[String]) -> Result<String> {
        let args = send_command_args(&self.config.document_name, node_ids, commands);
        let response: SendCommandResponse = self.run_json(args).await.map_err(Error::DispatchFailed)?;
        Ok(response.command.command_id)
    }

    async fn list_invocations(&self, job_id: &str) -> Result<Vec<InvocationSummary>> {
        let args = vec![
            "ssm".to_string(),
            "list-command-invocations".to_string(),
            "--command-id".to_string(),
            job_id.to_string(),
        ];
        let response: ListInvocationsResponse = self.run_json(args).await.map_err(Error::Provider)?;
        Ok(summaries_from(response))
    }

    async fn get_invocation_detail(&self, job_id: &str, node_id: &str) -> Result<InvocationDetail> {
        let args = vec![
            "ssm".to_string(),
            "get-command-invocation".to_string(),
            "--command-id".to_string(),
            job_id.to_string(),
            "--instance-id".to_string(),
            node_id.to_string(),
        ];
        let response: GetInvocationResponse = self.run_json(args).await.map_err(Error::Provider)?;
        Ok(detail_from(response))
    }
}

#[async_trait]
impl NodeInventory for AwsCliProvider {
    async fn list_managed_node_ids(&self) -> Result<Vec<String>> {
        let args = vec!["ssm".to_string(), "describe-instance-information".to_string()];
        let response: InstanceInformationResponse =
            self.run_json(args).await.map_err(Error::Inventory)?;
        Ok(response
            .instance_information_list
            .into_iter()
            .map(|i| i.instance_id)
            .collect())
    }

    async fn describe_nodes(&self, ids: &[String]) -> Result<Vec<Node>> {
        let mut args = vec![
            "ec2".to_string(),
            "describe-instances".to_string(),
            "--instance-ids".to_string(),
        ];
        args.extend(ids.iter().cloned());
        let response: DescribeInstancesResponse =
            self.run_json(args).await.map_err(Error::Inventory)?;
        Ok(nodes_from(response))
    }
}
