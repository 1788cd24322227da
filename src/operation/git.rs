//! Local git checkout lookups used as deploy defaults

use tokio::process::Command;

/// Run `git <args>` and return trimmed stdout, or `None` on any failure
async fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().await.ok()?;
    if !output.status.success() {
        tracing::debug!(?args, "git lookup failed");
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// `remote.origin.url` of the current checkout
pub async fn remote_origin_url() -> Option<String> {
    git_output(&["config", "--get", "remote.origin.url"]).await
}

/// Name of the currently checked-out branch
pub async fn current_branch() -> Option<String> {
    git_output(&["rev-parse", "--abbrev-ref", "HEAD"]).await
}
