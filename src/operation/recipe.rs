//! Command recipes for the built-in operations

use super::batch::CommandBatch;
use crate::Result;

/// Quote a string for a POSIX shell using single quotes
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Append a public key to a user's `authorized_keys`
///
/// # Errors
///
/// Returns error if the resulting batch would be empty (never in practice)
pub fn install_public_key(user: &str, public_key: &str) -> Result<CommandBatch> {
    let key = public_key.trim();
    let home = format!("/home/{user}/.ssh");
    CommandBatch::new([
        format!("sudo -u {user} mkdir -p {home}"),
        format!(
            "echo {} | sudo -u {user} tee -a {home}/authorized_keys > /dev/null",
            shell_quote(key)
        ),
    ])
}

/// Deploy parameters substituted into the recipe template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployParams {
    /// Branch, tag, or commit to check out
    pub version: String,
    pub repo_url: String,
    /// Fresh directory name for this deploy
    pub deploy_dir: String,
}

impl DeployParams {
    /// Use `deploy-<unix seconds>` as the deploy directory
    #[must_use]
    pub fn new(version: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            repo_url: repo_url.into(),
            deploy_dir: format!("deploy-{}", chrono::Utc::now().timestamp()),
        }
    }
}

/// Render the deploy template
///
/// `{version}` and `{repo_url}` are shell-quoted on substitution.
///
/// # Errors
///
/// Returns error if the template has no non-blank lines
pub fn deploy(template: &[String], params: &DeployParams) -> Result<CommandBatch> {
    let version = shell_quote(&params.version);
    let repo_url = shell_quote(&params.repo_url);
    CommandBatch::new(template.iter().map(|line| {
        line.replace("{version}", &version)
            .replace("{repo_url}", &repo_url)
            .replace("{deploy_dir}", &params.deploy_dir)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("plain"), "'plain'");
    }

    #[test]
    fn install_key_targets_user_home() {
        let batch = install_public_key("ubuntu", "ssh-ed25519 AAAA me@host\n").unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.lines()[1],
            "echo 'ssh-ed25519 AAAA me@host' | sudo -u ubuntu tee -a /home/ubuntu/.ssh/authorized_keys > /dev/null"
        );
    }

    #[test]
    fn deploy_substitutes_placeholders() {
        let template = vec![
            "git clone {repo_url} {deploy_dir}".to_string(),
            "cd {deploy_dir} && git checkout {version}".to_string(),
        ];
        let params = DeployParams {
            version: "v1.2".into(),
            repo_url: "git@example.com:app.git".into(),
            deploy_dir: "deploy-1".into(),
        };
        let batch = deploy(&template, &params).unwrap();
        assert_eq!(
            batch.lines(),
            [
                "git clone 'git@example.com:app.git' deploy-1",
                "cd deploy-1 && git checkout 'v1.2'"
            ]
        );
    }

    #[test]
    fn deploy_values_cannot_break_out_of_the_line() {
        let template = vec!["git checkout {version}".to_string()];
        let params = DeployParams {
            version: "main; rm -rf /".into(),
            repo_url: "repo".into(),
            deploy_dir: "deploy-1".into(),
        };
        let batch = deploy(&template, &params).unwrap();
        assert_eq!(batch.lines(), ["git checkout 'main; rm -rf /'"]);
    }

    #[test]
    fn deploy_dir_is_timestamped() {
        let params = DeployParams::new("main", "repo");
        assert!(params.deploy_dir.starts_with("deploy-"));
    }
}
