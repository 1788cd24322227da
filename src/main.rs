use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use fleet_dispatch::report::render;
use fleet_dispatch::{
    AwsCliProvider, AwsSessionLauncher, CommandBatch, Config, DialoguerPrompter, Error,
    NodeRegistry, Outcome, RunOptions, Runner, TerminalProgress,
};

/// Exit code for a user interrupt
const EXIT_INTERRUPTED: u8 = 130;

/// Fleet - run commands and sessions across managed nodes
#[derive(Parser)]
#[command(name = "fleet", version, about)]
struct Cli {
    /// Node name(s), comma-separated (e.g. "prod-web,prod-worker")
    #[arg(short, long, value_delimiter = ',')]
    instances: Option<Vec<String>>,

    /// Command(s) to run; repeat the flag or separate lines with newlines.
    /// Commands can also be piped in on stdin.
    #[arg(short, long)]
    commands: Vec<String>,

    /// Branch or tag to deploy
    #[arg(long = "ref", value_name = "REF")]
    deploy_ref: Option<String>,

    /// Repository URL to deploy from (defaults to this checkout's origin)
    #[arg(long)]
    repo_url: Option<String>,

    /// Public key file to install
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// User to install the public key for
    #[arg(long)]
    user: Option<String>,

    /// Seconds between status queries
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: Option<u64>,

    /// Stop waiting for results after this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_wait: Option<u64>,

    /// AWS profile
    #[arg(long)]
    profile: Option<String>,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,fleet_dispatch=info",
        1 => "warn,fleet_dispatch=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n\n{}", "Operation canceled".red());
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::SelectionEmpty) => {
                println!("No nodes selected");
                ExitCode::SUCCESS
            }
            Some(Error::Interrupted) => {
                eprintln!("\n\n{}", "Operation canceled".red());
                ExitCode::from(EXIT_INTERRUPTED)
            }
            Some(Error::Declined) => {
                println!("{}", "Operation canceled".red());
                ExitCode::SUCCESS
            }
            _ => {
                tracing::error!("fatal: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_flags(&mut config, &cli);
    config.aws.resolve_cli()?;
    tracing::debug!(?config, "loaded configuration");

    let options = run_options(&cli)?;

    let provider = Arc::new(AwsCliProvider::new(config.aws.clone()));
    let registry = NodeRegistry::discover(provider.as_ref()).await?;
    if registry.is_empty() {
        anyhow::bail!("no managed nodes found");
    }

    let launcher = AwsSessionLauncher::new(config.aws.clone());
    let prompter = DialoguerPrompter;

    let mut runner = Runner::new(
        &config,
        &registry,
        provider,
        &launcher,
        &prompter,
        TerminalProgress::stdout(),
    );

    match runner.run(&options).await? {
        Outcome::Exited | Outcome::SessionEnded => {}
        Outcome::Reported(report) => {
            let mut stdout = std::io::stdout().lock();
            render(&report, &mut stdout)?;
        }
    }

    Ok(())
}

/// CLI flags win over file and environment settings
fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(secs) = cli.poll_interval {
        config.poll.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.max_wait {
        config.poll.max_wait = Some(Duration::from_secs(secs));
    }
    if let Some(profile) = &cli.profile {
        config.aws.profile = Some(profile.clone());
    }
    if let Some(region) = &cli.region {
        config.aws.region = Some(region.clone());
    }
}

/// Collect commands from flags and piped stdin
fn run_options(cli: &Cli) -> fleet_dispatch::Result<RunOptions> {
    let mut text = cli.commands.join("\n");

    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut piped = String::new();
        stdin.lock().read_to_string(&mut piped)?;
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&piped);
    }

    let commands = if text.trim().is_empty() {
        None
    } else {
        Some(CommandBatch::from_text(&text)?)
    };

    Ok(RunOptions {
        instances: cli.instances.clone(),
        commands,
        deploy_ref: cli.deploy_ref.clone(),
        repo_url: cli.repo_url.clone(),
        key_file: cli.key_file.clone(),
        user: cli.user.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_second_flags_are_rejected() {
        assert!(Cli::try_parse_from(["fleet", "--poll-interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["fleet", "--max-wait", "0"]).is_err());

        let cli = Cli::try_parse_from(["fleet", "--poll-interval", "2"]).unwrap();
        let mut config = Config::default();
        apply_flags(&mut config, &cli);
        assert_eq!(config.poll.interval, Duration::from_secs(2));
    }
}
