//! Interactive prompts
//!
//! Every call blocks until the user answers. Interrupts surface as
//! [`Error::Interrupted`].

use std::io::Write;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dialoguer::{Confirm, Input, MultiSelect, Select};

use crate::nodes::{Node, Selection};
use crate::operation::OperationKind;
use crate::{Error, Result};

/// Blocking prompt UI
pub trait Prompter {
    /// Pick the operation to run
    ///
    /// # Errors
    ///
    /// Returns error if the prompt fails or is interrupted
    fn choose_operation(&self) -> Result<OperationKind>;

    /// Pick nodes; `single` limits the choice to one node
    ///
    /// # Errors
    ///
    /// Returns error if the prompt fails or is interrupted
    fn select_nodes(&self, nodes: &[Node], single: bool) -> Result<Selection>;

    /// Free text with a default
    ///
    /// # Errors
    ///
    /// Returns error if the prompt fails or is interrupted
    fn input(&self, prompt: &str, default: &str) -> Result<String>;

    /// Several lines of text, ended by an empty line
    ///
    /// # Errors
    ///
    /// Returns error if the prompt fails or is interrupted
    fn multiline(&self, prompt: &str) -> Result<String>;

    /// Wait for any key, or proceed on its own after `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] on Ctrl-C
    fn keypress_gate(&self, message: &str, timeout: Duration) -> Result<()>;

    /// Yes/no question
    ///
    /// # Errors
    ///
    /// Returns error if the prompt fails or is interrupted
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Terminal prompts via `dialoguer`, with a `crossterm` keypress gate
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn choose_operation(&self) -> Result<OperationKind> {
        let labels: Vec<&str> = OperationKind::ALL.iter().map(|k| k.label()).collect();
        let idx = Select::new()
            .with_prompt("Select operation to run")
            .items(&labels)
            .default(0)
            .interact()?;
        Ok(OperationKind::ALL[idx])
    }

    fn select_nodes(&self, nodes: &[Node], single: bool) -> Result<Selection> {
        if nodes.is_empty() {
            return Ok(Selection::default());
        }

        let labels: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();

        if single {
            let idx = Select::new()
                .with_prompt("Select server to connect to")
                .items(&labels)
                .default(0)
                .interact()?;
            return Ok(Selection::new([nodes[idx].id.clone()]));
        }

        let picked = MultiSelect::new()
            .with_prompt("Select server(s) to run operation on")
            .items(&labels)
            .interact()?;
        Ok(Selection::new(picked.into_iter().map(|i| nodes[i].id.clone())))
    }

    fn input(&self, prompt: &str, default: &str) -> Result<String> {
        let value: String = Input::new()
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()?;
        Ok(value)
    }

    fn multiline(&self, prompt: &str) -> Result<String> {
        println!("{prompt} (finish with an empty line)");
        let mut lines = Vec::new();
        loop {
            let line: String = Input::new()
                .with_prompt(">")
                .allow_empty(true)
                .interact_text()?;
            if line.trim().is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    fn keypress_gate(&self, message: &str, timeout: Duration) -> Result<()> {
        let _raw = RawMode::enable()?;
        let started = Instant::now();
        let mut stdout = std::io::stdout();

        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            write!(
                stdout,
                "\r{message} (starts in {} seconds) ",
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
            )?;
            stdout.flush()?;

            if remaining.is_zero() {
                break;
            }

            if event::poll(remaining.min(Duration::from_millis(250)))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    write!(stdout, "\r\n")?;
                    return Err(Error::Interrupted);
                }
                break;
            }
        }

        write!(stdout, "\r\n")?;
        Ok(())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new().with_prompt(prompt).default(default).interact()?)
    }
}

/// Restores cooked mode on drop
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!(error = %e, "failed to restore terminal mode");
        }
    }
}
