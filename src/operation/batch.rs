//! Command batches

use crate::{Error, Result};

/// Ordered, non-empty list of shell command lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBatch {
    lines: Vec<String>,
}

impl CommandBatch {
    /// Build a batch, dropping blank lines
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCommandBatch`] if nothing runnable is left
    pub fn new<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(Into::<String>::into)
            .filter(|l| !l.trim().is_empty())
            .collect();

        if lines.is_empty() {
            return Err(Error::EmptyCommandBatch);
        }
        Ok(Self { lines })
    }

    /// Split free text (flag values, piped stdin, multiline input) into a batch
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCommandBatch`] if the text has no non-blank lines
    pub fn from_text(text: &str) -> Result<Self> {
        Self::new(text.lines().map(|l| l.trim_end_matches('\r')))
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Never true for a batch built through [`CommandBatch::new`]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
