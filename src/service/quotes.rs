//! Quote corpus.
//!
//! A read-only list of quotes shared by every connection handler. Lines are
//! trimmed and blank lines skipped; the corpus must not be empty.

use crate::error::{constants, ProtocolError, Result};
use rand::Rng;
use std::path::Path;

/// Corpus compiled into the binary, used when no quotes file is configured
const BUILTIN_QUOTES: &str = include_str!("quotes.txt");

#[derive(Debug, Clone)]
pub struct QuoteBook {
    quotes: Vec<String>,
}

impl QuoteBook {
    /// Build from one-quote-per-line text.
    ///
    /// # Errors
    /// Returns `ProtocolError::ConfigError` if no non-blank line remains.
    pub fn from_text(text: &str) -> Result<Self> {
        let quotes = parse_lines(text);
        if quotes.is_empty() {
            return Err(ProtocolError::ConfigError(constants::ERR_EMPTY_QUOTES.into()));
        }
        Ok(Self { quotes })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path).map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Failed to read quotes file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_text(&text)
    }

    pub fn builtin() -> Self {
        Self {
            quotes: parse_lines(BUILTIN_QUOTES),
        }
    }

    /// Use `path` when given, the built-in corpus otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn contains(&self, quote: &str) -> bool {
        self.quotes.iter().any(|q| q == quote)
    }

    /// Pick a quote uniformly at random
    pub fn random(&self) -> &str {
        let idx = rand::rng().random_range(0..self.quotes.len());
        &self.quotes[idx]
    }
}

fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
