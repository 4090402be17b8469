//! Named regex searches evaluated against single output lines.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Controls when a [`NamedRegexSearch`] is allowed to run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadLogic {
    /// Evaluate on every line.
    #[default]
    None,
    /// Stop evaluating once the search has matched a single time.
    IgnoreAfterFirstMatch,
    /// Only evaluate the most recent line seen so far (prompt detection).
    OnlyLastLine,
}

/// A regex with a name, an optional group selection and a read policy.
///
/// The pattern is compiled on first use. An invalid pattern is logged once
/// and then simply never matches.
#[derive(Debug, Clone)]
pub struct NamedRegexSearch {
    /// Name used for variable capture and diagnostics.
    pub name: String,
    pattern: String,
    /// Capture groups concatenated into the result. Empty = whole match.
    pub groups_to_include: Vec<usize>,
    /// Skipped entirely while set.
    pub ignore: bool,
    pub read_logic: ReadLogic,
    compiled: OnceLock<Option<Regex>>,
}

impl NamedRegexSearch {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            groups_to_include: Vec::new(),
            ignore: false,
            read_logic: ReadLogic::None,
            compiled: OnceLock::new(),
        }
    }

    /// Builder: only return the listed capture groups, concatenated.
    pub fn with_groups(mut self, groups: Vec<usize>) -> Self {
        self.groups_to_include = groups;
        self
    }

    /// Builder: set the read policy.
    pub fn with_read_logic(mut self, read_logic: ReadLogic) -> Self {
        self.read_logic = read_logic;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern compiles. Forces compilation.
    pub fn is_valid(&self) -> bool {
        self.regex().is_some()
    }

    fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(&self.pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    log::warn!(
                        "Search '{}' has an invalid pattern {:?}: {}",
                        self.name,
                        self.pattern,
                        e
                    );
                    None
                }
            })
            .as_ref()
    }

    /// Evaluate the search against one line.
    ///
    /// `is_last_line` tells `OnlyLastLine` searches whether this is the most
    /// recent complete line. The trailing line break is not part of the
    /// matched text.
    pub fn process(&mut self, line: &str, is_last_line: bool) -> Option<String> {
        if self.ignore {
            return None;
        }
        if self.read_logic == ReadLogic::OnlyLastLine && !is_last_line {
            return None;
        }

        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
        let captures = self.regex()?.captures(line)?;
        let value = if self.groups_to_include.is_empty() {
            captures
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        } else {
            self.groups_to_include
                .iter()
                .filter_map(|&group| captures.get(group))
                .map(|m| m.as_str())
                .collect::<String>()
        };

        if self.read_logic == ReadLogic::IgnoreAfterFirstMatch {
            self.ignore = true;
        }
        Some(value)
    }
}
