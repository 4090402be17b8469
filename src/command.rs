//! Queued command entries and command script loading.
//!
//! A script is either plain text (one command per line) or a YAML list whose
//! entries are strings or `{ text, ignore }` maps. In text scripts, blank
//! lines are dropped and lines starting with `#` become ignored entries
//! (marker and leading whitespace stripped) so they still show up in the
//! queue and count toward progress without being run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry of an execution queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub text: String,

    /// Skipped by the scheduler without touching the filter chain
    #[serde(default)]
    pub ignore: bool,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ignore: false,
        }
    }

    pub fn ignored(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ignore: true,
        }
    }

    /// First whitespace-delimited token, if any.
    pub fn first_token(&self) -> Option<&str> {
        self.text.split_whitespace().next()
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptEntry {
    Text(String),
    Full(Command),
}

/// Parse a plain-text command script.
pub fn parse_script(text: &str) -> Vec<Command> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.trim_start().strip_prefix('#') {
            Some(comment) => Command::ignored(comment.trim_start()),
            None => Command::new(line),
        })
        .collect()
}

/// Parse a YAML command script.
pub fn parse_yaml_script(text: &str) -> Result<Vec<Command>> {
    let entries: Vec<ScriptEntry> =
        serde_yaml_ng::from_str(text).context("Invalid YAML command script")?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            ScriptEntry::Text(text) => Command::new(text),
            ScriptEntry::Full(command) => command,
        })
        .collect())
}

/// Load a command script, choosing the format from the file extension.
pub fn load_script(path: &Path) -> Result<Vec<Command>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read command script {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let commands = if is_yaml {
        parse_yaml_script(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        parse_script(&contents)
    };
    log::info!(
        "Loaded {} commands from {}",
        commands.len(),
        path.display()
    );
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_script_comments_become_ignored() {
        let commands = parse_script("echo one\n\n# note\r\n  sleep 1\n");
        assert_eq!(
            commands,
            vec![
                Command::new("echo one"),
                Command::ignored("note"),
                Command::new("  sleep 1"),
            ]
        );
    }

    #[test]
    fn test_yaml_script_mixed_entries() {
        let yaml = "- echo a\n- text: echo b\n  ignore: true\n- text: echo c\n";
        let commands = parse_yaml_script(yaml).unwrap();
        assert_eq!(commands.len(), 3);
        assert!(!commands[0].ignore);
        assert!(commands[1].ignore);
        assert_eq!(commands[2].text, "echo c");
    }

    #[test]
    fn test_first_token() {
        assert_eq!(Command::new("  sleep 0.5").first_token(), Some("sleep"));
        assert_eq!(Command::new("   ").first_token(), None);
    }
}
