//! Output censorship built on the trigger matrix.
//!
//! Three well-known rows decide what reaches the output sink:
//!
//! | Row              | Effect on a matching line                          |
//! |------------------|----------------------------------------------------|
//! | `censor-line`    | the line is hidden                                 |
//! | `disable-output` | the line is hidden and so is everything after it   |
//! | `enable-output`  | the line is hidden, output resumes after it        |
//!
//! Custom rows can be added through [`OutputCensor::matrix_mut`]; they fire
//! their callbacks but never affect visibility.

use crate::matrix::{TriggerHit, TriggerMatrix, TriggerRow};
use crate::search::NamedRegexSearch;

pub const CENSOR_LINE_ROW: &str = "censor-line";
pub const DISABLE_OUTPUT_ROW: &str = "disable-output";
pub const ENABLE_OUTPUT_ROW: &str = "enable-output";

/// Filters an output stream line by line.
#[derive(Debug)]
pub struct OutputCensor {
    matrix: TriggerMatrix,
    output_enabled: bool,
    hidden_lines: usize,
}

impl OutputCensor {
    pub fn new() -> Self {
        let mut matrix = TriggerMatrix::new();
        matrix.add_row(TriggerRow::new(CENSOR_LINE_ROW));
        matrix.add_row(TriggerRow::new(DISABLE_OUTPUT_ROW));
        matrix.add_row(TriggerRow::new(ENABLE_OUTPUT_ROW));
        Self {
            matrix,
            output_enabled: true,
            hidden_lines: 0,
        }
    }

    // ── censor-line ──────────────────────────────────────────────────────

    pub fn add_censor_line_trigger(&mut self, pattern: &str) {
        self.add_pattern(CENSOR_LINE_ROW, pattern);
    }

    pub fn remove_censor_line_trigger(&mut self, pattern: &str) -> bool {
        self.remove_pattern(CENSOR_LINE_ROW, pattern)
    }

    pub fn clear_censor_line_triggers(&mut self) {
        self.clear_row(CENSOR_LINE_ROW);
    }

    // ── disable-output ───────────────────────────────────────────────────

    pub fn add_censorship_trigger(&mut self, pattern: &str) {
        self.add_pattern(DISABLE_OUTPUT_ROW, pattern);
    }

    pub fn remove_censorship_trigger(&mut self, pattern: &str) -> bool {
        self.remove_pattern(DISABLE_OUTPUT_ROW, pattern)
    }

    pub fn clear_censorship_triggers(&mut self) {
        self.clear_row(DISABLE_OUTPUT_ROW);
    }

    // ── enable-output ────────────────────────────────────────────────────

    pub fn add_uncensorship_trigger(&mut self, pattern: &str) {
        self.add_pattern(ENABLE_OUTPUT_ROW, pattern);
    }

    pub fn remove_uncensorship_trigger(&mut self, pattern: &str) -> bool {
        self.remove_pattern(ENABLE_OUTPUT_ROW, pattern)
    }

    pub fn clear_uncensorship_triggers(&mut self) {
        self.clear_row(ENABLE_OUTPUT_ROW);
    }

    /// Whether lines are currently passed through.
    pub fn is_output_enabled(&self) -> bool {
        self.output_enabled
    }

    pub fn set_output_enabled(&mut self, enabled: bool) {
        self.output_enabled = enabled;
    }

    /// Number of lines suppressed so far.
    pub fn hidden_lines(&self) -> usize {
        self.hidden_lines
    }

    pub fn matrix(&self) -> &TriggerMatrix {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut TriggerMatrix {
        &mut self.matrix
    }

    /// Feed a chunk of output; every surviving complete line goes to `print`.
    pub fn feed(&mut self, chunk: &str, mut print: impl FnMut(&str)) {
        let enabled = &mut self.output_enabled;
        let hidden = &mut self.hidden_lines;
        self.matrix.feed(chunk, |line, hits| {
            if line_visible(enabled, hits) {
                print(line);
            } else {
                *hidden += 1;
            }
        });
    }

    /// Emit a trailing partial line, subject to the same rules.
    pub fn flush(&mut self, mut print: impl FnMut(&str)) {
        let enabled = &mut self.output_enabled;
        let hidden = &mut self.hidden_lines;
        self.matrix.flush(|line, hits| {
            if line_visible(enabled, hits) {
                print(line);
            } else {
                *hidden += 1;
            }
        });
    }

    fn add_pattern(&mut self, purpose: &str, pattern: &str) {
        if let Some(row) = self.matrix.row_mut(purpose) {
            if row.contains_pattern(pattern) {
                log::debug!("Pattern {:?} already registered for '{}'", pattern, purpose);
                return;
            }
            let name = format!("{}#{}", purpose, row.searches().len());
            row.add_search(NamedRegexSearch::new(name, pattern));
        }
    }

    fn remove_pattern(&mut self, purpose: &str, pattern: &str) -> bool {
        self.matrix
            .row_mut(purpose)
            .is_some_and(|row| row.remove_pattern(pattern))
    }

    fn clear_row(&mut self, purpose: &str) {
        if let Some(row) = self.matrix.row_mut(purpose) {
            row.clear();
        }
    }
}

impl Default for OutputCensor {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the well-known rows to one line and report whether it is shown.
///
/// When a line both disables and enables output, output ends up enabled.
fn line_visible(output_enabled: &mut bool, hits: &[TriggerHit]) -> bool {
    let has = |purpose: &str| hits.iter().any(|h| h.purpose == purpose);
    let censor_line = has(CENSOR_LINE_ROW);
    let disable = has(DISABLE_OUTPUT_ROW);
    let enable = has(ENABLE_OUTPUT_ROW);

    if disable {
        *output_enabled = false;
    }
    if enable {
        *output_enabled = true;
    }
    !(censor_line || disable || enable) && *output_enabled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(censor: &mut OutputCensor, chunk: &str) -> Vec<String> {
        let mut out = Vec::new();
        censor.feed(chunk, |line| out.push(line.to_string()));
        out
    }

    #[test]
    fn test_passthrough_without_triggers() {
        let mut censor = OutputCensor::new();
        assert_eq!(run(&mut censor, "a\nb\n"), vec!["a\n", "b\n"]);
        assert_eq!(censor.hidden_lines(), 0);
    }

    #[test]
    fn test_censor_line_hides_only_matching_line() {
        let mut censor = OutputCensor::new();
        censor.add_censor_line_trigger("password");
        assert_eq!(
            run(&mut censor, "user: bob\npassword: hunter2\ndone\n"),
            vec!["user: bob\n", "done\n"]
        );
        assert_eq!(censor.hidden_lines(), 1);
    }

    #[test]
    fn test_disable_and_enable_block() {
        let mut censor = OutputCensor::new();
        censor.add_censorship_trigger("^BEGIN SECRET");
        censor.add_uncensorship_trigger("^END SECRET");
        let out = run(
            &mut censor,
            "before\nBEGIN SECRET\nkey1\nkey2\nEND SECRET\nafter\n",
        );
        assert_eq!(out, vec!["before\n", "after\n"]);
        assert!(censor.is_output_enabled());
        assert_eq!(censor.hidden_lines(), 4);
    }

    #[test]
    fn test_disabled_state_spans_feed_calls() {
        let mut censor = OutputCensor::new();
        censor.add_censorship_trigger("off");
        assert!(run(&mut censor, "off\n").is_empty());
        assert!(run(&mut censor, "still hidden\n").is_empty());
        assert!(!censor.is_output_enabled());
    }

    #[test]
    fn test_remove_and_clear_triggers() {
        let mut censor = OutputCensor::new();
        censor.add_censor_line_trigger("a");
        censor.add_censor_line_trigger("a");
        assert_eq!(censor.matrix().row(CENSOR_LINE_ROW).unwrap().searches().len(), 1);
        assert!(censor.remove_censor_line_trigger("a"));
        assert!(!censor.remove_censor_line_trigger("a"));
        censor.add_censorship_trigger("x");
        censor.add_uncensorship_trigger("y");
        censor.clear_censorship_triggers();
        censor.clear_uncensorship_triggers();
        assert!(censor.matrix().rows().iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_custom_rows_do_not_affect_visibility() {
        let mut censor = OutputCensor::new();
        let mut row = TriggerRow::new("variables");
        row.add_search(NamedRegexSearch::new("v", "."));
        censor.matrix_mut().add_row(row);
        assert_eq!(run(&mut censor, "shown\n"), vec!["shown\n"]);
    }
}
