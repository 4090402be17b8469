//! Per-owner output buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::owner::OwnerKey;

/// Host callback receiving each visible output line (newline included).
///
/// Invoked while the owner's context is locked, so it must not call back
/// into the engine for the same owner.
pub type Printer = Arc<dyn Fn(&OwnerKey, &str) + Send + Sync>;

/// Bounded buffer of the output an owner has produced.
///
/// Every stored line ends with `\n`. When `max_lines` is non-zero the oldest
/// lines are dropped once the buffer is full.
pub struct OutputLog {
    owner: OwnerKey,
    lines: VecDeque<String>,
    max_lines: usize,
    printer: Option<Printer>,
    /// Lines handed out by `poll`; always <= lines.len()
    polled: usize,
    total: usize,
}

impl OutputLog {
    pub fn new(owner: OwnerKey, max_lines: usize, printer: Option<Printer>) -> Self {
        Self {
            owner,
            lines: VecDeque::new(),
            max_lines,
            printer,
            polled: 0,
            total: 0,
        }
    }

    /// Append text, splitting it into lines.
    pub fn push(&mut self, text: &str) {
        for line in text.split_inclusive('\n') {
            let mut line = line.to_string();
            if !line.ends_with('\n') {
                line.push('\n');
            }
            self.push_line(line);
        }
    }

    fn push_line(&mut self, line: String) {
        if let Some(printer) = &self.printer {
            printer(&self.owner, &line);
        }
        self.lines.push_back(line);
        self.total += 1;
        if self.max_lines > 0 && self.lines.len() > self.max_lines {
            self.lines.pop_front();
            self.polled = self.polled.saturating_sub(1);
        }
    }

    /// Lines appended since the previous call.
    pub fn poll(&mut self) -> Vec<String> {
        let fresh: Vec<String> = self.lines.iter().skip(self.polled).cloned().collect();
        self.polled = self.lines.len();
        fresh
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Buffered output as one string.
    pub fn text(&self) -> String {
        self.lines.iter().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.polled = 0;
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines ever written, including dropped and cleared ones.
    pub fn total_lines(&self) -> usize {
        self.total
    }
}

impl std::fmt::Debug for OutputLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputLog")
            .field("owner", &self.owner)
            .field("lines", &self.lines.len())
            .field("max_lines", &self.max_lines)
            .field("has_printer", &self.printer.is_some())
            .finish()
    }
}
