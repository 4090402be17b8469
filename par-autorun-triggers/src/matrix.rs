//! Line-buffered trigger matrix.
//!
//! A [`TriggerMatrix`] is a list of [`TriggerRow`]s, each holding a column of
//! [`NamedRegexSearch`]es. Text is fed in arbitrary chunks; once a chunk
//! completes a line, every search of every row runs against it, matching
//! rows fire their callback, and the line is handed to the sink together
//! with the `(row, col)` coordinates of every hit.

use std::fmt;

use crate::search::NamedRegexSearch;

/// Callback fired with the first captured value of a matching row.
pub type TriggerCallback = Box<dyn FnMut(&str) + Send>;

/// One row of the matrix: a purpose and the searches that serve it.
pub struct TriggerRow {
    purpose: String,
    searches: Vec<NamedRegexSearch>,
    on_trigger: Option<TriggerCallback>,
}

impl TriggerRow {
    pub fn new(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            searches: Vec::new(),
            on_trigger: None,
        }
    }

    /// Builder: attach the callback fired when any search in the row matches.
    pub fn with_callback(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_trigger = Some(Box::new(callback));
        self
    }

    pub fn set_callback(&mut self, callback: Option<TriggerCallback>) {
        self.on_trigger = callback;
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn searches(&self) -> &[NamedRegexSearch] {
        &self.searches
    }

    pub fn searches_mut(&mut self) -> &mut [NamedRegexSearch] {
        &mut self.searches
    }

    pub fn add_search(&mut self, search: NamedRegexSearch) {
        self.searches.push(search);
    }

    /// Remove every search using `pattern`. Returns whether anything was removed.
    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        let before = self.searches.len();
        self.searches.retain(|s| s.pattern() != pattern);
        self.searches.len() != before
    }

    pub fn contains_pattern(&self, pattern: &str) -> bool {
        self.searches.iter().any(|s| s.pattern() == pattern)
    }

    pub fn clear(&mut self) {
        self.searches.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }
}

impl fmt::Debug for TriggerRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRow")
            .field("purpose", &self.purpose)
            .field("searches", &self.searches)
            .field("has_callback", &self.on_trigger.is_some())
            .finish()
    }
}

/// A single search hit on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerHit {
    pub row: usize,
    pub col: usize,
    /// Purpose of the row that matched.
    pub purpose: String,
    /// Captured value (whole match or the selected groups).
    pub value: String,
}

/// Rows of searches evaluated against complete lines.
#[derive(Debug, Default)]
pub struct TriggerMatrix {
    rows: Vec<TriggerRow>,
    /// Text after the last newline, waiting for the rest of its line.
    pending: String,
}

impl TriggerMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. A row with the same purpose is replaced in place.
    ///
    /// Returns the row index.
    pub fn add_row(&mut self, row: TriggerRow) -> usize {
        if let Some(index) = self.row_index(row.purpose()) {
            log::warn!("Replacing trigger row '{}'", row.purpose());
            self.rows[index] = row;
            index
        } else {
            self.rows.push(row);
            self.rows.len() - 1
        }
    }

    pub fn row_index(&self, purpose: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.purpose == purpose)
    }

    pub fn row(&self, purpose: &str) -> Option<&TriggerRow> {
        self.rows.iter().find(|r| r.purpose == purpose)
    }

    pub fn row_mut(&mut self, purpose: &str) -> Option<&mut TriggerRow> {
        self.rows.iter_mut().find(|r| r.purpose == purpose)
    }

    pub fn remove_row(&mut self, purpose: &str) -> Option<TriggerRow> {
        let index = self.row_index(purpose)?;
        Some(self.rows.remove(index))
    }

    pub fn rows(&self) -> &[TriggerRow] {
        &self.rows
    }

    /// Text buffered without a terminating newline yet.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Append `chunk` and process every line it completes.
    ///
    /// The sink receives each line (newline included) and its hits, after
    /// row callbacks have fired. Returns the number of lines emitted.
    pub fn feed<F>(&mut self, chunk: &str, mut sink: F) -> usize
    where
        F: FnMut(&str, &[TriggerHit]),
    {
        self.pending.push_str(chunk);
        let mut emitted = 0;
        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            let is_last_line = !self.pending.contains('\n');
            let hits = self.evaluate(&line, is_last_line);
            sink(&line, &hits);
            emitted += 1;
        }
        emitted
    }

    /// Emit the buffered partial line, if any, as a final line.
    pub fn flush<F>(&mut self, mut sink: F) -> bool
    where
        F: FnMut(&str, &[TriggerHit]),
    {
        if self.pending.is_empty() {
            return false;
        }
        let line = std::mem::take(&mut self.pending);
        let hits = self.evaluate(&line, true);
        sink(&line, &hits);
        true
    }

    /// Run every search of every row against `line` and fire row callbacks.
    pub fn evaluate(&mut self, line: &str, is_last_line: bool) -> Vec<TriggerHit> {
        let mut hits = Vec::new();
        for (row_index, row) in self.rows.iter_mut().enumerate() {
            let mut first_value: Option<String> = None;
            for (col, search) in row.searches.iter_mut().enumerate() {
                if let Some(value) = search.process(line, is_last_line) {
                    if first_value.is_none() {
                        first_value = Some(value.clone());
                    }
                    hits.push(TriggerHit {
                        row: row_index,
                        col,
                        purpose: row.purpose.clone(),
                        value,
                    });
                }
            }
            if let (Some(value), Some(callback)) = (first_value, row.on_trigger.as_mut()) {
                callback(&value);
            }
        }
        hits
    }
}
