//! Filters: the stages a command passes through before reaching the shell.
//!
//! A [`Filter`] inspects one command and starts a [`FilterTask`]. The task
//! either finishes immediately or keeps running across scheduler steps
//! (`sleep`, for example). When it finishes, its result decides the fate of
//! the command: `None` consumes it, `Some(text)` forwards `text` (possibly
//! rewritten) to the next filter.
//!
//! Filters never touch the scheduler directly. They talk to it through the
//! [`StepContext`], which carries the owner's output buffer and captured
//! variables and collects [`ControlRequest`]s applied after the filter
//! returns.

pub mod builtins;
pub mod chain;
pub mod dispatch;
pub mod variables;

use std::collections::HashMap;

use crate::output::OutputLog;
use crate::owner::OwnerKey;

pub use chain::{ChainPoll, ChainRun, FilterChain};
pub use dispatch::{FnCommand, NamedCommand, NamedCommandDispatch, split_command};
pub use variables::VariableSubstitution;

/// A stage of the filter chain.
pub trait Filter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Begin processing `command`.
    fn start(&self, cx: &mut StepContext<'_>, command: &str) -> Box<dyn FilterTask>;
}

/// In-flight work of one filter on one command.
pub trait FilterTask: Send {
    /// Advance the task; `true` once it is done.
    ///
    /// Called once per scheduler step while the task is pending. Must not
    /// block.
    fn finished(&mut self, cx: &mut StepContext<'_>) -> bool;

    /// Outcome after `finished` returned true: `None` consumes the command.
    fn result(&mut self) -> Option<String>;

    /// Completion fraction in `0.0..=1.0`, for tasks that can tell.
    fn progress(&self) -> f32 {
        0.0
    }

    /// The owner is being cancelled; release whatever the task holds.
    fn cancel(&mut self) {}
}

/// A task that is finished as soon as it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Immediate(Option<String>);

impl Immediate {
    /// Forward `text` to the next filter.
    pub fn pass(text: impl Into<String>) -> Box<dyn FilterTask> {
        Box::new(Self(Some(text.into())))
    }

    /// Consume the command.
    pub fn consume() -> Box<dyn FilterTask> {
        Box::new(Self(None))
    }

    pub fn boxed(result: Option<String>) -> Box<dyn FilterTask> {
        Box::new(Self(result))
    }
}

impl FilterTask for Immediate {
    fn finished(&mut self, _cx: &mut StepContext<'_>) -> bool {
        true
    }

    fn result(&mut self) -> Option<String> {
        self.0.take()
    }

    fn progress(&self) -> f32 {
        1.0
    }
}

/// Synchronous filter built from a closure.
///
/// The closure returns the same thing [`FilterTask::result`] does.
pub struct FnFilter<F> {
    name: String,
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&mut StepContext<'_>, &str) -> Option<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Filter for FnFilter<F>
where
    F: Fn(&mut StepContext<'_>, &str) -> Option<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, cx: &mut StepContext<'_>, command: &str) -> Box<dyn FilterTask> {
        Immediate::boxed((self.func)(cx, command))
    }
}

/// Scheduler operations a filter may request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// Insert a command right after the one being processed
    InsertNext(String),
    /// Cancel the owner's execution
    Cancel,
    /// Stop the owner's shell (a new one starts on the next forwarded command)
    StopShell,
}

/// What a filter can see and do during one scheduler step.
pub struct StepContext<'a> {
    owner: &'a OwnerKey,
    output: &'a mut OutputLog,
    variables: &'a HashMap<String, String>,
    requests: Vec<ControlRequest>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        owner: &'a OwnerKey,
        output: &'a mut OutputLog,
        variables: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            owner,
            output,
            variables,
            requests: Vec::new(),
        }
    }

    pub fn owner(&self) -> &OwnerKey {
        self.owner
    }

    /// Write text to the owner's output (not subject to censorship).
    pub fn print(&mut self, text: &str) {
        self.output.push(text);
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// Variables captured from the owner's shell output so far.
    pub fn variables(&self) -> &HashMap<String, String> {
        self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Queue `text` to run right after the current command.
    ///
    /// Several calls in one step insert in call order.
    pub fn insert_next(&mut self, text: impl Into<String>) {
        self.requests.push(ControlRequest::InsertNext(text.into()));
    }

    pub fn request(&mut self, request: ControlRequest) {
        self.requests.push(request);
    }

    pub fn requests(&self) -> &[ControlRequest] {
        &self.requests
    }

    pub fn take_requests(&mut self) -> Vec<ControlRequest> {
        std::mem::take(&mut self.requests)
    }
}
