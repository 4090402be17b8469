//! Dispatch of commands whose first token names a registered handler.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtins::{ClearCommand, ExitCommand, LogCommand, QuitCommand, SleepCommand};
use super::{Filter, FilterTask, Immediate, StepContext};

/// A command implemented inside the pipeline instead of the shell.
pub trait NamedCommand: Send + Sync {
    /// First token that selects this command.
    fn token(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// Start handling `command`; `args` are its remaining tokens.
    fn start(&self, cx: &mut StepContext<'_>, args: &[&str], command: &str)
    -> Box<dyn FilterTask>;
}

/// Split a command into its first token and the remaining tokens.
pub fn split_command(command: &str) -> Option<(&str, Vec<&str>)> {
    let mut tokens = command.split_whitespace();
    let token = tokens.next()?;
    Some((token, tokens.collect()))
}

/// Filter routing commands to [`NamedCommand`] handlers by first token.
///
/// Commands with no matching handler pass through unchanged.
#[derive(Clone, Default)]
pub struct NamedCommandDispatch {
    commands: HashMap<String, Arc<dyn NamedCommand>>,
}

impl NamedCommandDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with `sleep`, `clear`, `quit`, `exit` and `log` registered.
    pub fn with_builtins() -> Self {
        let mut dispatch = Self::new();
        dispatch.register(SleepCommand);
        dispatch.register(ClearCommand);
        dispatch.register(QuitCommand);
        dispatch.register(ExitCommand);
        dispatch.register(LogCommand);
        dispatch
    }

    /// Register a handler. A handler with the same token is replaced and returned.
    pub fn register(&mut self, command: impl NamedCommand + 'static) -> Option<Arc<dyn NamedCommand>> {
        self.register_arc(Arc::new(command))
    }

    pub fn register_arc(&mut self, command: Arc<dyn NamedCommand>) -> Option<Arc<dyn NamedCommand>> {
        let token = command.token().to_string();
        let previous = self.commands.insert(token.clone(), command);
        if previous.is_some() {
            log::warn!("Named command '{}' registered twice, keeping the latest", token);
        }
        previous
    }

    pub fn unregister(&mut self, token: &str) -> Option<Arc<dyn NamedCommand>> {
        self.commands.remove(token)
    }

    pub fn get(&self, token: &str) -> Option<&Arc<dyn NamedCommand>> {
        self.commands.get(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.commands.contains_key(token)
    }

    /// Registered tokens, sorted.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Filter for NamedCommandDispatch {
    fn name(&self) -> &str {
        "named-commands"
    }

    fn start(&self, cx: &mut StepContext<'_>, command: &str) -> Box<dyn FilterTask> {
        let Some((token, args)) = split_command(command) else {
            return Immediate::pass(command);
        };
        match self.commands.get(token) {
            Some(handler) => {
                log::debug!("[{}] dispatching '{}'", cx.owner(), token);
                handler.start(cx, &args, command)
            }
            None => Immediate::pass(command),
        }
    }
}

impl std::fmt::Debug for NamedCommandDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCommandDispatch")
            .field("tokens", &self.tokens())
            .finish()
    }
}

/// Synchronous named command built from a closure.
///
/// The closure receives the arguments and returns the filter result.
pub struct FnCommand<F> {
    token: String,
    description: String,
    func: F,
}

impl<F> FnCommand<F>
where
    F: Fn(&mut StepContext<'_>, &[&str]) -> Option<String> + Send + Sync,
{
    pub fn new(token: impl Into<String>, func: F) -> Self {
        Self {
            token: token.into(),
            description: String::new(),
            func,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl<F> NamedCommand for FnCommand<F>
where
    F: Fn(&mut StepContext<'_>, &[&str]) -> Option<String> + Send + Sync,
{
    fn token(&self) -> &str {
        &self.token
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn start(
        &self,
        cx: &mut StepContext<'_>,
        args: &[&str],
        _command: &str,
    ) -> Box<dyn FilterTask> {
        Immediate::boxed((self.func)(cx, args))
    }
}
