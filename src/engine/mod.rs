//! Cooperative scheduler and the registry of per-owner execution contexts.
//!
//! The host calls [`Engine::step`] for an owner whenever it has time (a
//! frame, a timer tick). Each call moves that owner's queue forward by at
//! most one completed command and never blocks on the shell.
//!
//! Contexts are created on first [`Engine::enqueue`] and live until
//! [`Engine::remove`]. Different owners are stepped independently; the
//! registry lock is only held long enough to look a context up.

mod context;
mod error;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use par_autorun_config::Config;
use par_autorun_triggers::OutputCensor;

use crate::command::Command;
use crate::filter::FilterChain;
use crate::output::Printer;
use crate::owner::OwnerKey;

pub use context::ExecutionState;
pub use error::EngineError;

use context::{ContextSettings, ExecutionContext};

type SharedContext = Arc<Mutex<ExecutionContext>>;

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: Config,
    chain: Option<FilterChain>,
    printer: Option<Printer>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            chain: None,
            printer: None,
        }
    }

    /// Use `chain` instead of [`FilterChain::standard`].
    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Receive every visible output line as it is produced.
    pub fn printer(mut self, printer: impl Fn(&OwnerKey, &str) + Send + Sync + 'static) -> Self {
        self.printer = Some(Arc::new(printer));
        self
    }

    pub fn build(self) -> Engine {
        let chain = self.chain.unwrap_or_else(FilterChain::standard);
        log::info!("Engine filter chain: {:?}", chain.names());
        Engine {
            chain: Arc::new(chain),
            settings: Arc::new(ContextSettings::from_config(&self.config)),
            printer: self.printer,
            contexts: RwLock::new(HashMap::new()),
        }
    }
}

/// Drives command queues for any number of owners.
pub struct Engine {
    chain: Arc<FilterChain>,
    settings: Arc<ContextSettings>,
    printer: Option<Printer>,
    contexts: RwLock<HashMap<OwnerKey, SharedContext>>,
}

impl Engine {
    /// Engine with the standard filter chain and no printer.
    pub fn new(config: &Config) -> Self {
        EngineBuilder::new(config.clone()).build()
    }

    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    fn get(&self, owner: &OwnerKey) -> Result<SharedContext, EngineError> {
        self.contexts
            .read()
            .get(owner)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOwner(owner.clone()))
    }

    fn get_or_create(&self, owner: &OwnerKey) -> SharedContext {
        if let Some(ctx) = self.contexts.read().get(owner) {
            return Arc::clone(ctx);
        }
        let mut contexts = self.contexts.write();
        Arc::clone(contexts.entry(owner.clone()).or_insert_with(|| {
            log::debug!("Creating execution context for '{}'", owner);
            Arc::new(Mutex::new(ExecutionContext::new(
                owner.clone(),
                Arc::clone(&self.settings),
                self.printer.clone(),
            )))
        }))
    }

    /// Replace `owner`'s queue and start from its first command.
    ///
    /// Creates the owner's context when it does not exist yet.
    pub fn enqueue<I, C>(&self, owner: impl Into<OwnerKey>, commands: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Command>,
    {
        let owner = owner.into();
        let commands = commands.into_iter().map(Into::into).collect();
        self.get_or_create(&owner).lock().enqueue(commands);
    }

    /// Advance `owner` by one increment.
    ///
    /// Returns `Ok(true)` while commands remain and `Ok(false)` once the
    /// queue is finished or cancelled.
    pub fn step(&self, owner: &OwnerKey) -> Result<bool, EngineError> {
        let ctx = self.get(owner)?;
        let mut ctx = ctx.lock();
        ctx.step(&self.chain)
    }

    /// Stop running `owner`'s queue. Input already sent to the shell stays sent.
    pub fn cancel(&self, owner: &OwnerKey) -> Result<(), EngineError> {
        self.get(owner)?.lock().cancel();
        Ok(())
    }

    /// Insert a command right after `owner`'s current one.
    pub fn insert_next(&self, owner: &OwnerKey, text: impl Into<String>) -> Result<(), EngineError> {
        self.get(owner)?.lock().insert_next(text)
    }

    /// Completion estimate in `0.0..=1.0`; 0.0 for unknown owners.
    pub fn progress(&self, owner: &OwnerKey) -> f32 {
        self.get(owner)
            .map_or(0.0, |ctx| ctx.lock().progress(self.chain.len()))
    }

    pub fn state(&self, owner: &OwnerKey) -> ExecutionState {
        self.get(owner)
            .map_or(ExecutionState::Idle, |ctx| ctx.lock().state())
    }

    /// Current queue position; -1 once cancelled.
    pub fn cursor(&self, owner: &OwnerKey) -> Option<isize> {
        self.get(owner).ok().map(|ctx| ctx.lock().cursor())
    }

    pub fn queue(&self, owner: &OwnerKey) -> Vec<Command> {
        self.get(owner)
            .map(|ctx| ctx.lock().queue().to_vec())
            .unwrap_or_default()
    }

    /// Move pending shell output into `owner`'s output buffer.
    ///
    /// Returns the lines added since the previous call.
    pub fn poll_output(&self, owner: &OwnerKey) -> Result<Vec<String>, EngineError> {
        let ctx = self.get(owner)?;
        let mut ctx = ctx.lock();
        ctx.pump_output();
        Ok(ctx.output_mut().poll())
    }

    /// Buffered output lines, oldest first.
    pub fn output(&self, owner: &OwnerKey) -> Vec<String> {
        self.get(owner)
            .map(|ctx| ctx.lock().output().snapshot())
            .unwrap_or_default()
    }

    pub fn output_text(&self, owner: &OwnerKey) -> String {
        self.get(owner)
            .map(|ctx| ctx.lock().output().text())
            .unwrap_or_default()
    }

    pub fn clear_output(&self, owner: &OwnerKey) -> Result<(), EngineError> {
        self.get(owner)?.lock().output_mut().clear();
        Ok(())
    }

    /// Variables captured from `owner`'s shell output.
    pub fn variables(&self, owner: &OwnerKey) -> HashMap<String, String> {
        self.get(owner)
            .map(|ctx| ctx.lock().variables().clone())
            .unwrap_or_default()
    }

    pub fn is_shell_running(&self, owner: &OwnerKey) -> bool {
        self.get(owner)
            .is_ok_and(|ctx| ctx.lock().is_shell_running())
    }

    /// Stop `owner`'s shell; the next shell-bound command starts a new one.
    pub fn stop_shell(&self, owner: &OwnerKey) -> Result<(), EngineError> {
        self.get(owner)?.lock().stop_shell();
        Ok(())
    }

    /// Tear down `owner`'s context and shell. Returns whether it existed.
    pub fn remove(&self, owner: &OwnerKey) -> bool {
        let removed = self.contexts.write().remove(owner);
        match removed {
            Some(ctx) => {
                let mut ctx = ctx.lock();
                ctx.cancel();
                ctx.stop_shell();
                log::info!("Removed execution context for '{}'", owner);
                true
            }
            None => false,
        }
    }

    pub fn owners(&self) -> Vec<OwnerKey> {
        let mut owners: Vec<OwnerKey> = self.contexts.read().keys().cloned().collect();
        owners.sort();
        owners
    }

    pub fn contains(&self, owner: &OwnerKey) -> bool {
        self.contexts.read().contains_key(owner)
    }

    /// Run `f` against `owner`'s output censor, creating the context if needed.
    pub fn with_censor<R>(&self, owner: &OwnerKey, f: impl FnOnce(&mut OutputCensor) -> R) -> R {
        let ctx = self.get_or_create(owner);
        let mut ctx = ctx.lock();
        f(ctx.censor_mut())
    }

    // ── censor-line ──────────────────────────────────────────────────────

    pub fn add_censor_line_trigger(&self, owner: &OwnerKey, pattern: &str) {
        self.with_censor(owner, |c| c.add_censor_line_trigger(pattern));
    }

    pub fn remove_censor_line_trigger(&self, owner: &OwnerKey, pattern: &str) -> bool {
        self.with_censor(owner, |c| c.remove_censor_line_trigger(pattern))
    }

    pub fn clear_censor_line_triggers(&self, owner: &OwnerKey) {
        self.with_censor(owner, |c| c.clear_censor_line_triggers());
    }

    // ── disable-output ───────────────────────────────────────────────────

    pub fn add_censorship_trigger(&self, owner: &OwnerKey, pattern: &str) {
        self.with_censor(owner, |c| c.add_censorship_trigger(pattern));
    }

    pub fn remove_censorship_trigger(&self, owner: &OwnerKey, pattern: &str) -> bool {
        self.with_censor(owner, |c| c.remove_censorship_trigger(pattern))
    }

    pub fn clear_censorship_triggers(&self, owner: &OwnerKey) {
        self.with_censor(owner, |c| c.clear_censorship_triggers());
    }

    // ── enable-output ────────────────────────────────────────────────────

    pub fn add_uncensorship_trigger(&self, owner: &OwnerKey, pattern: &str) {
        self.with_censor(owner, |c| c.add_uncensorship_trigger(pattern));
    }

    pub fn remove_uncensorship_trigger(&self, owner: &OwnerKey, pattern: &str) -> bool {
        self.with_censor(owner, |c| c.remove_uncensorship_trigger(pattern))
    }

    pub fn clear_uncensorship_triggers(&self, owner: &OwnerKey) {
        self.with_censor(owner, |c| c.clear_uncensorship_triggers());
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let contexts = std::mem::take(&mut *self.contexts.write());
        if !contexts.is_empty() {
            log::debug!("Engine dropped with {} live contexts", contexts.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_owner_is_an_error() {
        let engine = Engine::new(&Config::default());
        let owner = OwnerKey::new("ghost");
        assert!(matches!(
            engine.step(&owner),
            Err(EngineError::UnknownOwner(_))
        ));
        assert!(engine.cancel(&owner).is_err());
        assert_eq!(engine.state(&owner), ExecutionState::Idle);
        assert_eq!(engine.progress(&owner), 0.0);
    }

    #[test]
    fn test_enqueue_creates_context_and_remove_drops_it() {
        let engine = Engine::new(&Config::default());
        let owner = OwnerKey::new("a");
        engine.enqueue(&owner, ["log one"]);
        assert_eq!(engine.owners(), vec![owner.clone()]);
        assert!(engine.remove(&owner));
        assert!(!engine.remove(&owner));
        assert!(!engine.contains(&owner));
    }

    #[test]
    fn test_builtins_run_through_standard_chain() {
        let engine = Engine::new(&Config::default());
        let owner = OwnerKey::new("b");
        engine.enqueue(&owner, ["log hello", "clear", "log world"]);
        while engine.step(&owner).unwrap() {}
        assert_eq!(engine.output(&owner), vec!["world\n"]);
        assert_eq!(engine.state(&owner), ExecutionState::Finished);
        assert!(!engine.is_shell_running(&owner));
    }
}
