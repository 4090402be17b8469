//! Per-owner execution state.
//!
//! An [`ExecutionContext`] holds everything one owner needs: the command
//! queue and cursor, the command currently inside the filter chain, the
//! owner's shell, its output censor and output buffer. The engine locks a
//! context for the duration of one step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use par_autorun_config::{Config, TriggerSetConfig};
use par_autorun_shell::{ShellError, ShellLaunch, ShellProcess};
use par_autorun_triggers::{NamedRegexSearch, OutputCensor};

use super::error::EngineError;
use crate::command::Command;
use crate::filter::{ChainPoll, ChainRun, ControlRequest, FilterChain, StepContext};
use crate::output::{OutputLog, Printer};
use crate::owner::OwnerKey;

/// Where an owner's execution stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Nothing enqueued yet
    Idle,
    /// Commands remain and nothing is blocking
    Running,
    /// A filter task has not finished
    WaitingFilter,
    /// Waiting for the shell's ready pattern
    WaitingShell,
    /// The cursor passed the end of the queue
    Finished,
    Cancelled,
}

/// Settings shared by every context of one engine.
#[derive(Debug, Clone)]
pub(crate) struct ContextSettings {
    pub launch: ShellLaunch,
    pub ready_pattern: Option<String>,
    pub ready_timeout: Duration,
    pub captures: Vec<NamedRegexSearch>,
    pub triggers: TriggerSetConfig,
    pub max_iterations: usize,
    pub max_output_lines: usize,
}

impl ContextSettings {
    pub fn from_config(config: &Config) -> Self {
        let shell = &config.shell;
        let mut launch = ShellLaunch::new(&shell.executable).with_args(shell.args.iter().cloned());
        launch.working_directory = shell.working_directory.clone();
        launch.env_vars = shell.env_vars.clone();

        let captures = config
            .triggers
            .variables
            .iter()
            .filter(|capture| capture.enabled)
            .map(|capture| {
                NamedRegexSearch::new(&capture.name, &capture.pattern)
                    .with_groups(capture.groups.clone())
                    .with_read_logic(capture.read_logic)
            })
            .collect();

        Self {
            launch,
            ready_pattern: shell.ready_pattern.clone(),
            ready_timeout: Duration::from_millis(shell.ready_timeout_ms),
            captures,
            triggers: config.triggers.clone(),
            max_iterations: config.engine.max_iterations_per_step,
            max_output_lines: config.engine.max_output_lines,
        }
    }
}

/// Execution state of one owner.
pub(crate) struct ExecutionContext {
    owner: OwnerKey,
    settings: Arc<ContextSettings>,
    queue: Vec<Command>,
    /// Index of the current command; -1 once cancelled
    cursor: isize,
    /// Command currently inside the filter chain
    run: Option<ChainRun>,
    cancelled: bool,
    state: ExecutionState,
    shell: Option<ShellProcess>,
    censor: OutputCensor,
    output: OutputLog,
    variables: HashMap<String, String>,
    /// Deadline while waiting for the shell's ready pattern
    awaiting_shell: Option<Instant>,
}

impl ExecutionContext {
    pub(crate) fn new(
        owner: OwnerKey,
        settings: Arc<ContextSettings>,
        printer: Option<Printer>,
    ) -> Self {
        let mut censor = OutputCensor::new();
        for pattern in &settings.triggers.censor_line {
            censor.add_censor_line_trigger(pattern);
        }
        for pattern in &settings.triggers.disable_output {
            censor.add_censorship_trigger(pattern);
        }
        for pattern in &settings.triggers.enable_output {
            censor.add_uncensorship_trigger(pattern);
        }

        Self {
            output: OutputLog::new(owner.clone(), settings.max_output_lines, printer),
            owner,
            settings,
            queue: Vec::new(),
            cursor: 0,
            run: None,
            cancelled: false,
            state: ExecutionState::Idle,
            shell: None,
            censor,
            variables: HashMap::new(),
            awaiting_shell: None,
        }
    }

    pub fn queue(&self) -> &[Command] {
        &self.queue
    }

    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn state(&self) -> ExecutionState {
        if self.cancelled {
            ExecutionState::Cancelled
        } else {
            self.state
        }
    }

    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputLog {
        &mut self.output
    }

    pub fn censor_mut(&mut self) -> &mut OutputCensor {
        &mut self.censor
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn is_shell_running(&mut self) -> bool {
        self.shell.as_mut().is_some_and(|shell| shell.is_running())
    }

    /// Replace the queue and start over from its first command.
    pub(crate) fn enqueue(&mut self, commands: Vec<Command>) {
        self.drop_task();
        log::info!("[{}] enqueued {} commands", self.owner, commands.len());
        self.queue = commands;
        self.cursor = 0;
        self.cancelled = false;
        self.state = if self.queue.is_empty() {
            ExecutionState::Finished
        } else {
            ExecutionState::Running
        };
    }

    /// Insert `text` right after the current command.
    pub(crate) fn insert_next(&mut self, text: impl Into<String>) -> Result<(), EngineError> {
        if self.cancelled {
            return Err(EngineError::Cancelled(self.owner.clone()));
        }
        let position = usize::try_from(self.cursor).map_or(0, |cursor| cursor + 1);
        self.insert_at(position, text.into());
        Ok(())
    }

    fn insert_at(&mut self, position: usize, text: String) {
        let position = position.min(self.queue.len());
        log::debug!("[{}] inserting {:?} at {}", self.owner, text, position);
        self.queue.insert(position, Command::new(text));
        if matches!(self.state, ExecutionState::Idle | ExecutionState::Finished) {
            self.state = ExecutionState::Running;
        }
    }

    /// Mark the context cancelled; the active task is torn down on the next step.
    pub(crate) fn cancel(&mut self) {
        if !self.cancelled {
            log::info!("[{}] cancelled at command {}", self.owner, self.cursor);
        }
        self.cancelled = true;
        self.cursor = -1;
    }

    /// Advance execution by one increment.
    pub(crate) fn step(&mut self, chain: &FilterChain) -> Result<bool, EngineError> {
        self.pump_output();

        if self.cancelled {
            self.drop_task();
            self.state = ExecutionState::Cancelled;
            return Ok(false);
        }
        if self.state == ExecutionState::Idle {
            return Ok(false);
        }

        if let Some(deadline) = self.awaiting_shell {
            let ready = self.shell.as_ref().is_some_and(|shell| shell.take_ready());
            if !ready && Instant::now() < deadline {
                self.state = ExecutionState::WaitingShell;
                return Ok(true);
            }
            if !ready {
                log::warn!("[{}] shell not ready before timeout, continuing", self.owner);
            }
            self.awaiting_shell = None;
        }

        self.skip_ignored();
        let index = match usize::try_from(self.cursor) {
            Ok(index) if index < self.queue.len() => index,
            _ => {
                self.state = ExecutionState::Finished;
                return Ok(false);
            }
        };

        let limit = self.settings.max_iterations;
        let mut budget = limit;
        let queue = &self.queue;
        let run = self
            .run
            .get_or_insert_with(|| ChainRun::new(queue[index].text.clone()));
        let mut cx = StepContext::new(&self.owner, &mut self.output, &self.variables);
        let poll = run.poll(chain, &mut cx, &mut budget);
        let requests = cx.take_requests();

        self.apply_requests(index, requests);
        if self.cancelled {
            self.drop_task();
            self.state = ExecutionState::Cancelled;
            return Ok(false);
        }

        match poll {
            ChainPoll::Pending => {
                self.state = ExecutionState::WaitingFilter;
                return Ok(true);
            }
            ChainPoll::Exhausted => {
                log::error!(
                    "[{}] exceeded {} transitions in one step at command {}",
                    self.owner,
                    limit,
                    self.cursor
                );
                self.state = ExecutionState::Running;
                return Err(EngineError::RunawayLoop {
                    owner: self.owner.clone(),
                    limit,
                });
            }
            ChainPoll::Consumed => {
                self.run = None;
            }
            ChainPoll::Forward(text) => {
                self.run = None;
                self.forward(&text);
            }
        }
        self.cursor += 1;

        if self.awaiting_shell.is_some() {
            self.state = ExecutionState::WaitingShell;
            return Ok(true);
        }
        if self.cursor as usize >= self.queue.len() {
            self.state = ExecutionState::Finished;
            return Ok(false);
        }
        self.state = ExecutionState::Running;
        Ok(true)
    }

    /// Move the cursor past a run of ignored commands.
    fn skip_ignored(&mut self) {
        if self.run.is_some() {
            return;
        }
        let Ok(start) = usize::try_from(self.cursor) else {
            return;
        };
        let skipped = self
            .queue
            .get(start..)
            .map_or(0, |rest| rest.iter().take_while(|c| c.ignore).count());
        if skipped > 0 {
            log::trace!("[{}] skipping {} ignored commands at {}", self.owner, skipped, start);
            self.cursor += skipped as isize;
        }
    }

    fn apply_requests(&mut self, index: usize, requests: Vec<ControlRequest>) {
        let mut position = index + 1;
        for request in requests {
            match request {
                ControlRequest::InsertNext(text) => {
                    self.insert_at(position, text);
                    position += 1;
                }
                ControlRequest::Cancel => self.cancel(),
                ControlRequest::StopShell => self.stop_shell(),
            }
        }
    }

    /// Send shell-bound text to the owner's shell, starting one if needed.
    fn forward(&mut self, text: &str) {
        if let Err(e) = self.ensure_shell() {
            log::error!("[{}] failed to start shell: {}", self.owner, e);
            self.output
                .push(&format!("[par-autorun] failed to start shell: {e}"));
            return;
        }
        let Some(shell) = self.shell.as_mut() else {
            return;
        };

        let wait_for_ready = self.settings.ready_pattern.is_some();
        if wait_for_ready {
            // Stale readiness from earlier output must not release this command
            shell.take_ready();
        }
        match shell.run(text) {
            Ok(()) => {
                log::debug!("[{}] -> shell: {:?}", self.owner, text);
                if wait_for_ready {
                    self.awaiting_shell = Some(Instant::now() + self.settings.ready_timeout);
                }
            }
            Err(e) => {
                log::error!("[{}] failed to send {:?}: {}", self.owner, text, e);
                self.output
                    .push(&format!("[par-autorun] failed to send command: {e}"));
            }
        }
    }

    fn ensure_shell(&mut self) -> Result<(), ShellError> {
        if let Some(shell) = self.shell.as_mut() {
            if shell.is_running() {
                return Ok(());
            }
            log::info!("[{}] shell is gone, starting a new one", self.owner);
            self.stop_shell();
        }

        let shell = ShellProcess::spawn(&self.settings.launch)?;
        for search in &self.settings.captures {
            shell.add_variable_search(search.clone());
        }
        shell.set_ready_pattern(self.settings.ready_pattern.as_deref());
        log::info!(
            "[{}] started shell '{}' (pid {:?})",
            self.owner,
            self.settings.launch.executable,
            shell.pid()
        );
        self.shell = Some(shell);
        Ok(())
    }

    /// Move shell output through the censor into the output buffer.
    pub(crate) fn pump_output(&mut self) {
        let Some(shell) = self.shell.as_ref() else {
            return;
        };
        let lines = shell.drain_lines();
        if lines.is_empty() {
            return;
        }
        self.variables.extend(shell.variables());
        self.absorb(&lines);
    }

    fn absorb(&mut self, lines: &[String]) {
        let output = &mut self.output;
        for line in lines {
            self.censor.feed(line, |visible| output.push(visible));
        }
    }

    /// Stop the owner's shell, keeping whatever output it already produced.
    pub(crate) fn stop_shell(&mut self) {
        self.pump_output();
        let Some(mut shell) = self.shell.take() else {
            return;
        };
        shell.stop();
        let lines = shell.drain_lines();
        self.variables.extend(shell.variables());
        self.absorb(&lines);

        let output = &mut self.output;
        self.censor.flush(|visible| output.push(visible));
        self.awaiting_shell = None;
    }

    fn drop_task(&mut self) {
        if let Some(mut run) = self.run.take() {
            log::debug!("[{}] dropping task for {:?}", self.owner, run.text());
            run.cancel();
        }
        self.awaiting_shell = None;
    }

    /// Completion estimate in `0.0..=1.0`.
    pub(crate) fn progress(&self, filter_count: usize) -> f32 {
        match self.state() {
            ExecutionState::Idle | ExecutionState::Cancelled => return 0.0,
            ExecutionState::Finished => return 1.0,
            _ => {}
        }
        if self.queue.is_empty() {
            return 1.0;
        }

        let len = self.queue.len() as f32;
        let cursor = self.cursor.max(0) as f32;
        let (filter_index, task) = self
            .run
            .as_ref()
            .map_or((0, 0.0), |run| (run.filter_index(), run.task_progress()));
        let stage = if filter_count == 0 {
            0.0
        } else {
            filter_index as f32 / filter_count as f32
        };

        let positional = (cursor + stage) / len;
        let progress = if task <= 0.0 {
            positional
        } else {
            task.max(positional)
        };
        progress.clamp(0.0, 1.0)
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.drop_task();
        self.stop_shell();
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("owner", &self.owner)
            .field("queue", &self.queue.len())
            .field("cursor", &self.cursor)
            .field("state", &self.state())
            .field("has_shell", &self.shell.is_some())
            .finish()
    }
}
