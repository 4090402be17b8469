//! Built-in named commands: `sleep`, `clear`, `quit`, `exit`, `log`.

use std::time::{Duration, Instant};

use super::dispatch::NamedCommand;
use super::{ControlRequest, FilterTask, Immediate, StepContext};

/// `sleep <seconds>`: wait without blocking the scheduler.
pub struct SleepCommand;

impl SleepCommand {
    fn parse(args: &[&str]) -> Option<Duration> {
        let [secs] = args else { return None };
        let secs: f64 = secs.parse().ok()?;
        Duration::try_from_secs_f64(secs).ok()
    }
}

impl NamedCommand for SleepCommand {
    fn token(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Pause the queue for the given number of seconds"
    }

    fn start(
        &self,
        cx: &mut StepContext<'_>,
        args: &[&str],
        _command: &str,
    ) -> Box<dyn FilterTask> {
        match Self::parse(args) {
            Some(duration) => {
                log::debug!("[{}] sleeping {:?}", cx.owner(), duration);
                Box::new(SleepTask::new(duration))
            }
            None => {
                log::warn!("[{}] sleep: invalid arguments {:?}", cx.owner(), args);
                cx.print(&format!("sleep: invalid duration {:?}", args.join(" ")));
                Immediate::consume()
            }
        }
    }
}

/// Pending `sleep`; finishes once its deadline has passed.
#[derive(Debug)]
pub struct SleepTask {
    started: Instant,
    duration: Duration,
}

impl SleepTask {
    pub fn new(duration: Duration) -> Self {
        Self {
            started: Instant::now(),
            duration,
        }
    }
}

impl FilterTask for SleepTask {
    fn finished(&mut self, _cx: &mut StepContext<'_>) -> bool {
        self.started.elapsed() >= self.duration
    }

    fn result(&mut self) -> Option<String> {
        None
    }

    fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.started.elapsed().as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

/// `clear`: empty the owner's output buffer.
pub struct ClearCommand;

impl NamedCommand for ClearCommand {
    fn token(&self) -> &str {
        "clear"
    }

    fn description(&self) -> &str {
        "Clear the output buffer"
    }

    fn start(&self, cx: &mut StepContext<'_>, _args: &[&str], _command: &str) -> Box<dyn FilterTask> {
        cx.clear_output();
        Immediate::consume()
    }
}

/// `quit`: cancel the rest of the queue.
pub struct QuitCommand;

impl NamedCommand for QuitCommand {
    fn token(&self) -> &str {
        "quit"
    }

    fn description(&self) -> &str {
        "Cancel the remaining commands"
    }

    fn start(&self, cx: &mut StepContext<'_>, _args: &[&str], _command: &str) -> Box<dyn FilterTask> {
        log::info!("[{}] quit requested", cx.owner());
        cx.request(ControlRequest::Cancel);
        Immediate::consume()
    }
}

/// `exit`: stop the shell; the next forwarded command starts a new one.
pub struct ExitCommand;

impl NamedCommand for ExitCommand {
    fn token(&self) -> &str {
        "exit"
    }

    fn description(&self) -> &str {
        "Stop the shell process"
    }

    fn start(&self, cx: &mut StepContext<'_>, _args: &[&str], _command: &str) -> Box<dyn FilterTask> {
        cx.request(ControlRequest::StopShell);
        Immediate::consume()
    }
}

/// `log <text>`: print `text` and write it to the debug log.
pub struct LogCommand;

impl NamedCommand for LogCommand {
    fn token(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Print a message"
    }

    fn start(&self, cx: &mut StepContext<'_>, _args: &[&str], command: &str) -> Box<dyn FilterTask> {
        // Keep the message's own spacing
        let message = command
            .trim_start()
            .strip_prefix(self.token())
            .unwrap_or_default()
            .trim();
        log::info!("[{}] {}", cx.owner(), message);
        cx.print(message);
        Immediate::consume()
    }
}
