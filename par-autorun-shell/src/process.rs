//! Single shell subprocess management.
//!
//! [`ShellProcess`] manages the lifecycle of one shell subprocess with piped
//! stdin/stdout/stderr. Each output stream gets a reader thread that splits
//! the stream into lines, runs the registered variable searches and the
//! readiness search over every line, and queues it. The cooperative side
//! drains the queue with [`ShellProcess::drain_lines`].

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use par_autorun_triggers::{NamedRegexSearch, ReadLogic};

use crate::error::ShellError;

/// Callback invoked on the reader thread for every line read.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Predicate polled by [`ShellProcess::is_running`]; returning `false`
/// marks the shell as no longer wanted.
pub type KeepAlive = Box<dyn Fn() -> bool + Send + Sync>;

/// Parameters for spawning a shell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellLaunch {
    pub executable: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    /// Added on top of the inherited environment.
    pub env_vars: HashMap<String, String>,
}

impl ShellLaunch {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }
}

/// State shared between the owning [`ShellProcess`] and its reader threads.
#[derive(Default)]
struct LineSink {
    lines: Mutex<VecDeque<String>>,
    searches: Mutex<Vec<NamedRegexSearch>>,
    variables: Mutex<HashMap<String, String>>,
    ready_search: Mutex<Option<NamedRegexSearch>>,
    ready: AtomicBool,
    on_line: Mutex<Option<LineCallback>>,
}

impl LineSink {
    fn accept(&self, line: String, is_last_line: bool) {
        {
            let mut searches = self.searches.lock();
            for search in searches.iter_mut() {
                if let Some(value) = search.process(&line, is_last_line) {
                    log::debug!("ShellProcess: captured {} = {:?}", search.name, value);
                    self.variables.lock().insert(search.name.clone(), value);
                }
            }
        }

        let ready = self
            .ready_search
            .lock()
            .as_mut()
            .is_some_and(|search| search.process(&line, is_last_line).is_some());
        if ready {
            self.ready.store(true, Ordering::Release);
        }

        // Clone out of the lock so the callback may touch the process.
        let callback = self.on_line.lock().clone();
        if let Some(callback) = callback {
            callback(&line);
        }

        self.lines.lock().push_back(line);
    }

    /// Run only the readiness search over an unterminated line.
    ///
    /// Interactive prompts end without a newline, so they would otherwise
    /// never reach the ready search. The text is queued once its line ends.
    fn accept_partial(&self, partial: &str) {
        let ready = self
            .ready_search
            .lock()
            .as_mut()
            .is_some_and(|search| search.process(partial, true).is_some());
        if ready {
            self.ready.store(true, Ordering::Release);
        }
    }
}

/// Manages a single shell subprocess with line-oriented output.
pub struct ShellProcess {
    /// The child process handle, if still alive.
    child: Option<Child>,
    /// Writer to the child's stdin, if still open.
    stdin_writer: Option<ChildStdin>,
    working_directory: Option<PathBuf>,
    sink: Arc<LineSink>,
    /// Handle to the background thread reading stdout.
    stdout_thread: Option<JoinHandle<()>>,
    /// Handle to the background thread reading stderr.
    stderr_thread: Option<JoinHandle<()>>,
    keep_alive: Option<KeepAlive>,
}

impl ShellProcess {
    /// Spawn a shell with piped stdin/stdout/stderr.
    ///
    /// The environment is inherited and extended with `launch.env_vars`.
    /// On Windows no console window is created.
    ///
    /// # Errors
    /// Returns [`ShellError::Spawn`] if the executable cannot be started.
    pub fn spawn(launch: &ShellLaunch) -> Result<Self, ShellError> {
        let mut cmd = Command::new(&launch.executable);
        cmd.args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&launch.env_vars);
        if let Some(dir) = &launch.working_directory {
            cmd.current_dir(dir);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
            command: launch.executable.clone(),
            source,
        })?;

        let stdin_writer = child.stdin.take();
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ShellError::MissingPipe("stdout/stderr"));
        };

        let sink = Arc::new(LineSink::default());
        let readers = spawn_reader(stdout, Arc::clone(&sink), "stdout").and_then(|out| {
            spawn_reader(stderr, Arc::clone(&sink), "stderr").map(|err| (out, err))
        });
        let (stdout_thread, stderr_thread) = match readers {
            Ok(handles) => handles,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ShellError::Reader(e));
            }
        };

        log::info!(
            "ShellProcess: spawned '{}' (pid {})",
            launch.executable,
            child.id()
        );

        Ok(Self {
            child: Some(child),
            stdin_writer,
            working_directory: launch.working_directory.clone(),
            sink,
            stdout_thread: Some(stdout_thread),
            stderr_thread: Some(stderr_thread),
            keep_alive: None,
        })
    }

    /// OS process id, while the child handle is held.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Whether the shell is usable.
    ///
    /// True only while the child has not exited, the stdout reader is still
    /// alive, and the keep-alive predicate (if any) returns true.
    pub fn is_running(&mut self) -> bool {
        let alive = match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        };
        let reading = self
            .stdout_thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished());
        alive && reading && self.keep_alive.as_ref().is_none_or(|keep| keep())
    }

    /// Write `command` followed by a newline to the shell's stdin.
    ///
    /// # Errors
    /// [`ShellError::NotRunning`] when the shell is gone; the caller decides
    /// whether to spawn a replacement.
    pub fn run(&mut self, command: &str) -> Result<(), ShellError> {
        if !self.is_running() {
            return Err(ShellError::NotRunning);
        }
        let stdin = self.stdin_writer.as_mut().ok_or(ShellError::NotRunning)?;
        writeln!(stdin, "{}", command)?;
        stdin.flush()?;
        log::trace!("ShellProcess: wrote {:?}", command);
        Ok(())
    }

    /// Take every line read since the last call, in arrival order.
    pub fn drain_lines(&self) -> Vec<String> {
        self.sink.lines.lock().drain(..).collect()
    }

    pub fn has_pending_lines(&self) -> bool {
        !self.sink.lines.lock().is_empty()
    }

    /// Register a search run against every output line.
    ///
    /// Matches are stored under the search's name; see [`Self::variables`].
    pub fn add_variable_search(&self, search: NamedRegexSearch) {
        self.sink.searches.lock().push(search);
    }

    pub fn remove_variable_search(&self, name: &str) -> bool {
        let mut searches = self.sink.searches.lock();
        let before = searches.len();
        searches.retain(|s| s.name != name);
        searches.len() != before
    }

    /// Snapshot of the captured variables.
    pub fn variables(&self) -> HashMap<String, String> {
        self.sink.variables.lock().clone()
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.sink.variables.lock().get(name).cloned()
    }

    /// Set (or clear) the pattern announcing that the shell is ready.
    ///
    /// Only the most recent line is checked, so old prompts in a burst of
    /// output do not count.
    pub fn set_ready_pattern(&self, pattern: Option<&str>) {
        *self.sink.ready_search.lock() = pattern.map(|p| {
            NamedRegexSearch::new("ready", p).with_read_logic(ReadLogic::OnlyLastLine)
        });
        self.sink.ready.store(false, Ordering::Release);
    }

    /// Return whether the ready pattern fired since the last call, and reset it.
    pub fn take_ready(&self) -> bool {
        self.sink.ready.swap(false, Ordering::AcqRel)
    }

    /// Callback invoked on the reader thread for every line.
    pub fn set_on_line(&self, callback: Option<LineCallback>) {
        *self.sink.on_line.lock() = callback;
    }

    pub fn set_keep_alive(&mut self, keep_alive: Option<KeepAlive>) {
        self.keep_alive = keep_alive;
    }

    /// Stop the subprocess.
    ///
    /// Drops stdin (EOF to the child), kills the child and reaps it. Reader
    /// threads that already finished are joined; the rest are detached and
    /// exit on their own once the pipes close. Queued lines stay drainable.
    pub fn stop(&mut self) {
        self.stdin_writer.take();

        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            log::info!("ShellProcess: stopped pid {}", child.id());
        }

        for handle in [self.stdout_thread.take(), self.stderr_thread.take()]
            .into_iter()
            .flatten()
        {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::debug!("ShellProcess: detaching reader thread still draining output");
            }
        }
    }
}

impl Drop for ShellProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start a thread splitting `stream` into lines for `sink`.
///
/// Lines keep their newline. A trailing partial line is delivered at EOF;
/// before that, each partial read is offered to the readiness search.
fn spawn_reader<R>(
    stream: R,
    sink: Arc<LineSink>,
    label: &'static str,
) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("par-autorun-{}", label))
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut pending = Vec::new();
            loop {
                let (consumed, complete) = match reader.fill_buf() {
                    Ok([]) => break,
                    Ok(available) => {
                        let (consumed, complete) =
                            match available.iter().position(|&b| b == b'\n') {
                                Some(i) => (i + 1, true),
                                None => (available.len(), false),
                            };
                        pending.extend_from_slice(&available[..consumed]);
                        (consumed, complete)
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::warn!("ShellProcess: error reading {}: {}", label, e);
                        break;
                    }
                };
                reader.consume(consumed);

                if complete {
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    let is_last_line = !reader.buffer().contains(&b'\n');
                    sink.accept(line, is_last_line);
                } else {
                    sink.accept_partial(&String::from_utf8_lossy(&pending));
                }
            }
            if !pending.is_empty() {
                sink.accept(String::from_utf8_lossy(&pending).into_owned(), true);
            }
            log::debug!("ShellProcess: {} reader finished", label);
        })
}
