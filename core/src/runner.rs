//! Runs the SourceSafe client and classifies what it printed.
//!
//! `ss.exe` exit codes are not reliable, so success or failure is decided by
//! matching known text in the captured streams. Both streams are drained by
//! their own reader thread so the child never blocks on a full pipe.

use crate::error::VssError;
use crate::locator::ExecutableLocator;
use crate::types::{Credentials, Result};

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Environment variable the client reads to find its database directory.
pub const DATABASE_ENV_VAR: &str = "SSDIR";

/// Prompt printed on stdout when the client wants credentials.
pub const AUTH_PROMPT: &str = "Username:";

/// Printed on stdout when a project or file does not exist.
pub const INVALID_PATH_MARKER: &str = "is not an existing filename or project";

/// Interactive question written to stderr that is not an error.
pub const DEFAULT_FOLDER_PROMPT: &str = "as the default project folder";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(25);
const READ_CHUNK: usize = 8 * 1024;

/// One call of the client: command token, arguments, credentials, database and time limit.
#[derive(Debug, Clone)]
pub struct Invocation {
    command: String,
    arguments: Vec<String>,
    credentials: Option<Credentials>,
    database_path: PathBuf,
    timeout: Duration,
}

impl Invocation {
    /// Creates an invocation of `command` against the database at `database_path`.
    pub fn new<P: AsRef<Path>>(command: impl Into<String>, database_path: P) -> Self {
        Invocation {
            command: command.into(),
            arguments: Vec::new(),
            credentials: None,
            database_path: database_path.as_ref().to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn time_limit(&self) -> Duration {
        self.timeout
    }

    /// Full argument vector: command token, arguments, then `-Y<user>[,<password>]`.
    pub(crate) fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.arguments.len() + 2);
        argv.push(self.command.clone());
        argv.extend(self.arguments.iter().cloned());
        if let Some(credentials) = &self.credentials {
            argv.push(credentials.to_argument());
        }
        argv
    }

    /// The command line as shown in logs and errors; the password is masked.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.arguments.len() + 2);
        parts.push(quote(&self.command));
        parts.extend(self.arguments.iter().map(|a| quote(a)));
        if let Some(credentials) = &self.credentials {
            parts.push(quote(&credentials.to_redacted_argument()));
        }
        parts.join(" ")
    }

    /// Checks the command token and the database file, returning the directory for `SSDIR`.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty command or missing database,
    /// `PermissionDenied` when the database cannot be opened read/write.
    pub(crate) fn prepare(&self) -> Result<PathBuf> {
        if self.command.trim().is_empty() {
            return Err(VssError::InvalidArgument(
                "no SourceSafe command was given".to_string(),
            ));
        }

        let database = &self.database_path;
        if database.as_os_str().is_empty() || !database.exists() {
            return Err(VssError::InvalidArgument(format!(
                "database file {} does not exist",
                database.display()
            )));
        }

        // Opening without truncate or create leaves the file untouched.
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(database)
            .map_err(|source| match source.kind() {
                ErrorKind::PermissionDenied => VssError::PermissionDenied(database.clone()),
                _ => VssError::FileSystem {
                    path: database.clone(),
                    source,
                },
            })?;

        Ok(match database.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        })
    }
}

fn quote(argument: &str) -> String {
    if argument.chars().any(char::is_whitespace) {
        format!("\"{}\"", argument)
    } else {
        argument.to_string()
    }
}

/// Output captured from one run of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// The process was killed after the timeout elapsed.
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Classifies the captured text, returning stdout verbatim on success.
    ///
    /// # Errors
    /// `Authentication` when stdout starts with the username prompt,
    /// `InvalidPath` when stdout reports a missing project or file,
    /// `Tool` for any other stderr content, and `Timeout` when the run was cut short.
    pub fn into_stdout(self, invocation: &Invocation) -> Result<String> {
        if starts_with_ignore_case(self.stdout.trim_start(), AUTH_PROMPT) {
            return Err(VssError::Authentication {
                command: invocation.command_line(),
                stdout: self.stdout.trim().to_string(),
            });
        }

        if self.stdout.contains(INVALID_PATH_MARKER) {
            return Err(VssError::InvalidPath {
                command: invocation.command_line(),
                stdout: self.stdout.trim().to_string(),
            });
        }

        if !self.stderr.trim().is_empty() && !self.stderr.contains(DEFAULT_FOLDER_PROMPT) {
            return Err(VssError::Tool {
                command: invocation.command_line(),
                stderr: self.stderr,
            });
        }

        if self.timed_out {
            return Err(VssError::Timeout {
                command: invocation.command_line(),
                seconds: invocation.timeout.as_secs(),
            });
        }

        Ok(self.stdout)
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

/// Launches the client for a single [`Invocation`] and blocks until it finishes or times out.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    locator: ExecutableLocator,
}

impl ProcessRunner {
    pub fn new(locator: ExecutableLocator) -> Self {
        ProcessRunner { locator }
    }

    pub fn locator(&self) -> &ExecutableLocator {
        &self.locator
    }

    /// Runs the client and returns whatever it printed, without classifying it.
    ///
    /// On timeout the child is killed and the partial output is returned with
    /// `timed_out` set.
    ///
    /// # Errors
    /// Returns `VssError` for invalid input, a missing executable, or a failure
    /// to start or wait for the process.
    pub fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        let database_dir = invocation.prepare()?;
        let executable = self.locator.resolve()?;
        let command_line = invocation.command_line();
        debug!(
            executable = %executable.display(),
            command = %command_line,
            ssdir = %database_dir.display(),
            "running SourceSafe client"
        );

        let mut child = Command::new(&executable)
            .args(invocation.argv())
            .env(DATABASE_ENV_VAR, &database_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| VssError::Execution {
                command: command_line.clone(),
                source,
            })?;

        let mut stdout = StreamBuffer::drain(child.stdout.take());
        let mut stderr = StreamBuffer::drain(child.stderr.take());

        let deadline = Instant::now() + invocation.timeout;
        let mut timed_out = wait_with_deadline(&mut child, deadline, &command_line)?;
        if !timed_out {
            // A descendant that inherited the pipes can keep them open after the client exits.
            let stdout_closed = stdout.wait_until(deadline);
            let stderr_closed = stderr.wait_until(deadline);
            timed_out = !(stdout_closed && stderr_closed);
        }
        if timed_out {
            warn!(
                command = %command_line,
                timeout_secs = invocation.timeout.as_secs(),
                "SourceSafe client did not finish within the timeout"
            );
        }

        Ok(ExecutionResult {
            stdout: stdout.snapshot(),
            stderr: stderr.snapshot(),
            timed_out,
        })
    }

    /// Runs the client and classifies its output, returning stdout on success.
    pub fn execute(&self, invocation: &Invocation) -> Result<String> {
        self.run(invocation)?.into_stdout(invocation)
    }
}

/// Polls the child until it exits or `deadline` passes; kills it in the latter case.
fn wait_with_deadline(child: &mut Child, deadline: Instant, command_line: &str) -> Result<bool> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(command = %command_line, ?status, "SourceSafe client exited");
                return Ok(false);
            }
            Ok(None) => {}
            Err(source) => {
                return Err(VssError::Execution {
                    command: command_line.to_string(),
                    source,
                })
            }
        }

        let now = Instant::now();
        if now >= deadline {
            if let Err(e) = child.kill() {
                debug!(command = %command_line, error = %e, "kill after timeout failed");
            }
            let _ = child.wait();
            return Ok(true);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// One output stream, accumulated by a dedicated reader thread under its own lock.
struct StreamBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    closed: Receiver<()>,
}

impl StreamBuffer {
    fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (closed_tx, closed) = mpsc::channel();
        let reader = stream.map(|mut stream| {
            let sink = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    match stream.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => sink
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!(error = %e, "stopped reading SourceSafe client output");
                            break;
                        }
                    }
                }
                let _ = closed_tx.send(());
            })
        });
        StreamBuffer {
            buffer,
            reader,
            closed,
        }
    }

    /// Waits for end of stream until `deadline`; `false` if the stream is still open.
    fn wait_until(&mut self, deadline: Instant) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Err(RecvTimeoutError::Timeout) = self.closed.recv_timeout(remaining) {
            return false;
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        true
    }

    fn snapshot(&self) -> String {
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
