//! Provides asynchronous versions of the SourceSafe provider operations using tokio.

use crate::config::ProviderConfig;
use crate::error::VssError;
use crate::listing::parse_listing;
use crate::locator::ExecutableLocator;
use crate::models::DirectoryTree;
use crate::providers::sourcesafe::{commands, retrieval_error};
use crate::runner::{ExecutionResult, Invocation, DATABASE_ENV_VAR};
use crate::types::{Label, RemotePath, Result};

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 8 * 1024;

/// SourceSafe provider whose operations run on the tokio runtime.
#[derive(Debug, Clone)]
pub struct AsyncSourceSafeProvider {
    config: ProviderConfig,
    locator: ExecutableLocator,
}

impl AsyncSourceSafeProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let locator = ExecutableLocator::new(config.executable_path.clone());
        Self::with_locator(config, locator)
    }

    pub fn with_locator(config: ProviderConfig, locator: ExecutableLocator) -> Self {
        AsyncSourceSafeProvider { config, locator }
    }

    pub fn is_available(&self) -> bool {
        self.locator.is_available()
    }

    /// Runs a cheap listing to verify the database and credentials.
    pub async fn validate_connection(&self) -> Result<()> {
        self.execute(commands::DIR, commands::validate()).await?;
        Ok(())
    }

    /// Lists `path` recursively.
    pub async fn list_directory(&self, path: &RemotePath) -> Result<DirectoryTree> {
        let output = self.execute(commands::DIR, commands::list(path)).await?;
        Ok(parse_listing(&output, path.as_str()))
    }

    /// Retrieves `file` into a scratch directory and returns its bytes.
    pub async fn fetch_file_content(&self, file: &RemotePath) -> Result<Vec<u8>> {
        if file.is_empty() {
            return Err(VssError::InvalidArgument(
                "a file path is required to fetch content".to_string(),
            ));
        }

        let scratch = tempfile::Builder::new()
            .prefix("vsslens-")
            .tempdir()
            .map_err(|source| VssError::FileSystem {
                path: std::env::temp_dir(),
                source,
            })?;
        self.execute(commands::GET, commands::fetch(file, scratch.path())?)
            .await?;

        let local = scratch.path().join(file.file_name());
        tokio::fs::read(&local)
            .await
            .map_err(|source| retrieval_error(local.clone(), source))
    }

    pub async fn get_latest(&self, source: &RemotePath, target: &Path) -> Result<()> {
        create_target(target).await?;
        self.execute(commands::GET, commands::get(source, target, None)?)
            .await?;
        Ok(())
    }

    pub async fn apply_label(&self, label: &Label, path: &RemotePath) -> Result<()> {
        self.execute(commands::LABEL, commands::label(label, path))
            .await?;
        Ok(())
    }

    pub async fn get_labeled(&self, label: &Label, source: &RemotePath, target: &Path) -> Result<()> {
        create_target(target).await?;
        self.execute(commands::GET, commands::get(source, target, Some(label))?)
            .await?;
        Ok(())
    }

    async fn execute(&self, command: &str, arguments: Vec<String>) -> Result<String> {
        let invocation = Invocation::new(command, &self.config.database_path)
            .args(arguments)
            .credentials(self.config.credentials_for_invocation())
            .timeout(self.config.timeout());
        let output = run_async(&self.locator, &invocation).await?.into_stdout(&invocation)?;
        info!(command = %invocation.command_line(), "SourceSafe command completed");
        Ok(output)
    }
}

async fn create_target(target: &Path) -> Result<()> {
    tokio::fs::create_dir_all(target)
        .await
        .map_err(|source| VssError::FileSystem {
            path: target.to_path_buf(),
            source,
        })
}

// --- Async Helper Functions ---

/// Runs the client on the tokio runtime, killing it once the invocation's timeout elapses.
pub async fn run_async(locator: &ExecutableLocator, invocation: &Invocation) -> Result<ExecutionResult> {
    let database_dir = invocation.prepare()?;
    let executable = locator.resolve()?;
    let command_line = invocation.command_line();
    debug!(executable = %executable.display(), command = %command_line, "running SourceSafe client");

    let mut child = Command::new(&executable)
        .args(invocation.argv())
        .env(DATABASE_ENV_VAR, &database_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| VssError::Execution {
            command: command_line.clone(),
            source,
        })?;

    let mut stdout = AsyncStreamBuffer::drain(child.stdout.take());
    let mut stderr = AsyncStreamBuffer::drain(child.stderr.take());

    let deadline = Instant::now() + invocation.time_limit();
    let waited = tokio::time::timeout_at(deadline, child.wait()).await;
    match waited {
        Ok(Ok(status)) => {
            debug!(command = %command_line, ?status, "SourceSafe client exited");
            // A descendant that inherited the pipes can keep them open after the client exits.
            let closed = tokio::time::timeout_at(deadline, async {
                stdout.wait_closed().await;
                stderr.wait_closed().await;
            })
            .await
            .is_ok();
            if !closed {
                warn!(
                    command = %command_line,
                    timeout_secs = invocation.time_limit().as_secs(),
                    "SourceSafe client output stayed open past the timeout"
                );
            }
            Ok(ExecutionResult {
                stdout: stdout.abandon(),
                stderr: stderr.abandon(),
                timed_out: !closed,
            })
        }
        Ok(Err(source)) => Err(VssError::Execution {
            command: command_line,
            source,
        }),
        Err(_) => {
            if let Err(e) = child.kill().await {
                debug!(command = %command_line, error = %e, "kill after timeout failed");
            }
            warn!(
                command = %command_line,
                timeout_secs = invocation.time_limit().as_secs(),
                "SourceSafe client did not finish within the timeout"
            );
            Ok(ExecutionResult {
                stdout: stdout.abandon(),
                stderr: stderr.abandon(),
                timed_out: true,
            })
        }
    }
}

/// One output stream, drained by its own task into its own buffer.
struct AsyncStreamBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl AsyncStreamBuffer {
    fn drain<R: AsyncRead + Unpin + Send + 'static>(stream: Option<R>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = stream.map(|mut stream| {
            let sink = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => sink
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                        Err(e) => {
                            debug!(error = %e, "stopped reading SourceSafe client output");
                            break;
                        }
                    }
                }
            })
        });
        AsyncStreamBuffer { buffer, reader }
    }

    /// Waits for end of stream.
    async fn wait_closed(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            let _ = reader.await;
        }
        self.reader = None;
    }

    /// Stops reading and returns what has arrived so far.
    fn abandon(mut self) -> String {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.snapshot()
    }

    fn snapshot(&self) -> String {
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
