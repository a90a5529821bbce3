//! Defines the error types used throughout the VssLens library.
use std::path::PathBuf;
use thiserror::Error;

/// Represents errors that can occur while driving the SourceSafe client.
///
/// Most variants are produced by matching known text in the client's output,
/// since `ss.exe` does not use exit codes reliably.
#[derive(Debug, Error)]
pub enum VssError {
    /// The `ss.exe` executable could not be located.
    #[error("SourceSafe client is not available: {0}")]
    NotAvailable(String),

    /// Malformed input, e.g. an empty command token or a missing database file.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The database file exists but cannot be opened for both reading and writing.
    #[error("Permission denied for SourceSafe database {0:?}; read and write access are required")]
    PermissionDenied(PathBuf),

    /// The client prompted for a username, meaning the supplied credentials were rejected.
    #[error("SourceSafe rejected the credentials for `{command}`: {stdout}")]
    Authentication { command: String, stdout: String },

    /// The remote path does not exist as a project or file.
    #[error("`{command}` failed because the path does not exist in the SourceSafe database: {stdout}")]
    InvalidPath { command: String, stdout: String },

    /// The client wrote something unexpected to its error stream.
    #[error("`{command}` failed with the following stderr: {stderr}")]
    Tool { command: String, stderr: String },

    /// A file that should have been retrieved into a local directory is missing.
    #[error("Expected retrieved file was not found: {0:?}")]
    NotFound(PathBuf),

    /// The client did not exit within the configured timeout and was killed.
    #[error("`{command}` did not complete within {seconds} seconds and was terminated")]
    Timeout { command: String, seconds: u64 },

    /// Failed to start or wait for the external process.
    #[error("Unable to execute `{command}`: {source}")]
    Execution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Error accessing or writing to the local file system.
    #[error("File system error at {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VssError {
    /// Returns `true` for failures the client reported about the remote side
    /// (credentials, missing path, tool messages), as opposed to local setup problems.
    pub fn is_classified(&self) -> bool {
        matches!(
            self,
            VssError::Authentication { .. } | VssError::InvalidPath { .. } | VssError::Tool { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_embed_context() {
        let err = VssError::Tool {
            command: "Dir $/ProjA -R".to_string(),
            stderr: "Database is locked".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Dir $/ProjA -R"));
        assert!(message.contains("Database is locked"));

        let err = VssError::Timeout {
            command: "Get $/ProjA".to_string(),
            seconds: 30,
        };
        assert!(err.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_classified_errors() {
        assert!(VssError::Authentication {
            command: "Dir".to_string(),
            stdout: "Username:".to_string(),
        }
        .is_classified());
        assert!(!VssError::NotAvailable("ss.exe".to_string()).is_classified());
        assert!(!VssError::NotFound(PathBuf::from("a.txt")).is_classified());
    }
}
