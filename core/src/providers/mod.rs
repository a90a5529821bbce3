//! Source control providers exposed to the host build platform.
//!
//! The host works against [`SourceControlProvider`]; the only implementation
//! drives the SourceSafe command-line client.

pub mod sourcesafe;

use crate::models::DirectoryTree;
use crate::types::{Label, RemotePath, Result};

use std::path::Path;

pub use sourcesafe::SourceSafeProvider;

/// Operations the host platform calls on a source control provider.
pub trait SourceControlProvider: Send + Sync {
    /// Checks whether the client executable can be found.
    fn is_available(&self) -> bool;

    /// Runs a cheap listing to verify the database and credentials.
    fn validate_connection(&self) -> Result<()>;

    /// Lists a project recursively.
    fn list_directory(&self, path: &RemotePath) -> Result<DirectoryTree>;

    /// Returns the content of a single file.
    fn fetch_file_content(&self, file: &RemotePath) -> Result<Vec<u8>>;

    /// Retrieves the latest version of `source` into the local `target` directory.
    fn get_latest(&self, source: &RemotePath, target: &Path) -> Result<()>;

    /// Applies `label` to `path`.
    fn apply_label(&self, label: &Label, path: &RemotePath) -> Result<()>;

    /// Retrieves the version of `source` carrying `label` into `target`.
    fn get_labeled(&self, label: &Label, source: &RemotePath, target: &Path) -> Result<()>;
}

/// Creates the provider for the given settings.
pub fn provider_for_config(config: crate::config::ProviderConfig) -> Box<dyn SourceControlProvider> {
    Box::new(SourceSafeProvider::new(config))
}
