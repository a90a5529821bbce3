//! SourceSafe provider implementation.

use crate::config::ProviderConfig;
use crate::error::VssError;
use crate::listing::parse_listing;
use crate::locator::ExecutableLocator;
use crate::models::DirectoryTree;
use crate::providers::SourceControlProvider;
use crate::runner::{Invocation, ProcessRunner};
use crate::types::{Label, RemotePath, Result};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Argument construction for the client commands used by the providers.
pub(crate) mod commands {
    use crate::error::VssError;
    use crate::types::{Label, RemotePath, Result};
    use std::path::Path;

    pub const DIR: &str = "Dir";
    pub const GET: &str = "Get";
    pub const LABEL: &str = "Label";

    /// Answers "yes" to every interactive question.
    const NON_INTERACTIVE: &str = "-I-Y";
    const RECURSIVE: &str = "-R";
    const FILES_AND_FOLDERS: &str = "-F";
    const REPLACE_WRITABLE: &str = "-GWR";

    /// `Dir <path> -R -F -I-Y`, or the plain root listing for the empty path.
    pub fn list(path: &RemotePath) -> Vec<String> {
        if path.is_empty() {
            return validate();
        }
        vec![
            path.as_argument().to_string(),
            RECURSIVE.to_string(),
            FILES_AND_FOLDERS.to_string(),
            NON_INTERACTIVE.to_string(),
        ]
    }

    /// `Dir $/ -I-Y`
    pub fn validate() -> Vec<String> {
        vec![RemotePath::root().as_argument().to_string(), NON_INTERACTIVE.to_string()]
    }

    /// `Get <file> -GL<dir> -I-Y`
    pub fn fetch(file: &RemotePath, local_dir: &Path) -> Result<Vec<String>> {
        Ok(vec![
            file.as_argument().to_string(),
            local_switch("-GL", local_dir)?,
            NON_INTERACTIVE.to_string(),
        ])
    }

    /// `Get <src> -R -GL<target> -GWR [-VL<label>] -I-Y`
    pub fn get(source: &RemotePath, target: &Path, label: Option<&Label>) -> Result<Vec<String>> {
        let mut args = vec![
            source.as_argument().to_string(),
            RECURSIVE.to_string(),
            local_switch("-GL", target)?,
            REPLACE_WRITABLE.to_string(),
        ];
        if let Some(label) = label {
            args.push(format!("-VL{}", label));
        }
        args.push(NON_INTERACTIVE.to_string());
        Ok(args)
    }

    /// `Label <path> -L<label> -I-Y`
    pub fn label(label: &Label, path: &RemotePath) -> Vec<String> {
        vec![
            path.as_argument().to_string(),
            format!("-L{}", label),
            NON_INTERACTIVE.to_string(),
        ]
    }

    /// A switch with a local path glued to it, as the client expects (`-GLC:\out`).
    fn local_switch(switch: &str, path: &Path) -> Result<String> {
        path.to_str()
            .map(|p| format!("{}{}", switch, p))
            .ok_or_else(|| {
                VssError::InvalidArgument(format!(
                    "local path {:?} is not valid UTF-8",
                    path
                ))
            })
    }
}

/// Drives `ss.exe` for one configured database.
///
/// Every call spawns its own process and builds its result from scratch, so a
/// provider can be shared between threads.
#[derive(Debug, Clone)]
pub struct SourceSafeProvider {
    config: ProviderConfig,
    runner: ProcessRunner,
}

impl SourceSafeProvider {
    /// Creates a provider that looks for the client in the standard places.
    pub fn new(config: ProviderConfig) -> Self {
        let locator = ExecutableLocator::new(config.executable_path.clone());
        Self::with_locator(config, locator)
    }

    /// Creates a provider with a custom executable search.
    pub fn with_locator(config: ProviderConfig, locator: ExecutableLocator) -> Self {
        SourceSafeProvider {
            config,
            runner: ProcessRunner::new(locator),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn invocation(&self, command: &str, arguments: Vec<String>) -> Invocation {
        Invocation::new(command, &self.config.database_path)
            .args(arguments)
            .credentials(self.config.credentials_for_invocation())
            .timeout(self.config.timeout())
    }

    fn execute(&self, command: &str, arguments: Vec<String>) -> Result<String> {
        self.runner.execute(&self.invocation(command, arguments))
    }
}

impl SourceControlProvider for SourceSafeProvider {
    fn is_available(&self) -> bool {
        self.runner.locator().is_available()
    }

    fn validate_connection(&self) -> Result<()> {
        self.execute(commands::DIR, commands::validate())?;
        info!(database = %self.config.database_path.display(), "SourceSafe connection validated");
        Ok(())
    }

    /// Lists `path` recursively.
    ///
    /// For the empty path a non-recursive listing of the root still runs, to
    /// surface credential and database problems, but the fixed root shape is returned.
    fn list_directory(&self, path: &RemotePath) -> Result<DirectoryTree> {
        let output = self.execute(commands::DIR, commands::list(path))?;
        let tree = parse_listing(&output, path.as_str());
        info!(
            path = %path,
            directories = tree.directory_paths().len(),
            files = tree.file_count(),
            "listed SourceSafe project"
        );
        Ok(tree)
    }

    /// Retrieves `file` into a scratch directory and returns its bytes.
    ///
    /// # Errors
    /// Returns `VssError::NotFound` if the client reported success but left no file behind.
    fn fetch_file_content(&self, file: &RemotePath) -> Result<Vec<u8>> {
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

        self.execute(commands::GET, commands::fetch(file, scratch.path())?)?;

        let local = scratch.path().join(file.file_name());
        let content = read_retrieved(&local)?;
        info!(path = %file, bytes = content.len(), "fetched SourceSafe file");
        Ok(content)
    }

    fn get_latest(&self, source: &RemotePath, target: &Path) -> Result<()> {
        ensure_directory(target)?;
        self.execute(commands::GET, commands::get(source, target, None)?)?;
        info!(source = %source, target = %target.display(), "retrieved latest SourceSafe version");
        Ok(())
    }

    fn apply_label(&self, label: &Label, path: &RemotePath) -> Result<()> {
        self.execute(commands::LABEL, commands::label(label, path))?;
        info!(label = %label, path = %path, "applied SourceSafe label");
        Ok(())
    }

    fn get_labeled(&self, label: &Label, source: &RemotePath, target: &Path) -> Result<()> {
        ensure_directory(target)?;
        self.execute(commands::GET, commands::get(source, target, Some(label))?)?;
        info!(label = %label, source = %source, target = %target.display(), "retrieved labeled SourceSafe version");
        Ok(())
    }
}

/// Creates `target` and its parents if needed.
pub(crate) fn ensure_directory(target: &Path) -> Result<()> {
    fs::create_dir_all(target).map_err(|source| VssError::FileSystem {
        path: target.to_path_buf(),
        source,
    })
}

/// Maps a failed read of a retrieved file to `NotFound` or `FileSystem`.
pub(crate) fn retrieval_error(local: PathBuf, source: std::io::Error) -> VssError {
    if source.kind() == ErrorKind::NotFound {
        VssError::NotFound(local)
    } else {
        VssError::FileSystem {
            path: local,
            source,
        }
    }
}

fn read_retrieved(local: &Path) -> Result<Vec<u8>> {
    fs::read(local).map_err(|source| retrieval_error(local.to_path_buf(), source))
}
