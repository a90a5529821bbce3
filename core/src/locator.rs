//! Locates the `ss.exe` executable.
//!
//! Candidates are tried in order: the explicitly configured path, the two
//! standard install directories, then a system lookup (the SourceSafe
//! registry key on Windows). The first existing file wins.

use crate::error::VssError;
use crate::types::Result;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Executable name of the SourceSafe command-line client.
pub const EXECUTABLE_NAME: &str = "ss.exe";

const PROGRAM_FILES_PATH: &str = r"C:\Program Files\Microsoft Visual SourceSafe\ss.exe";
const PROGRAM_FILES_X86_PATH: &str = r"C:\Program Files (x86)\Microsoft Visual SourceSafe\ss.exe";

/// A last-resort lookup returning a candidate executable path.
pub type SystemLookup = Arc<dyn Fn() -> Option<PathBuf> + Send + Sync>;

/// Resolves the client executable.
#[derive(Clone)]
pub struct ExecutableLocator {
    explicit: Option<PathBuf>,
    well_known: Vec<PathBuf>,
    system_lookup: SystemLookup,
}

impl fmt::Debug for ExecutableLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableLocator")
            .field("explicit", &self.explicit)
            .field("well_known", &self.well_known)
            .finish_non_exhaustive()
    }
}

impl ExecutableLocator {
    /// Creates a locator with the standard install paths and the platform system lookup.
    ///
    /// A blank `explicit` path counts as not configured.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        ExecutableLocator {
            explicit: explicit.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty()),
            well_known: vec![
                PathBuf::from(PROGRAM_FILES_PATH),
                PathBuf::from(PROGRAM_FILES_X86_PATH),
            ],
            system_lookup: Arc::new(registry_lookup),
        }
    }

    /// Replaces the standard install paths.
    pub fn with_well_known_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.well_known = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Replaces the system lookup.
    pub fn with_system_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn() -> Option<PathBuf> + Send + Sync + 'static,
    {
        self.system_lookup = Arc::new(lookup);
        self
    }

    /// Returns the path of the executable to run.
    ///
    /// # Errors
    /// Returns `VssError::NotAvailable` if a configured path does not exist or
    /// none of the candidates resolves to a file.
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(explicit) = &self.explicit {
            if explicit.is_file() {
                return Ok(explicit.clone());
            }
            return Err(VssError::NotAvailable(format!(
                "configured executable {} does not exist",
                explicit.display()
            )));
        }

        if let Some(found) = self.well_known.iter().find(|p| p.is_file()) {
            debug!(path = %found.display(), "found SourceSafe client in install directory");
            return Ok(found.clone());
        }

        match (self.system_lookup)() {
            Some(found) if found.is_file() => {
                debug!(path = %found.display(), "found SourceSafe client via system lookup");
                Ok(found)
            }
            _ => Err(VssError::NotAvailable(format!(
                "{} was not found in the standard install directories or the system configuration",
                EXECUTABLE_NAME
            ))),
        }
    }

    /// `true` when [`resolve`](Self::resolve) would succeed.
    pub fn is_available(&self) -> bool {
        self.resolve().is_ok()
    }
}

/// Reads the SourceSafe SCC server path from the registry and returns `ss.exe` beside it.
#[cfg(windows)]
fn registry_lookup() -> Option<PathBuf> {
    use std::process::{Command, Stdio};

    let output = Command::new("reg")
        .args([
            "query",
            r"HKLM\SOFTWARE\Microsoft\SourceSafe",
            "/v",
            "SCCServerPath",
        ])
        .stdin(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_registry_value(&String::from_utf8_lossy(&output.stdout))
        .and_then(|dll| dll.parent().map(|dir| dir.join(EXECUTABLE_NAME)))
}

#[cfg(not(windows))]
fn registry_lookup() -> Option<PathBuf> {
    None
}

/// Extracts the value column of a `reg query` line such as
/// `    SCCServerPath    REG_SZ    C:\...\ssscc.dll`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_registry_value(output: &str) -> Option<PathBuf> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once("REG_SZ")?;
        let value = value.trim();
        (!value.is_empty()).then(|| PathBuf::from(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_client(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    fn nothing_installed(dir: &TempDir) -> ExecutableLocator {
        ExecutableLocator::new(None)
            .with_well_known_paths([dir.path().join("a/ss.exe"), dir.path().join("b/ss.exe")])
            .with_system_lookup(|| None)
    }

    #[test]
    fn test_unavailable_when_no_strategy_finds_a_file() {
        let dir = TempDir::new().unwrap();
        let locator = nothing_installed(&dir);
        assert!(!locator.is_available());
        assert!(matches!(locator.resolve(), Err(VssError::NotAvailable(_))));
    }

    #[test]
    fn test_blank_explicit_path_falls_through() {
        let dir = TempDir::new().unwrap();
        let installed = fake_client(&dir, "ss.exe");
        for blank in ["", "   "] {
            let config = crate::config::ProviderConfig::new("srcsafe.ini").executable_path(blank);
            let locator = ExecutableLocator::new(config.executable_path)
                .with_well_known_paths([installed.clone()])
                .with_system_lookup(|| None);
            assert!(locator.is_available());
            assert_eq!(locator.resolve().unwrap(), installed);
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = fake_client(&dir, "custom-ss.exe");
        let installed = fake_client(&dir, "ss.exe");
        let locator = ExecutableLocator::new(Some(explicit.clone()))
            .with_well_known_paths([installed]);
        assert_eq!(locator.resolve().unwrap(), explicit);
    }

    #[test]
    fn test_missing_explicit_path_does_not_fall_back() {
        let dir = TempDir::new().unwrap();
        let installed = fake_client(&dir, "ss.exe");
        let locator = ExecutableLocator::new(Some(dir.path().join("missing.exe")))
            .with_well_known_paths([installed]);
        assert!(!locator.is_available());
        let message = locator.resolve().unwrap_err().to_string();
        assert!(message.contains("missing.exe"), "{}", message);
    }

    #[test]
    fn test_first_well_known_path() {
        let dir = TempDir::new().unwrap();
        let first = fake_client(&dir, "first.exe");
        let locator = nothing_installed(&dir).with_well_known_paths([first.clone()]);
        assert_eq!(locator.resolve().unwrap(), first);
    }

    #[test]
    fn test_second_well_known_path() {
        let dir = TempDir::new().unwrap();
        let second = fake_client(&dir, "second.exe");
        let locator = nothing_installed(&dir)
            .with_well_known_paths([dir.path().join("missing.exe"), second.clone()]);
        assert!(locator.is_available());
        assert_eq!(locator.resolve().unwrap(), second);
    }

    #[test]
    fn test_system_lookup() {
        let dir = TempDir::new().unwrap();
        let found = fake_client(&dir, "ss.exe");
        let reported = found.clone();
        let locator = nothing_installed(&dir).with_system_lookup(move || Some(reported.clone()));
        assert_eq!(locator.resolve().unwrap(), found);
    }

    #[test]
    fn test_system_lookup_pointing_at_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.exe");
        let locator = nothing_installed(&dir).with_system_lookup(move || Some(missing.clone()));
        assert!(!locator.is_available());
    }

    #[test]
    fn test_parse_registry_value() {
        let output = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\SourceSafe\r\n    \
                      SCCServerPath    REG_SZ    C:\\VSS\\win32\\ssscc.dll\r\n\r\n";
        assert_eq!(
            parse_registry_value(output),
            Some(PathBuf::from("C:\\VSS\\win32\\ssscc.dll"))
        );
        assert_eq!(parse_registry_value("ERROR: not found"), None);
    }
}
