use vsslens_core::models::DirectoryTree;
use vsslens_core::providers::{provider_for_config, SourceControlProvider};
use vsslens_core::types::{Label, RemotePath};
use vsslens_core::ProviderConfig;

use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyList};
use std::path::Path;
use std::str::FromStr;

// Create custom exceptions
create_exception!(vsslens, VssLensError, PyException);
create_exception!(vsslens, SourceSafeCommandError, VssLensError);

/// Converts VssLens error to Python exception.
///
/// Failures reported by the client itself raise `SourceSafeCommandError`.
fn to_py_err(err: vsslens_core::error::VssError) -> PyErr {
    if err.is_classified() {
        SourceSafeCommandError::new_err(err.to_string())
    } else {
        VssLensError::new_err(err.to_string())
    }
}

fn remote_path(path: &str) -> PyResult<RemotePath> {
    RemotePath::from_str(path).map_err(to_py_err)
}

/// Converts a directory tree into nested dicts.
fn tree_to_dict<'py>(py: Python<'py>, tree: &DirectoryTree) -> PyResult<&'py PyDict> {
    let result = PyDict::new(py);
    result.set_item("name", tree.name())?;
    result.set_item("path", tree.path())?;

    let files = PyList::empty(py);
    for file in &tree.files {
        let file_dict = PyDict::new(py);
        file_dict.set_item("name", &file.display_name)?;
        file_dict.set_item("path", &file.full_path)?;
        files.append(file_dict)?;
    }
    result.set_item("files", files)?;

    let subdirectories = PyList::empty(py);
    for subdirectory in &tree.subdirectories {
        subdirectories.append(tree_to_dict(py, subdirectory)?)?;
    }
    result.set_item("subdirectories", subdirectories)?;

    Ok(result)
}

/// A SourceSafe database reached through `ss.exe`.
#[pyclass(name = "SourceSafeProvider")]
struct PySourceSafeProvider {
    inner: Box<dyn SourceControlProvider>,
}

#[pymethods]
impl PySourceSafeProvider {
    /// Create a provider for the database at `database_path`.
    #[new]
    fn new(
        database_path: &str,
        executable_path: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Self {
        let mut config = ProviderConfig::new(database_path);
        if let Some(executable) = executable_path {
            config = config.executable_path(executable);
        }
        if let Some(user) = username {
            config = config.credentials(user, password);
        }
        if let Some(secs) = timeout_secs {
            config = config.timeout_secs(secs);
        }
        PySourceSafeProvider {
            inner: provider_for_config(config),
        }
    }

    /// Whether `ss.exe` can be located.
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    /// Run a lightweight listing to check the database and credentials.
    fn validate_connection(&self, py: Python<'_>) -> PyResult<()> {
        py.allow_threads(|| self.inner.validate_connection())
            .map_err(to_py_err)
    }

    /// List a project recursively as nested dicts.
    fn get_directory_entry_info<'py>(&self, py: Python<'py>, path: &str) -> PyResult<&'py PyDict> {
        let path = remote_path(path)?;
        let tree = py
            .allow_threads(|| self.inner.list_directory(&path))
            .map_err(to_py_err)?;
        tree_to_dict(py, &tree)
    }

    /// Get the content of a single file.
    fn get_file_contents<'py>(&self, py: Python<'py>, path: &str) -> PyResult<&'py PyBytes> {
        let path = remote_path(path)?;
        let content = py
            .allow_threads(|| self.inner.fetch_file_content(&path))
            .map_err(to_py_err)?;
        Ok(PyBytes::new(py, &content))
    }

    /// Retrieve the latest version of `source` into the local `target` directory.
    fn get_latest(&self, py: Python<'_>, source: &str, target: &str) -> PyResult<()> {
        let source = remote_path(source)?;
        py.allow_threads(|| self.inner.get_latest(&source, Path::new(target)))
            .map_err(to_py_err)
    }

    /// Apply a label to a project or file.
    fn apply_label(&self, py: Python<'_>, label: &str, path: &str) -> PyResult<()> {
        let label = Label::from_str(label).map_err(to_py_err)?;
        let path = remote_path(path)?;
        py.allow_threads(|| self.inner.apply_label(&label, &path))
            .map_err(to_py_err)
    }

    /// Retrieve the labeled version of `source` into the local `target` directory.
    fn get_labeled(&self, py: Python<'_>, label: &str, source: &str, target: &str) -> PyResult<()> {
        let label = Label::from_str(label).map_err(to_py_err)?;
        let source = remote_path(source)?;
        py.allow_threads(|| self.inner.get_labeled(&label, &source, Path::new(target)))
            .map_err(to_py_err)
    }
}

/// Python module configuration
#[pymodule]
fn _vsslens(py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PySourceSafeProvider>()?;
    m.add("VssLensError", py.get_type::<VssLensError>())?;
    m.add("SourceSafeCommandError", py.get_type::<SourceSafeCommandError>())?;

    Ok(())
}
