//! A Rust library that exposes a Visual SourceSafe database to a build platform
//! by wrapping the `ss.exe` command-line client.
//!
//! The client's free-text output is turned into [`DirectoryTree`]s and file
//! contents; failures are classified from the text it prints, since its exit
//! codes cannot be trusted.
//!
//! This library requires `ss.exe` to be installed, either in a standard
//! location or at a path given in [`ProviderConfig`].
//!

pub mod config;
pub mod error;
pub mod listing;
pub mod locator;
pub mod models;
pub mod runner;
pub mod types;

pub mod providers;

// Feature-gated modules
#[cfg(feature = "async")]
pub mod async_provider;

// Re-export key types
pub use crate::config::ProviderConfig;
pub use crate::error::VssError;
pub use crate::models::{DirectoryTree, FileEntry};
pub use crate::providers::{SourceControlProvider, SourceSafeProvider};
pub use crate::types::{Credentials, Label, RemotePath, Result};

#[cfg(feature = "async")]
pub use crate::async_provider::AsyncSourceSafeProvider;

pub mod prelude {
    //! Convenient import for common VssLens types and traits.
    pub use crate::config::ProviderConfig;
    pub use crate::error::VssError;
    pub use crate::locator::ExecutableLocator;
    pub use crate::models::*;
    pub use crate::providers::{SourceControlProvider, SourceSafeProvider};
    pub use crate::types::{Credentials, Label, RemotePath, Result};

    #[cfg(feature = "async")]
    pub use crate::async_provider::AsyncSourceSafeProvider;
}
