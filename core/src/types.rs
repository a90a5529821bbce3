//! Defines core value types like remote paths and labels for the SourceSafe bridge.
use crate::error::VssError;
use once_cell::sync::Lazy;
use regex::Regex;
#[cfg(feature = "serde")]
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;
use std::{
    ffi::OsStr,
    fmt,
    fmt::{Debug, Display, Formatter},
    result::Result as stdResult,
};

/// A specialized `Result` type for SourceSafe operations.
pub type Result<A> = stdResult<A, VssError>;

/// Marker for the repository's top-level project.
pub const ROOT_MARKER: &str = "$";

/// Path separator used by SourceSafe project paths.
pub const SEPARATOR: char = '/';

// `$`, optionally followed by `/segment` parts; no control characters anywhere.
static REMOTE_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$(/[^/\x00-\x1f]+)*$").expect("Invalid static remote path regex")
});

/// Maximum label length accepted by `ss Label`.
const MAX_LABEL_LEN: usize = 31;

/// Represents a validated SourceSafe project or file path such as `$/Project/src`.
///
/// The empty path stands for "no path given", which the provider treats as the
/// repository root. A trailing separator is trimmed, so `$/` becomes `$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RemotePath {
    pub(crate) value: String,
}

impl RemotePath {
    /// The empty path.
    pub fn root() -> Self {
        RemotePath::default()
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns `true` when no path was given.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The last path segment, or the root marker for `$` and the empty path.
    pub fn file_name(&self) -> &str {
        name_of(&self.value)
    }

    /// Path to hand to `ss`, substituting `$/` for the empty path.
    pub(crate) fn as_argument(&self) -> &str {
        if self.value.is_empty() || self.value == ROOT_MARKER {
            "$/"
        } else {
            &self.value
        }
    }
}

impl FromStr for RemotePath {
    type Err = VssError;

    /// Parses and normalizes a remote path, returning `Err(VssError::InvalidArgument)`
    /// when it does not look like a SourceSafe path.
    fn from_str(value: &str) -> Result<Self> {
        let normalized = normalize_path(value.trim());
        if normalized.is_empty() || REMOTE_PATH_REGEX.is_match(normalized) {
            Ok(RemotePath {
                value: normalized.to_string(),
            })
        } else {
            Err(VssError::InvalidArgument(format!(
                "`{}` is not a SourceSafe path",
                value
            )))
        }
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl AsRef<OsStr> for RemotePath {
    fn as_ref(&self) -> &OsStr {
        self.value.as_ref()
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RemotePath {
    fn deserialize<D>(deserializer: D) -> stdResult<RemotePath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RemotePath::from_str(&s).map_err(de::Error::custom)
    }
}

/// Represents a validated SourceSafe label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    value: String,
}

impl FromStr for Label {
    type Err = VssError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if !trimmed.is_empty()
            && trimmed.chars().count() <= MAX_LABEL_LEN
            && !trimmed.chars().any(|c| c.is_control() || c == '"')
        {
            Ok(Label {
                value: trimmed.to_string(),
            })
        } else {
            Err(VssError::InvalidArgument(format!(
                "`{}` is not a valid label (1 to {} characters, no quotes or control characters)",
                s, MAX_LABEL_LEN
            )))
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Username and optional password passed to the client with `-Y`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Credentials {
            username: username.into(),
            password,
        }
    }

    /// The `-Y<user>[,<password>]` switch.
    pub(crate) fn to_argument(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => {
                format!("-Y{},{}", self.username, password)
            }
            _ => format!("-Y{}", self.username),
        }
    }

    /// The switch as it may appear in logs and error messages.
    pub(crate) fn to_redacted_argument(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => format!("-Y{},********", self.username),
            _ => format!("-Y{}", self.username),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

// --- Internal path helpers ---

/// Trims trailing separators, keeping a lone root marker intact.
pub(crate) fn normalize_path(path: &str) -> &str {
    path.trim_end_matches(SEPARATOR)
}

/// Name of a node: the last segment of `path`, or the root marker when empty.
pub(crate) fn name_of(path: &str) -> &str {
    let trimmed = normalize_path(path);
    if trimmed.is_empty() {
        return ROOT_MARKER;
    }
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Joins a parent path and a child name with a single separator.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    format!("{}{}{}", normalize_path(parent), SEPARATOR, child)
}

/// Case-insensitive, segment-aware prefix test used for parent/child relationships.
pub(crate) fn is_descendant_path(parent: &str, candidate: &str) -> bool {
    let parent = normalize_path(parent);
    let candidate = normalize_path(candidate);
    if parent.is_empty() {
        return !candidate.is_empty();
    }
    if candidate.len() <= parent.len() || !candidate.is_char_boundary(parent.len()) {
        return false;
    }
    let (head, rest) = candidate.split_at(parent.len());
    head.eq_ignore_ascii_case(parent) && rest.starts_with(SEPARATOR)
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_remote_paths() {
        let valid_paths = vec!["$", "$/", "$/Project", "$/Project/src/", "$/My Project/Sub-1"];

        for path in valid_paths.iter() {
            assert!(RemotePath::from_str(path).is_ok(), "Expected valid: {}", path);
        }
    }

    #[test]
    fn test_invalid_remote_paths() {
        let invalid_paths = vec!["Project", "/Project", "$Project", "$//Project", "$/a\tb", "C:\\src"];

        for path in invalid_paths.iter() {
            assert!(RemotePath::from_str(path).is_err(), "Expected invalid: {}", path);
        }
    }

    #[test]
    fn test_remote_path_normalization() {
        assert_eq!(RemotePath::from_str("$/Project/").unwrap().to_string(), "$/Project");
        assert_eq!(RemotePath::from_str("$/").unwrap().to_string(), "$");
        assert!(RemotePath::from_str("").unwrap().is_empty());
        assert_eq!(RemotePath::from_str("  $/A  ").unwrap().to_string(), "$/A");
    }

    #[test]
    fn test_remote_path_argument_and_name() {
        assert_eq!(RemotePath::root().as_argument(), "$/");
        assert_eq!(RemotePath::from_str("$").unwrap().as_argument(), "$/");
        let file = RemotePath::from_str("$/Project/readme.txt").unwrap();
        assert_eq!(file.as_argument(), "$/Project/readme.txt");
        assert_eq!(file.file_name(), "readme.txt");
        assert_eq!(RemotePath::root().file_name(), "$");
    }

    #[test]
    fn test_name_of() {
        assert_eq!(name_of(""), "$");
        assert_eq!(name_of("$"), "$");
        assert_eq!(name_of("$/ProjA"), "ProjA");
        assert_eq!(name_of("$/ProjA/Sub/"), "Sub");
        assert_eq!(name_of("/"), "$");
    }

    #[test]
    fn test_descendant_paths() {
        assert!(is_descendant_path("$/ProjA", "$/ProjA/Sub"));
        assert!(is_descendant_path("$/proja", "$/ProjA/Sub/Deeper"));
        assert!(is_descendant_path("$", "$/ProjA"));
        assert!(is_descendant_path("", "$"));
        assert!(!is_descendant_path("$/ProjA/Sub", "$/ProjA/Sub2"));
        assert!(!is_descendant_path("$/ProjA", "$/ProjA"));
        assert!(!is_descendant_path("$/ProjA/Sub", "$/ProjA"));
    }

    #[test]
    fn test_labels() {
        assert!(Label::from_str("Release 1.0").is_ok());
        assert!(Label::from_str("build-2024.11.03").is_ok());
        assert!(Label::from_str("").is_err());
        assert!(Label::from_str("   ").is_err());
        assert!(Label::from_str("has\"quote").is_err());
        assert!(Label::from_str("has\nnewline").is_err());
        assert!(Label::from_str(&"x".repeat(32)).is_err());
        assert!(Label::from_str(&"x".repeat(31)).is_ok());
    }

    #[test]
    fn test_credentials_arguments() {
        let with_password = Credentials::new("builder", Some("s3cret".to_string()));
        assert_eq!(with_password.to_argument(), "-Ybuilder,s3cret");
        assert_eq!(with_password.to_redacted_argument(), "-Ybuilder,********");
        assert!(!format!("{:?}", with_password).contains("s3cret"));

        let without_password = Credentials::new("builder", None);
        assert_eq!(without_password.to_argument(), "-Ybuilder");

        let empty_password = Credentials::new("builder", Some(String::new()));
        assert_eq!(empty_password.to_argument(), "-Ybuilder");
    }
}
