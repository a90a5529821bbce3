//! Provides structured types representing SourceSafe projects and files.

use crate::types::{is_descendant_path, join_path, name_of, normalize_path, ROOT_MARKER};

/// Represents a file reported by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// The file name as the client printed it.
    pub display_name: String,
    /// Path of the containing project joined with `display_name`.
    pub full_path: String,
}

impl FileEntry {
    pub(crate) fn new(parent_path: &str, display_name: &str) -> FileEntry {
        FileEntry {
            display_name: display_name.to_string(),
            full_path: join_path(parent_path, display_name),
        }
    }
}

/// One project in the flat sequence produced while reading a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    path: String,
    /// Files directly inside this project.
    pub files: Vec<FileEntry>,
}

impl Node {
    pub fn new(path: &str) -> Node {
        Node {
            path: normalize_path(path).to_string(),
            files: Vec::new(),
        }
    }

    /// Normalized path, without a trailing separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path, or `$` for the empty path.
    pub fn name(&self) -> &str {
        name_of(&self.path)
    }

    /// `true` if `other` lies below this node (case-insensitive path prefix).
    pub fn is_parent_of(&self, other: &Node) -> bool {
        is_descendant_path(&self.path, &other.path)
    }
}

/// Represents a project with its subprojects and files, as returned to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    path: String,
    pub subdirectories: Vec<DirectoryTree>,
    pub files: Vec<FileEntry>,
}

impl DirectoryTree {
    pub fn new(path: &str) -> DirectoryTree {
        DirectoryTree {
            path: normalize_path(path).to_string(),
            subdirectories: Vec::new(),
            files: Vec::new(),
        }
    }

    /// The fixed shape reported for a request without a path:
    /// an unnamed root holding the `$` project.
    pub fn synthetic_root() -> DirectoryTree {
        let mut root = DirectoryTree::new("");
        root.subdirectories.push(DirectoryTree::new(ROOT_MARKER));
        root
    }

    pub(crate) fn from_node(node: Node) -> DirectoryTree {
        DirectoryTree {
            path: node.path,
            subdirectories: Vec::new(),
            files: node.files,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path, or `$` for the empty path.
    pub fn name(&self) -> &str {
        name_of(&self.path)
    }

    /// `true` if `other` lies below this tree (case-insensitive path prefix).
    pub fn is_parent_of(&self, other: &DirectoryTree) -> bool {
        is_descendant_path(&self.path, &other.path)
    }

    /// Paths of this tree and all subprojects, depth-first in listing order.
    pub fn directory_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        let mut pending = vec![self];
        while let Some(tree) = pending.pop() {
            paths.push(tree.path.as_str());
            pending.extend(tree.subdirectories.iter().rev());
        }
        paths
    }

    /// Finds the tree at `path`, comparing case-insensitively.
    pub fn find(&self, path: &str) -> Option<&DirectoryTree> {
        let wanted = normalize_path(path);
        let mut pending = vec![self];
        while let Some(tree) = pending.pop() {
            if tree.path.eq_ignore_ascii_case(wanted) {
                return Some(tree);
            }
            pending.extend(tree.subdirectories.iter().filter(|sub| {
                sub.path.eq_ignore_ascii_case(wanted) || is_descendant_path(&sub.path, wanted)
            }));
        }
        None
    }

    /// Number of files in this tree and every subproject.
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .subdirectories
                .iter()
                .map(DirectoryTree::file_count)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_derive_from_paths() {
        assert_eq!(Node::new("").name(), "$");
        assert_eq!(Node::new("$").name(), "$");
        assert_eq!(Node::new("$/ProjA").name(), "ProjA");
        assert_eq!(Node::new("$/ProjA/").path(), "$/ProjA");
        assert_eq!(DirectoryTree::new("$/ProjA/Sub/").name(), "Sub");
    }

    #[test]
    fn test_file_entry_full_path() {
        let file = FileEntry::new("$/ProjA", "readme.txt");
        assert_eq!(file.display_name, "readme.txt");
        assert_eq!(file.full_path, "$/ProjA/readme.txt");
    }

    #[test]
    fn test_parent_relationship_ignores_case() {
        let parent = Node::new("$/ProjA");
        assert!(parent.is_parent_of(&Node::new("$/proja/Sub")));
        assert!(!parent.is_parent_of(&Node::new("$/ProjAB")));
        assert!(!parent.is_parent_of(&parent));
    }

    #[test]
    fn test_synthetic_root() {
        let root = DirectoryTree::synthetic_root();
        assert_eq!(root.path(), "");
        assert_eq!(root.name(), "$");
        assert_eq!(root.subdirectories.len(), 1);
        assert_eq!(root.subdirectories[0].path(), "$");
        assert_eq!(root.subdirectories[0].name(), "$");
        assert!(root.is_parent_of(&root.subdirectories[0]));
    }

    fn sample() -> DirectoryTree {
        let mut a = DirectoryTree::new("$/P/A");
        a.subdirectories.push(DirectoryTree::new("$/P/A/X"));
        a.files.push(FileEntry::new("$/P/A", "a.txt"));
        let mut root = DirectoryTree::new("$/P");
        root.subdirectories.push(a);
        root.subdirectories.push(DirectoryTree::new("$/P/B"));
        root.files.push(FileEntry::new("$/P", "top.txt"));
        root
    }

    #[test]
    fn test_directory_paths_are_depth_first() {
        assert_eq!(sample().directory_paths(), vec!["$/P", "$/P/A", "$/P/A/X", "$/P/B"]);
    }

    #[test]
    fn test_find_and_file_count() {
        let tree = sample();
        assert_eq!(tree.find("$/p/a/x").map(DirectoryTree::path), Some("$/P/A/X"));
        assert_eq!(tree.find("$/P/B/").map(DirectoryTree::name), Some("B"));
        assert!(tree.find("$/P/C").is_none());
        assert_eq!(tree.file_count(), 2);
    }
}
