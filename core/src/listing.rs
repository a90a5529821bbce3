//! Parses the output of `ss Dir -R` into a [`DirectoryTree`].
//!
//! The client prints one section per project, separated by a blank line:
//!
//! ```text
//! $/ProjA:
//! $Sub
//! readme.txt
//! 2 item(s)
//!
//! $/ProjA/Sub:
//! notes.txt
//! 1 item(s)
//! ```
//!
//! Sections arrive depth-first and carry no parent links, so nesting is
//! rebuilt from path prefixes and section order alone.

use crate::models::{DirectoryTree, FileEntry, Node};
use crate::types::{join_path, normalize_path};

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Marker that starts a subproject entry.
const SUBPROJECT_MARKER: char = '$';

/// Suffix of the summary line closing each section.
const ITEM_COUNT_SUFFIX: &str = " item(s)";

/// Printed instead of entries for an empty project.
const EMPTY_PROJECT_NOTICE: &str = "No items found under";

/// Builds the tree for a listing of `requested_path`.
///
/// An empty `requested_path` yields [`DirectoryTree::synthetic_root`] without
/// looking at `raw_text`; the client reports the same content for "no path"
/// as for `$/`.
pub fn parse_listing(raw_text: &str, requested_path: &str) -> DirectoryTree {
    if normalize_path(requested_path.trim()).is_empty() {
        return DirectoryTree::synthetic_root();
    }

    build_tree(parse_nodes(raw_text))
        .unwrap_or_else(|| DirectoryTree::new(requested_path.trim()))
}

/// One section of the listing: a project header and the entries below it.
#[derive(Debug)]
struct Section {
    header: String,
    subprojects: Vec<String>,
    files: Vec<String>,
}

fn read_sections(raw_text: &str) -> Vec<Section> {
    let text = raw_text.replace("\r\n", "\n");
    let mut sections = Vec::new();

    for chunk in text.split("\n\n") {
        if chunk.trim().is_empty() {
            continue;
        }

        let mut lines = chunk.lines();
        // Anything before the first `name:` line is noise.
        let header = match lines.by_ref().find(|line| line.contains(':')) {
            Some(line) => line,
            None => {
                debug!(section = chunk, "skipping listing section without a header");
                continue;
            }
        };
        let header = match header.split_once(':') {
            Some((path, _)) => normalize_path(path.trim()).to_string(),
            None => continue,
        };

        let mut section = Section {
            header,
            subprojects: Vec::new(),
            files: Vec::new(),
        };
        for line in lines {
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }
            if let Some(name) = entry.strip_prefix(SUBPROJECT_MARKER) {
                if !name.is_empty() {
                    section.subprojects.push(name.to_string());
                }
            } else if !entry.ends_with(ITEM_COUNT_SUFFIX) && !entry.starts_with(EMPTY_PROJECT_NOTICE)
            {
                section.files.push(entry.to_string());
            }
        }
        sections.push(section);
    }

    sections
}

/// Reads the listing into a flat, depth-first sequence of projects with their files.
///
/// Each section header contributes one node in output order. A subproject that
/// never gets a section of its own (non-recursive listings) becomes a childless
/// node right after the header that named it.
pub fn parse_nodes(raw_text: &str) -> Vec<Node> {
    let sections = read_sections(raw_text);
    let headers: HashSet<String> = sections
        .iter()
        .map(|section| section.header.to_ascii_lowercase())
        .collect();

    let mut nodes: Vec<Node> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for section in sections {
        let key = section.header.to_ascii_lowercase();
        let index = match positions.get(&key) {
            Some(&index) => index,
            None => {
                nodes.push(Node::new(&section.header));
                positions.insert(key, nodes.len() - 1);
                nodes.len() - 1
            }
        };

        let header = &section.header;
        nodes[index]
            .files
            .extend(section.files.iter().map(|file| FileEntry::new(header, file)));

        for subproject in &section.subprojects {
            let path = join_path(header, subproject);
            let key = path.to_ascii_lowercase();
            if headers.contains(&key) || positions.contains_key(&key) {
                continue;
            }
            nodes.push(Node::new(&path));
            positions.insert(key, nodes.len() - 1);
        }
    }

    nodes
}

/// Nests a depth-first sequence of nodes under its first node.
///
/// Uses an explicit stack of open projects, so nesting depth is not limited by
/// the call stack. Nodes that do not lie below the first node are dropped.
pub fn build_tree(nodes: Vec<Node>) -> Option<DirectoryTree> {
    let mut nodes = nodes.into_iter();
    let root = DirectoryTree::from_node(nodes.next()?);
    let mut open: Vec<DirectoryTree> = vec![root];

    for node in nodes {
        let tree = DirectoryTree::from_node(node);

        while open.len() > 1 && !open.last().map_or(false, |top| top.is_parent_of(&tree)) {
            close_top(&mut open);
        }

        if open.last().map_or(false, |top| top.is_parent_of(&tree)) {
            open.push(tree);
        } else {
            warn!(
                path = tree.path(),
                root = open.first().map(DirectoryTree::path).unwrap_or_default(),
                "dropping listing entry outside the requested project"
            );
        }
    }

    while open.len() > 1 {
        close_top(&mut open);
    }
    open.pop()
}

/// Pops the innermost open project and attaches it to its parent.
fn close_top(open: &mut Vec<DirectoryTree>) {
    if let Some(done) = open.pop() {
        if let Some(parent) = open.last_mut() {
            parent.subdirectories.push(done);
        }
    }
}
