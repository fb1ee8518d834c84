//! Hierarchical test-case model.
//!
//! A case list is a tree of named nodes. Group nodes only organise; every
//! other node is an executable test. The unit the runner dispatches is the
//! *leaf group*: a group with at least one executable direct child, sent to
//! the device as a single `<path>.*` filter.
//!
//! All enumerations are pre-order in document order. Resumption depends on
//! that order, so it must never change.

mod parser;

pub use parser::{parse_case_list, TreeError};

use std::path::Path;

/// Case type attribute value that marks a grouping node.
pub const GROUP_CASE_TYPE: &str = "TestGroup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Leaf,
}

impl NodeKind {
    pub fn from_case_type(case_type: &str) -> Self {
        if case_type == GROUP_CASE_TYPE {
            Self::Group
        } else {
            Self::Leaf
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestNode {
    pub name: String,
    pub kind: NodeKind,
    /// Raw case type as written in the description (e.g. `SelfValidate`).
    pub case_type: String,
    /// `.`-joined ancestor names, package first. Filled in by [`TestTree::new`].
    pub path: String,
    pub children: Vec<TestNode>,
}

impl TestNode {
    pub fn new(name: impl Into<String>, case_type: impl Into<String>) -> Self {
        let case_type = case_type.into();
        Self {
            name: name.into(),
            kind: NodeKind::from_case_type(&case_type),
            case_type,
            path: String::new(),
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<TestNode>) -> Self {
        let mut node = Self::new(name, GROUP_CASE_TYPE);
        node.children = children;
        node
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name, "SelfValidate")
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    pub fn is_executable(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// A group with at least one executable direct child.
    pub fn is_leaf_group(&self) -> bool {
        self.is_group() && self.children.iter().any(TestNode::is_executable)
    }

    fn assign_paths(&mut self, parent: &str) {
        self.path = if parent.is_empty() {
            self.name.clone()
        } else {
            format!("{parent}.{}", self.name)
        };
        let path = self.path.clone();
        for child in &mut self.children {
            child.assign_paths(&path);
        }
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TestNode, usize), depth: usize) {
        visit(self, depth);
        for child in &self.children {
            child.walk(visit, depth + 1);
        }
    }
}

/// Parsed, read-only case list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTree {
    package: String,
    roots: Vec<TestNode>,
}

impl TestTree {
    /// Build a tree and assign every node its full path.
    pub fn new(package: impl Into<String>, mut roots: Vec<TestNode>) -> Self {
        let package = package.into();
        for root in &mut roots {
            root.assign_paths(&package);
        }
        Self { package, roots }
    }

    /// Parse a case-list XML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TreeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        parse_case_list(&text)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn roots(&self) -> &[TestNode] {
        &self.roots
    }

    /// Visit every node in pre-order with its depth (roots are depth 0).
    pub fn visit<'a>(&'a self, mut visit: impl FnMut(&'a TestNode, usize)) {
        for root in &self.roots {
            root.walk(&mut visit, 0);
        }
    }

    fn collect_paths(&self, keep: impl Fn(&TestNode) -> bool) -> Vec<String> {
        let mut paths = Vec::new();
        self.visit(|node, _| {
            if keep(node) {
                paths.push(node.path.clone());
            }
        });
        paths
    }

    /// Every executable test.
    pub fn all_leaf_paths(&self) -> Vec<String> {
        self.collect_paths(TestNode::is_executable)
    }

    /// Every group, leaf group or not.
    pub fn all_group_paths(&self) -> Vec<String> {
        self.collect_paths(TestNode::is_group)
    }

    /// Groups with at least one executable direct child; the dispatch units.
    pub fn leaf_group_paths(&self) -> Vec<String> {
        self.collect_paths(TestNode::is_leaf_group)
    }

    pub fn group_count(&self) -> usize {
        let mut n = 0;
        self.visit(|node, _| n += usize::from(node.is_group()));
        n
    }

    pub fn test_count(&self) -> usize {
        let mut n = 0;
        self.visit(|node, _| n += usize::from(node.is_executable()));
        n
    }

    /// Indented outline, one line per node, `[G]` groups and `[T]` tests.
    /// Nodes deeper than `max_depth` are left out.
    pub fn outline(&self, max_depth: Option<usize>) -> Vec<String> {
        let mut lines = Vec::new();
        self.visit(|node, depth| {
            if max_depth.is_some_and(|max| depth > max) {
                return;
            }
            let marker = if node.is_group() { "[G]" } else { "[T]" };
            lines.push(format!(
                "{}{} {} ({})",
                "  ".repeat(depth),
                marker,
                node.name,
                node.case_type
            ));
        });
        lines
    }
}
