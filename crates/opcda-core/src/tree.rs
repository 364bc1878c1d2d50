// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Namespace tree of an OPC DA server.
//!
//! A [`Tree`] is built once by walking the server's browse cursor and is not
//! edited afterwards. Children are owned through `branches`; the upward link
//! is the list of ancestor names in `path`, which is only informational.
//!
//! ```text
//! root
//!    - bandwidth
//!    + options
//!      - options.frequency
//!      - options.amplitude
//!    + numeric
//!      - numeric.sin
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Leaf
// =============================================================================

/// A tag in the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaf {
    /// Display name inside its branch.
    pub name: String,

    /// Fully qualified tag identifier.
    pub item_id: String,
}

impl Leaf {
    /// Creates a new leaf.
    pub fn new(name: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.item_id)
    }
}

// =============================================================================
// Tree
// =============================================================================

/// A branch of the namespace with its leaves and sub-branches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tree {
    /// Branch name.
    pub name: String,

    /// Names of the ancestors, root first. Empty for the root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,

    /// Owned sub-branches, in server order.
    #[serde(default)]
    pub branches: Vec<Tree>,

    /// Leaves directly under this branch, in server order.
    #[serde(default)]
    pub leaves: Vec<Leaf>,
}

impl Tree {
    /// Creates a root node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates an empty node placed under `parent`.
    pub fn child_of(parent: &Tree, name: impl Into<String>) -> Self {
        let mut path = parent.path.clone();
        path.push(parent.name.clone());
        Self {
            name: name.into(),
            path,
            ..Default::default()
        }
    }

    /// Adds a leaf and returns the tree.
    pub fn with_leaf(mut self, name: impl Into<String>, item_id: impl Into<String>) -> Self {
        self.leaves.push(Leaf::new(name, item_id));
        self
    }

    /// Adds a sub-branch built by `build` and returns the tree.
    pub fn with_branch(
        mut self,
        name: impl Into<String>,
        build: impl FnOnce(Tree) -> Tree,
    ) -> Self {
        let child = build(Tree::child_of(&self, name));
        self.branches.push(child);
        self
    }

    /// Appends a leaf.
    pub fn push_leaf(&mut self, leaf: Leaf) {
        self.leaves.push(leaf);
    }

    /// Appends a sub-branch; it should have been created with [`Tree::child_of`].
    pub fn push_branch(&mut self, branch: Tree) {
        self.branches.push(branch);
    }

    /// Name of the parent branch, `None` for the root.
    pub fn parent(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// Depth below the root.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Number of leaves reachable from this node, itself included.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len() + self.branches.iter().map(Tree::leaf_count).sum::<usize>()
    }

    /// Returns the first node in pre-order whose name equals `name`.
    pub fn extract_branch_by_name(&self, name: &str) -> Option<&Tree> {
        if self.name == name {
            return Some(self);
        }
        self.branches
            .iter()
            .find_map(|branch| branch.extract_branch_by_name(name))
    }

    /// Applies [`Tree::extract_branch_by_name`] once per name, each search
    /// starting from the previous match.
    pub fn extract_branch_by_names<S: AsRef<str>>(&self, names: &[S]) -> Option<&Tree> {
        names
            .iter()
            .try_fold(self, |tree, name| tree.extract_branch_by_name(name.as_ref()))
    }

    /// Collects every tag identifier, leaves before branches, in pre-order.
    pub fn collect_tags(&self) -> Vec<String> {
        let mut tags = Vec::with_capacity(self.leaf_count());
        self.collect_into(&mut tags);
        tags
    }

    fn collect_into(&self, tags: &mut Vec<String>) {
        tags.extend(self.leaves.iter().map(|leaf| leaf.item_id.clone()));
        for branch in &self.branches {
            branch.collect_into(tags);
        }
    }

    fn render_subtree(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let indent = "  ".repeat(level);
        for leaf in &self.leaves {
            writeln!(f, "{indent} - {}", leaf.item_id)?;
        }
        for branch in &self.branches {
            writeln!(f, "{indent} + {}", branch.name)?;
            branch.render_subtree(f, level + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        self.render_subtree(f, 1)
    }
}

// =============================================================================
// Free functions
// =============================================================================

/// Message rendered for a missing tree.
pub const EMPTY_TREE: &str = "Tree is empty";

/// See [`Tree::extract_branch_by_name`].
pub fn extract_branch_by_name<'a>(tree: Option<&'a Tree>, name: &str) -> Option<&'a Tree> {
    tree?.extract_branch_by_name(name)
}

/// See [`Tree::extract_branch_by_names`].
pub fn extract_branch_by_names<'a, S: AsRef<str>>(
    tree: Option<&'a Tree>,
    names: &[S],
) -> Option<&'a Tree> {
    tree?.extract_branch_by_names(names)
}

/// See [`Tree::collect_tags`]. A missing tree has no tags.
pub fn collect_tags(tree: Option<&Tree>) -> Vec<String> {
    tree.map(Tree::collect_tags).unwrap_or_default()
}

/// Renders a tree, or [`EMPTY_TREE`] when there is none.
pub fn render(tree: Option<&Tree>) -> String {
    match tree {
        Some(tree) => tree.to_string(),
        None => format!("{EMPTY_TREE}\n"),
    }
}

/// Prints [`render`] to stdout.
pub fn pretty_print(tree: Option<&Tree>) {
    print!("{}", render(tree));
}

// =============================================================================
// Tests
// =============================================================================
