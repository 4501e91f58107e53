use colored::Colorize;

use crate::metadata::{MetadataStore, StoreError};
use crate::paths::{ROOT, join_child, split_parent_and_name};
use crate::repository::{Content, Entry, KeyValueCache};

const EMPTY_MARKER: &str = "<empty>";

/// A rendered view of part of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File {
        name: String,
        size: u64,
        /// Listed by the parent but without an entry of its own.
        missing: bool,
    },
    Directory {
        name: String,
        /// `None` when the directory was not expanded.
        children: Option<Vec<TreeNode>>,
    },
}

impl TreeNode {
    /// Loads `path` and expands directories up to `depth` levels below it
    /// (`None` expands everything). A path without an entry loads as an empty
    /// directory.
    pub async fn load<M, F>(
        store: &MetadataStore<M, F>,
        path: &str,
        depth: Option<usize>,
    ) -> Result<Self, StoreError>
    where
        M: KeyValueCache<Entry>,
        F: KeyValueCache<Content>,
    {
        let name = if path == ROOT {
            ROOT.to_string()
        } else {
            split_parent_and_name(path).1.to_string()
        };
        let entry = store
            .get_metadata(path)
            .await?
            .unwrap_or_else(|| Entry::directory(name.as_str()));
        Self::expand(store, path, name, Some(entry), depth).await
    }

    async fn expand<M, F>(
        store: &MetadataStore<M, F>,
        path: &str,
        name: String,
        entry: Option<Entry>,
        depth: Option<usize>,
    ) -> Result<Self, StoreError>
    where
        M: KeyValueCache<Entry>,
        F: KeyValueCache<Content>,
    {
        match entry {
            Some(entry) if entry.is_directory => {}
            Some(entry) => {
                return Ok(TreeNode::File {
                    name,
                    size: entry.size,
                    missing: false,
                });
            }
            None => {
                let placeholder = Entry::placeholder(name);
                return Ok(TreeNode::File {
                    name: placeholder.name,
                    size: placeholder.size,
                    missing: true,
                });
            }
        }

        if depth == Some(0) {
            return Ok(TreeNode::Directory {
                name,
                children: None,
            });
        }

        let names = store.list_directory(path).await?;
        let mut children = Vec::with_capacity(names.len());
        for child_name in names {
            let child_path = join_child(path, &child_name);
            let child_entry = store.get_metadata(&child_path).await?;
            let child = Box::pin(Self::expand(
                store,
                &child_path,
                child_name,
                child_entry,
                depth.map(|depth| depth - 1),
            ))
            .await?;
            children.push(child);
        }

        Ok(TreeNode::Directory {
            name,
            children: Some(children),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            TreeNode::File { name, .. } | TreeNode::Directory { name, .. } => name,
        }
    }

    /// One line per child of this node, directories suffixed with `/`.
    pub fn render_listing(&self) -> String {
        match self {
            TreeNode::Directory {
                children: Some(children),
                ..
            } if !children.is_empty() => children
                .iter()
                .map(|child| child.label())
                .collect::<Vec<_>>()
                .join("\n"),
            TreeNode::Directory { .. } => EMPTY_MARKER.dimmed().to_string(),
            TreeNode::File { .. } => self.label(),
        }
    }

    /// The node and everything expanded below it, drawn with box characters.
    pub fn render_tree(&self) -> String {
        let mut lines = vec![self.label()];
        self.render_children("", &mut lines);
        lines.join("\n")
    }

    fn render_children(&self, prefix: &str, lines: &mut Vec<String>) {
        let TreeNode::Directory {
            children: Some(children),
            ..
        } = self
        else {
            return;
        };

        if children.is_empty() {
            lines.push(format!("{prefix}└── {}", EMPTY_MARKER.dimmed()));
            return;
        }

        for (index, child) in children.iter().enumerate() {
            let last = index + 1 == children.len();
            let (branch, indent) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            lines.push(format!("{prefix}{branch}{}", child.label()));
            child.render_children(&format!("{prefix}{indent}"), lines);
        }
    }

    fn label(&self) -> String {
        let name = self.name();
        match self {
            TreeNode::Directory { .. } if name == ROOT => name.blue().bold().to_string(),
            TreeNode::Directory { .. } => format!("{}/", name.blue().bold()),
            TreeNode::File { missing: true, .. } => format!("{} {}", name, "(missing)".red()),
            TreeNode::File { size, .. } => format!("{} ({} B)", name, size),
        }
    }
}
