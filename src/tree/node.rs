use serde::Serialize;

/// Name and path of the placeholder entry emitted when the depth limit stops
/// a walk.
pub const TRUNCATED_NAME: &str = "...";
pub const TRUNCATED_PATH: &str = "truncated";

/// One node of a repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Directory(DirectoryNode),
    File(FileEntry),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory(dir) => &dir.name,
            TreeNode::File(file) => &file.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryNode {
    /// Final path segment, or the repository name at the root.
    pub name: String,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// A directory that was not listed because the depth limit was reached.
    pub fn truncated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: vec![TreeNode::File(FileEntry {
                name: TRUNCATED_NAME.to_string(),
                path: TRUNCATED_PATH.to_string(),
            })],
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(
            self.children.as_slice(),
            [TreeNode::File(FileEntry { name, path })]
                if name == TRUNCATED_NAME && path == TRUNCATED_PATH
        )
    }

    /// Look up a direct child directory by name.
    pub fn subdir(&self, name: &str) -> Option<&DirectoryNode> {
        self.children.iter().find_map(|child| match child {
            TreeNode::Directory(dir) if dir.name == name => Some(dir),
            _ => None,
        })
    }

    /// Names of the direct children, in stored order.
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(TreeNode::name).collect()
    }
}
