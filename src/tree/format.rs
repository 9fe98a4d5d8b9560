//! Plain-text rendering of a repository tree.

use super::node::{DirectoryNode, TreeNode};

const INDENT: &str = "  ";

/// Render `root` as an indented outline.
///
/// The root's own name is not emitted.  Siblings are sorted by name at every
/// level, so the output does not depend on the order in which the walker's
/// concurrent subdirectory listings finished.
pub fn format_tree(root: &DirectoryNode) -> String {
    let mut lines = Vec::new();
    push_children(root, 1, &mut lines);
    lines.join("\n")
}

fn push_children(dir: &DirectoryNode, depth: usize, lines: &mut Vec<String>) {
    let mut children: Vec<&TreeNode> = dir.children.iter().collect();
    children.sort_by(|a, b| a.name().cmp(b.name()));

    for child in children {
        lines.push(format!("{}{}", INDENT.repeat(depth), child.name()));
        if let TreeNode::Directory(sub) = child {
            push_children(sub, depth + 1, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::FileEntry;

    fn file(name: &str) -> TreeNode {
        TreeNode::File(FileEntry {
            name: name.into(),
            path: name.into(),
        })
    }

    fn dir(name: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode::Directory(DirectoryNode {
            name: name.into(),
            children,
        })
    }

    #[test]
    fn empty_root_renders_nothing() {
        assert_eq!(format_tree(&DirectoryNode::new("widgets")), "");
    }

    #[test]
    fn root_name_is_never_emitted() {
        let root = DirectoryNode {
            name: "widgets".into(),
            children: vec![file("Cargo.toml")],
        };
        let out = format_tree(&root);
        assert_eq!(out, "  Cargo.toml");
        assert!(!out.contains("widgets"));
    }

    #[test]
    fn siblings_sorted_regardless_of_insertion_order() {
        let root = DirectoryNode {
            name: "r".into(),
            children: vec![
                dir("src", vec![file("main.rs"), file("lib.rs")]),
                file("b.txt"),
                dir("a", vec![]),
                file("README.md"),
            ],
        };
        assert_eq!(
            format_tree(&root),
            "  README.md\n  a\n  b.txt\n  src\n    lib.rs\n    main.rs"
        );
    }

    #[test]
    fn nested_indentation_and_truncation_marker() {
        let root = DirectoryNode {
            name: "r".into(),
            children: vec![dir(
                "a",
                vec![dir("b", vec![TreeNode::Directory(DirectoryNode::truncated("c"))])],
            )],
        };
        assert_eq!(format_tree(&root), "  a\n    b\n      c\n        ...");
    }

    #[test]
    fn output_is_deterministic() {
        let root = DirectoryNode {
            name: "r".into(),
            children: vec![file("z"), file("y"), dir("x", vec![file("w")])],
        };
        assert_eq!(format_tree(&root), format_tree(&root.clone()));
    }
}
