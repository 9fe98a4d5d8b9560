//! Repository tree model, walker, and text formatter.

pub mod format;
pub mod node;
pub mod walker;

pub use format::format_tree;
pub use walker::TreeWalker;
