//! Forge abstraction layer.
//!
//! The tree walker only needs to list directory contents of a single
//! repository.  [`RepoHandle`] captures exactly that, so the walker and the
//! structure service never see GitHub URLs or response formats.

pub mod github;
pub mod rate_limit;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Contents listing
// ---------------------------------------------------------------------------

/// Kind of a repository contents entry, as reported by the forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One item of a contents listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentEntry {
    /// Final path segment (e.g. `main.rs`).
    pub name: String,
    /// Repository-relative path (e.g. `src/main.rs`).
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Result of listing a path: a directory yields many entries, a file path
/// yields the file itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

impl Contents {
    /// Normalize to a list, wrapping a lone entry.
    pub fn into_entries(self) -> Vec<ContentEntry> {
        match self {
            Contents::Listing(entries) => entries,
            Contents::Single(entry) => vec![entry],
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// An authenticated view of one repository.
#[async_trait::async_trait]
pub trait RepoHandle: Send + Sync {
    /// Short repository name (without owner).
    fn name(&self) -> &str;

    fn default_branch(&self) -> &str;

    /// List the contents at a repository-relative path (`""` = root) on the
    /// default branch.
    async fn list_contents(&self, path: &str) -> Result<Contents>;
}

/// Split `owner/repo` into its two halves.
pub fn split_repo_name(repo_name: &str) -> Option<(&str, &str)> {
    let (owner, repo) = repo_name.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}
