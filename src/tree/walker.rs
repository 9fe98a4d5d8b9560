//! Depth-limited, concurrently fanned-out repository tree walk.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tokio::sync::Semaphore;
use tracing::{trace, warn};

use crate::forge::RepoHandle;
use crate::metrics::MetricsRegistry;

use super::node::{DirectoryNode, FileEntry, TreeNode};

/// File suffixes left out of the tree: images, video, notebooks and
/// compressed blobs.  Matched against the bare file name, case-sensitively.
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp", "ico", "svg", "mp4", "avi", "mov", "wmv",
    "flv", "ipynb", "zlib",
];

pub fn is_excluded_file(name: &str) -> bool {
    EXCLUDED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Depth of `path` relative to the walk root.
///
/// With a scope, the first `base_path.len()` bytes are dropped before
/// counting segments; the remainder is not required to start at a segment
/// boundary.
pub fn relative_depth(path: &str, base_path: Option<&str>) -> usize {
    let relative = match base_path {
        Some(base) if !base.is_empty() => path.get(base.len()..).unwrap_or("").trim_matches('/'),
        _ => path,
    };
    if relative.is_empty() {
        0
    } else {
        relative.split('/').count()
    }
}

/// Enumerates a repository into a [`DirectoryNode`] tree.
#[derive(Clone)]
pub struct TreeWalker {
    max_depth: usize,
    /// Bounds the number of contents listings in flight across every walk in
    /// the process.  A permit is held only for the duration of one listing.
    listing_permits: Arc<Semaphore>,
    metrics: MetricsRegistry,
}

impl TreeWalker {
    pub fn new(max_depth: usize, listing_concurrency: usize, metrics: MetricsRegistry) -> Self {
        Self {
            max_depth,
            listing_permits: Arc::new(Semaphore::new(listing_concurrency)),
            metrics,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Walk `path`, returning its subtree.
    ///
    /// Depth is always recomputed from `path` and `base_path`; `current_depth`
    /// is what the caller believed and is only logged.  Listing failures are
    /// logged and leave the affected directory with the children gathered so
    /// far; they never fail the walk.
    pub fn walk<'a>(
        &'a self,
        repo: &'a dyn RepoHandle,
        path: String,
        current_depth: usize,
        base_path: Option<&'a str>,
    ) -> BoxFuture<'a, DirectoryNode> {
        Box::pin(async move {
            let depth = relative_depth(&path, base_path);
            trace!(%path, caller_depth = current_depth, depth, "walking directory");

            let name = match path.rsplit('/').next() {
                Some(last) if !last.is_empty() => last.to_string(),
                _ => repo.name().to_string(),
            };

            if depth >= self.max_depth {
                return DirectoryNode::truncated(name);
            }

            let mut node = DirectoryNode::new(name);

            let listing = {
                let _permit = match self.listing_permits.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!(%path, error = %e, "listing pool closed");
                        self.metrics.metrics.listing_failures.inc();
                        return node;
                    }
                };
                repo.list_contents(&path).await
            };

            let entries = match listing {
                Ok(contents) => contents.into_entries(),
                Err(e) => {
                    warn!(%path, error = %e, "error fetching contents");
                    self.metrics.metrics.listing_failures.inc();
                    return node;
                }
            };

            let mut subdirs = Vec::new();
            for entry in entries {
                if !entry.is_dir() && is_excluded_file(&entry.name) {
                    continue;
                }
                if let Some(base) = base_path.filter(|b| !b.is_empty()) {
                    if !entry.path.starts_with(base) {
                        continue;
                    }
                }
                if entry.is_dir() {
                    subdirs.push(self.walk(repo, entry.path, depth, base_path));
                } else {
                    node.children.push(TreeNode::File(FileEntry {
                        name: entry.name,
                        path: entry.path,
                    }));
                }
            }

            // join_all yields results in issue order.
            node.children
                .extend(join_all(subdirs).await.into_iter().map(TreeNode::Directory));
            node
        })
    }
}
