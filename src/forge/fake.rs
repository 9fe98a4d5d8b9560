//! In-memory repository used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::{ContentEntry, Contents, EntryKind, RepoHandle};

/// A repository described as a flat list of paths.  Paths ending in `/` are
/// directories; every parent of a listed path is implied to be a directory.
pub struct FakeRepo {
    name: String,
    dirs: HashMap<String, Vec<ContentEntry>>,
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    listed: Mutex<Vec<String>>,
}

impl FakeRepo {
    pub fn new(name: &str, paths: &[&str]) -> Self {
        let mut dirs: HashMap<String, Vec<ContentEntry>> = HashMap::new();
        dirs.entry(String::new()).or_default();

        for raw in paths {
            let is_dir = raw.ends_with('/');
            let path = raw.trim_end_matches('/');
            let segments: Vec<&str> = path.split('/').collect();
            for i in 0..segments.len() {
                let parent = segments[..i].join("/");
                let own = segments[..=i].join("/");
                let kind = if i + 1 < segments.len() || is_dir {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                };
                if kind == EntryKind::Dir {
                    dirs.entry(own.clone()).or_default();
                }
                let siblings = dirs.entry(parent).or_default();
                if !siblings.iter().any(|e| e.path == own) {
                    siblings.push(ContentEntry {
                        name: segments[i].to_string(),
                        path: own,
                        kind,
                    });
                }
            }
        }

        Self {
            name: name.to_string(),
            dirs,
            failing: Vec::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            listed: Mutex::new(Vec::new()),
        }
    }

    /// Make listing `path` fail.
    pub fn fail_on(mut self, path: &str) -> Self {
        self.failing.push(path.to_string());
        self
    }

    /// Delay the listing of `path`.
    pub fn delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Total number of `list_contents` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths listed, in call order.
    pub fn listed(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    fn find_file(&self, path: &str) -> Option<ContentEntry> {
        self.dirs
            .values()
            .flatten()
            .find(|e| e.path == path && !e.is_dir())
            .cloned()
    }
}

#[async_trait::async_trait]
impl RepoHandle for FakeRepo {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_branch(&self) -> &str {
        "main"
    }

    async fn list_contents(&self, path: &str) -> Result<Contents> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.listed.lock().unwrap().push(path.to_string());

        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|p| p == path) {
            return Err(anyhow!("simulated listing failure for '{path}'"));
        }
        if let Some(entries) = self.dirs.get(path) {
            return Ok(Contents::Listing(entries.clone()));
        }
        self.find_file(path)
            .map(Contents::Single)
            .ok_or_else(|| anyhow!("path '{path}' not found"))
    }
}
