use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};

/// Fallback personal access tokens, handed out round-robin.
///
/// Built once at startup and shared by reference; the cursor is the only
/// mutable state.
pub struct TokenPool {
    tokens: Vec<String>,
    cursor: AtomicUsize,
}

impl TokenPool {
    /// Parse a comma-separated token list.  Whitespace is trimmed and empty
    /// items are dropped; an empty result is an error.
    pub fn parse(list: &str) -> Result<Self> {
        let tokens: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let pool = Self {
            tokens,
            cursor: AtomicUsize::new(0),
        };
        anyhow::ensure!(!pool.is_empty(), "GitHub token list is empty");
        Ok(pool)
    }

    /// Read the token list from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let list = std::env::var(var)
            .with_context(|| format!("GitHub token list variable {var} is not set"))?;
        let pool = Self::parse(&list).with_context(|| format!("invalid token list in {var}"))?;
        tracing::info!(count = pool.len(), "initialized GitHub token pool");
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Next token in rotation.
    pub fn next_token(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.tokens.len();
        &self.tokens[i]
    }
}

impl std::fmt::Debug for TokenPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPool")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}
