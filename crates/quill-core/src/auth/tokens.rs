//! Token persistence.
//!
//! Stores the access/refresh/CSRF token triple in `${QUILL_HOME}/tokens.json`
//! with restricted permissions (0600). Token contents are opaque; nothing
//! here inspects or validates them.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// The token triple handed out by the auth endpoints.
///
/// Fields are independent: an update with an absent field leaves the
/// stored value untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Short-lived credential sent as `Authorization: Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Longer-lived credential used to obtain a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Anti-forgery token sent as `X-CSRF-Token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl TokenSet {
    /// True when no token is present at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.csrf_token.is_none()
    }

    /// Applies `update` on top of `self`: present fields replace stored
    /// ones, absent fields are left unchanged.
    fn merge(&mut self, update: TokenSet) {
        if let Some(access) = update.access_token {
            self.access_token = Some(access);
        }
        if let Some(refresh) = update.refresh_token {
            self.refresh_token = Some(refresh);
        }
        if let Some(csrf) = update.csrf_token {
            self.csrf_token = Some(csrf);
        }
    }
}

/// File-backed store for the token triple.
///
/// Access goes through a sync mutex so the request pipeline can read and
/// update tokens without holding a lock across an await point.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    current: Mutex<TokenSet>,
}

impl TokenStore {
    /// Opens the store at the default path, loading any persisted tokens.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn open() -> Result<Self> {
        Self::open_at(paths::tokens_path())
    }

    /// Opens the store at a specific path. A missing file is an empty set.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn open_at(path: PathBuf) -> Result<Self> {
        let current = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read tokens from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse tokens from {}", path.display()))?
        } else {
            TokenSet::default()
        };

        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    /// Returns a copy of the current token set.
    pub fn get(&self) -> TokenSet {
        self.lock().clone()
    }

    /// Applies a partial update and persists the result.
    ///
    /// # Errors
    /// Returns an error if the token file cannot be written.
    pub fn set(&self, update: TokenSet) -> Result<()> {
        let snapshot = {
            let mut current = self.lock();
            current.merge(update);
            current.clone()
        };
        self.persist(&snapshot)
    }

    /// Removes all three tokens and persists the empty set.
    ///
    /// # Errors
    /// Returns an error if the token file cannot be written.
    pub fn clear(&self) -> Result<()> {
        let snapshot = {
            let mut current = self.lock();
            *current = TokenSet::default();
            current.clone()
        };
        self.persist(&snapshot)
    }

    fn lock(&self) -> MutexGuard<'_, TokenSet> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the token file with restricted permissions (0600).
    fn persist(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}
