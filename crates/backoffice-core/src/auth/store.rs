//! Durable token storage.
//!
//! Stores the access/refresh token pair in `<base>/tokens.json` with
//! restricted permissions (0600). The file is a flat JSON object; keys other
//! than `adminToken` and `refreshToken` are preserved untouched.
//! Tokens are never logged or displayed in full.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::mask_token;

/// Storage key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "adminToken";
/// Storage key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// The persisted subset of a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl StoredCredentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &self.access_token.as_deref().map(mask_token))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(mask_token),
            )
            .finish()
    }
}

/// Key/value storage for the token pair.
///
/// `save` overwrites both slots in a single write so the stored refresh token
/// always belongs to the most recently issued session.
pub trait TokenStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> Result<StoredCredentials>;

    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, creds: &StoredCredentials) -> Result<()>;

    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn clear(&self) -> Result<()> {
        self.save(&StoredCredentials::default())
    }
}

/// On-disk layout: every key in the file, ours included.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

impl TokenFile {
    fn set(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(v) if !v.is_empty() => {
                self.entries.insert(key.to_string(), v.to_string());
            }
            _ => {
                self.entries.remove(key);
            }
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Token store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<TokenFile> {
        if !self.path.exists() {
            return Ok(TokenFile::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read tokens from {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(TokenFile::default());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse tokens from {}", self.path.display()))
    }

    fn write_file(&self, file: &TokenFile) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(file).context("Failed to serialize token file")?;
        write_private(&self.path, contents.as_bytes())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<StoredCredentials> {
        let file = self.read_file()?;
        Ok(StoredCredentials {
            access_token: file.get(ACCESS_TOKEN_KEY),
            refresh_token: file.get(REFRESH_TOKEN_KEY),
        })
    }

    fn save(&self, creds: &StoredCredentials) -> Result<()> {
        let mut file = self.read_file()?;
        file.set(ACCESS_TOKEN_KEY, creds.access_token.as_deref());
        file.set(REFRESH_TOKEN_KEY, creds.refresh_token.as_deref());
        self.write_file(&file)?;
        tracing::debug!(path = %self.path.display(), "token file written");
        Ok(())
    }
}

/// Writes `contents` to `path` with 0600 permissions via temp file + rename.
///
/// # Errors
/// Returns an error if the directory, temp file or rename fails.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(&tmp_path)
        .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
    drop(file);

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// In-process token store, mainly for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    creds: Mutex<StoredCredentials>,
    writes: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn new(creds: StoredCredentials) -> Self {
        Self {
            creds: Mutex::new(creds),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `save`/`clear` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<StoredCredentials> {
        Ok(self
            .creds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, creds: &StoredCredentials) -> Result<()> {
        *self.creds.lock().unwrap_or_else(PoisonError::into_inner) = creds.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
