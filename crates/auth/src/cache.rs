// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token persistence between invocations.
//!
//! [`KeyringTokenCache`] keeps tokens in the OS credential store and is the
//! default. [`FileTokenCache`] writes an owner-only JSON file instead.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::token::TokenResult;

/// Service name keyring entries are filed under.
pub const KEYRING_SERVICE: &str = "k8s-pixy-auth";

/// Stores one [`TokenResult`] per cache identifier.
pub trait TokenCache: Send + Sync {
    /// `Ok(None)` on a miss; `Err` only when the backend itself fails.
    fn get_tokens(&self, identifier: &str) -> anyhow::Result<Option<TokenResult>>;

    fn cache_tokens(&self, identifier: &str, tokens: &TokenResult) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    tokens: BTreeMap<String, TokenResult>,
}

/// JSON file holding every identifier's tokens.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<CacheDocument> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheDocument::default())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };
        serde_json::from_slice(&raw).with_context(|| format!("parse {}", self.path.display()))
    }

    fn persist(&self, doc: &CacheDocument) -> anyhow::Result<()> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(doc)?;
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = self.path.with_extension(format!("tmp.{}.{n}", std::process::id()));

        let result = write_private(&tmp, &json).and_then(|()| {
            std::fs::rename(&tmp, &self.path)
                .with_context(|| format!("rename {} to {}", tmp.display(), self.path.display()))
        });
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }
}

/// Create `path` readable by the owner only. Fails if it already exists.
fn create_private(path: &Path) -> anyhow::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).with_context(|| format!("create {}", path.display()))
}

fn write_private(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let mut file = create_private(path)?;
    file.write_all(contents).with_context(|| format!("write {}", path.display()))?;
    file.sync_all().with_context(|| format!("sync {}", path.display()))
}

impl TokenCache for FileTokenCache {
    fn get_tokens(&self, identifier: &str) -> anyhow::Result<Option<TokenResult>> {
        let mut doc = self.load()?;
        let found = doc.tokens.remove(identifier);
        debug!(identifier, hit = found.is_some(), "token cache lookup");
        Ok(found)
    }

    fn cache_tokens(&self, identifier: &str, tokens: &TokenResult) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        doc.tokens.insert(identifier.to_owned(), tokens.clone());
        self.persist(&doc)?;
        debug!(identifier, path = %self.path.display(), "tokens cached");
        Ok(())
    }
}

/// String secrets keyed by name.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    fn get_secret(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set_secret(&self, key: &str, secret: &str) -> anyhow::Result<()>;
}

/// The platform credential store, one entry per key under `service`.
#[derive(Debug, Clone)]
pub struct OsKeyring {
    service: String,
}

impl OsKeyring {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, key: &str) -> anyhow::Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .with_context(|| format!("open keyring entry {}/{key}", self.service))
    }
}

impl SecretStore for OsKeyring {
    fn get_secret(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read keyring entry {}/{key}", self.service)),
        }
    }

    fn set_secret(&self, key: &str, secret: &str) -> anyhow::Result<()> {
        self.entry(key)?
            .set_password(secret)
            .with_context(|| format!("write keyring entry {}/{key}", self.service))
    }
}

/// Tokens stored as one JSON secret per cache identifier.
pub struct KeyringTokenCache {
    store: Box<dyn SecretStore>,
}

impl KeyringTokenCache {
    pub fn new(store: impl SecretStore + 'static) -> Self {
        Self { store: Box::new(store) }
    }

    /// Cache backed by the OS keyring under [`KEYRING_SERVICE`].
    pub fn system() -> Self {
        Self::new(OsKeyring::new(KEYRING_SERVICE))
    }
}

impl TokenCache for KeyringTokenCache {
    fn get_tokens(&self, identifier: &str) -> anyhow::Result<Option<TokenResult>> {
        let raw = self
            .store
            .get_secret(identifier)
            .context("could not get token information from the keyring")?;
        debug!(identifier, hit = raw.is_some(), "keyring cache lookup");
        let Some(raw) = raw else {
            return Ok(None);
        };
        let tokens =
            serde_json::from_str(&raw).context("could not decode token data from the keyring")?;
        Ok(Some(tokens))
    }

    fn cache_tokens(&self, identifier: &str, tokens: &TokenResult) -> anyhow::Result<()> {
        let raw = serde_json::to_string(tokens)?;
        self.store
            .set_secret(identifier, &raw)
            .context("could not store token information in the keyring")?;
        debug!(identifier, "tokens cached in keyring");
        Ok(())
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    entries: Mutex<HashMap<String, TokenResult>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with one entry.
    pub fn with_entry(identifier: impl Into<String>, tokens: TokenResult) -> Self {
        let cache = Self::default();
        cache.entries.lock().insert(identifier.into(), tokens);
        cache
    }
}

impl TokenCache for MemoryTokenCache {
    fn get_tokens(&self, identifier: &str) -> anyhow::Result<Option<TokenResult>> {
        Ok(self.entries.lock().get(identifier).cloned())
    }

    fn cache_tokens(&self, identifier: &str, tokens: &TokenResult) -> anyhow::Result<()> {
        self.entries.lock().insert(identifier.to_owned(), tokens.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
