// src/cache.rs
//! Tracker cache: keys and a filesystem-backed store.
//!
//! Mirrors the restore/save protocol of a CI cache. `restore` tries the exact
//! key first and then falls back to the newest entry whose key starts with
//! the restore prefix; `save` writes the entry for a key.

use crate::error::{PosterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CACHE_KEY_STEM: &str = "posted-media-cache";
const TRACKER_SCHEMA: &str = "v1";
const PAYLOAD_FILE: &str = "payload";
const META_FILE: &str = "meta.json";

/// Runner OS label in the form CI runners report it.
pub fn runner_os() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "macOS".to_string(),
        "windows" => "Windows".to_string(),
        other => other.to_string(),
    }
}

fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub key: String,
    pub restore_prefix: String,
}

impl CacheKey {
    pub fn restore_prefix(os: &str) -> String {
        format!("{}-{}-", sanitize(os), CACHE_KEY_STEM)
    }

    /// Key tied to a stable namespace (the page being posted to) and the
    /// tracker schema version. Code changes do not move it.
    pub fn stable(os: &str, namespace: &str) -> Self {
        let restore_prefix = Self::restore_prefix(os);
        Self {
            key: format!("{}{}-{}", restore_prefix, TRACKER_SCHEMA, sanitize(namespace)),
            restore_prefix,
        }
    }

    /// Key derived from the contents of `files`, in the manner of a
    /// `hashFiles` expression. Any edit to any file yields a new key.
    pub fn from_sources(os: &str, files: &[PathBuf]) -> Result<Self> {
        if files.is_empty() {
            return Err(PosterError::Cache("no source files to hash".to_string()));
        }

        let mut sorted = files.to_vec();
        sorted.sort();

        let mut hasher = Sha256::new();
        for file in &sorted {
            let content = std::fs::read(file).map_err(|e| {
                PosterError::Cache(format!("failed to read {}: {}", file.display(), e))
            })?;
            hasher.update(Sha256::digest(&content));
        }

        let restore_prefix = Self::restore_prefix(os);
        Ok(Self {
            key: format!("{}{}", restore_prefix, hex::encode(hasher.finalize())),
            restore_prefix,
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    saved_at: DateTime<Utc>,
    sequence: u64,
    size_bytes: u64,
}

/// Which entry a restore came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheHit {
    Exact(String),
    Prefix(String),
}

impl CacheHit {
    pub fn key(&self) -> &str {
        match self {
            CacheHit::Exact(key) | CacheHit::Prefix(key) => key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join("entries")
    }

    fn entry_dir(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || sanitize(key) != key {
            return Err(PosterError::Cache(format!("invalid cache key '{}'", key)));
        }
        Ok(self.entries_dir().join(key))
    }

    fn read_meta(dir: &Path) -> Option<EntryMeta> {
        let raw = std::fs::read_to_string(dir.join(META_FILE)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn all_entries(&self) -> Result<Vec<EntryMeta>> {
        let dir = self.entries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(meta) = Self::read_meta(&entry.path()) {
                if entry.path().join(PAYLOAD_FILE).exists() {
                    entries.push(meta);
                }
            }
        }
        Ok(entries)
    }

    /// Restore the entry for `key` into `dest`, falling back to the newest
    /// entry under `key.restore_prefix`. Returns `None` on a full miss and
    /// leaves `dest` untouched.
    pub fn restore(&self, key: &CacheKey, dest: &Path) -> Result<Option<CacheHit>> {
        let exact = self.entry_dir(&key.key)?;
        let hit = if Self::read_meta(&exact).is_some() && exact.join(PAYLOAD_FILE).exists() {
            Some(CacheHit::Exact(key.key.clone()))
        } else {
            self.all_entries()?
                .into_iter()
                .filter(|meta| meta.key.starts_with(&key.restore_prefix))
                .max_by(|a, b| (a.saved_at, a.sequence).cmp(&(b.saved_at, b.sequence)))
                .map(|meta| CacheHit::Prefix(meta.key))
        };

        match &hit {
            Some(found) => {
                let payload = self.entry_dir(found.key())?.join(PAYLOAD_FILE);
                if let Some(parent) = dest.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::copy(&payload, dest)?;
                info!("♻️ Cache restored from key: {}", found.key());
            }
            None => info!("Cache not found for key: {}", key.key),
        }

        Ok(hit)
    }

    /// Save `src` under `key`. Saving an existing key replaces its content.
    pub fn save(&self, key: &CacheKey, src: &Path) -> Result<()> {
        if !src.exists() {
            return Err(PosterError::Cache(format!(
                "path to cache does not exist: {}",
                src.display()
            )));
        }

        let sequence = self
            .all_entries()?
            .iter()
            .map(|meta| meta.sequence)
            .max()
            .map_or(0, |max| max + 1);

        let dir = self.entry_dir(&key.key)?;
        std::fs::create_dir_all(&dir)?;

        let staged = tempfile::NamedTempFile::new_in(&dir)?;
        let size_bytes = std::fs::copy(src, staged.path())?;
        staged
            .persist(dir.join(PAYLOAD_FILE))
            .map_err(|e| PosterError::Cache(format!("failed to store payload: {}", e)))?;

        let meta = EntryMeta {
            key: key.key.clone(),
            saved_at: Utc::now(),
            sequence,
            size_bytes,
        };
        std::fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?)?;

        debug!("Cache entry {} is {} bytes (sequence {})", key.key, size_bytes, sequence);
        info!("📦 Cache saved with key: {}", key.key);
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.all_entries()?.into_iter().map(|meta| meta.key).collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_key_shape() {
        let key = CacheKey::stable("Linux", "1234567890");
        assert_eq!(key.key, "Linux-posted-media-cache-v1-1234567890");
        assert_eq!(key.restore_prefix, "Linux-posted-media-cache-");
        assert!(key.key.starts_with(&key.restore_prefix));
    }

    #[test]
    fn test_stable_key_sanitizes_namespace() {
        let key = CacheKey::stable("Linux", "page/../x y");
        assert_eq!(key.key, "Linux-posted-media-cache-v1-page_.._x_y");
    }

    #[test]
    fn test_source_key_is_order_independent_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.rs");
        let b = dir.path().join("b.rs");
        std::fs::write(&a, "fn a() {}").unwrap();
        std::fs::write(&b, "fn b() {}").unwrap();

        let first = CacheKey::from_sources("Linux", &[a.clone(), b.clone()]).unwrap();
        let swapped = CacheKey::from_sources("Linux", &[b.clone(), a.clone()]).unwrap();
        assert_eq!(first, swapped);
        assert_eq!(first.key.len(), "Linux-posted-media-cache-".len() + 64);

        std::fs::write(&b, "fn b() { println!(); }").unwrap();
        let edited = CacheKey::from_sources("Linux", &[a, b]).unwrap();
        assert_ne!(first.key, edited.key);
        assert_eq!(first.restore_prefix, edited.restore_prefix);
    }

    #[test]
    fn test_source_key_requires_files() {
        assert!(CacheKey::from_sources("Linux", &[]).is_err());
    }

    #[test]
    fn test_restore_miss_leaves_dest_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path().join("cache"));
        let dest = dir.path().join("tracker.json");

        let hit = store.restore(&CacheKey::stable("Linux", "p"), &dest).unwrap();
        assert_eq!(hit, None);
        assert!(!dest.exists());
    }

    #[test]
    fn test_exact_hit_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path().join("cache"));
        let src = dir.path().join("src.json");
        let dest = dir.path().join("dest.json");
        let key = CacheKey::stable("Linux", "p");

        std::fs::write(&src, "[1]").unwrap();
        store.save(&key, &src).unwrap();
        std::fs::write(&src, "[1,2]").unwrap();
        store.save(&key, &src).unwrap();

        let hit = store.restore(&key, &dest).unwrap();
        assert_eq!(hit, Some(CacheHit::Exact(key.key.clone())));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "[1,2]");
        assert_eq!(store.keys().unwrap(), vec![key.key]);
    }

    #[test]
    fn test_prefix_fallback_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path().join("cache"));
        let src = dir.path().join("src.json");
        let dest = dir.path().join("dest.json");

        let old = CacheKey { key: "Linux-posted-media-cache-aaaa".into(), restore_prefix: "Linux-posted-media-cache-".into() };
        let newer = CacheKey { key: "Linux-posted-media-cache-bbbb".into(), restore_prefix: "Linux-posted-media-cache-".into() };
        let other_os = CacheKey { key: "Windows-posted-media-cache-cccc".into(), restore_prefix: "Windows-posted-media-cache-".into() };

        std::fs::write(&src, "old").unwrap();
        store.save(&old, &src).unwrap();
        std::fs::write(&src, "newer").unwrap();
        store.save(&newer, &src).unwrap();
        std::fs::write(&src, "windows").unwrap();
        store.save(&other_os, &src).unwrap();

        let changed = CacheKey { key: "Linux-posted-media-cache-ffff".into(), restore_prefix: "Linux-posted-media-cache-".into() };
        let hit = store.restore(&changed, &dest).unwrap();
        assert_eq!(hit, Some(CacheHit::Prefix("Linux-posted-media-cache-bbbb".to_string())));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "newer");
    }

    #[test]
    fn test_save_requires_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path());
        let result = store.save(&CacheKey::stable("Linux", "p"), &dir.path().join("missing.json"));
        assert!(matches!(result, Err(PosterError::Cache(_))));
    }
}
