//! Rendered asset index with LRU eviction.
//!
//! Assets live as `<asset_id>.wav` / `<asset_id>.mid` files in one directory.
//! The index is shared between workers (which insert) and the request
//! surface (which reads), so it locks internally.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{DaemonError, ErrorCode, Result};
use crate::types::Asset;

/// Maximum number of assets to keep indexed.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Asset index with LRU eviction policy.
pub struct AssetCache {
    dir: PathBuf,
    max_entries: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Monotonic access counter.
    clock: u64,
}

/// An indexed asset with its last access stamp.
struct CacheEntry {
    asset: Asset,
    last_accessed: u64,
}

impl AssetCache {
    /// Opens the asset directory with default capacity, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_capacity(dir, DEFAULT_MAX_ENTRIES)
    }

    /// Opens the asset directory with the given capacity.
    pub fn with_capacity(dir: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            DaemonError::with_source(
                ErrorCode::InvalidConfig,
                format!("Failed to create asset directory {}", dir.display()),
                e,
            )
        })?;
        Ok(Self {
            dir,
            max_entries: max_entries.max(1),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Directory holding asset files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the rendered audio of `asset_id` is written to.
    pub fn wav_path(&self, asset_id: &str) -> PathBuf {
        self.dir.join(format!("{}.wav", asset_id))
    }

    /// Path the MIDI source of `asset_id` is written to.
    pub fn midi_path(&self, asset_id: &str) -> PathBuf {
        self.dir.join(format!("{}.mid", asset_id))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns an asset by ID, updating its access time.
    pub fn get(&self, asset_id: &str) -> Option<Asset> {
        let mut inner = self.lock();
        inner.clock += 1;
        let now = inner.clock;
        inner.entries.get_mut(asset_id).map(|entry| {
            entry.last_accessed = now;
            entry.asset.clone()
        })
    }

    /// Indexes an asset.
    ///
    /// If the index is full, the least recently used entry is evicted first
    /// and its files are removed.
    pub fn insert(&self, asset: Asset) {
        let mut inner = self.lock();
        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&asset.asset_id) {
            if let Some(evicted) = evict_lru(&mut inner) {
                tracing::debug!(asset_id = %evicted.asset_id, "evicting asset");
                remove_files(&evicted);
            }
        }

        inner.clock += 1;
        let last_accessed = inner.clock;
        inner
            .entries
            .insert(asset.asset_id.clone(), CacheEntry { asset, last_accessed });
    }

    /// Reads the rendered audio bytes of an asset.
    pub fn read_bytes(&self, asset_id: &str) -> Result<Vec<u8>> {
        let asset = self
            .get(asset_id)
            .ok_or_else(|| DaemonError::asset_not_found(asset_id))?;
        std::fs::read(&asset.path).map_err(|e| {
            DaemonError::with_source(
                ErrorCode::AssetNotFound,
                format!("Asset {} is no longer readable", asset_id),
                e,
            )
        })
    }

    /// Checks if an asset ID is indexed.
    pub fn contains(&self, asset_id: &str) -> bool {
        self.lock().entries.contains_key(asset_id)
    }

    /// Returns the number of indexed assets.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if no assets are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_lru(inner: &mut Inner) -> Option<Asset> {
    let oldest_key = inner
        .entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_accessed)
        .map(|(k, _)| k.clone())?;

    inner.entries.remove(&oldest_key).map(|entry| entry.asset)
}

fn remove_files(asset: &Asset) {
    for path in [&asset.path, &asset.midi_path] {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove evicted asset file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassKind;
    use std::time::SystemTime;

    fn make_asset(cache: &AssetCache, id: &str) -> Asset {
        let path = cache.wav_path(id);
        std::fs::write(&path, id.as_bytes()).unwrap();
        Asset {
            asset_id: id.to_string(),
            job_id: "job".to_string(),
            kind: PassKind::Final,
            path,
            midi_path: cache.midi_path(id),
            duration_sec: 8.0,
            sample_rate: 32000,
            bpm: 120,
            note_count: 4,
            generation_time_sec: 0.2,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn insert_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path().join("assets")).unwrap();
        assert!(cache.is_empty());

        let asset = make_asset(&cache, "abc123");
        cache.insert(asset);

        assert!(cache.contains("abc123"));
        assert_eq!(cache.get("abc123").unwrap().bpm, 120);
        assert_eq!(cache.read_bytes("abc123").unwrap(), b"abc123");
    }

    #[test]
    fn unknown_asset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path()).unwrap();
        let err = cache.read_bytes("nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::AssetNotFound);
    }

    #[test]
    fn deleted_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path()).unwrap();
        let asset = make_asset(&cache, "gone");
        std::fs::remove_file(&asset.path).unwrap();
        cache.insert(asset);
        assert_eq!(cache.read_bytes("gone").unwrap_err().code, ErrorCode::AssetNotFound);
    }

    #[test]
    fn evict_lru_removes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::with_capacity(dir.path(), 2).unwrap();

        cache.insert(make_asset(&cache, "first"));
        cache.insert(make_asset(&cache, "second"));

        // Access first to make it more recent
        cache.get("first");

        // Adding third should evict second (least recently accessed)
        cache.insert(make_asset(&cache, "third"));

        assert!(cache.contains("first"));
        assert!(!cache.contains("second"));
        assert!(cache.contains("third"));
        assert!(!cache.wav_path("second").exists());
    }

    #[test]
    fn paths_live_in_asset_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path()).unwrap();
        assert_eq!(cache.wav_path("ab"), dir.path().join("ab.wav"));
        assert_eq!(cache.midi_path("ab"), dir.path().join("ab.mid"));
    }
}
