//! The parser/LLM result cache (SPEC_FULL.md §6 `cache/`): entries are
//! content-addressed by `sha256(parser_version || file_contents)` rather
//! than the teacher's whole-repository graph blob, since this cache is
//! per-file/per-parser-result, not per-build (see DESIGN.md "Caching").

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::error::{MuError, Result};

/// Derives the cache key for one file's parse result: the parser's own
/// version string folded in so a parser upgrade invalidates every entry it
/// produced, without needing to touch the cache directory.
pub fn cache_key(parser_version: &str, file_contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parser_version.as_bytes());
    hasher.update(b"\0");
    hasher.update(file_contents.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A directory of content-addressed, msgpack-encoded entries under
/// `<repo>/.mu/cache/`.
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    pub fn open(mu_dir: &Path, config: &CacheConfig) -> Result<Self> {
        let dir = mu_dir.join("cache");
        std::fs::create_dir_all(&dir)
            .map_err(|e| MuError::Config(format!("creating {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            ttl: Duration::from_secs(config.ttl_hours * 3600),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.mp"))
    }

    /// Returns the cached value for `key`, or `None` if absent, corrupt, or
    /// older than the configured TTL. Never errors: a cache miss just means
    /// the caller re-derives the value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        let meta = std::fs::metadata(&path).ok()?;
        let age = meta.modified().ok()?.elapsed().unwrap_or(Duration::MAX);
        if age > self.ttl {
            return None;
        }
        let bytes = std::fs::read(&path).ok()?;
        rmp_serde::from_slice(&bytes).ok()
    }

    /// Writes `value` under `key`. Cache writes are best-effort: a failure
    /// to persist an entry never fails the caller's parse or build.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        let Ok(bytes) = rmp_serde::to_vec(value) else {
            return;
        };
        let _ = std::fs::write(self.entry_path(key), bytes);
    }

    /// Drops every entry older than the configured TTL.
    pub fn evict_expired(&self) -> Result<usize> {
        let mut removed = 0;
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| MuError::Config(format!("reading {}: {e}", self.dir.display())))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else { continue };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .unwrap_or(Duration::ZERO);
            if age > self.ttl && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .map_err(|e| MuError::Config(format!("clearing {}: {e}", self.dir.display())))?;
            std::fs::create_dir_all(&self.dir)
                .map_err(|e| MuError::Config(format!("recreating {}: {e}", self.dir.display())))?;
        }
        Ok(())
    }
}

/// A cache-backed parse: looks up `(parser_version, source)` before calling
/// `parse`, and stores the result on a miss. Used by callers that want
/// caching without threading a `Cache` through `LanguageParser` impls
/// (SPEC_FULL.md §6, §4.2).
pub fn cached_parse<T, F>(
    cache: &Cache,
    parser_version: &str,
    source: &str,
    parse: F,
) -> T
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    let key = cache_key(parser_version, source);
    if let Some(hit) = cache.get::<T>(&key) {
        return hit;
    }
    let value = parse();
    cache.put(&key, &value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_version_and_contents_hash_identically() {
        let a = cache_key("py-1.0", "def f(): pass");
        let b = cache_key("py-1.0", "def f(): pass");
        assert_eq!(a, b);
    }

    #[test]
    fn parser_version_bump_changes_the_key() {
        let a = cache_key("py-1.0", "def f(): pass");
        let b = cache_key("py-1.1", "def f(): pass");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path(), &CacheConfig::default()).unwrap();
        let key = cache_key("py-1.0", "x = 1");
        assert!(cache.get::<Vec<String>>(&key).is_none());
        cache.put(&key, &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.get::<Vec<String>>(&key), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path(), &CacheConfig::default()).unwrap();
        cache.put(&cache_key("py-1.0", "x"), &"value".to_string());
        cache.clear().unwrap();
        assert!(cache.get::<String>(&cache_key("py-1.0", "x")).is_none());
    }
}
