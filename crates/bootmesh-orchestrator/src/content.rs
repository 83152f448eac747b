//! Content-addressed artifact cache and bounded-concurrency fetcher.

use crate::chain::ContentStore;
use crate::error::{Error, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Scheme every reference starts with.
pub const DIGEST_SCHEME: &str = "blake3:";

/// Parse `blake3:<64 hex>` into its digest.
pub fn parse_reference(reference: &str) -> Result<blake3::Hash> {
    reference
        .strip_prefix(DIGEST_SCHEME)
        .and_then(|hex| blake3::Hash::from_hex(hex).ok())
        .ok_or_else(|| Error::InvalidReference(reference.to_string()))
}

/// Check `bytes` against the digest named by `reference`.
pub fn verify(reference: &str, bytes: &[u8]) -> Result<()> {
    let expected = parse_reference(reference)?;
    let actual = blake3::hash(bytes);
    if actual != expected {
        return Err(Error::ContentIntegrity {
            reference: reference.to_string(),
            expected: expected.to_hex().to_string(),
            actual: actual.to_hex().to_string(),
        });
    }
    Ok(())
}

/// File name for a reference: anything outside `[a-zA-Z0-9._-]` becomes `_`.
pub fn cache_key(reference: &str) -> String {
    reference
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// On-disk cache, one file per reference.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Open the cache, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, reference: &str) -> PathBuf {
        self.dir.join(cache_key(reference))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.path_for(reference).is_file()
    }

    /// Present and still hashing to its reference.
    pub fn contains_verified(&self, reference: &str) -> bool {
        fs::read(self.path_for(reference))
            .map(|bytes| verify(reference, &bytes).is_ok())
            .unwrap_or(false)
    }

    pub fn read(&self, reference: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_for(reference))?)
    }

    pub fn write(&self, reference: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.path_for(reference), bytes)?;
        Ok(())
    }
}

/// Downloads references into a [`ContentCache`] with bounded fan-out.
pub struct ContentFetcher<'a> {
    store: &'a dyn ContentStore,
    cache: &'a ContentCache,
    concurrency: usize,
}

impl<'a> ContentFetcher<'a> {
    pub fn new(store: &'a dyn ContentStore, cache: &'a ContentCache, concurrency: usize) -> Self {
        Self {
            store,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    /// Make every reference available in the cache.
    ///
    /// References are deduplicated first and verified cache hits are
    /// skipped. The first failure stops the remaining downloads. Returns
    /// how many references were downloaded.
    pub async fn fetch_all<I, S>(&self, references: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = references
            .into_iter()
            .map(|r| r.as_ref().to_string())
            .collect();

        let mut pending = Vec::new();
        for reference in unique {
            parse_reference(&reference)?;
            if self.cache.contains_verified(&reference) {
                debug!("{} already cached", reference);
            } else {
                pending.push(reference);
            }
        }

        let fetched: Vec<()> = stream::iter(pending)
            .map(|reference| self.fetch_one(reference))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        if !fetched.is_empty() {
            info!("Downloaded {} content reference(s)", fetched.len());
        }
        Ok(fetched.len())
    }

    async fn fetch_one(&self, reference: String) -> Result<()> {
        debug!("Fetching {}", reference);
        let bytes = self.store.fetch(&reference).await?;
        verify(&reference, &bytes)?;
        self.cache.write(&reference, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockContentStore;
    use tempfile::TempDir;

    #[test]
    fn keys_are_sanitized() {
        assert_eq!(cache_key("blake3:ab/cd ef"), "blake3_ab_cd_ef");
        assert_eq!(cache_key("boot_sequence.yaml"), "boot_sequence.yaml");
    }

    #[test]
    fn reference_must_be_a_digest() {
        assert!(parse_reference("blake3:00").is_err());
        assert!(parse_reference("sha256:abc").is_err());
        let reference = format!("blake3:{}", blake3::hash(b"x").to_hex());
        assert!(parse_reference(&reference).is_ok());
    }

    #[test]
    fn cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = ContentCache::open(dir.path().join("cache")).unwrap();
        let reference = format!("blake3:{}", blake3::hash(b"hello").to_hex());

        assert!(!cache.contains(&reference));
        cache.write(&reference, b"hello").unwrap();
        assert!(cache.contains(&reference));
        assert!(cache.contains_verified(&reference));
        assert_eq!(cache.read(&reference).unwrap(), b"hello");

        cache.write(&reference, b"tampered").unwrap();
        assert!(!cache.contains_verified(&reference));
    }

    #[tokio::test]
    async fn fetches_once_per_reference() {
        let dir = TempDir::new().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let store = MockContentStore::default();
        let a = store.put(b"contract wasm");
        let b = store.put(b"contract abi");

        let fetcher = ContentFetcher::new(&store, &cache, 2);
        let count = fetcher.fetch_all([&a, &b, &a]).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.fetches.lock().unwrap().len(), 2);

        // second pass is all cache hits
        assert_eq!(fetcher.fetch_all([&a, &b]).await.unwrap(), 0);
        assert_eq!(store.fetches.lock().unwrap().len(), 2);
        assert_eq!(cache.read(&b).unwrap(), b"contract abi");
    }

    #[tokio::test]
    async fn rejects_corrupted_download() {
        let dir = TempDir::new().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let store = MockContentStore::default();
        let reference = format!("blake3:{}", blake3::hash(b"expected").to_hex());
        store
            .blobs
            .lock()
            .unwrap()
            .insert(reference.clone(), b"something else".to_vec());

        let err = ContentFetcher::new(&store, &cache, 4)
            .fetch_all([&reference])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentIntegrity { .. }));
        assert!(!cache.contains(&reference));
    }

    #[tokio::test]
    async fn missing_reference_fails_the_batch() {
        let dir = TempDir::new().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let store = MockContentStore::default();
        let present = store.put(b"present");
        let absent = format!("blake3:{}", blake3::hash(b"absent").to_hex());

        let err = ContentFetcher::new(&store, &cache, 1)
            .fetch_all([present, absent])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentFetch { .. }));
    }
}
