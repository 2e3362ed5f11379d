use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use pyreq_requirement::Link;

use crate::file_cache::FileCache;
use crate::{Cache, CacheBucket};

/// The algorithm used for all computed hashes.
pub const FAVORITE_HASH: &str = "sha256";

const CHUNK_SIZE: usize = 8096;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Expected a file, but found a directory: `{}`", .0.display())]
    Directory(PathBuf),
    #[error("Unsupported artifact location: `{0}`")]
    UnsupportedLink(String),
    #[error("Failed to read artifact: `{0}`")]
    Io(String, #[source] io::Error),
    #[error("Failed to fetch artifact: `{url}`")]
    Remote {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Opens a readable stream for an artifact.
pub trait ArtifactFetcher {
    fn open(&self, link: &Link) -> Result<Box<dyn Read + '_>, ArtifactError>;
}

/// An [`ArtifactFetcher`] that only supports `file://` links.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFetcher;

impl ArtifactFetcher for LocalFetcher {
    fn open(&self, link: &Link) -> Result<Box<dyn Read + '_>, ArtifactError> {
        let path = link
            .to_file_path()
            .ok_or_else(|| ArtifactError::UnsupportedLink(link.to_string()))?;
        Ok(Box::new(open_local_file(&path)?))
    }
}

/// Open a local artifact for reading, rejecting directories.
pub fn open_local_file(path: &Path) -> Result<fs_err::File, ArtifactError> {
    if path.is_dir() {
        return Err(ArtifactError::Directory(path.to_path_buf()));
    }
    fs_err::File::open(path).map_err(|err| ArtifactError::Io(path.display().to_string(), err))
}

/// Caches the hashes of artifacts whose URLs carry a hash fragment, so they needn't be
/// downloaded again.
///
/// Artifacts without a hash fragment are hashed on every request: their content at a given URL
/// may change.
#[derive(Debug)]
pub struct HashCache<F> {
    files: FileCache,
    fetcher: F,
}

impl<F: ArtifactFetcher> HashCache<F> {
    pub fn new(cache: &Cache, fetcher: F) -> Self {
        Self {
            files: FileCache::new(cache.shard(CacheBucket::Hashes, ""), ""),
            fetcher,
        }
    }

    /// Return the `<algorithm>:<digest>` hash of the artifact at `link`.
    pub fn get_hash(&self, link: &Link) -> Result<String, ArtifactError> {
        let cacheable = link.hash().is_some();
        if cacheable {
            match self.files.get(link.url()) {
                Ok(Some(content)) => {
                    if let Ok(hash) = String::from_utf8(content) {
                        debug!("Using cached hash for: {}", link.show_url());
                        return Ok(hash);
                    }
                }
                Ok(None) => {}
                Err(err) => debug!("Failed to read cached hash for {link}: {err}"),
            }
        }

        let hash = self.hash_artifact(link)?;
        if cacheable {
            if let Err(err) = self.files.set(link.url(), hash.as_bytes()) {
                debug!("Failed to cache hash for {link}: {err}");
            }
        }
        Ok(hash)
    }

    fn hash_artifact(&self, link: &Link) -> Result<String, ArtifactError> {
        debug!("Hashing artifact: {}", link.show_url());
        let mut reader = self.fetcher.open(link)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0; CHUNK_SIZE];
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|err| ArtifactError::Io(link.to_string(), err))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(format!("{FAVORITE_HASH}:{}", hex::encode(hasher.finalize())))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::Read;

    use assert_fs::prelude::*;

    use pyreq_requirement::Link;

    use crate::{ArtifactError, ArtifactFetcher, Cache, HashCache, LocalFetcher};

    /// Serves fixed content and counts how often it was asked to.
    struct CountingFetcher {
        content: &'static [u8],
        calls: Cell<usize>,
    }

    impl ArtifactFetcher for CountingFetcher {
        fn open(&self, _link: &Link) -> Result<Box<dyn Read + '_>, ArtifactError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Box::new(self.content))
        }
    }

    const HELLO: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn cached_when_fragment_present() {
        let cache = Cache::temp().unwrap();
        let fetcher = CountingFetcher {
            content: b"hello",
            calls: Cell::new(0),
        };
        let hashes = HashCache::new(&cache, fetcher);
        let digest = HELLO.trim_start_matches("sha256:");
        let link = Link::new(format!("https://example.com/demo-1.0.tar.gz#sha256={digest}"));

        assert_eq!(hashes.get_hash(&link).unwrap(), HELLO);
        assert_eq!(hashes.get_hash(&link).unwrap(), HELLO);
        assert_eq!(hashes.fetcher.calls.get(), 1);
    }

    #[test]
    fn not_cached_without_fragment() {
        let cache = Cache::temp().unwrap();
        let fetcher = CountingFetcher {
            content: b"hello",
            calls: Cell::new(0),
        };
        let hashes = HashCache::new(&cache, fetcher);
        let link = Link::new("https://example.com/demo-1.0.tar.gz");

        assert_eq!(hashes.get_hash(&link).unwrap(), HELLO);
        assert_eq!(hashes.get_hash(&link).unwrap(), HELLO);
        assert_eq!(hashes.fetcher.calls.get(), 2);
    }

    #[test]
    fn local_file() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let file = temp_dir.child("demo-1.0.tar.gz");
        file.write_binary(b"hello").unwrap();

        let cache = Cache::temp().unwrap();
        let hashes = HashCache::new(&cache, LocalFetcher);
        let link = Link::from_path(file.path()).unwrap();
        assert_eq!(hashes.get_hash(&link).unwrap(), HELLO);
    }

    #[test]
    fn local_directory() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let cache = Cache::temp().unwrap();
        let hashes = HashCache::new(&cache, LocalFetcher);
        let link = Link::from_path(temp_dir.path()).unwrap();
        assert!(matches!(
            hashes.get_hash(&link),
            Err(ArtifactError::Directory(_))
        ));
    }
}
