use std::fmt::{Display, Formatter};
use std::io;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{TempDir, tempdir};
use tracing::warn;

use pyreq_normalize::PackageName;

#[cfg(feature = "clap")]
pub use crate::cli::CacheArgs;
pub use crate::dependencies::DependencyCache;
pub use crate::digest::{CanonicalUrl, StableHash, StableHasher, digest};
pub use crate::hashes::{
    ArtifactError, ArtifactFetcher, FAVORITE_HASH, HashCache, LocalFetcher, open_local_file,
};
pub use crate::key::{CacheKey, CacheKeyError, CacheKeySource};
pub use crate::removal::Removal;
use crate::removal::rm_rf;

#[cfg(feature = "clap")]
mod cli;
mod dependencies;
mod digest;
mod file_cache;
mod hashes;
mod key;
mod removal;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Key(#[from] CacheKeyError),
    #[error("Failed to serialize cache entry for `{0}`")]
    Serialize(String, #[source] serde_json::Error),
}

/// A [`CacheEntry`] which may or may not exist yet.
#[derive(Debug, Clone)]
pub struct CacheEntry(PathBuf);

impl CacheEntry {
    /// Create a new [`CacheEntry`] from a directory and a file name.
    pub fn new(dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> Self {
        Self(dir.into().join(file))
    }

    /// Return the path to the [`CacheEntry`].
    #[inline]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Return the cache entry's parent directory.
    #[inline]
    pub fn dir(&self) -> &Path {
        self.0.parent().unwrap_or(&self.0)
    }
}

/// A subdirectory within the cache.
#[derive(Debug, Clone)]
pub struct CacheShard(PathBuf);

impl CacheShard {
    /// Return a [`CacheEntry`] within this shard.
    pub fn entry(&self, file: impl AsRef<Path>) -> CacheEntry {
        CacheEntry::new(&self.0, file)
    }

    /// Return a [`CacheShard`] within this shard.
    #[must_use]
    pub fn shard(&self, dir: impl AsRef<Path>) -> Self {
        Self(self.0.join(dir.as_ref()))
    }
}

impl AsRef<Path> for CacheShard {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Deref for CacheShard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The root of the on-disk cache.
#[derive(Debug, Clone)]
pub struct Cache {
    /// The cache directory.
    root: PathBuf,
    /// A temporary cache directory, if the user requested `--no-cache`.
    ///
    /// Included to ensure that the temporary directory exists for the length of the operation, but
    /// is dropped at the end as appropriate.
    _temp_dir_drop: Option<Arc<TempDir>>,
}

impl Cache {
    /// A persistent cache directory at `root`.
    pub fn from_path(root: impl Into<PathBuf>) -> Result<Self, io::Error> {
        Ok(Self {
            root: Self::init(root)?,
            _temp_dir_drop: None,
        })
    }

    /// Create a temporary cache directory.
    pub fn temp() -> Result<Self, io::Error> {
        let temp_dir = tempdir()?;
        Ok(Self {
            root: Self::init(temp_dir.path())?,
            _temp_dir_drop: Some(Arc::new(temp_dir)),
        })
    }

    /// Return the root of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns `true` if the cache is a temporary directory that is removed on drop.
    pub fn is_temporary(&self) -> bool {
        self._temp_dir_drop.is_some()
    }

    /// The folder for a specific cache bucket.
    pub fn bucket(&self, cache_bucket: CacheBucket) -> PathBuf {
        self.root.join(cache_bucket.to_str())
    }

    /// Compute a shard in the cache.
    pub fn shard(&self, cache_bucket: CacheBucket, dir: impl AsRef<Path>) -> CacheShard {
        CacheShard(self.bucket(cache_bucket).join(dir.as_ref()))
    }

    /// Initialize a directory for use as a cache.
    fn init(root: impl Into<PathBuf>) -> Result<PathBuf, io::Error> {
        let root = root.into();

        // Create the cache directory, if it doesn't exist.
        fs_err::create_dir_all(&root)?;

        // Add the CACHEDIR.TAG.
        cachedir::ensure_tag(&root)?;

        // Add the .gitignore.
        match fs_err::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(root.join(".gitignore"))
        {
            Ok(mut file) => file.write_all(b"*")?,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => (),
            Err(err) => return Err(err),
        }

        fs_err::canonicalize(root)
    }

    /// Clear the cache, removing all entries.
    pub fn clear(&self) -> Result<Removal, io::Error> {
        rm_rf(&self.root)
    }

    /// Clear a single bucket, removing all of its entries.
    pub fn clear_bucket(&self, cache_bucket: CacheBucket) -> Result<Removal, io::Error> {
        rm_rf(self.bucket(cache_bucket))
    }

    /// Remove a package from the cache.
    ///
    /// Returns the number of entries removed from the cache.
    pub fn remove(&self, name: &PackageName) -> Result<Removal, io::Error> {
        let mut summary = Removal::default();
        for bucket in [CacheBucket::Dependencies, CacheBucket::Hashes] {
            summary += bucket.remove(self, name)?;
        }
        Ok(summary)
    }
}

/// The different kinds of data in the cache are stored in different buckets, which in our case
/// are subdirectories of the cache root.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CacheBucket {
    /// The resolved dependencies of pinned requirements.
    ///
    /// Partitioned by interpreter version and by a digest of the configured index URLs, with one
    /// JSON document per package name mapping `version[extras]` to a list of requirement lines:
    ///
    /// ```text
    /// dependencies-v0
    /// └── 3.12
    ///     └── 9b8e6e2c1fbbd0c2
    ///         └── 1a8b2c0f6e7d4c31.json   # digest("requests")
    /// ```
    ///
    /// ```json
    /// {"2.31.0[socks]": ["certifi>=2017.4.17", "idna<4,>=2.5", "PySocks!=1.5.7,>=1.5.6"]}
    /// ```
    Dependencies,
    /// `<algorithm>:<digest>` hashes of artifacts whose URLs carry a hash fragment, one file per
    /// URL (including the fragment).
    Hashes,
    /// Source distributions and other artifacts downloaded to extract their dependencies.
    Downloads,
    /// Wheels downloaded to extract their dependencies.
    Wheels,
}

impl CacheBucket {
    fn to_str(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies-v0",
            Self::Hashes => "hashes-v0",
            Self::Downloads => "downloads-v0",
            Self::Wheels => "wheels-v0",
        }
    }

    /// Remove a package from the cache bucket.
    ///
    /// Returns the number of entries removed from the cache.
    fn remove(self, cache: &Cache, name: &PackageName) -> Result<Removal, io::Error> {
        let mut summary = Removal::default();
        match self {
            Self::Dependencies => {
                // We expect a directory for every interpreter version, followed by a directory
                // for every index configuration, followed by a file per package.
                let file = dependencies::entry_name(name.as_str());
                for directory in directories(cache.bucket(self)) {
                    for directory in directories(directory) {
                        summary += rm_rf(directory.join(&file))?;
                    }
                }
            }
            Self::Hashes | Self::Downloads | Self::Wheels => {
                // Keyed by URL or filename; there's no reliable way to map them back to a package.
            }
        }
        Ok(summary)
    }
}

impl Display for CacheBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Iterate over the subdirectories of a directory.
///
/// If the directory does not exist, returns an empty iterator.
fn directories(path: impl AsRef<Path>) -> impl Iterator<Item = PathBuf> {
    path.as_ref()
        .read_dir()
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Failed to read entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_dir()))
        .map(|entry| entry.path())
}
