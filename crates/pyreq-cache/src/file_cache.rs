use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::trace;

use crate::{CacheEntry, CacheShard, digest};

/// A byte-oriented key-value store backed by one file per key.
///
/// Writes go to a temporary file in the same directory and are renamed into place, so a reader
/// never observes a partially written value.
#[derive(Debug, Clone)]
pub(crate) struct FileCache {
    shard: CacheShard,
    extension: &'static str,
}

impl FileCache {
    pub(crate) fn new(shard: CacheShard, extension: &'static str) -> Self {
        Self { shard, extension }
    }

    /// The directory that holds the entries.
    pub(crate) fn dir(&self) -> &Path {
        &self.shard
    }

    pub(crate) fn entry(&self, key: &str) -> CacheEntry {
        self.shard
            .entry(format!("{}{}", digest(key), self.extension))
    }

    pub(crate) fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let entry = self.entry(key);
        match fs_err::read(entry.path()) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn set(&self, key: &str, value: &[u8]) -> io::Result<()> {
        let entry = self.entry(key);
        trace!("Writing cache entry for `{key}` to: {}", entry.path().display());
        write_atomic(entry.path(), value)
    }

    /// Remove the value for `key`, returning `true` if it existed.
    pub(crate) fn delete(&self, key: &str) -> io::Result<bool> {
        let entry = self.entry(key);
        match fs_err::remove_file(entry.path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Write `data` to `path` atomically using a temporary file and atomic rename.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Cache entry has no parent: {}", path.display()),
        )
    })?;
    fs_err::create_dir_all(dir)?;
    let temp_file = NamedTempFile::new_in(dir)?;
    fs_err::write(temp_file.path(), data)?;
    temp_file.persist(path).map_err(|err| {
        io::Error::other(format!(
            "Failed to persist temporary file to {}: {}",
            path.display(),
            err.error
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Cache, CacheBucket};

    use super::FileCache;

    #[test]
    fn get_set_delete() {
        let cache = Cache::temp().unwrap();
        let files = FileCache::new(cache.shard(CacheBucket::Hashes, ""), "");

        assert_eq!(files.get("https://example.com/a").unwrap(), None);
        files.set("https://example.com/a", b"value").unwrap();
        assert_eq!(
            files.get("https://example.com/a").unwrap().as_deref(),
            Some(b"value".as_slice())
        );

        files.set("https://example.com/a", b"other").unwrap();
        assert_eq!(
            files.get("https://example.com/a").unwrap().as_deref(),
            Some(b"other".as_slice())
        );

        assert!(files.delete("https://example.com/a").unwrap());
        assert!(!files.delete("https://example.com/a").unwrap());
        assert_eq!(files.get("https://example.com/a").unwrap(), None);
    }
}
