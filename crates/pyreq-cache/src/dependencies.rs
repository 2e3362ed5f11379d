use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use pyreq_requirement::{DependencySet, Requirement};

use crate::file_cache::FileCache;
use crate::{Cache, CacheBucket, CacheError, CacheKey, CacheKeySource, CanonicalUrl, digest};

/// The JSON document stored per package: `version[extras]` to canonical requirement lines.
type VersionMap = BTreeMap<String, Vec<String>>;

/// The file name of the dependency cache entry for a (normalized) package name.
pub(crate) fn entry_name(name: &str) -> String {
    format!("{}.json", digest(name))
}

/// Caches the dependencies of pinned requirements, per interpreter version and index
/// configuration.
///
/// Entries are keyed by package name; each holds the dependency sets of every cached
/// `version[extras]` of that package.
#[derive(Debug, Clone)]
pub struct DependencyCache {
    files: FileCache,
}

impl DependencyCache {
    /// Create a dependency cache partitioned by `python_version` and the given index URLs.
    ///
    /// The order of the index URLs is significant: the first is the primary index.
    pub fn new(cache: &Cache, python_version: &str, index_urls: &[impl AsRef<str>]) -> Self {
        let index_urls = index_urls
            .iter()
            .map(|url| {
                let url = url.as_ref();
                CanonicalUrl::parse(url)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| url.trim().to_string())
            })
            .collect::<Vec<_>>();
        let shard = cache
            .shard(CacheBucket::Dependencies, python_version)
            .shard(digest(&index_urls));
        Self {
            files: FileCache::new(shard, ".json"),
        }
    }

    /// The directory holding this partition of the cache.
    pub fn dir(&self) -> &Path {
        self.files.dir()
    }

    /// Store the dependencies of `key`, alongside any other versions already cached for the
    /// same package.
    pub fn set<K: CacheKeySource + ?Sized>(
        &self,
        key: &K,
        dependencies: &DependencySet,
    ) -> Result<CacheKey, CacheError> {
        let key = CacheKey::from_source(key)?;
        let mut versions = self.read(&key.name)?.unwrap_or_default();
        versions.insert(
            key.version_with_extras.clone(),
            dependencies.lines().map(ToString::to_string).collect(),
        );
        let content = serde_json::to_vec(&versions)
            .map_err(|err| CacheError::Serialize(key.name.clone(), err))?;
        self.files.set(&key.name, &content)?;
        debug!("Cached {} dependencies for: {key}", dependencies.len());
        Ok(key)
    }

    /// Retrieve the dependencies of `key`.
    ///
    /// Returns `None` if nothing is cached for the package, if the package is cached without
    /// this `version[extras]`, or if the cached entry can't be decoded.
    pub fn get<K: CacheKeySource + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Option<DependencySet>, CacheError> {
        let key = CacheKey::from_source(key)?;
        let Some(mut versions) = self.read(&key.name)? else {
            return Ok(None);
        };
        let Some(lines) = versions.remove(&key.version_with_extras) else {
            return Ok(None);
        };

        let mut dependencies = DependencySet::new();
        for line in lines {
            match Requirement::from_line(&line) {
                Ok(requirement) => {
                    dependencies.insert(requirement);
                }
                Err(err) => {
                    warn!("Ignoring cached dependencies for {key}; invalid requirement `{line}`: {err}");
                    return Ok(None);
                }
            }
        }
        Ok(Some(dependencies))
    }

    /// Remove every cached version of the package identified by `key`.
    pub fn delete<K: CacheKeySource + ?Sized>(&self, key: &K) -> Result<bool, CacheError> {
        let key = CacheKey::from_source(key)?;
        Ok(self.files.delete(&key.name)?)
    }

    /// Read the version map for a package, treating an undecodable entry as absent.
    fn read(&self, name: &str) -> Result<Option<VersionMap>, CacheError> {
        let Some(content) = self.files.get(name)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<VersionMap>(&content) {
            Ok(versions) => Ok(Some(versions)),
            Err(err) => {
                warn!("Ignoring malformed dependency cache entry for `{name}`: {err}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pyreq_requirement::{DependencySet, Requirement};

    use crate::{Cache, CacheError, CacheKeyError, DependencyCache};

    fn dependencies(lines: &[&str]) -> DependencySet {
        lines
            .iter()
            .map(|line| Requirement::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn set_then_get() {
        let cache = Cache::temp().unwrap();
        let dependency_cache = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple"]);
        let key = Requirement::from_line("requests[socks]==2.31.0").unwrap();
        let expected = dependencies(&[
            "certifi>=2017.4.17",
            "idna<4,>=2.5",
            "PySocks!=1.5.7,>=1.5.6",
        ]);

        dependency_cache.set(&key, &expected).unwrap();
        assert_eq!(dependency_cache.get(&key).unwrap(), Some(expected));

        let entry = dependency_cache.files.entry("requests");
        let content = fs_err::read_to_string(entry.path()).unwrap();
        let versions: serde_json::Value = serde_json::from_str(&content).unwrap();
        insta::assert_json_snapshot!(versions, @r###"
        {
          "2.31.0[socks]": [
            "PySocks!=1.5.7,>=1.5.6",
            "certifi>=2017.4.17",
            "idna<4,>=2.5"
          ]
        }
        "###);
    }

    #[test]
    fn miss() {
        let cache = Cache::temp().unwrap();
        let dependency_cache = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple"]);
        let key = Requirement::from_line("six==1.16.0").unwrap();
        assert_eq!(dependency_cache.get(&key).unwrap(), None);

        // A different version of the same package is still a miss.
        dependency_cache
            .set(&Requirement::from_line("six==1.15.0").unwrap(), &DependencySet::new())
            .unwrap();
        assert_eq!(dependency_cache.get(&key).unwrap(), None);
        assert_eq!(
            dependency_cache
                .get(&Requirement::from_line("six==1.15.0").unwrap())
                .unwrap(),
            Some(DependencySet::new())
        );
    }

    #[test]
    fn versions_accumulate() {
        let cache = Cache::temp().unwrap();
        let dependency_cache = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple"]);
        let old = Requirement::from_line("flask==2.0.0").unwrap();
        let new = Requirement::from_line("flask==3.0.0").unwrap();
        dependency_cache
            .set(&old, &dependencies(&["click>=7.1.2"]))
            .unwrap();
        dependency_cache
            .set(&new, &dependencies(&["click>=8.1.3"]))
            .unwrap();

        assert_eq!(
            dependency_cache.get(&old).unwrap(),
            Some(dependencies(&["click>=7.1.2"]))
        );
        assert_eq!(
            dependency_cache.get(&new).unwrap(),
            Some(dependencies(&["click>=8.1.3"]))
        );
    }

    #[test]
    fn delete_evicts_every_version() {
        let cache = Cache::temp().unwrap();
        let dependency_cache = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple"]);
        let old = Requirement::from_line("flask==2.0.0").unwrap();
        let new = Requirement::from_line("flask==3.0.0").unwrap();
        dependency_cache.set(&old, &DependencySet::new()).unwrap();
        dependency_cache.set(&new, &DependencySet::new()).unwrap();

        assert!(dependency_cache.delete(&new).unwrap());
        assert_eq!(dependency_cache.get(&old).unwrap(), None);
        assert_eq!(dependency_cache.get(&new).unwrap(), None);
        assert!(!dependency_cache.delete(&new).unwrap());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let cache = Cache::temp().unwrap();
        let dependency_cache = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple"]);
        let key = Requirement::from_line("six==1.16.0").unwrap();
        dependency_cache.files.set("six", b"{not json").unwrap();
        assert_eq!(dependency_cache.get(&key).unwrap(), None);

        // The next write heals the entry.
        dependency_cache.set(&key, &DependencySet::new()).unwrap();
        assert_eq!(dependency_cache.get(&key).unwrap(), Some(DependencySet::new()));
    }

    #[test]
    fn partitioned_by_index() {
        let cache = Cache::temp().unwrap();
        let pypi = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple/"]);
        let same = DependencyCache::new(&cache, "3.12", &["https://PYPI.org/simple"]);
        let port = DependencyCache::new(&cache, "3.12", &["https://pypi.org:443/simple"]);
        let other = DependencyCache::new(&cache, "3.12", &["https://example.com/simple"]);
        let older = DependencyCache::new(&cache, "3.8", &["https://pypi.org/simple"]);
        assert_eq!(pypi.dir(), same.dir());
        assert_eq!(pypi.dir(), port.dir());
        assert_ne!(pypi.dir(), other.dir());
        assert_ne!(pypi.dir(), older.dir());

        let key = Requirement::from_line("six==1.16.0").unwrap();
        pypi.set(&key, &DependencySet::new()).unwrap();
        assert!(same.get(&key).unwrap().is_some());
        assert!(other.get(&key).unwrap().is_none());
    }

    #[test]
    fn unpinned_key() {
        let cache = Cache::temp().unwrap();
        let dependency_cache = DependencyCache::new(&cache, "3.12", &["https://pypi.org/simple"]);
        let key = Requirement::from_line("six>=1.0").unwrap();
        assert!(matches!(
            dependency_cache.get(&key),
            Err(CacheError::Key(CacheKeyError::NameResolution(_)))
        ));
    }
}
