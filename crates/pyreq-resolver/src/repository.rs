use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use pep440_rs::{Version, VersionSpecifiers};
use rustc_hash::FxHashMap;
use tempfile::TempDir;
use tracing::{debug, instrument, trace, warn};

use pyreq_cache::{ArtifactFetcher, Cache, CacheBucket, DependencyCache, HashCache, Removal};
use pyreq_normalize::PackageName;
use pyreq_requirement::{DependencySet, Requirement, RequirementSource};

use crate::{
    BuildDirs, Candidate, DependencyBuilder, MetadataApi, PackageFinder, Platforms, ResolveError,
};

/// Answers questions about individual requirements against a package index: which candidate
/// best matches a requirement, what a pinned requirement depends on, and the hashes of every file
/// of a pinned release.
///
/// Lookups go through two layers. The in-memory layer (candidates per project, extracted and
/// metadata-API dependencies per requirement) lives as long as the repository and is only
/// dropped by [`Repository::clear_memory`]. The on-disk layer ([`DependencyCache`] and
/// [`HashCache`]) is shared with every other repository using the same cache.
pub struct Repository<F, B, A> {
    finder: F,
    builder: B,
    metadata_api: Option<Box<dyn MetadataApi>>,
    cache: Cache,
    dependency_cache: DependencyCache,
    hash_cache: HashCache<A>,
    available_candidates: FxHashMap<(PackageName, Platforms), Rc<[Candidate]>>,
    /// Extracted dependencies, keyed by requirement line.
    dependencies: FxHashMap<String, DependencySet>,
    /// Dependencies reported by the metadata API, keyed by requirement line.
    json_dependencies: FxHashMap<String, DependencySet>,
    build_dir: TempDir,
    source_dir: TempDir,
    download_dir: PathBuf,
    wheel_download_dir: PathBuf,
}

impl<F, B, A> Repository<F, B, A>
where
    F: PackageFinder,
    B: DependencyBuilder,
    A: ArtifactFetcher,
{
    /// Create a repository whose dependency cache is partitioned by `python_version` and the
    /// finder's index URLs.
    pub fn new(
        cache: &Cache,
        python_version: &str,
        finder: F,
        builder: B,
        fetcher: A,
    ) -> Result<Self, io::Error> {
        let index_urls = finder.index_urls();
        Ok(Self {
            dependency_cache: DependencyCache::new(cache, python_version, &index_urls),
            hash_cache: HashCache::new(cache, fetcher),
            finder,
            builder,
            metadata_api: None,
            cache: cache.clone(),
            available_candidates: FxHashMap::default(),
            dependencies: FxHashMap::default(),
            json_dependencies: FxHashMap::default(),
            build_dir: scratch_dir("build")?,
            source_dir: scratch_dir("source")?,
            download_dir: cache.bucket(CacheBucket::Downloads),
            wheel_download_dir: cache.bucket(CacheBucket::Wheels),
        })
    }

    /// Consult `metadata_api` before extracting the dependencies of a requirement pinned to the
    /// latest release.
    #[must_use]
    pub fn with_metadata_api(mut self, metadata_api: impl MetadataApi + 'static) -> Self {
        self.metadata_api = Some(Box::new(metadata_api));
        self
    }

    pub fn finder(&self) -> &F {
        &self.finder
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn dependency_cache(&self) -> &DependencyCache {
        &self.dependency_cache
    }

    pub fn build_dir(&self) -> &Path {
        self.build_dir.path()
    }

    pub fn source_dir(&self) -> &Path {
        self.source_dir.path()
    }

    /// Start with fresh build and source directories; the old ones are removed.
    pub fn freshen_build_caches(&mut self) -> Result<(), io::Error> {
        self.build_dir = scratch_dir("build")?;
        self.source_dir = scratch_dir("source")?;
        Ok(())
    }

    /// Remove downloaded archives and wheels.
    pub fn clear_caches(&self) -> Result<Removal, io::Error> {
        let mut removal = self.cache.clear_bucket(CacheBucket::Downloads)?;
        removal += self.cache.clear_bucket(CacheBucket::Wheels)?;
        Ok(removal)
    }

    /// Forget every candidate and dependency set learned by this repository. The on-disk caches
    /// are unaffected.
    pub fn clear_memory(&mut self) {
        self.available_candidates.clear();
        self.dependencies.clear();
        self.json_dependencies.clear();
    }

    /// Every candidate for `name`, memoized per platform selection.
    pub fn find_all_candidates(
        &mut self,
        name: &PackageName,
        platforms: Platforms,
    ) -> Result<Rc<[Candidate]>, ResolveError> {
        let key = (name.clone(), platforms);
        if let Some(candidates) = self.available_candidates.get(&key) {
            return Ok(Rc::clone(candidates));
        }

        let candidates: Rc<[Candidate]> = self
            .finder
            .find_all_candidates(name, platforms)
            .map_err(|err| ResolveError::Finder {
                name: name.to_string(),
                source: err.into(),
            })?
            .into();
        debug!("Found {} candidates for: {name}", candidates.len());
        self.available_candidates.insert(key, Rc::clone(&candidates));
        Ok(candidates)
    }

    /// Pin `requirement` to the most preferred candidate satisfying its specifiers.
    ///
    /// Editable requirements, and requirements on a specific location, are returned unchanged.
    ///
    /// With `prereleases` unset, pre-releases are considered only if a specifier names one, or if
    /// no final release matches.
    #[instrument(skip_all, fields(requirement = %requirement))]
    pub fn find_best_match(
        &mut self,
        requirement: &Requirement,
        prereleases: Option<bool>,
    ) -> Result<Requirement, ResolveError> {
        if requirement.editable {
            return Ok(requirement.clone());
        }
        let RequirementSource::Registry { specifiers } = &requirement.source else {
            return Ok(requirement.clone());
        };

        let name = requirement.package_name()?;
        let candidates = self.find_all_candidates(&name, Platforms::Compatible)?;
        let best = matching_candidates(specifiers.as_ref(), &candidates, prereleases)
            .into_iter()
            .max_by_key(|candidate| self.finder.candidate_sort_key(candidate))
            .ok_or_else(|| ResolveError::NoCandidate {
                requirement: requirement.constructed_line(),
                candidates: candidates
                    .iter()
                    .map(|candidate| candidate.version.to_string())
                    .unique()
                    .collect(),
            })?;
        debug!("Selected {best}");

        Ok(Requirement {
            index: requirement.index.clone(),
            ..Requirement::pinned(
                best.name.to_string(),
                &best.version,
                requirement.extras.clone(),
                requirement.markers.clone(),
            )
        })
    }

    /// The dependencies of a pinned or editable requirement.
    ///
    /// Served from the dependency cache when possible. Otherwise, the dependencies reported by
    /// the metadata API (if any) are merged with those extracted from the distribution itself,
    /// written to the cache, and read back, so the result is in its cached form. If the cache
    /// can't be written, the freshly computed set is returned as is.
    #[instrument(skip_all, fields(requirement = %requirement))]
    pub fn get_dependencies(
        &mut self,
        requirement: &Requirement,
    ) -> Result<DependencySet, ResolveError> {
        expect_pinned_or_editable(requirement)?;

        match self.dependency_cache.get(requirement) {
            Ok(Some(dependencies)) => {
                trace!("Using cached dependencies for: {requirement}");
                return Ok(dependencies);
            }
            Ok(None) => {}
            Err(err) => {
                let err = ResolveError::from(err);
                if matches!(err, ResolveError::NameResolution(_)) {
                    return Err(err);
                }
                warn!("Failed to read the dependency cache: {err}");
            }
        }

        let mut dependencies = if self.metadata_api.is_some() && requirement.is_pinned() {
            self.get_json_dependencies(requirement)?
        } else {
            DependencySet::new()
        };
        dependencies.extend(self.get_legacy_dependencies(requirement)?);

        // A cache that can't be written to doesn't invalidate the computed dependencies.
        if let Err(err) = self.dependency_cache.set(requirement, &dependencies) {
            warn!("Failed to write the dependency cache: {err}");
            return Ok(dependencies);
        }
        match self.dependency_cache.get(requirement) {
            Ok(Some(cached)) => Ok(cached),
            Ok(None) => Ok(dependencies),
            Err(err) => {
                warn!("Failed to read back the dependency cache: {err}");
                Ok(dependencies)
            }
        }
    }

    /// The dependencies of a pinned requirement, as reported by the metadata API.
    ///
    /// Only consulted when the requirement is pinned to the latest release. Dependencies gated on
    /// an extra are skipped. Any failure to reach or read the API yields an empty set.
    pub fn get_json_dependencies(
        &mut self,
        requirement: &Requirement,
    ) -> Result<DependencySet, ResolveError> {
        let Some(version) = requirement.pinned_version() else {
            return Err(ResolveError::InputShape {
                expected: "a pinned",
                requirement: requirement.constructed_line(),
            });
        };

        let line = requirement.constructed_line();
        if let Some(dependencies) = self.json_dependencies.get(&line) {
            return Ok(dependencies.clone());
        }
        let Some(metadata_api) = self.metadata_api.as_deref() else {
            return Ok(DependencySet::new());
        };

        match json_dependencies(metadata_api, requirement, version) {
            Ok(dependencies) => {
                self.json_dependencies.insert(line, dependencies.clone());
                Ok(dependencies)
            }
            Err(err) => {
                debug!("Ignoring metadata API failure for {line}: {err:#}");
                Ok(DependencySet::new())
            }
        }
    }

    /// The dependencies of a pinned or editable requirement, extracted from the distribution by
    /// the [`DependencyBuilder`].
    ///
    /// When the distribution declares a `Requires-Python` constraint, the requirement itself,
    /// gated on that constraint, is added to the result.
    pub fn get_legacy_dependencies(
        &mut self,
        requirement: &Requirement,
    ) -> Result<DependencySet, ResolveError> {
        expect_pinned_or_editable(requirement)?;

        let line = requirement.original_line();
        if let Some(dependencies) = self.dependencies.get(&line) {
            return Ok(dependencies.clone());
        }

        // Local editable sources and version control checkouts are used in place.
        let download_dir = if requirement.is_vcs()
            || (requirement.editable
                && matches!(requirement.source, RequirementSource::Path { .. }))
        {
            None
        } else {
            fs_err::create_dir_all(&self.download_dir)?;
            Some(self.download_dir.as_path())
        };
        fs_err::create_dir_all(&self.wheel_download_dir)?;

        let scratch = tempfile::tempdir_in(self.build_dir.path())?;
        let dirs = BuildDirs {
            build_dir: scratch.path(),
            source_dir: self.source_dir.path(),
            download_dir,
            wheel_download_dir: &self.wheel_download_dir,
        };
        debug!("Extracting dependencies of: {line}");
        let result = self.builder.build(requirement, &dirs);
        if let Err(err) = scratch.close() {
            warn!("Failed to remove build directory: {err}");
        }
        let result = result.map_err(|err| ResolveError::Build {
            requirement: line.clone(),
            source: err.into(),
        })?;

        let mut dependencies = result.dependencies.into_iter().collect::<DependencySet>();
        if let Some(marker) = result
            .requires_python
            .as_deref()
            .and_then(requires_python_marker)
        {
            let mut gated = requirement.clone();
            gated.hashes.clear();
            gated.markers = Some(match &requirement.markers {
                Some(markers) => format!("({markers}) and {marker}"),
                None => marker,
            });
            dependencies.insert(gated);
        }

        self.dependencies.insert(line, dependencies.clone());
        Ok(dependencies)
    }

    /// The hashes of every file of the release a requirement is pinned to.
    ///
    /// Editable requirements have no hashes.
    #[instrument(skip_all, fields(requirement = %requirement))]
    pub fn get_hashes(
        &mut self,
        requirement: &Requirement,
        platforms: Platforms,
    ) -> Result<BTreeSet<String>, ResolveError> {
        if requirement.editable {
            return Ok(BTreeSet::new());
        }
        if !requirement.is_pinned() {
            return Err(ResolveError::InputShape {
                expected: "a pinned",
                requirement: requirement.constructed_line(),
            });
        }

        let name = requirement.package_name()?;
        let candidates = self.find_all_candidates(&name, platforms)?;
        let matching = matching_candidates(requirement.specifiers(), &candidates, Some(true));
        let Some(version) = matching.first().map(|candidate| &candidate.version) else {
            return Err(ResolveError::NoCandidate {
                requirement: requirement.constructed_line(),
                candidates: candidates
                    .iter()
                    .map(|candidate| candidate.version.to_string())
                    .unique()
                    .collect(),
            });
        };

        let mut hashes = BTreeSet::new();
        for candidate in matching.iter().filter(|candidate| candidate.version == *version) {
            hashes.insert(self.hash_cache.get_hash(&candidate.link)?);
        }
        Ok(hashes)
    }
}

fn scratch_dir(prefix: &str) -> Result<TempDir, io::Error> {
    tempfile::Builder::new().prefix(prefix).tempdir()
}

fn expect_pinned_or_editable(requirement: &Requirement) -> Result<(), ResolveError> {
    if requirement.editable || requirement.is_pinned() {
        Ok(())
    } else {
        Err(ResolveError::InputShape {
            expected: "a pinned or editable",
            requirement: requirement.constructed_line(),
        })
    }
}

/// The candidates satisfying `specifiers`, subject to the pre-release policy.
fn matching_candidates<'a>(
    specifiers: Option<&VersionSpecifiers>,
    candidates: &'a [Candidate],
    prereleases: Option<bool>,
) -> Vec<&'a Candidate> {
    let matching = candidates
        .iter()
        .filter(|candidate| {
            specifiers.is_none_or(|specifiers| specifiers.contains(&candidate.version))
        })
        .collect::<Vec<_>>();

    let allow_prereleases = prereleases.unwrap_or_else(|| {
        specifiers.is_some_and(|specifiers| {
            specifiers
                .iter()
                .any(|specifier| specifier.version().any_prerelease())
        })
    });
    if allow_prereleases {
        return matching;
    }

    let finals = matching
        .iter()
        .copied()
        .filter(|candidate| !candidate.version.any_prerelease())
        .collect::<Vec<_>>();
    if finals.is_empty() && prereleases.is_none() {
        matching
    } else {
        finals
    }
}

/// The dependencies of `requirement` according to the metadata API, if it's pinned to the latest
/// release.
fn json_dependencies(
    metadata_api: &dyn MetadataApi,
    requirement: &Requirement,
    version: &Version,
) -> anyhow::Result<DependencySet> {
    let name = requirement.package_name()?;
    let Some(latest) = metadata_api.releases(&name)?.into_iter().max() else {
        return Ok(DependencySet::new());
    };
    if latest != *version {
        trace!("Not using the metadata API for {name}=={version}; the latest release is {latest}");
        return Ok(DependencySet::new());
    }

    let mut dependencies = DependencySet::new();
    for line in metadata_api.requires_dist(&name, &latest)? {
        let dependency = Requirement::from_line(&line)?;
        if dependency
            .markers
            .as_deref()
            .is_some_and(|markers| markers.contains("extra"))
        {
            continue;
        }
        dependencies.insert(dependency);
    }
    Ok(dependencies)
}

/// Translate a `Requires-Python` constraint into a `python_version` marker expression.
fn requires_python_marker(requires_python: &str) -> Option<String> {
    let specifiers = VersionSpecifiers::from_str(requires_python)
        .inspect_err(|err| warn!("Ignoring invalid `Requires-Python` `{requires_python}`: {err}"))
        .ok()?;
    if specifiers.is_empty() {
        return None;
    }
    Some(
        specifiers
            .iter()
            .map(|specifier| {
                let operator = specifier.operator().to_string();
                let specifier = specifier.to_string();
                let version = specifier.strip_prefix(&operator).unwrap_or(&specifier);
                format!("python_version {operator} \"{}\"", version.trim())
            })
            .join(" and "),
    )
}
