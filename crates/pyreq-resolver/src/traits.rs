//! The collaborators of a [`crate::Repository`]: where candidates come from, how dependencies
//! are extracted from a distribution, and the optional metadata API that can short-circuit an
//! extraction.

use std::path::Path;

use pep440_rs::Version;

use pyreq_normalize::PackageName;
use pyreq_requirement::Requirement;

use crate::{Candidate, Platforms};

/// Discovers the candidates a package index offers for a project.
pub trait PackageFinder {
    /// Orders candidates from least to most preferred.
    type SortKey: Ord;

    /// The URLs of the indexes this finder searches, primary index first.
    fn index_urls(&self) -> Vec<String>;

    /// Every candidate the indexes offer for `name`, across all versions.
    fn find_all_candidates(
        &self,
        name: &PackageName,
        platforms: Platforms,
    ) -> anyhow::Result<Vec<Candidate>>;

    fn candidate_sort_key(&self, candidate: &Candidate) -> Self::SortKey;
}

/// The directories a [`DependencyBuilder`] may use.
#[derive(Debug, Clone, Copy)]
pub struct BuildDirs<'a> {
    /// A scratch directory for this build only; removed once the build returns.
    pub build_dir: &'a Path,
    /// Where to check out version-controlled sources.
    pub source_dir: &'a Path,
    /// Where to keep downloaded archives, or `None` if the source is already on disk (editable
    /// directories) or a checkout (version control).
    pub download_dir: Option<&'a Path>,
    pub wheel_download_dir: &'a Path,
}

/// The outcome of extracting the dependencies of a distribution.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub dependencies: Vec<Requirement>,
    /// The `Requires-Python` constraint of the distribution, if it declares one.
    pub requires_python: Option<String>,
}

/// Extracts the declared dependencies of a pinned or editable requirement, typically by
/// downloading, unpacking, or building it.
pub trait DependencyBuilder {
    fn build(&self, requirement: &Requirement, dirs: &BuildDirs<'_>)
    -> anyhow::Result<BuildResult>;
}

/// A metadata API that reports the declared dependencies of published releases without a
/// download.
pub trait MetadataApi {
    /// Every published version of `name`.
    fn releases(&self, name: &PackageName) -> anyhow::Result<Vec<Version>>;

    /// The `Requires-Dist` lines of a release.
    fn requires_dist(&self, name: &PackageName, version: &Version) -> anyhow::Result<Vec<String>>;
}
