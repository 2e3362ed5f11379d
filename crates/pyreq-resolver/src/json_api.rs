//! [`PackageFinder`], [`DependencyBuilder`], and [`MetadataApi`] implementations backed by the
//! JSON API of a package index.

use std::str::FromStr;

use anyhow::{Context, bail};
use pep440_rs::{Version, VersionSpecifiers};
use tracing::{debug, trace};

use pyreq_client::{JsonApiClient, PackageType, ProjectJson};
use pyreq_normalize::PackageName;
use pyreq_requirement::{Link, Requirement};

use crate::{
    BuildDirs, BuildResult, Candidate, DependencyBuilder, MetadataApi, PackageFinder, Platforms,
};

/// Finds candidates in the `releases` of a project's JSON API document, across one or more
/// indexes.
#[derive(Debug, Clone)]
pub struct JsonApiFinder {
    /// One client per index, primary index first.
    clients: Vec<JsonApiClient>,
    /// The interpreter version compatible files must support.
    python_version: Option<Version>,
}

impl JsonApiFinder {
    pub fn new(clients: Vec<JsonApiClient>, python_version: Option<Version>) -> Self {
        Self {
            clients,
            python_version,
        }
    }

    /// Returns `true` if a file declaring `requires_python` supports the target interpreter.
    fn supports_python(&self, requires_python: Option<&str>) -> bool {
        let (Some(python_version), Some(requires_python)) = (&self.python_version, requires_python)
        else {
            return true;
        };
        match VersionSpecifiers::from_str(requires_python) {
            Ok(specifiers) => specifiers.contains(python_version),
            Err(err) => {
                trace!("Ignoring invalid `requires_python` `{requires_python}`: {err}");
                true
            }
        }
    }

    fn collect_candidates(
        &self,
        name: &PackageName,
        project: ProjectJson,
        platforms: Platforms,
        candidates: &mut Vec<Candidate>,
    ) {
        for (version, files) in project.releases {
            let Ok(version) = Version::from_str(&version) else {
                debug!("Skipping invalid version `{version}` of {name}");
                continue;
            };
            for file in files {
                if file.packagetype == PackageType::Other {
                    continue;
                }
                if platforms == Platforms::Compatible
                    && (file.yanked || !self.supports_python(file.requires_python.as_deref()))
                {
                    trace!("Skipping incompatible file: {}", file.filename);
                    continue;
                }
                candidates.push(Candidate::new(
                    name.clone(),
                    version.clone(),
                    Link::new(file.url_with_hash()),
                ));
            }
        }
    }
}

impl PackageFinder for JsonApiFinder {
    /// Higher versions first; for equal versions, wheels over source distributions.
    type SortKey = (Version, bool);

    fn index_urls(&self) -> Vec<String> {
        self.clients
            .iter()
            .map(|client| client.base_url().to_string())
            .collect()
    }

    fn find_all_candidates(
        &self,
        name: &PackageName,
        platforms: Platforms,
    ) -> anyhow::Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for client in &self.clients {
            let project = match client.project(name) {
                Ok(project) => project,
                Err(pyreq_client::Error::PackageNotFound(_)) => {
                    trace!("{name} was not found in: {}", client.base_url());
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            self.collect_candidates(name, project, platforms, &mut candidates);
        }
        Ok(candidates)
    }

    fn candidate_sort_key(&self, candidate: &Candidate) -> Self::SortKey {
        (candidate.version.clone(), candidate.is_wheel())
    }
}

/// Reads the dependencies of a pinned release from the `requires_dist` of its JSON API
/// document, without downloading anything.
///
/// Dependencies gated on extras the requirement doesn't request are dropped.
#[derive(Debug, Clone)]
pub struct IndexMetadataBuilder {
    client: JsonApiClient,
}

impl IndexMetadataBuilder {
    pub fn new(client: JsonApiClient) -> Self {
        Self { client }
    }
}

impl DependencyBuilder for IndexMetadataBuilder {
    fn build(
        &self,
        requirement: &Requirement,
        _dirs: &BuildDirs<'_>,
    ) -> anyhow::Result<BuildResult> {
        let Some(version) = requirement.pinned_version() else {
            bail!(
                "Only pinned index requirements can be read from the index: `{}`",
                requirement.constructed_line()
            );
        };
        let name = requirement.package_name()?;
        let release = self.client.release(&name, version)?;

        let mut dependencies = Vec::new();
        for line in release.info.requires_dist.unwrap_or_default() {
            let dependency = Requirement::from_line(&line)
                .with_context(|| format!("Invalid `Requires-Dist` of {name}=={version}: `{line}`"))?;
            let requested = dependency.markers.as_deref().is_none_or(|markers| {
                !markers.contains("extra")
                    || requirement.extras.iter().any(|extra| {
                        markers.contains(&format!("\"{extra}\""))
                            || markers.contains(&format!("'{extra}'"))
                    })
            });
            if requested {
                dependencies.push(dependency);
            }
        }

        Ok(BuildResult {
            dependencies,
            requires_python: release
                .info
                .requires_python
                .filter(|requires_python| !requires_python.trim().is_empty()),
        })
    }
}

impl MetadataApi for JsonApiClient {
    fn releases(&self, name: &PackageName) -> anyhow::Result<Vec<Version>> {
        Ok(self
            .project(name)?
            .releases
            .keys()
            .filter_map(|version| Version::from_str(version).ok())
            .collect())
    }

    fn requires_dist(&self, name: &PackageName, version: &Version) -> anyhow::Result<Vec<String>> {
        Ok(self
            .release(name, version)?
            .info
            .requires_dist
            .unwrap_or_default())
    }
}
