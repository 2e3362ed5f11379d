use std::collections::BTreeSet;
use std::str::FromStr;

use indexmap::IndexMap;
use pep440_rs::VersionSpecifiers;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use pyreq_normalize::ExtraName;

use crate::requirement::sorted_specifiers;
use crate::{
    Link, Requirement, RequirementError, RequirementSource, VcsKind, VcsSource, build_vcs_link,
};

/// A package index declared in a Pipfile's `[[source]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

fn default_verify_ssl() -> bool {
    true
}

/// A single entry in a Pipfile `[packages]` table.
///
/// Either a bare version string (`requests = "*"`) or an inline table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipfileEntry {
    Version(String),
    Table(PipfileTable),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipfileTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bzr: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Vec<String>>,
}

impl PipfileTable {
    /// The version control system and repository URL, if the entry names one.
    fn vcs(&self) -> Option<(VcsKind, &str)> {
        [
            (VcsKind::Git, &self.git),
            (VcsKind::Hg, &self.hg),
            (VcsKind::Svn, &self.svn),
            (VcsKind::Bzr, &self.bzr),
        ]
        .into_iter()
        .find_map(|(vcs, uri)| uri.as_deref().map(|uri| (vcs, uri)))
    }

    /// Returns `true` if the table carries nothing beyond a version.
    fn is_version_only(&self) -> bool {
        let Self { version, .. } = self;
        version.is_some()
            && *self
                == (Self {
                    version: version.clone(),
                    ..Self::default()
                })
    }
}

/// The subset of a Pipfile that describes requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pipfile {
    #[serde(default)]
    pub source: Vec<IndexSource>,
    #[serde(default)]
    pub packages: IndexMap<String, PipfileEntry>,
    #[serde(default, rename = "dev-packages")]
    pub dev_packages: IndexMap<String, PipfileEntry>,
}

impl FromStr for Pipfile {
    type Err = RequirementError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(content)?)
    }
}

impl Pipfile {
    /// Convert the `[packages]` (and optionally `[dev-packages]`) tables into requirements.
    pub fn requirements(&self, dev: bool) -> Result<Vec<Requirement>, RequirementError> {
        let dev_packages = if dev { Some(&self.dev_packages) } else { None };
        self.packages
            .iter()
            .chain(dev_packages.into_iter().flatten())
            .map(|(name, entry)| Requirement::from_pipfile(name, entry))
            .collect()
    }
}

impl Requirement {
    /// Build a requirement from a Pipfile entry.
    pub fn from_pipfile(name: &str, entry: &PipfileEntry) -> Result<Self, RequirementError> {
        let table = match entry {
            PipfileEntry::Version(version) => {
                return Ok(Self::named(name, parse_version(version)?));
            }
            PipfileEntry::Table(table) => table,
        };

        let extras = table
            .extras
            .iter()
            .flatten()
            .map(|extra| {
                ExtraName::from_str(extra).map_err(|_| RequirementError::InvalidExtras(extra.clone()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        let editable = table.editable.unwrap_or(false);
        let hashes = match (&table.hash, &table.hashes) {
            (_, Some(hashes)) => hashes.clone(),
            (Some(hash), None) => vec![hash.clone()],
            (None, None) => Vec::new(),
        };

        let location_count = [
            table.vcs().is_some(),
            table.path.is_some(),
            table.file.is_some() || table.uri.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();
        if location_count > 1 {
            return Err(RequirementError::ConflictingSources(name.to_string()));
        }

        let (name, source, line) = if let Some((vcs, uri)) = table.vcs() {
            let extras = extras.iter().cloned().collect::<Vec<_>>();
            let link = build_vcs_link(
                vcs,
                uri,
                Some(name),
                table.reference.as_deref(),
                table.subdirectory.as_deref(),
                false,
                &extras,
            );
            let source = VcsSource::parse(&link)
                .ok_or_else(|| RequirementError::MissingName(link.clone()))?;
            let line = if editable { format!("-e {link}") } else { link };
            (Some(name.to_string()), RequirementSource::Vcs(source), Some(line))
        } else if let Some(path) = &table.path {
            let link = Link::from_path(path)
                .ok_or_else(|| RequirementError::InvalidPath(path.clone()))?;
            (
                Some(name.to_string()),
                RequirementSource::Path {
                    path: path.clone(),
                    link,
                },
                Some(path.clone()),
            )
        } else if let Some(uri) = table.file.as_ref().or(table.uri.as_ref()) {
            let link = Link::new(uri.as_str());
            (
                link.egg_fragment().map(ToString::to_string),
                RequirementSource::Url {
                    uri: uri.clone(),
                    link,
                    direct_reference: false,
                },
                Some(uri.clone()),
            )
        } else {
            let specifiers = match &table.version {
                Some(version) => parse_version(version)?,
                None => None,
            };
            (
                Some(name.to_string()),
                RequirementSource::Registry { specifiers },
                None,
            )
        };

        Ok(Self {
            name,
            source,
            extras,
            markers: table.markers.clone(),
            editable,
            hashes,
            line,
            index: table.index.clone(),
        })
    }

    /// Convert the requirement into a Pipfile `(name, entry)` pair.
    ///
    /// Local paths and archives are keyed by a short content hash of their location. Version
    /// control requirements must carry an `#egg=` name.
    pub fn as_pipfile(&self) -> Result<(String, PipfileEntry), RequirementError> {
        let mut table = PipfileTable::default();

        let name = match &self.source {
            RequirementSource::Path { path, .. } => {
                table.path = Some(path.clone());
                location_name(path)
            }
            RequirementSource::Url { uri, .. } => {
                table.file = Some(uri.clone());
                location_name(uri)
            }
            RequirementSource::Vcs(vcs) => {
                let name = self.name.clone().ok_or_else(|| {
                    RequirementError::MissingEggFragment(vcs.link.url_without_fragment().to_string())
                })?;
                let repository = Some(vcs.repository().to_string());
                match vcs.vcs {
                    VcsKind::Git => table.git = repository,
                    VcsKind::Hg => table.hg = repository,
                    VcsKind::Svn => table.svn = repository,
                    VcsKind::Bzr => table.bzr = repository,
                }
                table.reference.clone_from(&vcs.reference);
                table.subdirectory.clone_from(&vcs.subdirectory);
                name
            }
            RequirementSource::Registry { specifiers } => {
                let name = self
                    .name
                    .clone()
                    .ok_or_else(|| RequirementError::MissingName(self.constructed_line()))?;
                table.version = Some(match specifiers {
                    Some(specifiers) => sorted_specifiers(specifiers),
                    None => "*".to_string(),
                });
                name
            }
        };

        if !self.extras.is_empty() {
            table.extras = Some(self.extras.iter().map(ToString::to_string).collect());
        }
        if self.editable {
            table.editable = Some(true);
        }
        match self.hashes.as_slice() {
            [] => {}
            [hash] => table.hash = Some(hash.clone()),
            hashes => table.hashes = Some(hashes.to_vec()),
        }
        table.markers.clone_from(&self.markers);
        table.index.clone_from(&self.index);

        if table.is_version_only() {
            if let Some(version) = table.version {
                return Ok((name, PipfileEntry::Version(version)));
            }
        }
        Ok((name, PipfileEntry::Table(table)))
    }
}

/// A Pipfile version string: `*` (or empty) means any version.
fn parse_version(version: &str) -> Result<Option<VersionSpecifiers>, RequirementError> {
    let version = version.trim();
    if version.is_empty() || version == "*" {
        return Ok(None);
    }
    VersionSpecifiers::from_str(version)
        .map(Some)
        .map_err(|source| RequirementError::InvalidSpecifier {
            specifier: version.to_string(),
            source,
        })
}

/// A synthetic name for a local requirement: the first seven hex digits of the SHA-256 of its
/// location.
///
/// The prefix of the digest is used, never its suffix.
fn location_name(location: &str) -> String {
    let digest = hex::encode(Sha256::digest(location.as_bytes()));
    digest[..7].to_string()
}
