use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;
use pep440_rs::{Operator, Version, VersionSpecifier, VersionSpecifiers};
use tracing::debug;
use url::Url;

use pyreq_normalize::{ExtraName, PackageName};

use crate::{
    DistributionMetadata, IndexSource, Link, RequirementError, VcsSource, build_vcs_link,
    read_local_metadata,
};

/// A single Python requirement, in a form that is independent of whether it was read from a
/// requirements line or a Pipfile entry.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// The project name, as spelled by the user.
    pub name: Option<String>,
    pub source: RequirementSource,
    pub extras: BTreeSet<ExtraName>,
    /// The environment marker expression, verbatim.
    pub markers: Option<String>,
    pub editable: bool,
    /// Hashes of the form `<algorithm>:<digest>`, in the order they were given.
    pub hashes: Vec<String>,
    /// The text the requirement was parsed from, if it was parsed from a line.
    pub line: Option<String>,
    /// The name of the package index this requirement is pinned to, if any.
    pub index: Option<String>,
}

/// Where a [`Requirement`] is satisfied from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementSource {
    /// A named requirement resolved against a package index.
    Registry {
        specifiers: Option<VersionSpecifiers>,
    },
    /// A local directory or archive.
    Path { path: String, link: Link },
    /// A remote (or `file://`) archive.
    Url {
        uri: String,
        link: Link,
        /// Whether the requirement was spelled as `name @ url`.
        direct_reference: bool,
    },
    /// A version control checkout.
    Vcs(VcsSource),
}

impl Requirement {
    /// A named requirement with the given specifiers.
    pub fn named(name: impl Into<String>, specifiers: Option<VersionSpecifiers>) -> Self {
        Self {
            name: Some(name.into()),
            source: RequirementSource::Registry { specifiers },
            extras: BTreeSet::new(),
            markers: None,
            editable: false,
            hashes: Vec::new(),
            line: None,
            index: None,
        }
    }

    /// A requirement pinned to exactly `version`.
    pub fn pinned(
        name: impl Into<String>,
        version: &Version,
        extras: BTreeSet<ExtraName>,
        markers: Option<String>,
    ) -> Self {
        let specifiers =
            VersionSpecifiers::from_iter([VersionSpecifier::equals_version(version.clone())]);
        Self {
            extras,
            markers,
            ..Self::named(name, Some(specifiers))
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The normalized package name.
    pub fn package_name(&self) -> Result<PackageName, RequirementError> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| RequirementError::MissingName(self.constructed_line()))?;
        Ok(PackageName::from_str(name)?)
    }

    pub fn specifiers(&self) -> Option<&VersionSpecifiers> {
        match &self.source {
            RequirementSource::Registry { specifiers } => specifiers.as_ref(),
            _ => None,
        }
    }

    /// The link to the distribution, for anything other than a registry requirement.
    pub fn link(&self) -> Option<&Link> {
        match &self.source {
            RequirementSource::Registry { .. } => None,
            RequirementSource::Path { link, .. } | RequirementSource::Url { link, .. } => {
                Some(link)
            }
            RequirementSource::Vcs(vcs) => Some(&vcs.link),
        }
    }

    pub fn vcs(&self) -> Option<&VcsSource> {
        match &self.source {
            RequirementSource::Vcs(vcs) => Some(vcs),
            _ => None,
        }
    }

    pub fn is_vcs(&self) -> bool {
        matches!(self.source, RequirementSource::Vcs(_))
    }

    /// Returns `true` for local paths and archive URLs.
    pub fn is_local_file(&self) -> bool {
        matches!(
            self.source,
            RequirementSource::Path { .. } | RequirementSource::Url { .. }
        )
    }

    /// Returns `true` if the requirement has exactly one `==` or `===` specifier with no
    /// wildcard.
    pub fn is_pinned(&self) -> bool {
        self.pinned_version().is_some()
    }

    /// The version this requirement is pinned to, if it is pinned.
    pub fn pinned_version(&self) -> Option<&Version> {
        let specifiers = self.specifiers()?;
        let [specifier] = &**specifiers else {
            return None;
        };
        matches!(specifier.operator(), Operator::Equal | Operator::ExactEqual)
            .then(|| specifier.version())
    }

    /// The sorted extras, formatted as `[a,b]`, or the empty string.
    pub(crate) fn extras_suffix(&self) -> String {
        if self.extras.is_empty() {
            String::new()
        } else {
            format!("[{}]", self.extras.iter().join(","))
        }
    }

    /// Render the requirement as a canonical requirements line.
    ///
    /// Specifiers are sorted and joined with `,`, markers are appended as `; <markers>`, and each
    /// hash is appended as ` --hash=<hash>`.
    pub fn constructed_line(&self) -> String {
        let mut line = String::new();
        match &self.source {
            RequirementSource::Vcs(vcs) => {
                let extras = self.extras.iter().cloned().collect::<Vec<_>>();
                line.push_str(&build_vcs_link(
                    vcs.vcs,
                    &vcs.uri,
                    self.name.as_deref(),
                    vcs.reference.as_deref(),
                    vcs.subdirectory.as_deref(),
                    self.editable,
                    &extras,
                ));
            }
            RequirementSource::Path { path, .. } => {
                if self.editable {
                    line.push_str("-e ");
                }
                line.push_str(path);
                line.push_str(&self.extras_suffix());
            }
            RequirementSource::Url {
                uri,
                direct_reference,
                ..
            } => {
                if self.editable {
                    line.push_str("-e ");
                }
                match self.name.as_deref() {
                    Some(name) if *direct_reference => {
                        line.push_str(name);
                        line.push_str(&self.extras_suffix());
                        line.push_str(" @ ");
                        line.push_str(uri);
                    }
                    _ => {
                        line.push_str(uri);
                        line.push_str(&self.extras_suffix());
                    }
                }
            }
            RequirementSource::Registry { specifiers } => {
                if self.editable {
                    line.push_str("-e ");
                }
                line.push_str(self.name.as_deref().unwrap_or_default());
                line.push_str(&self.extras_suffix());
                if let Some(specifiers) = specifiers {
                    line.push_str(&sorted_specifiers(specifiers));
                }
            }
        }
        if let Some(markers) = &self.markers {
            line.push_str("; ");
            line.push_str(markers);
        }
        for hash in &self.hashes {
            line.push_str(" --hash=");
            line.push_str(hash);
        }
        line
    }

    /// The line as the user wrote it, for local paths and URLs; the constructed line otherwise.
    pub fn original_line(&self) -> String {
        match (&self.line, &self.source) {
            (
                Some(line),
                RequirementSource::Path { .. }
                | RequirementSource::Url { .. }
                | RequirementSource::Vcs(_),
            ) => {
                if self.editable && !line.starts_with("-e ") {
                    format!("-e {line}")
                } else {
                    line.clone()
                }
            }
            _ => self.constructed_line(),
        }
    }

    /// Render the requirement as an installer argument, optionally followed by the index
    /// options for the given sources.
    ///
    /// If the requirement names an index, only that source is emitted; otherwise every source
    /// is, the first as the primary index.
    pub fn as_requirement(&self, sources: Option<&[IndexSource]>) -> String {
        let mut line = self.constructed_line();
        let Some(sources) = sources else {
            return line;
        };
        if !matches!(self.source, RequirementSource::Registry { .. }) {
            return line;
        }

        let selected = match &self.index {
            Some(index) => sources
                .iter()
                .filter(|source| source.name == *index)
                .collect::<Vec<_>>(),
            None => sources.iter().collect(),
        };
        for (position, source) in selected.into_iter().enumerate() {
            if position == 0 {
                line.push_str(" -i ");
            } else {
                line.push_str(" --extra-index-url ");
            }
            line.push_str(&source.url);
            if !source.verify_ssl {
                if let Some(host) = Url::parse(&source.url)
                    .ok()
                    .and_then(|url| url.host_str().map(ToString::to_string))
                {
                    line.push_str(" --trusted-host ");
                    line.push_str(&host);
                }
            }
        }
        line
    }

    /// Read the name and version of a local source tree from its metadata files, if present.
    pub fn local_metadata(&self) -> Option<DistributionMetadata> {
        let path = match &self.source {
            RequirementSource::Path { link, path } => link
                .to_file_path()
                .unwrap_or_else(|| std::path::PathBuf::from(path)),
            RequirementSource::Url { link, .. } => link.to_file_path()?,
            _ => return None,
        };
        match read_local_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("Failed to read metadata from `{}`: {err}", path.display());
                None
            }
        }
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.source == other.source
            && self.extras == other.extras
            && self.markers == other.markers
            && self.editable == other.editable
            && self.hashes == other.hashes
            && self.index == other.index
    }
}

impl Eq for Requirement {}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.constructed_line())
    }
}

impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::from_line(line)
    }
}

/// Render a set of specifiers with the individual clauses sorted as strings, such that the
/// result doesn't depend on the order they were written in.
pub(crate) fn sorted_specifiers(specifiers: &VersionSpecifiers) -> String {
    specifiers
        .iter()
        .map(ToString::to_string)
        .sorted()
        .join(",")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pep440_rs::{Version, VersionSpecifiers};

    use crate::{IndexSource, Requirement};

    #[test]
    fn specifiers_are_sorted() {
        for line in ["idna<4,>=2.5", "idna>=2.5,<4", "idna (>=2.5, <4)"] {
            let requirement = Requirement::from_line(line).unwrap();
            assert_eq!(requirement.constructed_line(), "idna<4,>=2.5");
        }

        let requirement =
            Requirement::from_line("PySocks>=1.5.6,!=1.5.7; extra == 'socks'").unwrap();
        assert_eq!(
            requirement.constructed_line(),
            "PySocks!=1.5.7,>=1.5.6; extra == 'socks'"
        );
    }

    #[test]
    fn pinned() {
        let requirement = Requirement::named(
            "requests",
            Some(VersionSpecifiers::from_str("==2.18.4").unwrap()),
        );
        assert!(requirement.is_pinned());
        assert_eq!(
            requirement.pinned_version(),
            Some(&Version::from_str("2.18.4").unwrap())
        );
    }

    #[test]
    fn not_pinned() {
        for specifiers in ["==2.*", ">=2.0", "==2.0,<3", "!=2.0"] {
            let requirement = Requirement::named(
                "requests",
                Some(VersionSpecifiers::from_str(specifiers).unwrap()),
            );
            assert!(!requirement.is_pinned(), "{specifiers}");
        }
        assert!(!Requirement::named("requests", None).is_pinned());
    }

    #[test]
    fn as_requirement_with_sources() {
        let sources = vec![
            IndexSource {
                name: "pypi".to_string(),
                url: "https://pypi.org/simple".to_string(),
                verify_ssl: true,
            },
            IndexSource {
                name: "internal".to_string(),
                url: "http://pypi.internal/simple".to_string(),
                verify_ssl: false,
            },
        ];

        let requirement = Requirement::from_line("six==1.16.0").unwrap();
        assert_eq!(
            requirement.as_requirement(Some(&sources)),
            "six==1.16.0 -i https://pypi.org/simple --extra-index-url http://pypi.internal/simple --trusted-host pypi.internal"
        );

        let mut requirement = Requirement::from_line("six==1.16.0").unwrap();
        requirement.index = Some("internal".to_string());
        assert_eq!(
            requirement.as_requirement(Some(&sources)),
            "six==1.16.0 -i http://pypi.internal/simple --trusted-host pypi.internal"
        );
        assert_eq!(requirement.as_requirement(None), "six==1.16.0");
    }
}
