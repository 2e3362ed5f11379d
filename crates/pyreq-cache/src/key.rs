use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;
use pep440_rs::Version;

use pyreq_normalize::{ExtraName, PackageName};
use pyreq_requirement::{DistributionMetadata, Link, Requirement};

/// Archive suffixes stripped from a filename before splitting it into a name and version.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz", ".txz", ".tar", ".zip", ".egg",
];

#[derive(Debug, thiserror::Error)]
pub enum CacheKeyError {
    #[error("Unable to determine the name and version of `{0}`")]
    NameResolution(String),
}

/// The key under which the dependencies of a requirement are cached: the package name, and the
/// version with any extras appended (`2.31.0[security,socks]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub name: String,
    pub version_with_extras: String,
}

impl CacheKey {
    pub fn new<'a>(
        name: &str,
        version: &str,
        extras: impl IntoIterator<Item = &'a ExtraName>,
    ) -> Self {
        let name = PackageName::from_str(name)
            .map(|name| name.to_string())
            .unwrap_or_else(|_| name.to_string());
        let version = Version::from_str(version)
            .map(|version| version.to_string())
            .unwrap_or_else(|_| version.to_string());
        let extras = extras.into_iter().collect::<BTreeSet<_>>();
        let version_with_extras = if extras.is_empty() {
            version
        } else {
            format!("{version}[{}]", extras.iter().join(","))
        };
        Self {
            name,
            version_with_extras,
        }
    }

    /// Derive the key for `source`, trying each way of identifying it in turn.
    ///
    /// 1. An explicit `(name, version, extras)` triple.
    /// 2. `name` and `version` attributes.
    /// 3. The name and version from the distribution's own metadata.
    /// 4. The link: the `#egg=` fragment, or else the archive filename split into a name and a
    ///    version.
    pub fn from_source<S: CacheKeySource + ?Sized>(source: &S) -> Result<Self, CacheKeyError> {
        if let Some((name, version, extras)) = source.key_triple() {
            return Ok(Self::new(&name, &version, &extras));
        }
        let extras = source.extras();
        if let Some((name, version)) = source.name_and_version() {
            return Ok(Self::new(&name, &version, &extras));
        }
        if let Some(metadata) = source.distribution_metadata() {
            return Ok(Self::new(&metadata.name, &metadata.version, &extras));
        }
        if let Some((name, version)) = source.link().and_then(split_link) {
            return Ok(Self::new(&name, &version, &extras));
        }
        Err(CacheKeyError::NameResolution(source.describe()))
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version_with_extras)
    }
}

/// Something that identifies a distribution with more or less precision, depending on where it
/// came from (a Pipfile, a lock entry, a freshly resolved candidate).
pub trait CacheKeySource {
    /// An explicit `(name, version, extras)` triple, e.g., from a pinned requirement.
    fn key_triple(&self) -> Option<(String, String, BTreeSet<ExtraName>)> {
        None
    }

    /// A name and version, without extras.
    fn name_and_version(&self) -> Option<(String, String)> {
        None
    }

    /// The metadata of the built or unpacked distribution.
    fn distribution_metadata(&self) -> Option<DistributionMetadata> {
        None
    }

    fn link(&self) -> Option<&Link> {
        None
    }

    fn extras(&self) -> BTreeSet<ExtraName> {
        BTreeSet::new()
    }

    /// A human-readable description, for error messages.
    fn describe(&self) -> String;
}

impl CacheKeySource for Requirement {
    fn key_triple(&self) -> Option<(String, String, BTreeSet<ExtraName>)> {
        let name = self.name()?;
        let version = self.pinned_version()?;
        Some((name.to_string(), version.to_string(), self.extras.clone()))
    }

    fn distribution_metadata(&self) -> Option<DistributionMetadata> {
        self.local_metadata()
    }

    fn link(&self) -> Option<&Link> {
        Requirement::link(self)
    }

    fn extras(&self) -> BTreeSet<ExtraName> {
        self.extras.clone()
    }

    fn describe(&self) -> String {
        self.constructed_line()
    }
}

impl CacheKeySource for (&str, &Version, &BTreeSet<ExtraName>) {
    fn key_triple(&self) -> Option<(String, String, BTreeSet<ExtraName>)> {
        let (name, version, extras) = self;
        Some((name.to_string(), version.to_string(), (*extras).clone()))
    }

    fn describe(&self) -> String {
        format!("{}=={}", self.0, self.1)
    }
}

/// Identify a distribution from its link alone.
fn split_link(link: &Link) -> Option<(String, String)> {
    if let Some(name) = link.egg_fragment() {
        return Some((name.to_string(), link.show_url().to_string()));
    }

    let filename = link.filename();
    if let Some(stem) = filename.strip_suffix(".whl") {
        // Wheels are `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
        let mut parts = stem.split('-');
        let name = parts.next()?;
        let version = parts.next()?;
        return Some((name.to_string(), version.to_string()));
    }

    let stem = ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|extension| filename.strip_suffix(extension))
        .unwrap_or(&filename);
    let (name, version) = stem.rsplit_once('-')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }

    // A version with no dot is likely a trailing segment like `post1` or `dev`; try gluing it
    // onto the preceding segment.
    if !version.contains('.') {
        if let Some((shorter, segment)) = name.rsplit_once('-') {
            let combined = format!("{segment}-{version}");
            return if Version::from_str(&combined).is_ok() {
                Some((shorter.to_string(), combined))
            } else {
                Some((name.to_string(), version.to_string()))
            };
        }
    }
    Some((name.to_string(), version.to_string()))
}
