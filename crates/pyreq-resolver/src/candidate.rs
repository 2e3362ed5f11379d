use std::fmt::{Display, Formatter};

use pep440_rs::Version;

use pyreq_cache::CacheKeySource;
use pyreq_normalize::PackageName;
use pyreq_requirement::Link;

/// A single file offered by a package index for a given version of a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub name: PackageName,
    pub version: Version,
    pub link: Link,
}

impl Candidate {
    pub fn new(name: PackageName, version: Version, link: Link) -> Self {
        Self {
            name,
            version,
            link,
        }
    }

    /// Returns `true` if the candidate is a built distribution.
    pub fn is_wheel(&self) -> bool {
        self.link.filename().ends_with(".whl")
    }
}

impl Display for Candidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.link.show_url())
    }
}

impl CacheKeySource for Candidate {
    fn name_and_version(&self) -> Option<(String, String)> {
        Some((self.name.to_string(), self.version.to_string()))
    }

    fn link(&self) -> Option<&Link> {
        Some(&self.link)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Which files of a project a finder should consider.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platforms {
    /// Only files that can be installed into the target environment.
    #[default]
    Compatible,
    /// Every file, regardless of platform, interpreter, or yanked status (e.g., to collect the
    /// hashes of all distributions of a release).
    All,
}
