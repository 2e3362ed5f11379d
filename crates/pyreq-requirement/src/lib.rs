//! Parse and serialize Python requirements.
//!
//! A [`Requirement`] can be read from a requirements-file line (`requests[security]==2.18.4`,
//! `-e git+https://...#egg=name`, `./path/to/project`) or from a Pipfile entry, and written back
//! out in either form. Both directions agree on a single canonical model, so that converting a
//! requirement to one form and back yields an equal requirement.

use pep440_rs::VersionSpecifiersParseError;
use thiserror::Error;

use pyreq_normalize::InvalidNameError;

pub use crate::dependency_set::DependencySet;
pub use crate::link::Link;
pub use crate::metadata::{DistributionMetadata, MetadataError, read_local_metadata};
pub use crate::pipfile::{IndexSource, Pipfile, PipfileEntry, PipfileTable};
pub use crate::requirement::{Requirement, RequirementSource};
pub use crate::vcs::{VcsKind, VcsSource, build_vcs_link};

mod dependency_set;
mod line;
mod link;
mod metadata;
mod pipfile;
mod requirement;
mod vcs;

#[derive(Debug, Error)]
pub enum RequirementError {
    #[error("Empty requirement")]
    Empty,
    #[error("Expected `--hash=<algorithm>:<digest>`, found `{0}`")]
    UnexpectedToken(String),
    #[error("Hash must be of the form `<algorithm>:<digest>`, found `{0}`")]
    InvalidHash(String),
    #[error("Invalid extras in requirement `{0}`")]
    InvalidExtras(String),
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
    #[error("Invalid version specifier `{specifier}`")]
    InvalidSpecifier {
        specifier: String,
        #[source]
        source: VersionSpecifiersParseError,
    },
    #[error("Couldn't convert path to a URL: `{0}`")]
    InvalidPath(String),
    #[error(
        "pyreq requires an `#egg` fragment for version controlled dependencies. Please install remote dependency in the form `{0}#egg=<package-name>`."
    )]
    MissingEggFragment(String),
    #[error("Requirement `{0}` has no package name")]
    MissingName(String),
    #[error("Pipfile entry for `{0}` uses more than one source (`git`, `path`, `file`, ...)")]
    ConflictingSources(String),
    #[error("Failed to parse Pipfile")]
    Pipfile(#[from] toml::de::Error),
}
