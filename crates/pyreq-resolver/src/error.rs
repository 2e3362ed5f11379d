use thiserror::Error;

use pyreq_cache::{ArtifactError, CacheError, CacheKeyError};
use pyreq_requirement::RequirementError;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// An operation that needs a pinned (or editable) requirement received something else.
    #[error("Expected {expected} requirement, got: `{requirement}`")]
    InputShape {
        expected: &'static str,
        requirement: String,
    },

    #[error("Could not find a version that matches `{requirement}`{}", tried(.candidates))]
    NoCandidate {
        requirement: String,
        /// The versions offered by the index, in the order they were found.
        candidates: Vec<String>,
    },

    #[error(transparent)]
    NameResolution(#[from] CacheKeyError),

    #[error(transparent)]
    ArtifactAccess(#[from] ArtifactError),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error("Failed to find candidates for `{name}`")]
    Finder {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to extract the dependencies of `{requirement}`")]
    Build {
        requirement: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Cache(CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CacheError> for ResolveError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Key(err) => Self::NameResolution(err),
            err => Self::Cache(err),
        }
    }
}

fn tried(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!(" (tried: {})", candidates.join(", "))
    }
}
