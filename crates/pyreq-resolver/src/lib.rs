//! Pin individual requirements against a package index and memoize what is learned about them:
//! the best matching candidate, the declared dependencies, and the hashes of every file.

pub use candidate::{Candidate, Platforms};
pub use error::ResolveError;
pub use json_api::{IndexMetadataBuilder, JsonApiFinder};
pub use repository::Repository;
pub use traits::{BuildDirs, BuildResult, DependencyBuilder, MetadataApi, PackageFinder};

mod candidate;
mod error;
mod json_api;
mod repository;
mod traits;
