//! A blocking client for the JSON API of a Python package index (`/<name>/json`), which also
//! streams artifacts for hashing.

pub use client::{DEFAULT_JSON_API_URL, JsonApiClient, JsonApiClientBuilder};
pub use error::Error;
pub use json::{Digests, FileJson, InfoJson, PackageType, ProjectJson};

mod client;
mod error;
mod json;
