use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An invalid URL was provided.
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    /// The package was not found in the index.
    ///
    /// Make sure the package name is spelled correctly and that you've
    /// configured the right index to fetch it from.
    #[error("Package `{0}` was not found in the index.")]
    PackageNotFound(String),

    /// The release was not found in the index.
    #[error("Version `{1}` of package `{0}` was not found in the index.")]
    ReleaseNotFound(String, String),

    /// A generic request error happened while making a request. Refer to the
    /// error message for more details.
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error("Received some unexpected JSON from {url}")]
    BadJson {
        source: serde_json::Error,
        url: String,
    },
}

impl Error {
    pub fn from_json_err(err: serde_json::Error, url: String) -> Self {
        Self::BadJson { source: err, url }
    }
}
