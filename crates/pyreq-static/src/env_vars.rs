/// Declares all environment variables used throughout `pyreq` and its crates.
pub struct EnvVars;

impl EnvVars {
    /// Equivalent to the `--cache-dir` command-line argument. If set, pyreq will use this
    /// directory for caching instead of the default cache directory.
    pub const PYREQ_CACHE_DIR: &'static str = "PYREQ_CACHE_DIR";

    /// Equivalent to the `--no-cache` command-line argument. If set, pyreq will not use the
    /// cache for any operations.
    pub const PYREQ_NO_CACHE: &'static str = "PYREQ_NO_CACHE";

    /// Equivalent to the `--index-url` command-line argument. If set, pyreq will use this
    /// URL as the default index when searching for packages.
    pub const PYREQ_INDEX_URL: &'static str = "PYREQ_INDEX_URL";

    /// Equivalent to the `--extra-index-url` command-line argument. If set, pyreq will
    /// use this space-separated list of URLs as additional indexes when searching for packages.
    pub const PYREQ_EXTRA_INDEX_URL: &'static str = "PYREQ_EXTRA_INDEX_URL";

    /// Equivalent to the `--python-version` command-line argument. The interpreter version used
    /// to partition the dependency cache, e.g., `3.12`.
    pub const PYREQ_PYTHON_VERSION: &'static str = "PYREQ_PYTHON_VERSION";

    /// Timeout (in seconds) for HTTP requests. (default: 30 s)
    pub const PYREQ_HTTP_TIMEOUT: &'static str = "PYREQ_HTTP_TIMEOUT";

    /// Standard `RUST_LOG` environment variable.
    pub const RUST_LOG: &'static str = "RUST_LOG";
}
