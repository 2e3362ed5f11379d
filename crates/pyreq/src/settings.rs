use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use pep440_rs::Version;

use crate::cli::IndexArgs;

/// The resolved settings for commands that consult a package index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexSettings {
    /// Index JSON API URLs, primary index first, without duplicates.
    pub(crate) index_urls: Vec<String>,
    pub(crate) python_version: Version,
    pub(crate) http_timeout: Duration,
    pub(crate) metadata_api: bool,
}

impl IndexSettings {
    pub(crate) fn resolve(args: IndexArgs) -> anyhow::Result<Self> {
        let IndexArgs {
            index_url,
            extra_index_url,
            python_version,
            http_timeout,
            metadata_api,
        } = args;

        let python_version = Version::from_str(python_version.trim())
            .with_context(|| format!("Invalid Python version: `{python_version}`"))?;

        let mut index_urls: Vec<String> = Vec::with_capacity(extra_index_url.len() + 1);
        for url in std::iter::once(index_url).chain(extra_index_url) {
            let url = url.trim().trim_end_matches('/').to_string();
            if !url.is_empty() && !index_urls.contains(&url) {
                index_urls.push(url);
            }
        }
        if index_urls.is_empty() {
            anyhow::bail!("At least one index URL is required");
        }

        Ok(Self {
            index_urls,
            python_version,
            http_timeout: Duration::from_secs(http_timeout),
            metadata_api,
        })
    }

    /// The interpreter version partitioning the dependency cache, as `major.minor`.
    pub(crate) fn python_minor_version(&self) -> String {
        let release = self.python_version.release();
        match release {
            [major, minor, ..] => format!("{major}.{minor}"),
            [major] => format!("{major}.0"),
            [] => self.python_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::cli::IndexArgs;
    use crate::settings::IndexSettings;

    fn args(index_url: &str, extra_index_url: &[&str], python_version: &str) -> IndexArgs {
        IndexArgs {
            index_url: index_url.to_string(),
            extra_index_url: extra_index_url.iter().map(ToString::to_string).collect(),
            python_version: python_version.to_string(),
            http_timeout: 5,
            metadata_api: false,
        }
    }

    #[test]
    fn index_urls_are_deduplicated() {
        let settings = IndexSettings::resolve(args(
            "https://pypi.org/pypi/",
            &["https://example.com/pypi", "https://pypi.org/pypi", ""],
            "3.12",
        ))
        .unwrap();
        assert_eq!(
            settings.index_urls,
            vec!["https://pypi.org/pypi", "https://example.com/pypi"]
        );
        assert_eq!(settings.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn python_minor_version() {
        let settings = IndexSettings::resolve(args("https://pypi.org/pypi", &[], "3.11.4")).unwrap();
        assert_eq!(settings.python_minor_version(), "3.11");
        let settings = IndexSettings::resolve(args("https://pypi.org/pypi", &[], "3")).unwrap();
        assert_eq!(settings.python_minor_version(), "3.0");
    }

    #[test]
    fn invalid_python_version() {
        let err = IndexSettings::resolve(args("https://pypi.org/pypi", &[], "three")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid Python version: `three`");
    }
}
