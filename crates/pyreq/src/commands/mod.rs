use std::process::ExitCode;

use anyhow::Context;
use tracing::debug;

use pyreq_cache::Cache;
use pyreq_client::{JsonApiClient, JsonApiClientBuilder};
use pyreq_requirement::Requirement;
use pyreq_resolver::{IndexMetadataBuilder, JsonApiFinder, Repository};

pub(crate) use best_match::best_match;
pub(crate) use cache_clean::cache_clean;
pub(crate) use cache_dir::cache_dir;
pub(crate) use convert::convert;
pub(crate) use dependencies::dependencies;
pub(crate) use hashes::hashes;
pub(crate) use key::key;
pub(crate) use parse::parse;

use crate::settings::IndexSettings;

mod best_match;
mod cache_clean;
mod cache_dir;
mod convert;
mod dependencies;
mod hashes;
mod key;
mod parse;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ExitStatus {
    /// The command succeeded.
    Success,

    /// The command failed due to an error in the user input.
    Failure,

    /// The command failed with an unexpected error.
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => Self::from(0),
            ExitStatus::Failure => Self::from(1),
            ExitStatus::Error => Self::from(2),
        }
    }
}

/// A [`Repository`] backed by the JSON API of one or more package indexes.
pub(crate) type IndexRepository = Repository<JsonApiFinder, IndexMetadataBuilder, JsonApiClient>;

/// Create a repository over the configured indexes.
///
/// Candidates are searched across every index; dependencies are read from, and artifacts are
/// downloaded through, the primary index.
pub(crate) fn index_repository(
    settings: &IndexSettings,
    cache: &Cache,
) -> anyhow::Result<IndexRepository> {
    let clients = settings
        .index_urls
        .iter()
        .map(|url| {
            JsonApiClientBuilder::new(url.as_str())
                .timeout(settings.http_timeout)
                .build()
                .with_context(|| format!("Failed to create a client for: {url}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let primary = clients
        .first()
        .cloned()
        .context("At least one index URL is required")?;
    debug!(
        "Using {} index(es), primary index: {}",
        clients.len(),
        primary.base_url()
    );

    let finder = JsonApiFinder::new(clients, Some(settings.python_version.clone()));
    let builder = IndexMetadataBuilder::new(primary.clone());
    let repository = Repository::new(
        cache,
        &settings.python_minor_version(),
        finder,
        builder,
        primary.clone(),
    )
    .context("Failed to create build directories")?;

    Ok(if settings.metadata_api {
        repository.with_metadata_api(primary)
    } else {
        repository
    })
}

/// Parse a requirement line given on the command line.
pub(super) fn parse_line(line: &str) -> anyhow::Result<Requirement> {
    Requirement::from_line(line).with_context(|| format!("Failed to parse requirement: `{line}`"))
}

/// Format a number of bytes as a human-readable string, e.g., `1.2MiB`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub(super) fn human_readable_bytes(bytes: u64) -> String {
    static UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let bytes = bytes as f32;
    let i = ((bytes.log2() / 10.0) as usize).min(UNITS.len() - 1);
    format!("{:.1}{}", bytes / 1024_f32.powi(i as i32), UNITS[i])
}

#[cfg(test)]
mod tests {
    use crate::commands::human_readable_bytes;

    #[test]
    fn bytes() {
        assert_eq!(human_readable_bytes(0), "0B");
        assert_eq!(human_readable_bytes(1023), "1023B");
        assert_eq!(human_readable_bytes(1024), "1.0KiB");
        assert_eq!(human_readable_bytes(1536), "1.5KiB");
        assert_eq!(human_readable_bytes(5 * 1024 * 1024), "5.0MiB");
    }
}
