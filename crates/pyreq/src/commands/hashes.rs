use std::fmt::Write;

use anyhow::{Context, Result};

use pyreq_cache::Cache;
use pyreq_resolver::Platforms;

use crate::commands::{ExitStatus, index_repository, parse_line};
use crate::printer::Printer;
use crate::settings::IndexSettings;

/// Print the hash of every file of the release a requirement is pinned to.
pub(crate) fn hashes(
    line: &str,
    platforms: Platforms,
    settings: &IndexSettings,
    cache: &Cache,
    printer: Printer,
) -> Result<ExitStatus> {
    let requirement = parse_line(line)?;
    let mut repository = index_repository(settings, cache)?;

    let hashes = repository
        .get_hashes(&requirement, platforms)
        .with_context(|| format!("Failed to collect the hashes of `{requirement}`"))?;
    for hash in hashes {
        writeln!(printer.stdout(), "--hash={hash}")?;
    }
    Ok(ExitStatus::Success)
}
