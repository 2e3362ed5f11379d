use std::fmt::Write;

use anyhow::Result;
use owo_colors::OwoColorize;

use pyreq_cache::Cache;

use crate::commands::ExitStatus;
use crate::printer::Printer;

/// Show the cache directory.
pub(crate) fn cache_dir(cache: &Cache, printer: Printer) -> Result<ExitStatus> {
    writeln!(printer.stdout(), "{}", cache.root().display().cyan())?;
    Ok(ExitStatus::Success)
}
