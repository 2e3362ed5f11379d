use std::fmt::Write;

use anyhow::Result;
use owo_colors::OwoColorize;

use pyreq_cache::Cache;
use pyreq_resolver::ResolveError;

use crate::commands::{ExitStatus, index_repository, parse_line};
use crate::printer::Printer;
use crate::settings::IndexSettings;

/// Print the best matching candidate for a requirement, pinned.
pub(crate) fn best_match(
    line: &str,
    prereleases: Option<bool>,
    settings: &IndexSettings,
    cache: &Cache,
    printer: Printer,
) -> Result<ExitStatus> {
    let requirement = parse_line(line)?;
    let mut repository = index_repository(settings, cache)?;

    match repository.find_best_match(&requirement, prereleases) {
        Ok(pinned) => {
            writeln!(printer.stdout(), "{}", pinned.constructed_line())?;
            Ok(ExitStatus::Success)
        }
        Err(err @ ResolveError::NoCandidate { .. }) => {
            writeln!(printer.stderr(), "{}: {err}", "error".red().bold())?;
            Ok(ExitStatus::Failure)
        }
        Err(err) => Err(err.into()),
    }
}
