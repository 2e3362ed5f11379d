use std::fmt::Write;

use anyhow::{Context, Result};

use pyreq_cache::Cache;

use crate::commands::{ExitStatus, index_repository, parse_line};
use crate::printer::Printer;
use crate::settings::IndexSettings;

/// Print the dependencies of a pinned or editable requirement, one line each.
pub(crate) fn dependencies(
    line: &str,
    settings: &IndexSettings,
    cache: &Cache,
    printer: Printer,
) -> Result<ExitStatus> {
    let requirement = parse_line(line)?;
    let mut repository = index_repository(settings, cache)?;

    let dependencies = repository
        .get_dependencies(&requirement)
        .with_context(|| format!("Failed to determine the dependencies of `{requirement}`"))?;
    for dependency in dependencies.lines() {
        writeln!(printer.stdout(), "{dependency}")?;
    }
    Ok(ExitStatus::Success)
}
