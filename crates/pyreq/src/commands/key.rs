use std::fmt::Write;

use anyhow::Result;

use pyreq_cache::CacheKey;

use crate::commands::{ExitStatus, parse_line};
use crate::printer::Printer;

/// Print the dependency cache key of a requirement.
pub(crate) fn key(line: &str, printer: Printer) -> Result<ExitStatus> {
    let requirement = parse_line(line)?;
    let key = CacheKey::from_source(&requirement)?;
    writeln!(printer.stdout(), "{key}")?;
    Ok(ExitStatus::Success)
}
