use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use pyreq_requirement::PipfileEntry;

use crate::commands::{ExitStatus, parse_line};
use crate::printer::Printer;

/// Parse each requirement line and print its canonical line, followed by its Pipfile entry.
pub(crate) fn parse(lines: &[String], printer: Printer) -> Result<ExitStatus> {
    for (position, line) in lines.iter().enumerate() {
        let requirement = parse_line(line)?;
        let (name, entry) = requirement
            .as_pipfile()
            .with_context(|| format!("Failed to convert `{line}` to a Pipfile entry"))?;

        if position > 0 {
            writeln!(printer.stdout())?;
        }
        writeln!(
            printer.stdout(),
            "{}",
            requirement.constructed_line().bold()
        )?;
        write!(printer.stdout(), "{}", pipfile_toml(&name, &entry)?)?;
    }
    Ok(ExitStatus::Success)
}

/// Render a single entry as a `[packages]` table.
fn pipfile_toml(name: &str, entry: &PipfileEntry) -> Result<String> {
    let packages = BTreeMap::from([(name, entry)]);
    let document = BTreeMap::from([("packages", packages)]);
    Ok(toml::to_string(&document)?)
}
