use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use pyreq_requirement::Pipfile;

use crate::commands::ExitStatus;
use crate::printer::Printer;

/// Print a requirement line for every entry of a Pipfile.
pub(crate) fn convert(
    pipfile: &Path,
    dev: bool,
    include_index: bool,
    printer: Printer,
) -> Result<ExitStatus> {
    let content = fs_err::read_to_string(pipfile)?;
    for line in requirement_lines(&content, dev, include_index)
        .with_context(|| format!("Failed to read Pipfile: {}", pipfile.display()))?
    {
        writeln!(printer.stdout(), "{line}")?;
    }
    Ok(ExitStatus::Success)
}

fn requirement_lines(content: &str, dev: bool, include_index: bool) -> Result<Vec<String>> {
    let pipfile = Pipfile::from_str(content)?;
    let sources = include_index.then_some(pipfile.source.as_slice());
    Ok(pipfile
        .requirements(dev)?
        .iter()
        .map(|requirement| requirement.as_requirement(sources))
        .collect())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::requirement_lines;

    const PIPFILE: &str = indoc! {r#"
        [[source]]
        name = "pypi"
        url = "https://pypi.org/simple"
        verify_ssl = true

        [[source]]
        name = "internal"
        url = "https://packages.example.com/simple"
        verify_ssl = false

        [packages]
        requests = "==2.31.0"
        flask = { version = ">=3", index = "internal" }

        [dev-packages]
        pytest = "*"
    "#};

    #[test]
    fn packages_only() {
        let lines = requirement_lines(PIPFILE, false, false).unwrap();
        assert_eq!(lines, vec!["requests==2.31.0", "flask>=3"]);
    }

    #[test]
    fn with_dev_packages_and_indexes() {
        let lines = requirement_lines(PIPFILE, true, true).unwrap();
        insta::assert_debug_snapshot!(lines, @r###"
        [
            "requests==2.31.0 -i https://pypi.org/simple --extra-index-url https://packages.example.com/simple --trusted-host packages.example.com",
            "flask>=3 -i https://packages.example.com/simple --trusted-host packages.example.com",
            "pytest -i https://pypi.org/simple --extra-index-url https://packages.example.com/simple --trusted-host packages.example.com",
        ]
        "###);
    }

    #[test]
    fn invalid_pipfile() {
        assert!(requirement_lines("[packages]\nrequests = 1", false, false).is_err());
    }
}
