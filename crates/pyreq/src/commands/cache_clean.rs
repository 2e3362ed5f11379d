use std::fmt::Write;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use pyreq_cache::{Cache, Removal};
use pyreq_normalize::PackageName;

use crate::commands::{ExitStatus, human_readable_bytes};
use crate::printer::Printer;

/// Clear the cache, removing all entries or those linked to specific packages.
pub(crate) fn cache_clean(
    packages: &[PackageName],
    cache: &Cache,
    printer: Printer,
) -> Result<ExitStatus> {
    if !cache.root().exists() {
        writeln!(
            printer.stderr(),
            "No cache found at: {}",
            cache.root().display().cyan()
        )?;
        return Ok(ExitStatus::Success);
    }

    if packages.is_empty() {
        writeln!(
            printer.stderr(),
            "Clearing cache at: {}",
            cache.root().display().cyan()
        )?;

        let summary = cache
            .clear()
            .with_context(|| format!("Failed to clear cache at: {}", cache.root().display()))?;

        writeln!(printer.stderr(), "{}", summary_message(summary, None))?;
    } else {
        for package in packages {
            let summary = cache
                .remove(package)
                .with_context(|| format!("Failed to remove {package} from the cache"))?;
            writeln!(
                printer.stderr(),
                "{}",
                summary_message(summary, Some(package))
            )?;
        }
    }

    Ok(ExitStatus::Success)
}

/// Summarize the number of files and directories removed, and the bytes they took up.
fn summary_message(summary: Removal, package: Option<&PackageName>) -> String {
    let suffix = package
        .map(|package| format!(" for {package}"))
        .unwrap_or_default();
    let message = match (summary.num_files, summary.num_dirs) {
        (0, 0) => format!("No cache entries found{suffix}"),
        (0, 1) => format!("Removed 1 directory{suffix}"),
        (0, num_dirs_removed) => format!("Removed {num_dirs_removed} directories{suffix}"),
        (1, _) => format!("Removed 1 file{suffix}"),
        (num_files_removed, _) => format!("Removed {num_files_removed} files{suffix}"),
    };
    if summary.total_bytes > 0 {
        format!("{message} ({})", human_readable_bytes(summary.total_bytes))
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pyreq_cache::Removal;
    use pyreq_normalize::PackageName;

    use super::summary_message;

    #[test]
    fn summaries() {
        let removal = |num_files, num_dirs, total_bytes| Removal {
            num_files,
            num_dirs,
            total_bytes,
        };
        let requests = PackageName::from_str("requests").unwrap();

        assert_eq!(
            summary_message(removal(0, 0, 0), None),
            "No cache entries found"
        );
        assert_eq!(
            summary_message(removal(0, 3, 0), None),
            "Removed 3 directories"
        );
        assert_eq!(
            summary_message(removal(1, 2, 512), Some(&requests)),
            "Removed 1 file for requests (512B)"
        );
        assert_eq!(
            summary_message(removal(12, 4, 3 * 1024 * 1024), None),
            "Removed 12 files (3.0MiB)"
        );
    }
}
