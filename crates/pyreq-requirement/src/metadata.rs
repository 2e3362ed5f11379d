use std::path::{Path, PathBuf};

use fs_err as fs;
use mailparse::{MailHeaderMap, MailParseError};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    MailParse(#[from] MailParseError),
    #[error("Metadata field {0} not found")]
    FieldNotFound(&'static str),
}

/// The name and version of a distribution, as declared in its core metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionMetadata {
    pub name: String,
    pub version: String,
}

impl DistributionMetadata {
    /// Parse the `Name` and `Version` headers of a `PKG-INFO` or `METADATA` file.
    pub fn parse(content: &[u8]) -> Result<Self, MetadataError> {
        let (headers, _) = mailparse::parse_headers(content)?;
        let get = |name: &'static str| {
            headers
                .get_first_value(name)
                .filter(|value| value != "UNKNOWN")
                .ok_or(MetadataError::FieldNotFound(name))
        };
        Ok(Self {
            name: get("Name")?,
            version: get("Version")?,
        })
    }
}

/// Find the core metadata of a local source tree, checking `PKG-INFO` at the root, then
/// `*.egg-info/PKG-INFO`, then `*.dist-info/METADATA`.
///
/// Returns `Ok(None)` if the path is not a directory or has no metadata file.
pub fn read_local_metadata(path: &Path) -> Result<Option<DistributionMetadata>, MetadataError> {
    if !path.is_dir() {
        return Ok(None);
    }
    let Some(metadata) = find_metadata_file(path)? else {
        return Ok(None);
    };
    let content = fs::read(&metadata)?;
    DistributionMetadata::parse(&content).map(Some)
}

fn find_metadata_file(root: &Path) -> Result<Option<PathBuf>, MetadataError> {
    let pkg_info = root.join("PKG-INFO");
    if pkg_info.is_file() {
        return Ok(Some(pkg_info));
    }

    let entries = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.map(walkdir::DirEntry::into_path))
        .collect::<Result<Vec<_>, _>>()?;

    for (suffix, file) in [(".egg-info", "PKG-INFO"), (".dist-info", "METADATA")] {
        let found = entries.iter().find_map(|entry| {
            let name = entry.file_name()?.to_str()?;
            if !name.ends_with(suffix) {
                return None;
            }
            let candidate = entry.join(file);
            candidate.is_file().then_some(candidate)
        });
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}
