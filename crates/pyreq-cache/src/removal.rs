//! Recursive removal with a running tally, in the style of Cargo's `clean`.

use std::io;
use std::path::Path;

/// Remove a file or directory and all its contents, returning a [`Removal`] with
/// the number of files and directories removed, along with a total byte count.
pub(crate) fn rm_rf(path: impl AsRef<Path>) -> io::Result<Removal> {
    let mut removal = Removal::default();
    removal.rm_rf(path.as_ref())?;
    Ok(removal)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// The number of files removed.
    pub num_files: u64,
    /// The number of directories removed.
    pub num_dirs: u64,
    /// The total number of bytes removed.
    pub total_bytes: u64,
}

impl Removal {
    /// Returns `true` if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.num_files == 0 && self.num_dirs == 0
    }

    fn rm_rf(&mut self, path: &Path) -> io::Result<()> {
        let metadata = match fs_err::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };

        if !metadata.is_dir() {
            self.num_files += 1;
            self.total_bytes += metadata.len();
            return remove_file(path);
        }

        for entry in walkdir::WalkDir::new(path).contents_first(true) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                self.num_dirs += 1;
                // Entries may have been added since the walk began.
                fs_err::remove_dir_all(entry.path())?;
            } else {
                self.num_files += 1;
                if let Ok(metadata) = entry.metadata() {
                    self.total_bytes += metadata.len();
                }
                remove_file(entry.path())?;
            }
        }

        Ok(())
    }
}

impl std::ops::AddAssign for Removal {
    fn add_assign(&mut self, other: Self) {
        self.num_files += other.num_files;
        self.num_dirs += other.num_dirs;
        self.total_bytes += other.total_bytes;
    }
}

/// Like [`fs_err::remove_file`], but clears the readonly flag and retries if the first attempt
/// is denied.
fn remove_file(path: &Path) -> io::Result<()> {
    match fs_err::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            let mut permissions = fs_err::metadata(path)?.permissions();
            if !permissions.readonly() {
                return Err(err);
            }
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            fs_err::set_permissions(path, permissions)?;
            fs_err::remove_file(path)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;

    use super::rm_rf;

    #[test]
    fn counts() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        temp_dir.child("a/b/c.json").write_str("12345").unwrap();
        temp_dir.child("a/d.json").write_str("1").unwrap();

        let removal = rm_rf(temp_dir.child("a").path()).unwrap();
        assert_eq!(removal.num_files, 2);
        assert_eq!(removal.num_dirs, 2);
        assert_eq!(removal.total_bytes, 6);
        assert!(!temp_dir.child("a").path().exists());
    }

    #[test]
    fn missing() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let removal = rm_rf(temp_dir.child("missing").path()).unwrap();
        assert!(removal.is_empty());
    }
}
