use std::io;
use std::path::PathBuf;

use clap::Parser;
use etcetera::BaseStrategy;

use pyreq_static::EnvVars;

use crate::Cache;

#[derive(Parser, Debug, Clone)]
pub struct CacheArgs {
    /// Avoid reading from or writing to the cache, instead using a temporary directory for the
    /// duration of the operation.
    #[arg(
        global = true,
        long,
        short,
        alias = "no-cache-dir",
        env = EnvVars::PYREQ_NO_CACHE
    )]
    pub no_cache: bool,

    /// Path to the cache directory.
    ///
    /// Defaults to `$XDG_CACHE_HOME/pyreq` or `$HOME/.cache/pyreq` on macOS and Linux, and
    /// `%LOCALAPPDATA%\pyreq` on Windows.
    #[arg(global = true, long, env = EnvVars::PYREQ_CACHE_DIR)]
    pub cache_dir: Option<PathBuf>,
}

/// The system-appropriate cache directory.
fn user_cache_dir() -> Option<PathBuf> {
    etcetera::base_strategy::choose_base_strategy()
        .ok()
        .map(|dirs| dirs.cache_dir().join("pyreq"))
}

impl TryFrom<CacheArgs> for Cache {
    type Error = io::Error;

    /// Prefer, in order:
    /// 1. A temporary cache directory, if the user requested `--no-cache`.
    /// 2. The specific cache directory specified by the user via `--cache-dir` or
    ///    `PYREQ_CACHE_DIR`.
    /// 3. The system-appropriate cache directory.
    /// 4. A `.pyreq_cache` directory in the current working directory.
    ///
    /// Returns an absolute cache dir.
    fn try_from(value: CacheArgs) -> Result<Self, Self::Error> {
        if value.no_cache {
            Self::temp()
        } else if let Some(cache_dir) = value.cache_dir {
            Self::from_path(cache_dir)
        } else if let Some(cache_dir) = user_cache_dir() {
            Self::from_path(cache_dir)
        } else {
            Self::from_path(".pyreq_cache")
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::{Cache, CacheArgs};

    #[test]
    fn no_cache_is_temporary() {
        let args = CacheArgs::try_parse_from(["pyreq", "--no-cache"]).unwrap();
        let cache = Cache::try_from(args).unwrap();
        assert!(cache.is_temporary());
    }

    #[test]
    fn explicit_cache_dir() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let cache_dir = temp_dir.path().join("cache");
        let args =
            CacheArgs::try_parse_from(["pyreq", "--cache-dir", cache_dir.to_str().unwrap()])
                .unwrap();
        let cache = Cache::try_from(args).unwrap();
        assert!(!cache.is_temporary());
        assert_eq!(
            cache.root(),
            fs_err::canonicalize(&cache_dir).unwrap()
        );
    }
}
