use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use pyreq_cache::CacheArgs;
use pyreq_client::DEFAULT_JSON_API_URL;
use pyreq_normalize::PackageName;
use pyreq_static::EnvVars;

#[derive(Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    #[command(flatten)]
    pub(crate) global_args: GlobalArgs,

    #[command(flatten)]
    pub(crate) cache_args: CacheArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct GlobalArgs {
    /// Do not print any output.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    pub(crate) quiet: bool,

    /// Use verbose output.
    ///
    /// Pass twice to nest log messages under the lookups that emitted them.
    #[arg(global = true, action = clap::ArgAction::Count, long, short, conflicts_with = "quiet")]
    pub(crate) verbose: u8,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Parse requirement lines and print their canonical line and Pipfile entry.
    Parse(ParseArgs),
    /// Print the requirement lines of a Pipfile.
    Convert(ConvertArgs),
    /// Print the key under which the dependencies of a requirement are cached.
    Key(KeyArgs),
    /// Find the best matching candidate for a requirement and print it pinned.
    BestMatch(BestMatchArgs),
    /// Print the dependencies of a pinned or editable requirement.
    Dependencies(DependenciesArgs),
    /// Print the hashes of every file of the release a requirement is pinned to.
    Hashes(HashesArgs),
    /// Manage the cache.
    Cache(CacheNamespace),
}

#[derive(Args)]
pub(crate) struct ParseArgs {
    /// Requirement lines, as they would appear in a `requirements.txt`.
    #[arg(required = true)]
    pub(crate) lines: Vec<String>,
}

#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// Path to the Pipfile.
    #[arg(default_value = "Pipfile")]
    pub(crate) pipfile: PathBuf,

    /// Skip the `[dev-packages]` table.
    #[arg(long)]
    pub(crate) no_dev: bool,

    /// Append `-i` and `--extra-index-url` options built from the Pipfile's sources.
    #[arg(long)]
    pub(crate) include_index: bool,
}

#[derive(Args)]
pub(crate) struct KeyArgs {
    /// A requirement line.
    pub(crate) line: String,
}

#[derive(Args)]
pub(crate) struct BestMatchArgs {
    /// A requirement line.
    pub(crate) line: String,

    /// Allow pre-release versions.
    #[arg(long, conflicts_with = "no_pre")]
    pub(crate) pre: bool,

    /// Never select pre-release versions, even when no final release matches.
    #[arg(long)]
    pub(crate) no_pre: bool,

    #[command(flatten)]
    pub(crate) index_args: IndexArgs,
}

impl BestMatchArgs {
    /// The pre-release policy: allowed, forbidden, or decided by the requirement.
    pub(crate) fn prereleases(&self) -> Option<bool> {
        match (self.pre, self.no_pre) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

#[derive(Args)]
pub(crate) struct DependenciesArgs {
    /// A pinned (`name==version`) or editable requirement line.
    pub(crate) line: String,

    #[command(flatten)]
    pub(crate) index_args: IndexArgs,
}

#[derive(Args)]
pub(crate) struct HashesArgs {
    /// A pinned (`name==version`) requirement line.
    pub(crate) line: String,

    /// Include files for every platform and interpreter, including yanked files.
    #[arg(long)]
    pub(crate) all_platforms: bool,

    #[command(flatten)]
    pub(crate) index_args: IndexArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct IndexArgs {
    /// The URL of the package index's JSON API.
    #[arg(long, short, env = EnvVars::PYREQ_INDEX_URL, default_value = DEFAULT_JSON_API_URL)]
    pub(crate) index_url: String,

    /// Extra URLs of package indexes to search, after the primary index.
    #[arg(long, env = EnvVars::PYREQ_EXTRA_INDEX_URL, value_delimiter = ' ')]
    pub(crate) extra_index_url: Vec<String>,

    /// The Python version to resolve for, e.g., `3.12`.
    ///
    /// Files whose `Requires-Python` excludes this version are skipped, and the dependency cache
    /// is partitioned by it.
    #[arg(long, env = EnvVars::PYREQ_PYTHON_VERSION, default_value = "3.12")]
    pub(crate) python_version: String,

    /// Timeout (in seconds) for HTTP requests.
    #[arg(long, env = EnvVars::PYREQ_HTTP_TIMEOUT, default_value_t = 30)]
    pub(crate) http_timeout: u64,

    /// Consult the index's `requires_dist` metadata for requirements pinned to the latest
    /// release, in addition to reading each release's own metadata.
    #[arg(long)]
    pub(crate) metadata_api: bool,
}

#[derive(Args)]
pub(crate) struct CacheNamespace {
    #[command(subcommand)]
    pub(crate) command: CacheCommand,
}

#[derive(Subcommand)]
pub(crate) enum CacheCommand {
    /// Clear the cache, removing all entries or those linked to specific packages.
    Clean(CleanArgs),
    /// Show the cache directory.
    Dir,
}

#[derive(Args)]
pub(crate) struct CleanArgs {
    /// The packages to remove from the cache.
    pub(crate) package: Vec<PackageName>,
}
