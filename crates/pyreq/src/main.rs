use std::process::ExitCode;

use anstream::eprintln;
use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;

use pyreq_cache::Cache;
use pyreq_resolver::Platforms;

use crate::cli::{CacheCommand, Cli, Commands};
use crate::commands::ExitStatus;
use crate::logging::Level;
use crate::printer::Printer;
use crate::settings::IndexSettings;

mod cli;
mod commands;
mod logging;
mod printer;
mod settings;

fn run() -> Result<ExitStatus> {
    let Cli {
        command,
        global_args,
        cache_args,
    } = Cli::parse();

    logging::setup_logging(Level::from(global_args.verbose))?;

    let printer = if global_args.quiet {
        Printer::Quiet
    } else if global_args.verbose > 0 {
        Printer::Verbose
    } else {
        Printer::Default
    };

    let cache = || Cache::try_from(cache_args).context("Failed to initialize the cache");

    match command {
        Commands::Parse(args) => commands::parse(&args.lines, printer),
        Commands::Convert(args) => {
            commands::convert(&args.pipfile, !args.no_dev, args.include_index, printer)
        }
        Commands::Key(args) => commands::key(&args.line, printer),
        Commands::BestMatch(args) => {
            let prereleases = args.prereleases();
            let settings = IndexSettings::resolve(args.index_args)?;
            commands::best_match(&args.line, prereleases, &settings, &cache()?, printer)
        }
        Commands::Dependencies(args) => {
            let settings = IndexSettings::resolve(args.index_args)?;
            commands::dependencies(&args.line, &settings, &cache()?, printer)
        }
        Commands::Hashes(args) => {
            let platforms = if args.all_platforms {
                Platforms::All
            } else {
                Platforms::Compatible
            };
            let settings = IndexSettings::resolve(args.index_args)?;
            commands::hashes(&args.line, platforms, &settings, &cache()?, printer)
        }
        Commands::Cache(namespace) => match namespace.command {
            CacheCommand::Clean(args) => commands::cache_clean(&args.package, &cache()?, printer),
            CacheCommand::Dir => commands::cache_dir(&cache()?, printer),
        },
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(status) => status.into(),
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                let mut causes = err.chain();
                if let Some(err) = causes.next() {
                    eprintln!("{}: {}", "error".red().bold(), err);
                }
                for err in causes {
                    eprintln!("  {}: {}", "Caused by".red().bold(), err);
                }
            }
            ExitStatus::Error.into()
        }
    }
}
