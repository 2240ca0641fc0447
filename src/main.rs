//! The main entry point for the `refill` command-line application.
//!
//! This file is responsible for parsing command-line arguments and dispatching
//! to the appropriate command handler in the `refill` library.

use refill::cli::{self, Commands};
use refill::errors::Result;
use refill::logging;
use refill::runner::{self, ReplaceFlags};

fn main() -> Result<()> {
    let args = cli::parse_args();
    logging::setup_logging(args.verbose);

    let result = match args.command {
        Commands::Find { search } => runner::run_find(search),
        Commands::Replace {
            search,
            parameters,
            exact_word,
            ignore_case,
            start_marker,
            end_marker,
            dry_run,
            report,
            report_format,
        } => runner::run_replace(
            search,
            ReplaceFlags {
                parameters,
                exact_word,
                ignore_case,
                start_marker,
                end_marker,
                dry_run,
                report,
                report_format: Some(report_format),
                verbose: args.verbose,
            },
        ),
    };

    if let Err(e) = &result {
        tracing::error!("{e}");
    }
    result
}
