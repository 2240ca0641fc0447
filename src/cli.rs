use crate::report::ReportFormat;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Fill placeholders in files across a folder tree.
///
/// `refill` finds files by extension under a folder, skipping excluded
/// sub-folders, and rewrites `${Name}` placeholders (or whole words) with the
/// values given on the command line.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replace values or ${} parameters in files",
    long_about = "refill - Replace placeholders in many files at once.

QUICK EXAMPLES:
  refill replace -f ./site -e json,config -p 'Env=prod;Port=8080'
  refill replace -f . -e cs --exact-word -p 'http://localhost/api=https://prod/api'
  refill replace -f . -e yaml -p 'Tag=1.2' --ignore-folder-names bin,obj,.git
  refill find -f . -e config --ignore-folder-names node_modules

For detailed help on any command, use: refill <command> --help"
)]
pub struct Args {
    /// Log every change and debug details.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that searches a folder.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Folder to search files in.
    #[arg(short, long)]
    pub folder: Option<PathBuf>,

    /// A comma-separated list of file extensions (`json`, `.json` and `*.json` are equivalent).
    #[arg(short, long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// A comma-separated list of folder names to skip, with everything below them (ex: bin,obj,.git).
    #[arg(long = "ignore-folder-names", value_delimiter = ',')]
    pub ignore_folder_names: Vec<String>,

    /// Only search the folder itself and its direct sub-folders.
    #[arg(long)]
    pub no_subfolders: bool,

    /// Number of folders or files processed in parallel (1 to 10).
    #[arg(long, env = "REFILL_PARALLEL", value_parser = clap::value_parser!(u8).range(1..=10))]
    pub parallel: Option<u8>,

    /// YAML job file providing defaults for any of these options.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// The set of available commands for the `refill` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace parameters in the files found under a folder
    ///
    /// EXAMPLES:
    ///   refill replace -f . -e json -p 'Env=prod;Port=8080'
    ///   refill replace -f . -e json -p Env=prod -p Port=8080 --dry-run
    ///   refill replace -f . -e txt --start-marker '{{' --end-marker '}}' -p Name=Alice
    ///
    /// Job file format (job.yaml):
    ///   folder: ./site
    ///   extensions: [json, config]
    ///   exclude: [bin, obj]
    ///   parameters:
    ///     Env: prod
    ///     Port: '8080'
    Replace {
        #[command(flatten)]
        search: SearchArgs,

        /// Parameters to replace, as `Name1=Value1;Name2=Value2`. May be repeated.
        #[arg(short, long)]
        parameters: Vec<String>,

        /// Match the parameter name as a whole word instead of `${Name}` placeholders.
        #[arg(long, alias = "nopattern")]
        exact_word: bool,

        /// Find parameters case-insensitively.
        #[arg(long)]
        ignore_case: bool,

        /// Marker opening a placeholder.
        #[arg(long, requires = "end_marker")]
        start_marker: Option<String>,

        /// Marker closing a placeholder.
        #[arg(long, requires = "start_marker")]
        end_marker: Option<String>,

        /// Show which files would change without writing them.
        #[arg(long)]
        dry_run: bool,

        /// Write a report of every change to this file.
        #[arg(long)]
        report: Option<PathBuf>,

        /// The format of the change report.
        #[arg(long, value_enum, default_value = "text")]
        report_format: ReportFormat,
    },

    /// List the files a replace would process
    ///
    /// EXAMPLES:
    ///   refill find -f . -e config --ignore-folder-names bin,obj
    Find {
        #[command(flatten)]
        search: SearchArgs,
    },
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replace() {
        let args = Args::try_parse_from([
            "refill",
            "-v",
            "replace",
            "-f",
            "site",
            "-e",
            "json,.config",
            "-p",
            "A=1;B=2",
            "-p",
            "C=3",
            "--ignore-folder-names",
            "bin,obj",
            "--parallel",
            "3",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Replace {
                search,
                parameters,
                exact_word,
                report_format,
                ..
            } => {
                assert_eq!(search.folder, Some(PathBuf::from("site")));
                assert_eq!(search.extensions, vec!["json", ".config"]);
                assert_eq!(search.ignore_folder_names, vec!["bin", "obj"]);
                assert_eq!(search.parallel, Some(3));
                assert_eq!(parameters, vec!["A=1;B=2", "C=3"]);
                assert!(!exact_word);
                assert_eq!(report_format, ReportFormat::Text);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parallel_out_of_range_rejected() {
        let result = Args::try_parse_from(["refill", "find", "-f", ".", "--parallel", "11"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_markers_go_together() {
        let result = Args::try_parse_from([
            "refill",
            "replace",
            "-f",
            ".",
            "--start-marker",
            "{{",
        ]);
        assert!(result.is_err());
    }
}
