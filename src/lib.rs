//! `refill` is a library for filling placeholders in many files at once.
//!
//! It provides the core logic for the `refill` command-line tool but can also
//! be used on its own. A run goes through three stages:
//!
//! - `folder_filter`: walks a root folder and drops every sub-folder whose name,
//!   or whose ancestor's name, is on the exclusion list.
//! - `file_locator`: lists the files with the wanted extensions in the
//!   retained folders.
//! - `replacer`: rewrites `${Name}` placeholders, or whole-word names, in those
//!   files, reporting every change and the progress of the run.
//!
//! Files are processed in parallel on a bounded Rayon pool, and all disk access
//! goes through the `fs::FileSystem` trait.

pub mod binding;
pub mod cli;
pub mod config;
pub mod errors;
pub mod file_locator;
pub mod folder_filter;
pub mod fs;
pub mod logging;
pub mod replacer;
pub mod report;
pub mod runner;

// Re-export main types for easier access by library users.
pub use binding::{Binding, Bindings};
pub use config::{Concurrency, Delimiters, ExtensionFilter, SearchConfig};
pub use errors::{Error, Result};
pub use file_locator::{FileSearcher, locate_files};
pub use folder_filter::filter_directories;
pub use fs::{FileSystem, OsFileSystem};
pub use replacer::{ChangeEvent, MatchMode, ProgressCadence, ReplaceOptions, Replacer};
pub use report::{ChangeReport, ReportFormat, ReportWriter};
