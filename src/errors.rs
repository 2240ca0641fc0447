use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in the `refill` application.
///
/// The first group of variants describes misuse detected while a job is being
/// configured; the rest wrap errors bubbling up from the underlying crates.
#[derive(Error, Debug)]
pub enum Error {
    /// A required piece of configuration is missing (root folder, bindings, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The root folder of a search does not exist.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A file queued for substitution does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A value handed to the library is malformed or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error that occurred during the processing of a single file.
    #[error("File processing failed for {}: {source}", .path.display())]
    Processing {
        path: PathBuf,
        source: Box<Error>,
    },

    /// An error related to file system I/O.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred during regex compilation.
    #[error("Pattern compilation failed: {0}")]
    Regex(#[from] regex::Error),

    /// An invalid extension glob.
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// An error that occurred while parsing a YAML job file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error from the `ignore` crate, which is used for directory traversal.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An error related to persisting a temporary file.
    #[error("Tempfile error: {0}")]
    TempFile(#[from] tempfile::PersistError),

    /// An error related to CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenient type alias for `Result<T, refill::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps `self` with the path of the file being processed.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Error::Processing {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Configuration(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Configuration(s.to_string())
    }
}
