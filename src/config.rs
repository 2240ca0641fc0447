use crate::errors::{Error, Result};
use globset::{GlobBuilder, GlobMatcher};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The number of files or folders processed at the same time.
///
/// Always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency(usize);

impl Concurrency {
    pub const MIN: usize = 1;
    pub const MAX: usize = 10;

    /// Validates `limit` against `1..=10`.
    pub fn new(limit: usize) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&limit) {
            Ok(Self(limit))
        } else {
            Err(Error::InvalidArgument(format!(
                "parallel execution must be between {} and {}, got {limit}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Builds a dedicated Rayon pool with exactly this many threads.
    pub(crate) fn thread_pool(self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.0)
            .build()?)
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self(5)
    }
}

/// Folder names excluded from a search, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ExcludedNames(HashSet<String>);

impl ExcludedNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&name.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Where and how to look for folders.
///
/// Built once with the `with_*` methods, then only read.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    root: PathBuf,
    recurse: bool,
    excluded: ExcludedNames,
    concurrency: Concurrency,
}

impl SearchConfig {
    /// Creates a recursive search rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(Error::Configuration(
                "directory must be set before searching".to_string(),
            ));
        }
        Ok(Self {
            root,
            recurse: true,
            excluded: ExcludedNames::default(),
            concurrency: Concurrency::default(),
        })
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded = ExcludedNames::new(names);
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recurse(&self) -> bool {
        self.recurse
    }

    pub fn excluded(&self) -> &ExcludedNames {
        &self.excluded
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }
}

/// The file extensions a search is restricted to.
///
/// `.txt`, `*.txt` and `TXT` all normalize to `txt`. An empty filter matches
/// every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter(Vec<String>);

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self(normalized)
    }

    /// Matches every file.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn extensions(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compiles one case-insensitive `*.<ext>` matcher per extension, or a
    /// single `*` matcher for an empty filter.
    pub fn matchers(&self) -> Result<Vec<GlobMatcher>> {
        let patterns: Vec<String> = if self.0.is_empty() {
            vec!["*".to_string()]
        } else {
            self.0.iter().map(|e| format!("*.{e}")).collect()
        };

        patterns
            .iter()
            .map(|p| {
                Ok(GlobBuilder::new(p)
                    .case_insensitive(true)
                    .literal_separator(true)
                    .build()?
                    .compile_matcher())
            })
            .collect()
    }
}

fn normalize_extension(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(['*', '.'])
        .trim()
        .to_lowercase()
}

/// The markers wrapping a placeholder in delimited mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    start: String,
    end: String,
}

impl Delimiters {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if start.trim().is_empty() || end.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "start and end markers must not be blank".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: "${".to_string(),
            end: "}".to_string(),
        }
    }
}

/// Parameters as written in a job file: either a `name: value` map or a
/// list of `name=value` strings.
#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum ParameterSpec {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

/// Marker overrides in a job file.
#[derive(Deserialize, Clone, Debug)]
pub struct MarkerSpec {
    pub start: String,
    pub end: String,
}

/// A replacement job loaded from YAML. Every field is optional; command-line
/// flags take precedence over the values found here.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct JobConfig {
    #[serde(default)]
    pub folder: Option<PathBuf>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub parameters: Option<ParameterSpec>,
    #[serde(default)]
    pub ignore_case: Option<bool>,
    #[serde(default)]
    pub exact_word: Option<bool>,
    #[serde(default)]
    pub delimiters: Option<MarkerSpec>,
    #[serde(default)]
    pub parallel: Option<usize>,
    #[serde(default)]
    pub include_subfolders: Option<bool>,
}

/// A utility for locating and loading job files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the job file by searching in a prioritized list of locations.
    ///
    /// The search order is:
    /// 1. The path as given (absolute, or relative to the current directory).
    /// 2. A path relative to `working_dir`.
    /// 3. Inside the `~/.refill` directory.
    /// 4. Next to the executable.
    pub fn find_config(config_path: &Path, working_dir: &Path) -> Result<PathBuf> {
        let mut candidates = vec![config_path.to_path_buf()];
        if config_path.is_relative() {
            candidates.push(working_dir.join(config_path));
            if let Some(home) = dirs::home_dir() {
                candidates.push(home.join(".refill").join(config_path));
            }
            if let Some(exe_dir) = env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                candidates.push(exe_dir.join(config_path));
            }
        }

        if let Some(found) = candidates.iter().find(|c| c.is_file()) {
            return Ok(found.clone());
        }

        let tried: Vec<String> = candidates.iter().map(|c| c.display().to_string()).collect();
        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}",
            config_path.display(),
            tried.join("\n  - ")
        )
        .into())
    }

    /// Loads a `JobConfig` from a YAML file.
    pub fn load_job_config(path: &Path) -> Result<JobConfig> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}
