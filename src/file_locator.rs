use crate::config::{Concurrency, ExtensionFilter, SearchConfig};
use crate::errors::{Error, Result};
use crate::folder_filter::filter_directories;
use crate::fs::FileSystem;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Lists the files directly inside each of `directories` whose extension is
/// in `extensions`.
///
/// Directories are expected to be the already expanded output of
/// [`filter_directories`]; no recursion happens here. A file reachable
/// through several patterns, or a directory listed twice, yields the file
/// once.
pub fn locate_files(
    fs: &dyn FileSystem,
    directories: &[PathBuf],
    extensions: &ExtensionFilter,
    concurrency: Concurrency,
) -> Result<Vec<PathBuf>> {
    if directories.is_empty() {
        return Err(Error::Configuration(
            "directory must be set before searching".to_string(),
        ));
    }

    let matchers = extensions.matchers()?;
    let pool = concurrency.thread_pool()?;

    let per_directory: Vec<Vec<PathBuf>> = pool.install(|| {
        directories
            .par_iter()
            .map(|dir| -> Result<Vec<PathBuf>> {
                let mut found = Vec::new();
                for matcher in &matchers {
                    found.extend(fs.list_files(dir, matcher)?);
                }
                debug!("{} matching file(s) in {}", found.len(), dir.display());
                Ok(found)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut seen = HashSet::new();
    let files: Vec<PathBuf> = per_directory
        .into_iter()
        .flatten()
        .filter(|f| seen.insert(f.clone()))
        .collect();
    Ok(files)
}

/// Runs the folder filter and then the file locator for one search.
pub struct FileSearcher<'a> {
    fs: &'a dyn FileSystem,
    config: SearchConfig,
    extensions: ExtensionFilter,
}

impl<'a> FileSearcher<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: SearchConfig, extensions: ExtensionFilter) -> Self {
        Self {
            fs,
            config,
            extensions,
        }
    }

    pub fn has_extension_defined(&self) -> bool {
        !self.extensions.is_empty()
    }

    /// Discovers the matching files. Nothing is cached between calls.
    pub fn search(&self) -> Result<Vec<PathBuf>> {
        let directories = filter_directories(self.fs, &self.config)?;
        let files = locate_files(
            self.fs,
            &directories,
            &self.extensions,
            self.config.concurrency(),
        )?;
        info!(
            "Found {} file(s) in {} folder(s)",
            files.len(),
            directories.len()
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "content").unwrap();
        path
    }

    #[test]
    fn test_empty_directory_list_is_configuration_error() {
        let result = locate_files(&OsFileSystem, &[], &ExtensionFilter::any(), Concurrency::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_equivalent_extensions_yield_each_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let a = touch(root, "a.txt");
        let b = touch(root, "B.TXT");
        touch(root, "c.md");

        let filter = ExtensionFilter::new([".txt", "*.txt", "txt"]);
        let dirs = vec![root.to_path_buf(), root.to_path_buf()];
        let files = locate_files(&OsFileSystem, &dirs, &filter, Concurrency::default()).unwrap();

        let set: HashSet<PathBuf> = files.iter().cloned().collect();
        assert_eq!(files.len(), 2);
        assert_eq!(set, HashSet::from([a, b]));
    }

    #[test]
    fn test_empty_filter_matches_every_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "a.txt");
        touch(root, "Makefile");
        touch(root, "c.md");

        let files = locate_files(
            &OsFileSystem,
            &[root.to_path_buf()],
            &ExtensionFilter::any(),
            Concurrency::default(),
        )
        .unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_search_skips_excluded_folders() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let kept = touch(root, "src/app.config");
        let top = touch(root, "web.config");
        touch(root, "bin/Debug/app.config");
        touch(root, "src/notes.txt");

        let config = SearchConfig::new(root)
            .unwrap()
            .with_excluded(["BIN"])
            .with_concurrency(Concurrency::new(2).unwrap());
        let searcher = FileSearcher::new(&OsFileSystem, config, ExtensionFilter::new(["config"]));
        assert!(searcher.has_extension_defined());

        let files: HashSet<PathBuf> = searcher.search().unwrap().into_iter().collect();
        assert_eq!(files, HashSet::from([kept, top]));
    }
}
