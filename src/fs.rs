//! The file-system capability consumed by the search and substitution stages.
//!
//! Everything above this module talks to a [`FileSystem`] rather than to
//! `std::fs` directly, so tests and embedders can swap the backing store.

use crate::errors::{Error, Result};
use globset::GlobMatcher;
use ignore::WalkBuilder;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The operations the engine needs from a file system.
///
/// Implementations are shared by every worker of a parallel run and must be
/// `Sync`.
pub trait FileSystem: Sync {
    /// Returns `true` if `path` exists, whatever its kind.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Lists the directories below `path`, all descendants when `recursive`
    /// is set, otherwise only the immediate children. `path` itself is not
    /// part of the result.
    fn list_directories(&self, path: &Path, recursive: bool) -> Result<Vec<PathBuf>>;

    /// Lists the files directly inside `dir` whose file name matches `pattern`.
    fn list_files(&self, dir: &Path, pattern: &GlobMatcher) -> Result<Vec<PathBuf>>;

    /// Reads a whole file as UTF-8 text.
    fn read_text(&self, path: &Path) -> Result<String>;

    /// Replaces the content of a file.
    fn write_text(&self, path: &Path, contents: &str) -> Result<()>;

    /// The parent of `path`, or `None` once the top has been reached.
    fn parent_of(&self, path: &Path) -> Option<PathBuf> {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// The last component of `path`.
    fn name_of(&self, path: &Path) -> Option<String> {
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }
}

/// The real, disk-backed [`FileSystem`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_directories(&self, path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        let mut walker = WalkBuilder::new(path);
        // Exclusion is purely name based, so hidden and gitignored folders are listed too.
        walker.standard_filters(false);
        if !recursive {
            walker.max_depth(Some(1));
        }

        let mut directories = Vec::new();
        for entry in walker.build() {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                directories.push(entry.into_path());
            }
        }
        Ok(directories)
    }

    fn list_files(&self, dir: &Path, pattern: &GlobMatcher) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if pattern.is_match(Path::new(&entry.file_name())) {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        // Write atomically using tempfile
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            Some(_) => Path::new("."),
            None => {
                return Err(format!("Could not get parent directory for {}", path.display()).into());
            }
        };

        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(contents.as_bytes())?;

        // Preserve file permissions
        let perms = fs::metadata(path)?.permissions();
        fs::set_permissions(temp_file.path(), perms)?;

        temp_file.persist(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::Glob;
    use tempfile::TempDir;

    fn matcher(pattern: &str) -> GlobMatcher {
        Glob::new(pattern).unwrap().compile_matcher()
    }

    #[test]
    fn test_list_directories_recursive_and_flat() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a/b/c")).unwrap();
        fs::create_dir_all(temp_dir.path().join(".hidden")).unwrap();
        fs::write(temp_dir.path().join("a/file.txt"), "x").unwrap();

        let all = OsFileSystem.list_directories(temp_dir.path(), true).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.contains(&temp_dir.path().join(".hidden")));

        let flat = OsFileSystem.list_directories(temp_dir.path(), false).unwrap();
        assert_eq!(flat.len(), 2);
        assert!(!flat.contains(&temp_dir.path().join("a/b")));
    }

    #[test]
    fn test_list_files_is_not_recursive() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("top.txt"), "x").unwrap();
        fs::write(temp_dir.path().join("top.md"), "x").unwrap();
        fs::write(temp_dir.path().join("sub/deep.txt"), "x").unwrap();

        let files = OsFileSystem
            .list_files(temp_dir.path(), &matcher("*.txt"))
            .unwrap();
        assert_eq!(files, vec![temp_dir.path().join("top.txt")]);
    }

    #[test]
    fn test_read_missing_file_is_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");
        assert!(matches!(
            OsFileSystem.read_text(&missing),
            Err(Error::FileNotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_write_text_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "before").unwrap();

        OsFileSystem.write_text(&file, "after").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "after");
    }

    #[test]
    fn test_parent_chain_terminates() {
        let mut current = Some(PathBuf::from("/a/b/c"));
        let mut names = Vec::new();
        while let Some(path) = current {
            if let Some(name) = OsFileSystem.name_of(&path) {
                names.push(name);
            }
            current = OsFileSystem.parent_of(&path);
        }
        assert_eq!(names, vec!["c", "b", "a"]);
    }
}
