//! Recursive folder discovery with name-based subtree exclusion.

use crate::config::{ExcludedNames, SearchConfig};
use crate::errors::{Error, Result};
use crate::fs::FileSystem;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lists the root and every folder below it that is not excluded.
///
/// The root always comes first and is never excluded. Any other folder is
/// dropped when its own name, or the name of one of its ancestors, is in the
/// configured exclusion list, so excluding `node_modules` removes the whole
/// subtree. Apart from the root, order follows the underlying enumeration.
pub fn filter_directories(fs: &dyn FileSystem, config: &SearchConfig) -> Result<Vec<PathBuf>> {
    let root = config.root();
    if !fs.is_dir(root) {
        return Err(Error::DirectoryNotFound(root.to_path_buf()));
    }

    let discovered = fs.list_directories(root, config.recurse())?;
    let excluded = config.excluded();

    let pool = config.concurrency().thread_pool()?;
    let retained: Vec<PathBuf> = pool.install(|| {
        discovered
            .into_par_iter()
            .filter(|dir| {
                let skip = is_excluded(fs, dir, excluded);
                if skip {
                    debug!("Excluding {}", dir.display());
                }
                !skip
            })
            .collect()
    });

    let mut seen = HashSet::with_capacity(retained.len() + 1);
    let mut directories = Vec::with_capacity(retained.len() + 1);
    seen.insert(root.to_path_buf());
    directories.push(root.to_path_buf());
    for dir in retained {
        if seen.insert(dir.clone()) {
            directories.push(dir);
        }
    }

    debug!(
        "Retained {} folder(s) under {}",
        directories.len(),
        root.display()
    );
    Ok(directories)
}

/// Checks `dir` and then each of its ancestors against the exclusion list.
fn is_excluded(fs: &dyn FileSystem, dir: &Path, excluded: &ExcludedNames) -> bool {
    if excluded.is_empty() {
        return false;
    }

    let mut current = Some(dir.to_path_buf());
    while let Some(path) = current {
        if fs.name_of(&path).is_some_and(|name| excluded.contains(&name)) {
            return true;
        }
        current = fs.parent_of(&path);
    }
    false
}
