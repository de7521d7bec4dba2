pub mod cells;
pub mod combine;
pub mod correct;
pub mod pair;
pub mod refine;
pub mod run;
pub mod sensitivity;

use std::path::{Path, PathBuf};

use anyhow::Result;

/// Sorted paths in `dir` whose extension matches one of `extensions`.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.contains(&e))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
