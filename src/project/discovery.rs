//! Discovery of .sql files from paths given on the command line

use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::WalkDir;

use crate::error::SqlSharpenError;

fn is_build_output(path: &Path) -> bool {
    path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.eq_ignore_ascii_case("bin") || name.eq_ignore_ascii_case("obj")
    })
}

/// Every .sql file below `dir`, sorted, skipping bin/ and obj/ output directories
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("sql"))
        })
        .filter(|path| {
            path.strip_prefix(dir)
                .map_or(true, |relative| !is_build_output(relative))
        })
        .collect();
    files.sort();
    files
}

/// Expand files and directories into a list of .sql files.
///
/// Files are taken as given; directories are scanned recursively.
pub fn discover_sql_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(scan_directory(path));
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(SqlSharpenError::SqlPathNotFound { path: path.clone() }.into());
        }
    }
    Ok(files)
}
