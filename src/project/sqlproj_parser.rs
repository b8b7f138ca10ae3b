//! .sqlproj file parsing

use std::path::{Path, PathBuf};

use anyhow::Result;
use roxmltree::Document;

use super::discovery::scan_directory;
use crate::error::SqlSharpenError;

/// The parts of a SQL database project the model needs
#[derive(Debug, Clone)]
pub struct SqlProject {
    /// Project name (file stem)
    pub name: String,
    /// Schema for unqualified names (`DefaultSchema`, else dbo)
    pub default_schema: String,
    /// SQL files to compile, in discovery order
    pub sql_files: Vec<PathBuf>,
    pub project_dir: PathBuf,
}

/// Parse a .sqlproj file
pub fn parse_sqlproj(path: &Path) -> Result<SqlProject> {
    let content = std::fs::read_to_string(path).map_err(|e| SqlSharpenError::ProjectReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let doc = Document::parse(&content).map_err(|e| SqlSharpenError::ProjectParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let project_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Database")
        .to_string();

    let root = doc.root_element();

    let default_schema = find_property_value(&root, "DefaultSchema")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "dbo".to_string());

    let sql_files = find_sql_files(&root, &project_dir);

    Ok(SqlProject {
        name,
        default_schema,
        sql_files,
        project_dir,
    })
}

fn find_property_value(root: &roxmltree::Node, property_name: &str) -> Option<String> {
    root.descendants()
        .find(|node| node.tag_name().name() == property_name)
        .and_then(|node| node.text().map(str::to_string))
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("sql"))
}

fn find_sql_files(root: &roxmltree::Node, project_dir: &Path) -> Vec<PathBuf> {
    let mut sql_files = Vec::new();
    let mut include_patterns: Vec<String> = Vec::new();
    let mut exclude_patterns: Vec<String> = Vec::new();

    for node in root.descendants().filter(|n| n.tag_name().name() == "Build") {
        if let Some(include) = node.attribute("Include") {
            include_patterns.push(include.replace('\\', "/"));
        }
        if let Some(remove) = node.attribute("Remove") {
            exclude_patterns.push(remove.replace('\\', "/"));
        }
    }

    // SDK-style projects compile every .sql file under the project directory
    if include_patterns.is_empty() {
        sql_files = scan_directory(project_dir);
    }

    for pattern in &include_patterns {
        if pattern.contains('*') {
            let glob_pattern = project_dir.join(pattern);
            if let Ok(paths) = glob::glob(&glob_pattern.to_string_lossy()) {
                sql_files.extend(paths.filter_map(|p| p.ok()).filter(|p| is_sql_file(p)));
            }
        } else if pattern.to_lowercase().ends_with(".sql") {
            let sql_path = project_dir.join(pattern);
            if sql_path.exists() {
                sql_files.push(sql_path);
            }
        }
    }

    if !exclude_patterns.is_empty() {
        sql_files.retain(|file| !is_excluded(file, &exclude_patterns, project_dir));
    }

    sql_files
}

fn is_excluded(file: &Path, patterns: &[String], project_dir: &Path) -> bool {
    patterns.iter().any(|pattern| {
        let full = project_dir.join(pattern);
        if pattern.contains('*') {
            glob::Pattern::new(&full.to_string_lossy())
                .map(|matcher| matcher.matches_path(file))
                .unwrap_or(false)
        } else {
            file == full
        }
    })
}
