//! Common test utilities for sql-sharpen tests

use std::fs;
use std::path::{Path, PathBuf};

use sql_sharpen::model::{Procedure, SchemaModel};
use sql_sharpen::plan::CodePlan;
use sql_sharpen::{generate, GenerateOptions, GeneratedMetadata};
use tempfile::TempDir;

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub project_dir: PathBuf,
}

impl TestContext {
    /// Create a new test context by copying a fixture to a temp directory
    pub fn with_fixture(fixture_name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(fixture_name);

        let project_dir = temp_dir.path().to_path_buf();
        copy_dir_recursive(&fixture_path, &project_dir).expect("Failed to copy fixture");

        Self {
            _temp_dir: temp_dir,
            project_dir,
        }
    }

    /// Create an empty project directory; add files with [`TestContext::write_sql`]
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project_dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            project_dir,
        }
    }

    /// Write a .sql file relative to the project directory
    pub fn write_sql(&self, relative: &str, sql: &str) -> PathBuf {
        let path = self.project_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(&path, sql).expect("Failed to write SQL file");
        path
    }

    /// Get the path to the .sqlproj file
    pub fn project_path(&self) -> PathBuf {
        self.project_dir.join("project.sqlproj")
    }

    /// Options pointing at the project file with the `usp_` prefix
    pub fn project_options(&self) -> GenerateOptions {
        GenerateOptions {
            project_path: Some(self.project_path()),
            procedure_prefix: "usp_".to_string(),
            ..GenerateOptions::default()
        }
    }

    /// Options scanning the project directory without a project file
    pub fn directory_options(&self) -> GenerateOptions {
        GenerateOptions {
            sql_paths: vec![self.project_dir.clone()],
            procedure_prefix: "usp_".to_string(),
            ..GenerateOptions::default()
        }
    }

    /// Generate from the project file, panicking on fatal errors
    pub fn generate_successfully(&self) -> GeneratedMetadata {
        generate(&self.project_options())
            .unwrap_or_else(|e| panic!("Generation failed: {:?}", e))
    }
}

/// Recursively copy a directory
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Look up a procedure by method-facing name, panicking when absent
pub fn procedure<'a>(model: &'a SchemaModel, name: &str) -> &'a Procedure {
    model
        .procedure(name)
        .unwrap_or_else(|| panic!("procedure {} not in model", name))
}

/// Look up a plan by method-facing name, panicking when absent
pub fn plan<'a>(plans: &'a [CodePlan], name: &str) -> &'a CodePlan {
    plans
        .iter()
        .find(|p| p.procedure == name)
        .unwrap_or_else(|| panic!("no plan for {}", name))
}
