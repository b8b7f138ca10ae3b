//! Unit tests for .sqlproj parsing and SQL file discovery

use std::path::{Path, PathBuf};

use sql_sharpen::project::{discover_sql_files, parse_sqlproj};
use sql_sharpen::SqlSharpenError;
use tempfile::TempDir;

/// Helper to create a test project directory with sqlproj and SQL files
fn create_test_project(sqlproj_content: &str, sql_files: &[&str]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("project.sqlproj"), sqlproj_content).unwrap();

    for name in sql_files {
        let sql_path = temp_dir.path().join(name);
        if let Some(parent) = sql_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&sql_path, "SELECT 1").unwrap();
    }

    temp_dir
}

fn file_names(files: &[PathBuf], root: &Path) -> Vec<String> {
    let mut names: Vec<String> = files
        .iter()
        .map(|f| {
            f.strip_prefix(root)
                .unwrap_or(f)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}

#[test]
fn test_explicit_build_items() {
    let dir = create_test_project(
        r#"<Project>
  <ItemGroup>
    <Build Include="Tables\Users.sql" />
    <Build Include="Missing.sql" />
    <None Include="Scripts\Seed.sql" />
  </ItemGroup>
</Project>"#,
        &["Tables/Users.sql", "Scripts/Seed.sql"],
    );

    let project = parse_sqlproj(&dir.path().join("project.sqlproj")).unwrap();
    assert_eq!(file_names(&project.sql_files, dir.path()), vec!["Tables/Users.sql"]);
}

#[test]
fn test_wildcard_include_with_remove_pattern() {
    let dir = create_test_project(
        r#"<Project>
  <ItemGroup>
    <Build Include="**\*.sql" />
    <Build Remove="Scratch\*.sql" />
  </ItemGroup>
</Project>"#,
        &["Tables/A.sql", "Procs/B.sql", "Scratch/C.sql"],
    );

    let project = parse_sqlproj(&dir.path().join("project.sqlproj")).unwrap();
    assert_eq!(
        file_names(&project.sql_files, dir.path()),
        vec!["Procs/B.sql", "Tables/A.sql"]
    );
}

#[test]
fn test_default_schema_property() {
    let dir = create_test_project(
        r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup><DefaultSchema>app</DefaultSchema></PropertyGroup>
</Project>"#,
        &["A.sql"],
    );

    let project = parse_sqlproj(&dir.path().join("project.sqlproj")).unwrap();
    assert_eq!(project.default_schema, "app");
    assert_eq!(project.name, "project");
    assert_eq!(project.sql_files.len(), 1);
}

#[test]
fn test_missing_project_file() {
    let error = parse_sqlproj(Path::new("/no/such/project.sqlproj")).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SqlSharpenError>(),
        Some(SqlSharpenError::ProjectReadError { .. })
    ));
}

#[test]
fn test_discover_mixes_files_and_directories() {
    let dir = create_test_project("<Project />", &["Tables/A.sql", "Tables/B.sql", "Loose.sql"]);

    let files = discover_sql_files(&[
        dir.path().join("Loose.sql"),
        dir.path().join("Tables"),
    ])
    .unwrap();
    assert_eq!(
        file_names(&files, dir.path()),
        vec!["Loose.sql", "Tables/A.sql", "Tables/B.sql"]
    );
}
