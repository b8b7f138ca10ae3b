//! sql-sharpen: typed data-access code plans from a T-SQL database project
//!
//! This library reads tables, views, user-defined types and stored procedures,
//! resolves every procedure's result columns to their types and effective
//! nullability, and classifies each procedure into the return shape a code
//! generator should emit.

pub mod catalog;
pub mod error;
pub mod model;
pub mod parser;
pub mod plan;
pub mod project;

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

pub use error::{ResolveError, SqlSharpenError};
use model::{BuiltModel, ModelOptions, SchemaModel};
use plan::CodePlan;

/// Options for loading a schema and planning its procedures
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Path to a .sqlproj file
    pub project_path: Option<PathBuf>,
    /// .sql files or directories to scan, in addition to the project's files
    pub sql_paths: Vec<PathBuf>,
    /// Prefix stripped from procedure names (e.g., "usp_")
    pub procedure_prefix: String,
    /// Overrides the project's DefaultSchema
    pub default_schema: Option<String>,
    /// Enable verbose output
    pub verbose: bool,
}

/// The model and the code plans of every procedure that resolved
#[derive(Debug, Serialize)]
pub struct GeneratedMetadata {
    pub model: SchemaModel,
    pub plans: Vec<CodePlan>,
    /// Procedures left out of the model, one error each
    #[serde(skip)]
    pub failures: Vec<SqlSharpenError>,
}

/// Load the schema and query model described by the options
pub fn load_model(options: &GenerateOptions) -> Result<BuiltModel> {
    let mut sql_files = Vec::new();
    let mut default_schema = None;

    // Step 1: Parse the sqlproj file, if any
    if let Some(project_path) = &options.project_path {
        if options.verbose {
            println!("Reading project: {}", project_path.display());
        }
        let project = project::parse_sqlproj(project_path)?;
        default_schema = Some(project.default_schema);
        sql_files.extend(project.sql_files);
    }

    // Step 2: Add loose files and directories
    sql_files.extend(project::discover_sql_files(&options.sql_paths)?);

    if options.verbose {
        println!("Found {} SQL files", sql_files.len());
    }

    // Step 3: Parse all SQL files
    let statements = parser::parse_sql_files(&sql_files)?;

    if options.verbose {
        println!("Parsed {} SQL statements", statements.len());
    }

    // Step 4: Build the model
    let model_options = ModelOptions {
        default_schema: options
            .default_schema
            .clone()
            .or(default_schema)
            .unwrap_or_else(|| "dbo".to_string()),
        procedure_prefix: options.procedure_prefix.clone(),
    };
    let built = model::build_model(&statements, &model_options)?;

    if options.verbose {
        let model = &built.model;
        println!(
            "Built model with {} tables, {} views, {} table types, {} foreign keys",
            model.tables.len(),
            model.views.len(),
            model.table_types.len(),
            model.relationships.len()
        );
        println!(
            "Resolved {} procedures ({} failed)",
            model.procedures.len(),
            built.failures.len()
        );
    }

    Ok(built)
}

/// Load the model and plan every resolved procedure
pub fn generate(options: &GenerateOptions) -> Result<GeneratedMetadata> {
    let BuiltModel { model, failures } = load_model(options)?;

    // Step 5: Plan the procedures
    let plans = plan::plan_procedures(&model.procedures);

    if options.verbose {
        println!("Planned {} procedures", plans.len());
        for plan in &plans {
            println!("  {} -> {}", plan.procedure, plan.shape.name());
        }
    }

    Ok(GeneratedMetadata {
        model,
        plans,
        failures,
    })
}

/// Build a model straight from SQL text, one string per file
pub fn load_model_from_sql(sources: &[&str], procedure_prefix: &str) -> Result<BuiltModel> {
    let mut statements = Vec::new();
    for (index, sql) in sources.iter().enumerate() {
        let name = format!("source{}.sql", index + 1);
        statements.extend(parser::parse_sql_text(sql, Path::new(&name))?);
    }

    let options = ModelOptions {
        procedure_prefix: procedure_prefix.to_string(),
        ..ModelOptions::default()
    };
    model::build_model(&statements, &options)
}
