use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

use sql_sharpen::{generate, load_model, GenerateOptions, SqlSharpenError};

#[derive(Parser)]
#[command(name = "sql-sharpen")]
#[command(author, version, about = "Typed data-access code plans from T-SQL stored procedures")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["project", "sql_paths"])))]
struct InputArgs {
    /// Path to the .sqlproj file
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// .sql file or directory to include (repeatable)
    #[arg(long = "sql-path")]
    sql_paths: Vec<PathBuf>,

    /// Prefix stripped from procedure names (e.g., usp_)
    #[arg(long, default_value = "")]
    prefix: String,

    /// Schema for unqualified names (defaults to the project's, else dbo)
    #[arg(long)]
    default_schema: Option<String>,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl InputArgs {
    fn options(&self) -> GenerateOptions {
        GenerateOptions {
            project_path: self.project.clone(),
            sql_paths: self.sql_paths.clone(),
            procedure_prefix: self.prefix.clone(),
            default_schema: self.default_schema.clone(),
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the code plans and the schema/query model as JSON
    Plan(InputArgs),
    /// Write only the schema/query model as JSON
    Model(InputArgs),
}

fn report_failures(failures: &[SqlSharpenError]) {
    for failure in failures {
        let mut message = failure.to_string();
        let mut source = std::error::Error::source(failure);
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        eprintln!("warning: {}", message);
    }
}

fn write_output(json: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| SqlSharpenError::OutputWriteError {
                path: path.clone(),
                source: e,
            })?;
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan(args) => {
            let generated = generate(&args.options())?;
            report_failures(&generated.failures);
            let json = serde_json::to_string_pretty(&generated)?;
            write_output(&json, args.output.as_ref())?;
        }
        Commands::Model(args) => {
            let built = load_model(&args.options())?;
            report_failures(&built.failures);
            let json = serde_json::to_string_pretty(&built.model)?;
            write_output(&json, args.output.as_ref())?;
        }
    }

    Ok(())
}
