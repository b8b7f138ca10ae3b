//! SQL project file parsing and .sql file discovery

mod discovery;
mod sqlproj_parser;

pub use discovery::{discover_sql_files, scan_directory};
pub use sqlproj_parser::{parse_sqlproj, SqlProject};
