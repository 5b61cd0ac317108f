// ABOUTME: Library module for portable-sql-dump
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod dump;
pub mod error;
pub mod interactive;
pub mod schema;
pub mod utils;
pub mod value;

pub use connection::{connect, DatabaseConnection};
pub use dialect::Dialect;
pub use dump::{generate_sql_dump, write_sql_dump, ConflictMode, DumpOptions, DumpResult};
pub use error::{Diagnostic, Diagnostics, DumpError};
