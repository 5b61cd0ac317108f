// ABOUTME: Command implementations for each CLI subcommand
// ABOUTME: Exports dump and tables commands

pub mod dump;
pub mod tables;

pub use dump::{dump, DumpArgs};
pub use tables::tables;
