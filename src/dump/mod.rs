// ABOUTME: SQL dump generation: ordering, DDL, value conversion, inserts and sequence resets
// ABOUTME: Exports the orchestrator entry points and the options shared by every stage

pub mod converter;
pub mod ddl;
pub mod dependency;
pub mod insert;
pub mod orchestrator;
pub mod sequence;

pub use converter::{convert_value, Literal};
pub use ddl::{
    create_index_statement, create_table_statement, create_view_statement, foreign_key_statements,
};
pub use dependency::{get_table_dependencies, topological_sort, DependencyGraph, SortedTables};
pub use insert::generate_bulk_insert;
pub use orchestrator::{generate_sql_dump, write_sql_dump, DumpResult, DumpSummary};
pub use sequence::generate_sequence_resets;

use crate::dialect::Dialect;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Rows per INSERT statement when nothing else is configured
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Dialect the rows are read from and dialect the script is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectPair {
    pub source: Dialect,
    pub target: Dialect,
}

impl DialectPair {
    pub fn new(source: Dialect, target: Dialect) -> Self {
        Self { source, target }
    }

    pub fn is_same(&self) -> bool {
        self.source == self.target
    }
}

/// What an INSERT does when a row collides with an existing key
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// Plain INSERT; the load fails on duplicates
    #[default]
    Fail,
    /// Skip rows whose key already exists
    Ignore,
    /// Overwrite existing rows with the dumped values
    Replace,
}

/// Options controlling what a dump contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Tables to dump; None dumps every table and also emits views
    pub tables: Option<Vec<String>>,
    pub exclude_tables: Vec<String>,
    pub include_schema: bool,
    pub include_header: bool,
    /// Rows per INSERT; 0 disables the data section
    pub chunk_size: usize,
    pub conflict_mode: ConflictMode,
    /// Emit DROP TABLE IF EXISTS before creating tables
    pub drop_existing: bool,
    #[serde(skip)]
    pub show_progress: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            tables: None,
            exclude_tables: Vec::new(),
            include_schema: true,
            include_header: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            conflict_mode: ConflictMode::Fail,
            drop_existing: false,
            show_progress: false,
        }
    }
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn excluding<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn schema_only(mut self) -> Self {
        self.include_schema = true;
        self.chunk_size = 0;
        self
    }

    pub fn data_only(mut self) -> Self {
        self.include_schema = false;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.include_header = false;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_conflict_mode(mut self, mode: ConflictMode) -> Self {
        self.conflict_mode = mode;
        self
    }

    pub fn with_drop_existing(mut self, drop_existing: bool) -> Self {
        self.drop_existing = drop_existing;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// True when the dump covers the whole source, not a filtered subset
    pub fn is_full_dump(&self) -> bool {
        self.tables.is_none() && self.exclude_tables.is_empty()
    }

    /// Reject combinations that would produce an empty script
    pub fn validate(&self) -> Result<()> {
        if !self.include_schema && self.chunk_size == 0 {
            bail!(
                "Nothing to dump: schema output is disabled and chunk size is 0.\n\
                 Drop --data-only or set a chunk size greater than 0."
            );
        }
        if let Some(tables) = &self.tables {
            if tables.is_empty() {
                bail!("Table list is empty. Omit --tables to dump every table.");
            }
        }
        Ok(())
    }
}
