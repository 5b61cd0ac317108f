// ABOUTME: Error taxonomy and the diagnostics channel returned with every dump
// ABOUTME: Only introspection failures are fatal; everything else is recorded here

use std::fmt;

/// Errors callers may want to match on after downcasting an `anyhow::Error`
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// Schema, foreign key or index metadata could not be read for a table
    #[error("Failed to introspect table '{table}': {message}")]
    Introspection { table: String, message: String },

    /// A requested table does not exist on the source
    #[error("Table '{0}' was requested but does not exist in the source database")]
    UnknownTable(String),

    #[error("Unknown SQL dialect '{0}'. Expected one of: sqlite, mysql, postgresql")]
    UnknownDialect(String),
}

impl DumpError {
    pub fn introspection(table: &str, err: &anyhow::Error) -> Self {
        DumpError::Introspection {
            table: table.to_string(),
            message: format!("{:#}", err),
        }
    }
}

/// A non-fatal finding recorded while generating a dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Column type the exporter does not recognize; emitted as TEXT
    UnsupportedType {
        table: String,
        column: String,
        native_type: String,
    },
    /// Column default that cannot be carried to the target; dropped
    UnsupportedDefault {
        table: String,
        column: String,
        expression: String,
    },
    /// Foreign key cycle; ordering for these tables fell back to input order
    Cycle { tables: Vec<String> },
    /// Values passed through as escaped strings instead of typed literals
    ValueFallback {
        table: String,
        column: String,
        reason: String,
        occurrences: usize,
    },
    /// MySQL key column truncated to a prefix to fit the key-length ceiling
    KeyPrefixApplied {
        table: String,
        key: String,
        column: String,
        prefix: u32,
    },
    /// Foreign key referencing a table that is not part of the dump
    DroppedForeignKey {
        table: String,
        constraint: String,
        parent: String,
    },
    /// View not emitted for the target dialect
    SkippedView { view: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnsupportedType {
                table,
                column,
                native_type,
            } => write!(
                f,
                "{}.{}: unsupported type '{}' exported as TEXT",
                table, column, native_type
            ),
            Diagnostic::UnsupportedDefault {
                table,
                column,
                expression,
            } => write!(
                f,
                "{}.{}: default '{}' cannot be translated and was dropped",
                table, column, expression
            ),
            Diagnostic::Cycle { tables } => write!(
                f,
                "foreign key cycle between {}; emitted in discovery order",
                tables.join(", ")
            ),
            Diagnostic::ValueFallback {
                table,
                column,
                reason,
                occurrences,
            } => write!(
                f,
                "{}.{}: {} value(s) exported as plain strings ({})",
                table, column, occurrences, reason
            ),
            Diagnostic::KeyPrefixApplied {
                table,
                key,
                column,
                prefix,
            } => write!(
                f,
                "{}: key {} indexes only the first {} characters of '{}'",
                table, key, prefix, column
            ),
            Diagnostic::DroppedForeignKey {
                table,
                constraint,
                parent,
            } => write!(
                f,
                "{}: foreign key {} dropped because '{}' is not part of the dump",
                table, constraint, parent
            ),
            Diagnostic::SkippedView { view, reason } => {
                write!(f, "view {} skipped: {}", view, reason)
            }
        }
    }
}

/// Ordered collection of diagnostics produced by one dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if let Diagnostic::ValueFallback {
            table,
            column,
            reason,
            occurrences,
        } = &diagnostic
        {
            let existing = self.entries.iter_mut().find_map(|entry| match entry {
                Diagnostic::ValueFallback {
                    table: t,
                    column: c,
                    reason: r,
                    occurrences: n,
                } if t == table && c == column && r == reason => Some(n),
                _ => None,
            });
            if let Some(count) = existing {
                *count += occurrences;
                return;
            }
        }
        self.entries.push(diagnostic);
    }

    /// Record a per-value conversion fallback, merging repeats per column
    pub fn record_fallback(&mut self, table: &str, column: &str, reason: &str) {
        self.push(Diagnostic::ValueFallback {
            table: table.to_string(),
            column: column.to_string(),
            reason: reason.to_string(),
            occurrences: 1,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
