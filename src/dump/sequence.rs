// ABOUTME: Post-load statements restoring identity and sequence counters
// ABOUTME: Next generated id becomes max(id) + 1 on every target dialect

use crate::dialect::Dialect;
use crate::dump::DialectPair;
use crate::schema::{ColumnDescriptor, ColumnKind, TableSchema};
use std::collections::HashMap;

/// Emit counter resets for every table with an integer identity column
///
/// `max_ids` maps table name to the largest identity value written to the
/// dump. MySQL needs it as a literal; tables missing from it are empty and
/// get no MySQL statement. PostgreSQL and SQLite compute the maximum on the
/// target instead.
pub fn generate_sequence_resets(
    tables: &[TableSchema],
    max_ids: &HashMap<String, i64>,
    pair: DialectPair,
) -> Vec<String> {
    let target = pair.target;
    tables
        .iter()
        .filter_map(|table| {
            let column = identity_column(table, pair)?;
            let table_name = target.quote_ident(&table.name);
            let column_name = target.quote_ident(&column.name);

            match target {
                Dialect::Postgresql => Some(format!(
                    "SELECT setval(pg_get_serial_sequence('{}', '{}'), \
                     COALESCE((SELECT MAX({}) FROM {}), 0) + 1, false);",
                    table_name.replace('\'', "''"),
                    column.name.replace('\'', "''"),
                    column_name,
                    table_name
                )),
                Dialect::Mysql => max_ids.get(&table.name).map(|max| {
                    format!(
                        "ALTER TABLE {} AUTO_INCREMENT = {};",
                        table_name,
                        max.saturating_add(1)
                    )
                }),
                Dialect::Sqlite => {
                    // Only AUTOINCREMENT tables have a sqlite_sequence row
                    let single_key = table.primary_key.len() == 1 && table.primary_key[0] == column.name;
                    single_key.then(|| {
                        format!(
                            "UPDATE sqlite_sequence SET seq = (SELECT MAX({}) FROM {}) WHERE name = '{}';",
                            column_name,
                            table_name,
                            table.name.replace('\'', "''")
                        )
                    })
                }
            }
        })
        .collect()
}

fn identity_column(table: &TableSchema, pair: DialectPair) -> Option<&ColumnDescriptor> {
    table
        .identity_column()
        .filter(|c| ColumnKind::classify(c, pair.source) == ColumnKind::Integer)
}
