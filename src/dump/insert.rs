// ABOUTME: Bulk INSERT generation with chunking and per-dialect conflict handling
// ABOUTME: Each chunk of rows becomes exactly one multi-row INSERT statement

use crate::dialect::Dialect;
use crate::dump::converter::convert_value;
use crate::dump::{ConflictMode, DialectPair};
use crate::error::Diagnostics;
use crate::schema::TableSchema;
use crate::value::{Row, SqlValue};

/// Build one INSERT per `chunk_size` rows, columns in schema order
///
/// Returns no statements when `rows` is empty or `chunk_size` is 0.
/// Conversion fallbacks are recorded on `diagnostics` per column.
pub fn generate_bulk_insert(
    table: &TableSchema,
    rows: &[Row],
    chunk_size: usize,
    pair: DialectPair,
    conflict: ConflictMode,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    if chunk_size == 0 || rows.is_empty() || table.columns.is_empty() {
        return Vec::new();
    }

    let (prefix, suffix) = conflict_clauses(table, pair.target, conflict);
    rows.chunks(chunk_size)
        .map(|chunk| {
            let tuples: Vec<String> = chunk
                .iter()
                .map(|row| render_tuple(table, row, pair, diagnostics))
                .collect();
            format!("{}\n{}{};", prefix, tuples.join(",\n"), suffix)
        })
        .collect()
}

fn render_tuple(
    table: &TableSchema,
    row: &Row,
    pair: DialectPair,
    diagnostics: &mut Diagnostics,
) -> String {
    let values: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = row.get(idx).unwrap_or(&SqlValue::Null);
            let literal = convert_value(value, column, pair);
            if let Some(reason) = literal.fallback {
                diagnostics.record_fallback(&table.name, &column.name, reason);
            }
            literal.sql
        })
        .collect();
    format!("({})", values.join(", "))
}

/// Statement head up to VALUES, and the clause placed after the tuples
fn conflict_clauses(table: &TableSchema, target: Dialect, conflict: ConflictMode) -> (String, String) {
    let table_name = target.quote_ident(&table.name);
    let columns = target.quote_list(&table.column_names());
    let updatable: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|c| !table.primary_key.contains(c))
        .collect();

    let conflict = match conflict {
        ConflictMode::Replace if table.primary_key.is_empty() || updatable.is_empty() => {
            tracing::debug!(
                "Table '{}' has no updatable key columns; replace degrades to ignore",
                table.name
            );
            ConflictMode::Ignore
        }
        other => other,
    };

    let verb = match (target, conflict) {
        (_, ConflictMode::Fail) => "INSERT INTO",
        (Dialect::Sqlite, ConflictMode::Ignore) => "INSERT OR IGNORE INTO",
        (Dialect::Sqlite, ConflictMode::Replace) => "INSERT OR REPLACE INTO",
        (Dialect::Mysql, ConflictMode::Ignore) => "INSERT IGNORE INTO",
        (Dialect::Mysql, ConflictMode::Replace) | (Dialect::Postgresql, _) => "INSERT INTO",
    };

    let suffix = match (target, conflict) {
        (Dialect::Postgresql, ConflictMode::Ignore) => " ON CONFLICT DO NOTHING".to_string(),
        (Dialect::Postgresql, ConflictMode::Replace) => format!(
            "\nON CONFLICT ({}) DO UPDATE SET {}",
            target.quote_list(&table.primary_key),
            updatable
                .iter()
                .map(|c| {
                    let quoted = target.quote_ident(c);
                    format!("{} = EXCLUDED.{}", quoted, quoted)
                })
                .collect::<Vec<_>>()
                .join(", ")
        ),
        (Dialect::Mysql, ConflictMode::Replace) => format!(
            "\nON DUPLICATE KEY UPDATE {}",
            updatable
                .iter()
                .map(|c| {
                    let quoted = target.quote_ident(c);
                    format!("{} = VALUES({})", quoted, quoted)
                })
                .collect::<Vec<_>>()
                .join(", ")
        ),
        _ => String::new(),
    };

    (
        format!("{} {} ({}) VALUES", verb, table_name, columns),
        suffix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostic;
    use crate::schema::ColumnDescriptor;

    fn users() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDescriptor::new("id", "integer").primary_key().auto_increment(),
                ColumnDescriptor::new("name", "text"),
                ColumnDescriptor::new("active", "boolean"),
            ],
        )
    }

    fn rows() -> Vec<Row> {
        vec![
            vec![SqlValue::Int(1), "Ada".into(), true.into()],
            vec![SqlValue::Int(2), "Grace".into(), false.into()],
            vec![SqlValue::Int(3), "O'Neil".into(), SqlValue::Null],
        ]
    }

    fn insert(target: Dialect, chunk_size: usize, conflict: ConflictMode) -> Vec<String> {
        let mut diagnostics = Diagnostics::new();
        generate_bulk_insert(
            &users(),
            &rows(),
            chunk_size,
            DialectPair::new(Dialect::Postgresql, target),
            conflict,
            &mut diagnostics,
        )
    }

    #[test]
    fn test_chunk_size_one_emits_one_insert_per_row() {
        let statements = insert(Dialect::Sqlite, 1, ConflictMode::Fail);
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            "INSERT INTO users (id, name, active) VALUES\n(1, 'Ada', 1);"
        );
    }

    #[test]
    fn test_large_chunk_emits_single_insert() {
        let statements = insert(Dialect::Postgresql, 100, ConflictMode::Fail);
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "INSERT INTO \"users\" (\"id\", \"name\", \"active\") VALUES\n\
             (1, 'Ada', TRUE),\n\
             (2, 'Grace', FALSE),\n\
             (3, 'O''Neil', NULL);"
        );
    }

    #[test]
    fn test_uneven_chunks_keep_every_row() {
        let statements = insert(Dialect::Mysql, 2, ConflictMode::Fail);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].matches("),\n(").count(), 1);
        assert!(statements[1].contains("(3, 'O''Neil', NULL);"));
    }

    #[test]
    fn test_empty_rows_or_zero_chunk() {
        let mut diagnostics = Diagnostics::new();
        let pair = DialectPair::new(Dialect::Sqlite, Dialect::Sqlite);
        assert!(generate_bulk_insert(&users(), &[], 100, pair, ConflictMode::Fail, &mut diagnostics)
            .is_empty());
        assert!(insert(Dialect::Sqlite, 0, ConflictMode::Fail).is_empty());
    }

    #[test]
    fn test_ignore_mode_per_dialect() {
        assert!(insert(Dialect::Sqlite, 100, ConflictMode::Ignore)[0]
            .starts_with("INSERT OR IGNORE INTO users"));
        assert!(insert(Dialect::Mysql, 100, ConflictMode::Ignore)[0]
            .starts_with("INSERT IGNORE INTO `users`"));
        assert!(insert(Dialect::Postgresql, 100, ConflictMode::Ignore)[0]
            .ends_with(" ON CONFLICT DO NOTHING;"));
    }

    #[test]
    fn test_replace_mode_per_dialect() {
        assert!(insert(Dialect::Sqlite, 100, ConflictMode::Replace)[0]
            .starts_with("INSERT OR REPLACE INTO users"));
        assert!(insert(Dialect::Mysql, 100, ConflictMode::Replace)[0].ends_with(
            "\nON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `active` = VALUES(`active`);"
        ));
        assert!(insert(Dialect::Postgresql, 100, ConflictMode::Replace)[0].ends_with(
            "\nON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\", \
             \"active\" = EXCLUDED.\"active\";"
        ));
    }

    #[test]
    fn test_replace_without_primary_key_degrades_to_ignore() {
        let table = TableSchema::new("log", vec![ColumnDescriptor::new("line", "text")]);
        let mut diagnostics = Diagnostics::new();
        let statements = generate_bulk_insert(
            &table,
            &[vec!["x".into()]],
            10,
            DialectPair::new(Dialect::Mysql, Dialect::Postgresql),
            ConflictMode::Replace,
            &mut diagnostics,
        );
        assert_eq!(
            statements[0],
            "INSERT INTO \"log\" (\"line\") VALUES\n('x') ON CONFLICT DO NOTHING;"
        );
    }

    #[test]
    fn test_fallbacks_aggregated_per_column() {
        let table = TableSchema::new("events", vec![ColumnDescriptor::new("payload", "json")]);
        let rows: Vec<Row> = vec![vec!["{bad".into()], vec!["{worse".into()], vec!["{}".into()]];
        let mut diagnostics = Diagnostics::new();
        let statements = generate_bulk_insert(
            &table,
            &rows,
            100,
            DialectPair::new(Dialect::Mysql, Dialect::Sqlite),
            ConflictMode::Fail,
            &mut diagnostics,
        );
        assert_eq!(statements.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        match diagnostics.iter().next() {
            Some(Diagnostic::ValueFallback { occurrences, .. }) => assert_eq!(*occurrences, 2),
            other => panic!("unexpected diagnostic: {:?}", other),
        };
    }

    #[test]
    fn test_short_rows_padded_with_null() {
        let mut diagnostics = Diagnostics::new();
        let statements = generate_bulk_insert(
            &users(),
            &[vec![SqlValue::Int(9)]],
            10,
            DialectPair::new(Dialect::Sqlite, Dialect::Sqlite),
            ConflictMode::Fail,
            &mut diagnostics,
        );
        assert!(statements[0].ends_with("(9, NULL, NULL);"));
    }
}
