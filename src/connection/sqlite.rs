// ABOUTME: Read-only SQLite source driver built on rusqlite
// ABOUTME: Introspects through pragma table functions and sqlite_master

use crate::connection::{page_query, DatabaseConnection, Page};
use crate::dialect::Dialect;
use crate::schema::{ColumnDescriptor, ForeignKeyEdge, IndexDescriptor, TableSchema, ViewDescriptor};
use crate::value::{Row, SqlValue};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;

/// SQLite source opened read-only
///
/// rusqlite is synchronous; every call takes the lock, runs to completion
/// and releases it before returning to the runtime.
pub struct SqliteConnection {
    conn: Mutex<Connection>,
}

impl SqliteConnection {
    /// Open `sqlite://path`, `sqlite:path` or a bare file path
    pub fn open(url: &str) -> Result<Self> {
        let path = sqlite_path(url);
        if path.is_empty() {
            bail!("SQLite connection string has no file path");
        }
        if !path.starts_with("file:") && !Path::new(path).exists() {
            bail!(
                "SQLite database file not found: {}\n\
                 Check the path and make sure the file exists.",
                path
            );
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("Failed to open SQLite database '{}'", path))?;

        tracing::debug!("Opened SQLite database {} read-only", path);
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))?;
        f(&conn)
    }
}

fn sqlite_path(url: &str) -> &str {
    let trimmed = url.trim();
    trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed)
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
        .context("Failed to list SQLite tables")
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.with_conn(|conn| read_columns(conn, table))
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyEdge>> {
        self.with_conn(|conn| read_foreign_keys(conn, table))
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        self.with_conn(|conn| {
            let mut indexes = Vec::new();
            for entry in index_list(conn, table)? {
                if entry.origin == "pk" {
                    continue;
                }
                if entry.partial {
                    tracing::debug!("Skipping partial index {} on {}", entry.name, table);
                    continue;
                }
                let Some(columns) = index_columns(conn, &entry.name)? else {
                    tracing::debug!("Skipping expression index {} on {}", entry.name, table);
                    continue;
                };
                if entry.origin == "u" {
                    // Single-column UNIQUE constraints surface as column flags
                    if columns.len() == 1 {
                        continue;
                    }
                    indexes.push(IndexDescriptor {
                        name: format!("{}_{}_key", table, columns.join("_")),
                        table: table.to_string(),
                        columns,
                        unique: true,
                    });
                    continue;
                }
                indexes.push(IndexDescriptor {
                    name: entry.name,
                    table: table.to_string(),
                    columns,
                    unique: entry.unique,
                });
            }
            Ok(indexes)
        })
    }

    async fn views(&self) -> Result<Vec<ViewDescriptor>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, sql FROM sqlite_master WHERE type = 'view' ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(name, sql)| {
                    let definition = sql.as_deref().and_then(view_body);
                    if definition.is_none() {
                        tracing::warn!("⚠ Could not read the definition of view '{}'", name);
                    }
                    definition.map(|definition| ViewDescriptor { name, definition })
                })
                .collect())
        })
        .context("Failed to list SQLite views")
    }

    async fn fetch_rows(&self, table: &TableSchema, page: &Page) -> Result<Vec<Row>> {
        let select_list = Dialect::Sqlite.quote_list(&table.column_names());
        let sql = page_query(table, page, Dialect::Sqlite, &select_list);
        let width = table.columns.len();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::with_capacity(page.limit);
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(sqlite_to_value(row.get_ref(idx)?));
                }
                out.push(values);
            }
            Ok(out)
        })
        .with_context(|| format!("Failed to read rows from '{}'", table.name))
    }
}

fn sqlite_to_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => SqlValue::Text(text),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        ValueRef::Blob(bytes) => SqlValue::Bytes(bytes.to_vec()),
    }
}

fn read_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let rows = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, i64>(2)? != 0,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read columns of '{}'", table))?;

    let key_count = rows.iter().filter(|(.., pk)| *pk > 0).count();
    let unique_columns: Vec<String> = index_list(conn, table)?
        .into_iter()
        .filter(|entry| entry.origin == "u" && !entry.partial)
        .filter_map(|entry| index_columns(conn, &entry.name).transpose())
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|columns| columns.len() == 1)
        .flatten()
        .collect();

    let columns = rows
        .into_iter()
        .map(|(name, declared, not_null, default, pk)| {
            let mut column = ColumnDescriptor::new(&name, &declared);
            column.nullable = !not_null && pk == 0;
            column.is_primary_key = pk > 0;
            column.is_unique = unique_columns.contains(&name);
            // A lone INTEGER primary key aliases the rowid
            column.is_auto_increment =
                pk > 0 && key_count == 1 && declared.eq_ignore_ascii_case("integer");
            column.default = default;
            column
        })
        .collect();
    Ok(columns)
}

fn read_foreign_keys(conn: &Connection, table: &str) -> Result<Vec<ForeignKeyEdge>> {
    let mut stmt = conn.prepare(
        "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete \
         FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let rows = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read foreign keys of '{}'", table))?;

    let mut edges: Vec<ForeignKeyEdge> = Vec::with_capacity(rows.len());
    let mut constraint_names: Vec<(i64, String)> = Vec::new();
    for (id, seq, parent, from, to, on_update, on_delete) in rows {
        let parent_column = match to {
            Some(to) => to,
            None => parent_key_column(conn, &parent, seq)?,
        };
        let mut edge = ForeignKeyEdge::new(table, &from, &parent, &parent_column);

        // Columns of one composite constraint share the first column's name
        match constraint_names.iter().find(|(known, _)| *known == id) {
            Some((_, name)) => edge.name = name.clone(),
            None => constraint_names.push((id, edge.name.clone())),
        }
        edge.on_update = on_update.filter(|a| !a.eq_ignore_ascii_case("NO ACTION"));
        edge.on_delete = on_delete.filter(|a| !a.eq_ignore_ascii_case("NO ACTION"));
        edges.push(edge);
    }
    Ok(edges)
}

/// Column of the parent's primary key at position `seq`, for references
/// written without an explicit column list
fn parent_key_column(conn: &Connection, parent: &str, seq: i64) -> Result<String> {
    conn.query_row(
        "SELECT name FROM pragma_table_info(?1) WHERE pk = ?2",
        rusqlite::params![parent, seq + 1],
        |row| row.get(0),
    )
    .with_context(|| format!("Failed to resolve primary key of referenced table '{}'", parent))
}

struct IndexListEntry {
    name: String,
    unique: bool,
    origin: String,
    partial: bool,
}

fn index_list(conn: &Connection, table: &str) -> Result<Vec<IndexListEntry>> {
    let mut stmt = conn.prepare(
        "SELECT name, \"unique\", origin, partial FROM pragma_index_list(?1) ORDER BY name",
    )?;
    let entries = stmt
        .query_map([table], |row| {
            Ok(IndexListEntry {
                name: row.get(0)?,
                unique: row.get::<_, i64>(1)? != 0,
                origin: row.get(2)?,
                partial: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list indexes of '{}'", table))?;
    Ok(entries)
}

/// Indexed column names in key order; None when any key is an expression
fn index_columns(conn: &Connection, index: &str) -> Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    let names = stmt
        .query_map([index], |row| row.get::<_, Option<String>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read columns of index '{}'", index))?;
    Ok(names.into_iter().collect())
}

/// SELECT body of a stored `CREATE VIEW ... AS <body>` statement
fn view_body(sql: &str) -> Option<String> {
    let lower = sql.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut quote: Option<u8> = None;

    for i in 0..bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'[' => quote = Some(b']'),
            b'a' if lower[i..].starts_with("as") => {
                let before = i.checked_sub(1).map(|p| bytes[p]);
                let after = bytes.get(i + 2).copied();
                let bounded_before = before
                    .map(|c| c.is_ascii_whitespace() || matches!(c, b')' | b'"' | b'`' | b']'))
                    .unwrap_or(false);
                let bounded_after = after
                    .map(|c| c.is_ascii_whitespace() || c == b'(')
                    .unwrap_or(false);
                if bounded_before && bounded_after {
                    let body = sql[i + 2..].trim().trim_end_matches(';').trim();
                    return (!body.is_empty()).then(|| body.to_string());
                }
            }
            _ => {}
        }
    }
    None
}
