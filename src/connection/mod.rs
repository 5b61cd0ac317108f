// ABOUTME: Read-only source connection contract and per-dialect drivers
// ABOUTME: Every driver maps native rows into SqlValue and metadata into the schema model

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MysqlConnection;
pub use postgres::PostgresConnection;
pub use sqlite::SqliteConnection;

use crate::dialect::Dialect;
use crate::schema::{ColumnDescriptor, ForeignKeyEdge, IndexDescriptor, TableSchema, ViewDescriptor};
use crate::value::Row;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

/// One window of rows to read from a table
///
/// With `after` set and a single integer primary key, rows are read by
/// keyset (`key > after`); otherwise by `LIMIT/OFFSET` ordered on the
/// primary key when there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
    pub after: Option<i64>,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            offset: 0,
            after: None,
        }
    }
}

/// Introspection and row access against a live source database
///
/// Implementations open their session read-only and never write.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Base tables in name order; views and internal tables excluded
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns in schema order with key, identity and default metadata
    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Outgoing foreign keys, one edge per column pair
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyEdge>>;

    /// Secondary indexes; never the primary key
    async fn indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>>;

    async fn views(&self) -> Result<Vec<ViewDescriptor>>;

    /// Read one page of rows, values in `table.columns` order
    async fn fetch_rows(&self, table: &TableSchema, page: &Page) -> Result<Vec<Row>>;
}

/// Introspect one table, reading columns, foreign keys and indexes concurrently
pub async fn describe_table(conn: &dyn DatabaseConnection, table: &str) -> Result<TableSchema> {
    let (columns, foreign_keys, indexes) = futures::try_join!(
        conn.columns(table),
        conn.foreign_keys(table),
        conn.indexes(table)
    )?;

    if columns.is_empty() {
        bail!("no columns found; the table may not exist");
    }

    let mut schema = TableSchema::new(table, columns);
    schema.foreign_keys = foreign_keys;
    schema.indexes = indexes;
    Ok(schema)
}

/// Open a read-only connection for a source URL
pub async fn connect(url: &str) -> Result<Box<dyn DatabaseConnection>> {
    crate::utils::validate_connection_string(url)?;
    match Dialect::from_url(url)? {
        Dialect::Sqlite => Ok(Box::new(SqliteConnection::open(url)?)),
        Dialect::Mysql => Ok(Box::new(MysqlConnection::connect(url).await?)),
        Dialect::Postgresql => Ok(Box::new(PostgresConnection::connect(url).await?)),
    }
}

/// Substrings of driver connection errors and the advice shown with them
const CONNECT_HINTS: &[(&[&str], &str)] = &[
    (
        &["no pg_hba.conf entry"],
        "Access denied by pg_hba.conf. Ask the database administrator to allow this host.",
    ),
    (
        &["password authentication failed", "Access denied"],
        "Authentication failed. Check the user name and password in the connection URL.",
    ),
    (
        &["does not exist", "Unknown database"],
        "Database not found. Check the database name in the connection URL.",
    ),
    (
        &["Connection refused", "could not connect"],
        "Server unreachable. Check the host and port and that the server is running.",
    ),
    (
        &["timeout", "timed out"],
        "Connection timed out. The server did not answer in time.",
    ),
    (
        &["SSL", "TLS"],
        "TLS handshake failed. Check the server's TLS settings or the sslmode parameter.",
    ),
];

/// Turn a driver's connection error into a message with a hint
pub(crate) fn connect_error(dialect: Dialect, message: &str) -> anyhow::Error {
    let hint = CONNECT_HINTS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| message.contains(n)))
        .map(|(_, hint)| *hint);
    match hint {
        Some(hint) => anyhow!("{}\nError: {}", hint, message),
        None => anyhow!("Failed to connect to {}: {}", dialect, message),
    }
}

/// SELECT for one page, given the driver's select list
pub fn page_query(table: &TableSchema, page: &Page, dialect: Dialect, select_list: &str) -> String {
    let mut sql = format!("SELECT {} FROM {}", select_list, dialect.quote_ident(&table.name));

    match (page.after, table.integer_key(dialect)) {
        (Some(after), Some(key)) => {
            let key = dialect.quote_ident(&key.name);
            sql.push_str(&format!(
                " WHERE {} > {} ORDER BY {} LIMIT {}",
                key, after, key, page.limit
            ));
        }
        _ => {
            if !table.primary_key.is_empty() {
                sql.push_str(&format!(" ORDER BY {}", dialect.quote_list(&table.primary_key)));
            }
            sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
        }
    }

    sql
}
