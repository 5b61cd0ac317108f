// ABOUTME: Drives a full dump: introspection, ordering, DDL, paged data and resets
// ABOUTME: Streams the script to any writer and collects diagnostics along the way

use crate::connection::{describe_table, DatabaseConnection, Page};
use crate::dialect::Dialect;
use crate::dump::ddl::{drop_table_statement, drop_view_statement};
use crate::dump::{
    create_index_statement, create_table_statement, create_view_statement, foreign_key_statements,
    generate_bulk_insert, generate_sequence_resets, get_table_dependencies, topological_sort,
    DialectPair, DumpOptions,
};
use crate::error::{Diagnostic, Diagnostics, DumpError};
use crate::schema::{ColumnKind, ForeignKeyEdge, TableSchema, ViewDescriptor};
use crate::value::SqlValue;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;

/// Counts describing one generated dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub tables: usize,
    pub rows: u64,
    pub statements: usize,
}

/// A dump held in memory
#[derive(Debug, Clone)]
pub struct DumpResult {
    pub sql: String,
    pub diagnostics: Diagnostics,
    pub summary: DumpSummary,
}

/// Generate the complete dump script as a string
///
/// # Errors
///
/// Fails when the options are invalid, a requested table does not exist,
/// or introspecting or reading any table fails. Value conversion problems
/// never fail the dump; they are reported in `DumpResult::diagnostics`.
pub async fn generate_sql_dump(
    conn: &dyn DatabaseConnection,
    target: Dialect,
    options: &DumpOptions,
) -> Result<DumpResult> {
    let mut buffer = Vec::new();
    let (summary, diagnostics) = write_sql_dump(conn, target, options, &mut buffer).await?;
    let sql = String::from_utf8(buffer).context("Generated dump is not valid UTF-8")?;
    Ok(DumpResult {
        sql,
        diagnostics,
        summary,
    })
}

/// Stream the dump script into `out`
///
/// Output order: header, FK checks off, transaction begin, schema, data,
/// identity resets, commit, FK checks on.
pub async fn write_sql_dump<W: Write>(
    conn: &dyn DatabaseConnection,
    target: Dialect,
    options: &DumpOptions,
    out: &mut W,
) -> Result<(DumpSummary, Diagnostics)> {
    options.validate()?;
    let pair = DialectPair::new(conn.dialect(), target);
    let mut diagnostics = Diagnostics::new();

    let available = conn
        .list_tables()
        .await
        .context("Failed to list source tables")?;
    let requested = select_tables(&available, options)?;
    tracing::info!(
        "Dumping {} table(s) from {} to {}",
        requested.len(),
        pair.source,
        pair.target
    );

    let tables = introspect(conn, &requested, pair, &mut diagnostics).await?;
    let table_names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();

    let views = if options.include_schema && options.is_full_dump() {
        conn.views().await.context("Failed to read source views")?
    } else {
        Vec::new()
    };

    let mut script = ScriptWriter::new(out, pair.target);
    if options.include_header {
        script.header(pair, tables.len())?;
    }
    script.statement(&foreign_key_checks(pair.target, false))?;
    script.statement(begin_statement(pair.target))?;

    if options.include_schema {
        write_schema(&mut script, &tables, &views, &table_names, pair, options, &mut diagnostics)?;
    }

    let mut rows = 0u64;
    if options.chunk_size > 0 {
        let progress = progress_bar(options.show_progress, tables.len())?;
        let mut max_ids: HashMap<String, i64> = HashMap::new();

        for table in &tables {
            progress.set_message(format!("Dumping {}", table.name));
            let (count, max_id) = write_table_data(
                &mut script,
                conn,
                table,
                pair,
                options,
                &mut diagnostics,
            )
            .await?;
            rows += count;
            if let Some(max_id) = max_id {
                max_ids.insert(table.name.clone(), max_id);
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        // Without our CREATE TABLE the target may lack sqlite_sequence
        let skip_resets = pair.target == Dialect::Sqlite && !options.include_schema;
        if !skip_resets {
            let resets = generate_sequence_resets(&tables, &max_ids, pair);
            if !resets.is_empty() {
                script.section("Identity resets")?;
                for statement in &resets {
                    script.statement(statement)?;
                }
            }
        }
    }

    script.blank()?;
    script.statement("COMMIT;")?;
    script.statement(&foreign_key_checks(pair.target, true))?;
    script.flush()?;

    let summary = DumpSummary {
        tables: tables.len(),
        rows,
        statements: script.statements,
    };
    tracing::info!(
        "Dump complete: {} table(s), {} row(s), {} statement(s)",
        summary.tables,
        summary.rows,
        summary.statements
    );
    Ok((summary, diagnostics))
}

/// Apply the include and exclude lists to the source's table listing
///
/// Explicitly requested tables keep the caller's order; otherwise the
/// source listing order is used.
fn select_tables(available: &[String], options: &DumpOptions) -> Result<Vec<String>> {
    let mut selected: Vec<String> = match &options.tables {
        Some(requested) => {
            let mut selected = Vec::with_capacity(requested.len());
            for name in requested {
                if !available.contains(name) {
                    return Err(DumpError::UnknownTable(name.clone()).into());
                }
                if !selected.contains(name) {
                    selected.push(name.clone());
                }
            }
            selected
        }
        None => available.to_vec(),
    };

    for name in &options.exclude_tables {
        if !available.contains(name) {
            tracing::warn!("⚠ Excluded table '{}' does not exist on the source", name);
        }
    }
    selected.retain(|name| !options.exclude_tables.contains(name));
    Ok(selected)
}

/// Describe every table concurrently, then order them parents-first
async fn introspect(
    conn: &dyn DatabaseConnection,
    names: &[String],
    pair: DialectPair,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<TableSchema>> {
    let described = futures::future::try_join_all(names.iter().map(|name| async move {
        tracing::debug!("Introspecting table '{}'", name);
        describe_table(conn, name)
            .await
            .map_err(|e| anyhow::Error::from(DumpError::introspection(name, &e)))
    }))
    .await?;

    for table in &described {
        for column in &table.columns {
            let unknown = match ColumnKind::classify(column, pair.source) {
                ColumnKind::Unknown => true,
                ColumnKind::Array(element) => *element == ColumnKind::Unknown,
                _ => false,
            };
            if unknown {
                diagnostics.push(Diagnostic::UnsupportedType {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    native_type: column.native_type.clone(),
                });
            }
        }
    }

    let edges: Vec<ForeignKeyEdge> = described
        .iter()
        .flat_map(|t| t.foreign_keys.iter().cloned())
        .collect();
    let graph = get_table_dependencies(names, &edges);
    let sorted = topological_sort(names, &graph);
    for cycle in &sorted.cycles {
        diagnostics.push(Diagnostic::Cycle {
            tables: cycle.clone(),
        });
    }

    let mut by_name: HashMap<String, TableSchema> = described
        .into_iter()
        .map(|t| (t.name.clone(), t))
        .collect();
    Ok(sorted
        .order
        .iter()
        .filter_map(|name| by_name.remove(name))
        .collect())
}

fn write_schema<W: Write>(
    script: &mut ScriptWriter<'_, W>,
    tables: &[TableSchema],
    views: &[ViewDescriptor],
    table_names: &[String],
    pair: DialectPair,
    options: &DumpOptions,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    if options.drop_existing {
        script.section("Drop existing objects")?;
        for view in views {
            script.statement(&drop_view_statement(&view.name, pair.target))?;
        }
        for table in tables.iter().rev() {
            script.statement(&drop_table_statement(&table.name, pair.target))?;
        }
    }

    for table in tables {
        script.section(&format!("Table: {}", table.name))?;
        script.statement(&create_table_statement(table, pair, table_names, diagnostics))?;
        for index in &table.indexes {
            script.statement(&create_index_statement(table, index, pair, diagnostics))?;
        }
    }

    let foreign_keys: Vec<String> = tables
        .iter()
        .flat_map(|table| foreign_key_statements(table, pair, table_names, diagnostics))
        .collect();
    if !foreign_keys.is_empty() {
        script.section("Foreign keys")?;
        for statement in &foreign_keys {
            script.statement(statement)?;
        }
    }

    let view_statements: Vec<String> = views
        .iter()
        .filter_map(|view| create_view_statement(view, pair, diagnostics))
        .collect();
    if !view_statements.is_empty() {
        script.section("Views")?;
        for statement in &view_statements {
            script.statement(statement)?;
        }
    }
    Ok(())
}

/// Page through one table and write its INSERTs
///
/// Returns the row count and the largest identity value seen.
async fn write_table_data<W: Write>(
    script: &mut ScriptWriter<'_, W>,
    conn: &dyn DatabaseConnection,
    table: &TableSchema,
    pair: DialectPair,
    options: &DumpOptions,
    diagnostics: &mut Diagnostics,
) -> Result<(u64, Option<i64>)> {
    let chunk_size = options.chunk_size;
    let key_index = table
        .integer_key(pair.source)
        .and_then(|key| table.columns.iter().position(|c| c.name == key.name));
    let identity_index = table
        .identity_column()
        .and_then(|id| table.columns.iter().position(|c| c.name == id.name));

    let mut page = Page::first(chunk_size);
    let mut count = 0u64;
    let mut max_id: Option<i64> = None;
    let mut wrote_section = false;

    loop {
        let rows = conn
            .fetch_rows(table, &page)
            .await
            .map_err(|e| anyhow::Error::from(DumpError::introspection(&table.name, &e)))?;
        if rows.is_empty() {
            break;
        }

        if let Some(idx) = identity_index {
            for row in &rows {
                if let Some(SqlValue::Int(id)) = row.get(idx) {
                    max_id = Some(max_id.map_or(*id, |m| m.max(*id)));
                }
            }
        }

        if !wrote_section {
            script.section(&format!("Data: {}", table.name))?;
            wrote_section = true;
        }
        for statement in generate_bulk_insert(
            table,
            &rows,
            chunk_size,
            pair,
            options.conflict_mode,
            diagnostics,
        ) {
            script.statement(&statement)?;
        }

        count += rows.len() as u64;
        if rows.len() < chunk_size {
            break;
        }
        page.offset += rows.len();
        page.after = key_index.and_then(|idx| match rows.last().and_then(|row| row.get(idx)) {
            Some(SqlValue::Int(last)) => Some(*last),
            _ => None,
        });
    }

    tracing::debug!("Dumped {} row(s) from '{}'", count, table.name);
    Ok((count, max_id))
}

fn progress_bar(visible: bool, len: usize) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(progress)
}

fn foreign_key_checks(target: Dialect, enabled: bool) -> String {
    match (target, enabled) {
        (Dialect::Sqlite, false) => "PRAGMA foreign_keys = OFF;".to_string(),
        (Dialect::Sqlite, true) => "PRAGMA foreign_keys = ON;".to_string(),
        (Dialect::Mysql, false) => "SET FOREIGN_KEY_CHECKS = 0;".to_string(),
        (Dialect::Mysql, true) => "SET FOREIGN_KEY_CHECKS = 1;".to_string(),
        (Dialect::Postgresql, false) => "SET session_replication_role = 'replica';".to_string(),
        (Dialect::Postgresql, true) => "SET session_replication_role = 'origin';".to_string(),
    }
}

fn begin_statement(target: Dialect) -> &'static str {
    match target {
        Dialect::Sqlite => "BEGIN TRANSACTION;",
        Dialect::Mysql => "START TRANSACTION;",
        Dialect::Postgresql => "BEGIN;",
    }
}

/// Line-oriented script output that counts statements
struct ScriptWriter<'a, W: Write> {
    out: &'a mut W,
    target: Dialect,
    statements: usize,
}

impl<'a, W: Write> ScriptWriter<'a, W> {
    fn new(out: &'a mut W, target: Dialect) -> Self {
        Self {
            out,
            target,
            statements: 0,
        }
    }

    fn header(&mut self, pair: DialectPair, tables: usize) -> Result<()> {
        let generated = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        writeln!(self.out, "-- portable-sql-dump {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "-- Generated: {}", generated)?;
        writeln!(self.out, "-- Source dialect: {}", pair.source)?;
        writeln!(self.out, "-- Target dialect: {}", self.target)?;
        writeln!(self.out, "-- Tables: {}", tables)?;
        self.blank()
    }

    fn section(&mut self, title: &str) -> Result<()> {
        self.blank()?;
        writeln!(self.out, "-- {}", title.replace('\n', " "))?;
        Ok(())
    }

    fn statement(&mut self, sql: &str) -> Result<()> {
        writeln!(self.out, "{}", sql).context("Failed to write dump output")?;
        self.statements += 1;
        Ok(())
    }

    fn blank(&mut self) -> Result<()> {
        writeln!(self.out).context("Failed to write dump output")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush dump output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::ConflictMode;
    use crate::schema::{ColumnDescriptor, IndexDescriptor};
    use crate::value::Row;
    use async_trait::async_trait;

    /// In-memory source serving fixed schemas and rows
    struct StaticSource {
        dialect: Dialect,
        tables: Vec<TableSchema>,
        rows: HashMap<String, Vec<Row>>,
        views: Vec<ViewDescriptor>,
    }

    #[async_trait]
    impl DatabaseConnection for StaticSource {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        async fn list_tables(&self) -> Result<Vec<String>> {
            let mut names: Vec<String> = self.tables.iter().map(|t| t.name.clone()).collect();
            names.sort();
            Ok(names)
        }

        async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
            Ok(self.table(table).map(|t| t.columns.clone()).unwrap_or_default())
        }

        async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyEdge>> {
            Ok(self.table(table).map(|t| t.foreign_keys.clone()).unwrap_or_default())
        }

        async fn indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
            Ok(self.table(table).map(|t| t.indexes.clone()).unwrap_or_default())
        }

        async fn views(&self) -> Result<Vec<ViewDescriptor>> {
            Ok(self.views.clone())
        }

        async fn fetch_rows(&self, table: &TableSchema, page: &Page) -> Result<Vec<Row>> {
            let rows = self.rows.get(&table.name).cloned().unwrap_or_default();
            let key = table
                .integer_key(self.dialect)
                .and_then(|k| table.columns.iter().position(|c| c.name == k.name));
            let remaining: Vec<Row> = match (page.after, key) {
                (Some(after), Some(idx)) => rows
                    .into_iter()
                    .filter(|r| matches!(r[idx], SqlValue::Int(v) if v > after))
                    .collect(),
                _ => rows.into_iter().skip(page.offset).collect(),
            };
            Ok(remaining.into_iter().take(page.limit).collect())
        }
    }

    impl StaticSource {
        fn table(&self, name: &str) -> Option<&TableSchema> {
            self.tables.iter().find(|t| t.name == name)
        }
    }

    fn source() -> StaticSource {
        let projects = TableSchema::new(
            "m_projects",
            vec![
                ColumnDescriptor::new("id", "INTEGER").primary_key().auto_increment(),
                ColumnDescriptor::new("name", "TEXT").not_null(),
            ],
        );
        let users = TableSchema::new(
            "v4_users",
            vec![
                ColumnDescriptor::new("id", "INTEGER").primary_key().auto_increment(),
                ColumnDescriptor::new("project_id", "INTEGER"),
                ColumnDescriptor::new("active", "BOOLEAN"),
            ],
        )
        .with_foreign_key(ForeignKeyEdge::new("v4_users", "project_id", "m_projects", "id"))
        .with_index("idx_v4_users_project", &["project_id"], false);
        let empty = TableSchema::new(
            "audit",
            vec![ColumnDescriptor::new("id", "INTEGER").primary_key().auto_increment()],
        );

        let rows = HashMap::from([
            (
                "m_projects".to_string(),
                vec![
                    vec![SqlValue::Int(1), "alpha".into()],
                    vec![SqlValue::Int(2), "beta".into()],
                    vec![SqlValue::Int(3), "gamma".into()],
                ],
            ),
            (
                "v4_users".to_string(),
                vec![
                    vec![SqlValue::Int(10), SqlValue::Int(1), SqlValue::Int(1)],
                    vec![SqlValue::Int(11), SqlValue::Int(3), SqlValue::Int(0)],
                ],
            ),
        ]);

        StaticSource {
            dialect: Dialect::Sqlite,
            tables: vec![users, projects, empty],
            rows,
            views: vec![ViewDescriptor {
                name: "active_users".to_string(),
                definition: "SELECT id FROM v4_users WHERE active = 1".to_string(),
            }],
        }
    }

    async fn dump(target: Dialect, options: DumpOptions) -> DumpResult {
        generate_sql_dump(&source(), target, &options).await.unwrap()
    }

    #[tokio::test]
    async fn test_parents_before_children_in_schema_and_data() {
        let result = dump(Dialect::Postgresql, DumpOptions::default()).await;
        let sql = &result.sql;

        let create_projects = sql.find("CREATE TABLE IF NOT EXISTS \"m_projects\"").unwrap();
        let create_users = sql.find("CREATE TABLE IF NOT EXISTS \"v4_users\"").unwrap();
        assert!(create_projects < create_users);

        let insert_projects = sql.find("INSERT INTO \"m_projects\"").unwrap();
        let insert_users = sql.find("INSERT INTO \"v4_users\"").unwrap();
        assert!(insert_projects < insert_users);
        assert!(create_users < insert_projects);
    }

    #[tokio::test]
    async fn test_section_order() {
        let result = dump(Dialect::Mysql, DumpOptions::default()).await;
        let sql = &result.sql;

        let positions: Vec<usize> = [
            "-- Source dialect: sqlite",
            "SET FOREIGN_KEY_CHECKS = 0;",
            "START TRANSACTION;",
            "CREATE TABLE IF NOT EXISTS",
            "CREATE INDEX `idx_v4_users_project`",
            "CREATE OR REPLACE VIEW `active_users`",
            "INSERT INTO `m_projects`",
            "ALTER TABLE `m_projects` AUTO_INCREMENT = 4;",
            "COMMIT;",
            "SET FOREIGN_KEY_CHECKS = 1;",
        ]
        .iter()
        .map(|needle| sql.find(needle).unwrap_or_else(|| panic!("missing {}", needle)))
        .collect();

        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[tokio::test]
    async fn test_empty_table_gets_schema_but_no_insert() {
        let result = dump(Dialect::Sqlite, DumpOptions::default()).await;
        assert!(result.sql.contains("CREATE TABLE IF NOT EXISTS audit"));
        assert!(!result.sql.contains("INSERT INTO audit"));
        assert_eq!(result.summary.rows, 5);
        assert_eq!(result.summary.tables, 3);
    }

    #[tokio::test]
    async fn test_chunking_with_keyset_pages() {
        let options = DumpOptions::default().with_chunk_size(2);
        let result = dump(Dialect::Sqlite, options).await;
        assert_eq!(result.sql.matches("INSERT INTO m_projects").count(), 2);
        assert!(result.sql.contains("(3, 'gamma');"));
        assert_eq!(result.summary.rows, 5);
    }

    #[tokio::test]
    async fn test_schema_only() {
        let result = dump(Dialect::Postgresql, DumpOptions::default().schema_only()).await;
        assert!(result.sql.contains("CREATE TABLE"));
        assert!(!result.sql.contains("INSERT"));
        assert!(!result.sql.contains("setval"));
        assert_eq!(result.summary.rows, 0);
    }

    #[tokio::test]
    async fn test_data_only_without_header() {
        let options = DumpOptions::default().data_only().without_header();
        let result = dump(Dialect::Postgresql, options).await;
        assert!(!result.sql.contains("CREATE TABLE"));
        assert!(!result.sql.contains("-- portable-sql-dump"));
        assert!(result.sql.starts_with("SET session_replication_role = 'replica';"));
        assert!(result.sql.trim_end().ends_with("SET session_replication_role = 'origin';"));
        assert!(result.sql.contains("INSERT INTO \"v4_users\""));
    }

    #[tokio::test]
    async fn test_filtered_dump_drops_foreign_key_and_views() {
        let options = DumpOptions::default().with_tables(["v4_users"]);
        let result = dump(Dialect::Postgresql, options).await;
        assert!(!result.sql.contains("REFERENCES"));
        assert!(!result.sql.contains("CREATE OR REPLACE VIEW"));
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DroppedForeignKey { .. })));
    }

    #[tokio::test]
    async fn test_unknown_table_is_an_error() {
        let options = DumpOptions::default().with_tables(["missing"]);
        let err = generate_sql_dump(&source(), Dialect::Sqlite, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DumpError>(),
            Some(DumpError::UnknownTable(name)) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn test_excluded_tables_are_skipped() {
        let options = DumpOptions::default().excluding(["audit"]);
        let result = dump(Dialect::Sqlite, options).await;
        assert!(!result.sql.contains("audit"));
        assert_eq!(result.summary.tables, 2);
    }

    #[tokio::test]
    async fn test_drop_existing_in_reverse_order() {
        let options = DumpOptions::default().with_drop_existing(true);
        let result = dump(Dialect::Postgresql, options).await;
        let drop_view = result.sql.find("DROP VIEW IF EXISTS \"active_users\";").unwrap();
        let drop_users = result.sql.find("DROP TABLE IF EXISTS \"v4_users\" CASCADE;").unwrap();
        let drop_projects = result
            .sql
            .find("DROP TABLE IF EXISTS \"m_projects\" CASCADE;")
            .unwrap();
        assert!(drop_view < drop_users);
        assert!(drop_users < drop_projects);
    }

    #[tokio::test]
    async fn test_replace_mode_reaches_inserts() {
        let options = DumpOptions::default().with_conflict_mode(ConflictMode::Replace);
        let result = dump(Dialect::Sqlite, options).await;
        assert!(result.sql.contains("INSERT OR REPLACE INTO m_projects"));
    }

    fn cyclic_source() -> StaticSource {
        let a = TableSchema::new(
            "a",
            vec![
                ColumnDescriptor::new("id", "INTEGER").primary_key(),
                ColumnDescriptor::new("b_id", "INTEGER"),
            ],
        )
        .with_foreign_key(ForeignKeyEdge::new("a", "b_id", "b", "id"));
        let b = TableSchema::new(
            "b",
            vec![
                ColumnDescriptor::new("id", "INTEGER").primary_key(),
                ColumnDescriptor::new("a_id", "INTEGER"),
            ],
        )
        .with_foreign_key(ForeignKeyEdge::new("b", "a_id", "a", "id"));
        let c = TableSchema::new(
            "c",
            vec![
                ColumnDescriptor::new("id", "INTEGER").primary_key(),
                ColumnDescriptor::new("a_id", "INTEGER"),
            ],
        )
        .with_foreign_key(ForeignKeyEdge::new("c", "a_id", "a", "id"));

        StaticSource {
            dialect: Dialect::Sqlite,
            tables: vec![a, b, c],
            rows: HashMap::new(),
            views: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_postgres_cycle_has_no_forward_reference() {
        let result = generate_sql_dump(&cyclic_source(), Dialect::Postgresql, &DumpOptions::default())
            .await
            .unwrap();
        let sql = &result.sql;

        let last_create = ["a", "b", "c"]
            .iter()
            .map(|t| {
                sql.find(&format!("CREATE TABLE IF NOT EXISTS \"{}\"", t))
                    .unwrap_or_else(|| panic!("missing table {}", t))
            })
            .max()
            .unwrap();
        let first_reference = sql.find("REFERENCES").unwrap();
        assert!(last_create < first_reference, "{}", sql);

        let section = sql.find("-- Foreign keys").unwrap();
        assert!(last_create < section);
        for (table, constraint, parent) in [
            ("a", "fk_a_b_id", "b"),
            ("b", "fk_b_a_id", "a"),
            ("c", "fk_c_a_id", "a"),
        ] {
            assert!(sql.contains(&format!(
                "ALTER TABLE \"{table}\" DROP CONSTRAINT IF EXISTS \"{constraint}\", \
                 ADD CONSTRAINT \"{constraint}\" FOREIGN KEY"
            )));
            assert!(sql.contains(&format!("REFERENCES \"{parent}\" (\"id\")")));
        }

        let cycles: Vec<&Vec<String>> = result
            .diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Cycle { tables } => Some(tables),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, vec![&vec!["a".to_string(), "b".to_string()]]);
    }

    #[tokio::test]
    async fn test_mysql_cycle_keeps_inline_foreign_keys() {
        let result = generate_sql_dump(&cyclic_source(), Dialect::Mysql, &DumpOptions::default())
            .await
            .unwrap();
        assert!(!result.sql.contains("-- Foreign keys"));
        assert!(result.sql.contains("CONSTRAINT `fk_a_b_id` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)"));
        assert!(result.sql.contains("SET FOREIGN_KEY_CHECKS = 0;"));
    }

    #[test]
    fn test_select_tables_keeps_requested_order() {
        let available = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let options = DumpOptions::default().with_tables(["c", "a", "c"]);
        assert_eq!(select_tables(&available, &options).unwrap(), vec!["c", "a"]);
    }
}
