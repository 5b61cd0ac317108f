// ABOUTME: The tables command: lists source tables in the order a dump would emit them
// ABOUTME: Shows each table's foreign key parents and flags tables caught in cycles

use crate::connection::{self, describe_table};
use crate::dump::{get_table_dependencies, topological_sort, DependencyGraph, SortedTables};
use crate::utils::redact_url;
use anyhow::{Context, Result};
use futures::future::try_join_all;

/// Print the dump order for every table of `source`
pub async fn tables(source: &str) -> Result<()> {
    tracing::info!("Connecting to source {}...", redact_url(source));
    let conn = connection::connect(source)
        .await
        .context("Failed to connect to source database")?;
    tracing::info!("✓ Connected to source ({})", conn.dialect());

    let names = conn
        .list_tables()
        .await
        .context("Failed to list tables on source")?;
    if names.is_empty() {
        println!("No tables found.");
        return Ok(());
    }

    let schemas = try_join_all(names.iter().map(|t| describe_table(conn.as_ref(), t))).await?;
    let edges: Vec<_> = schemas
        .iter()
        .flat_map(|s| s.foreign_keys.iter().cloned())
        .collect();

    let graph = get_table_dependencies(&names, &edges);
    let sorted = topological_sort(&names, &graph);
    for cycle in &sorted.cycles {
        tracing::warn!("⚠ Foreign key cycle among: {}", cycle.join(", "));
    }

    print!("{}", format_table_order(&sorted, &graph));
    Ok(())
}

/// One line per table in dump order, with its parents and a cycle marker
fn format_table_order(sorted: &SortedTables, graph: &DependencyGraph) -> String {
    let width = sorted.order.len().to_string().len();
    let mut out = String::new();
    for (idx, table) in sorted.order.iter().enumerate() {
        out.push_str(&format!("{:>width$}. {}", idx + 1, table, width = width));
        if let Some(parents) = graph.get(table).filter(|p| !p.is_empty()) {
            let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
            out.push_str(&format!("  -> {}", parents.join(", ")));
        }
        if sorted.is_cyclic(table) {
            out.push_str("  (cycle)");
        }
        out.push('\n');
    }
    out
}
