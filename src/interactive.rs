// ABOUTME: Interactive terminal prompts for the dump command
// ABOUTME: Table multi-select, target dialect choice and overwrite confirmation

use crate::connection::DatabaseConnection;
use crate::dialect::Dialect;
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect, Select};
use std::path::Path;

/// Interactive table selection
///
/// Lists the source's tables with `preselected` ticked (every table when
/// `preselected` is empty), then asks for confirmation.
///
/// # Errors
///
/// Fails if the tables cannot be listed, the terminal is not interactive,
/// nothing is selected, or the user declines to proceed.
pub async fn select_tables(
    conn: &dyn DatabaseConnection,
    preselected: &[String],
) -> Result<Vec<String>> {
    tracing::info!("Discovering tables on source...");
    let tables = conn
        .list_tables()
        .await
        .context("Failed to list tables on source")?;

    if tables.is_empty() {
        bail!("Source database has no tables to dump");
    }
    tracing::info!("✓ Found {} table(s)", tables.len());
    tracing::info!("");

    println!("Select tables to dump:");
    println!("(Use arrow keys to navigate, Space to select, Enter to confirm)");
    println!();

    let defaults = default_selection(&tables, preselected);
    let selections = MultiSelect::with_theme(&ColorfulTheme::default())
        .items(&tables)
        .defaults(&defaults)
        .interact()
        .context("Failed to get table selection")?;

    if selections.is_empty() {
        tracing::warn!("⚠ No tables selected");
        bail!("Interactive selection cancelled: no tables selected");
    }

    let selected: Vec<String> = selections.iter().map(|&idx| tables[idx].clone()).collect();

    println!();
    println!("Tables to dump: {} of {}", selected.len(), tables.len());
    for table in &selected {
        println!("  ✓ {}", table);
    }
    println!();

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Proceed with this selection?")
        .default(true)
        .interact()
        .context("Failed to get confirmation")?;

    if !confirmed {
        tracing::warn!("⚠ User cancelled operation");
        bail!("Interactive selection cancelled by user");
    }

    Ok(selected)
}

/// Ask which dialect the dump should be written for
pub fn select_target_dialect(source: Dialect) -> Result<Dialect> {
    let dialects = [Dialect::Sqlite, Dialect::Mysql, Dialect::Postgresql];
    let labels: Vec<&str> = dialects.iter().map(|d| d.name()).collect();
    let default = dialects.iter().position(|d| *d == source).unwrap_or(0);

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Target dialect")
        .items(&labels)
        .default(default)
        .interact()
        .context("Failed to get target dialect")?;
    Ok(dialects[choice])
}

/// Ask before replacing an existing output file
pub fn confirm_overwrite(path: &Path) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}

/// Initial tick state for each listed table
fn default_selection(tables: &[String], preselected: &[String]) -> Vec<bool> {
    tables
        .iter()
        .map(|t| preselected.is_empty() || preselected.contains(t))
        .collect()
}
