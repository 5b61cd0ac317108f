// ABOUTME: The dump command: resolves flags and profile, connects, writes the script
// ABOUTME: File output goes through a temp file persisted only after a successful dump

use crate::config::{load_dump_config, DumpConfig};
use crate::connection;
use crate::dialect::Dialect;
use crate::dump::{write_sql_dump, ConflictMode, DumpOptions, DumpSummary};
use crate::error::Diagnostics;
use crate::interactive;
use crate::utils::redact_url;
use anyhow::{bail, Context, Result};
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct DumpArgs {
    /// Source database URL (sqlite://, mysql://, mariadb://, postgresql://) or SQLite file path
    #[arg(long)]
    pub source: Option<String>,
    /// Dialect to write the script for
    #[arg(long, value_enum)]
    pub target: Option<Dialect>,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Dump only these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tables: Option<Vec<String>>,
    /// Skip these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude_tables: Vec<String>,
    /// Emit CREATE statements only
    #[arg(long, conflicts_with = "data_only")]
    pub schema_only: bool,
    /// Emit INSERT statements only
    #[arg(long)]
    pub data_only: bool,
    /// Omit the leading comment block
    #[arg(long)]
    pub no_header: bool,
    /// Rows per INSERT statement (default: 100)
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Behaviour when an inserted row collides with an existing key
    #[arg(long, value_enum)]
    pub conflict: Option<ConflictMode>,
    /// Drop existing tables before creating them
    #[arg(long)]
    pub drop_existing: bool,
    /// TOML profile supplying defaults for these flags
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Choose tables (and the target, if not given) interactively
    #[arg(short, long)]
    pub interactive: bool,
    /// Fail when the dump produced any warnings
    #[arg(long)]
    pub strict: bool,
    /// Overwrite the output file without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Everything needed to run one dump after flags and profile are merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPlan {
    pub source: String,
    /// None when the target will be chosen interactively
    pub target: Option<Dialect>,
    pub output: Option<PathBuf>,
    pub options: DumpOptions,
}

/// Merge command-line flags over the optional profile
pub fn resolve_plan(args: &DumpArgs, config: DumpConfig) -> Result<DumpPlan> {
    let source = match args.source.clone().or(config.source) {
        Some(source) => source,
        None => bail!("No source given. Pass --source <url> or set `source` in the config file."),
    };

    let target = args.target.or(config.target);
    if target.is_none() && !args.interactive {
        bail!("No target dialect given. Pass --target sqlite|mysql|postgresql or use --interactive.");
    }

    let mut options = config.dump;
    if let Some(tables) = &args.tables {
        options.tables = Some(tables.clone());
    }
    if !args.exclude_tables.is_empty() {
        options.exclude_tables = args.exclude_tables.clone();
    }
    if args.schema_only && args.data_only {
        bail!("--schema-only and --data-only cannot be combined");
    }
    if args.data_only {
        options = options.data_only();
    }
    if args.no_header {
        options = options.without_header();
    }
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }
    if let Some(conflict) = args.conflict {
        options.conflict_mode = conflict;
    }
    if args.drop_existing {
        options.drop_existing = true;
    }
    // Last, so no chunk size from flags or config turns data back on
    if args.schema_only {
        options = options.schema_only();
    }

    let output = args.output.clone().or(config.output);
    options.show_progress = output.is_some() && std::io::stderr().is_terminal();
    options.validate()?;

    Ok(DumpPlan {
        source,
        target,
        output,
        options,
    })
}

/// Generate a dump as described by `args`
pub async fn dump(args: DumpArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_dump_config(path)?,
        None => DumpConfig::default(),
    };
    let mut plan = resolve_plan(&args, config)?;

    tracing::info!("Connecting to source {}...", redact_url(&plan.source));
    let conn = connection::connect(&plan.source)
        .await
        .context("Failed to connect to source database")?;
    tracing::info!("✓ Connected to source ({})", conn.dialect());

    let target = match plan.target {
        Some(target) => target,
        None => interactive::select_target_dialect(conn.dialect())?,
    };

    if args.interactive {
        let preselected = plan.options.tables.clone().unwrap_or_default();
        let selected = interactive::select_tables(conn.as_ref(), &preselected).await?;
        let all = conn.list_tables().await?;
        // Picking every table keeps the dump complete, views included
        plan.options.tables = if selected.len() == all.len() && plan.options.exclude_tables.is_empty() {
            None
        } else {
            Some(selected)
        };
    }

    let (summary, diagnostics) = match &plan.output {
        Some(path) => {
            if path.exists() && !args.yes && !interactive::confirm_overwrite(path)? {
                bail!("Output file {} exists; not overwritten", path.display());
            }
            write_to_file(conn.as_ref(), target, &plan.options, path, args.strict).await?
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let result = write_sql_dump(conn.as_ref(), target, &plan.options, &mut out).await?;
            out.flush().context("Failed to flush stdout")?;
            result
        }
    };

    report(&summary, &diagnostics);
    if args.strict && !diagnostics.is_empty() {
        bail!(
            "Dump produced {} warning(s) and --strict is set",
            diagnostics.len()
        );
    }
    Ok(())
}

async fn write_to_file(
    conn: &dyn connection::DatabaseConnection,
    target: Dialect,
    options: &DumpOptions,
    path: &Path,
    strict: bool,
) -> Result<(DumpSummary, Diagnostics)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let result = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let result = write_sql_dump(conn, target, options, &mut writer).await?;
        writer.flush().context("Failed to write dump file")?;
        result
    };

    if strict && !result.1.is_empty() {
        tracing::warn!("⚠ Not writing {} because --strict is set", path.display());
        return Ok(result);
    }

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to save dump to {}", path.display()))?;
    tracing::info!("✓ Dump written to {}", path.display());
    Ok(result)
}

fn report(summary: &DumpSummary, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        tracing::warn!("⚠ {}", diagnostic);
    }
    tracing::info!(
        "✅ Dumped {} table(s), {} row(s) in {} statement(s)",
        summary.tables,
        summary.rows,
        summary.statements
    );
}
