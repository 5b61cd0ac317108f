// ABOUTME: Schema exporter emitting CREATE TABLE, INDEX and VIEW statements per dialect
// ABOUTME: Translates column types, defaults, keys and MySQL key-length prefixes

use crate::dialect::Dialect;
use crate::dump::converter::{boolean_literal, quote_string};
use crate::dump::DialectPair;
use crate::error::{Diagnostic, Diagnostics};
use crate::schema::{
    base_type_name, parse_precision_scale, parse_type_length, ColumnDescriptor, ColumnKind,
    ForeignKeyEdge, IndexDescriptor, TableSchema, ViewDescriptor,
};

/// Characters of a long string column MySQL indexes in a key (191 * 4 bytes fits 767)
pub const MYSQL_KEY_PREFIX_LENGTH: u32 = 191;

/// Longest VARCHAR kept as VARCHAR on MySQL under utf8mb4
pub const MYSQL_MAX_VARCHAR: u32 = 16383;

/// Functions that tie a view body to its source dialect
const MYSQL_VIEW_FUNCTIONS: &[&str] = &[
    "ifnull", "if", "group_concat", "date_format", "str_to_date", "curdate", "curtime",
    "unix_timestamp", "from_unixtime", "date_add", "date_sub", "datediff", "json_extract",
    "json_unquote", "substring_index", "concat_ws", "last_insert_id",
];
const POSTGRES_VIEW_FUNCTIONS: &[&str] = &[
    "string_agg", "array_agg", "to_char", "to_date", "to_timestamp", "date_trunc", "date_part",
    "generate_series", "jsonb_build_object", "json_build_object", "jsonb_agg", "json_agg",
    "array_to_string", "regexp_replace", "unnest", "age",
];
const SQLITE_VIEW_FUNCTIONS: &[&str] = &[
    "strftime", "datetime", "julianday", "ifnull", "group_concat", "json_extract", "printf",
    "instr", "date", "time", "iif",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntWidth {
    Tiny,
    Small,
    Medium,
    Regular,
    Big,
}

/// Build the CREATE TABLE statement for `table` in the target dialect
///
/// `included_tables` is the set of tables present in the dump; foreign keys
/// referencing anything else are dropped and reported. PostgreSQL targets get
/// no inline foreign keys; see [`foreign_key_statements`].
pub fn create_table_statement(
    table: &TableSchema,
    pair: DialectPair,
    included_tables: &[String],
    diagnostics: &mut Diagnostics,
) -> String {
    let target = pair.target;
    let inline_pk = sqlite_inline_primary_key(table, pair);
    let mut lines = Vec::new();

    for column in &table.columns {
        lines.push(column_definition(table, column, pair, inline_pk, diagnostics));
    }

    if !table.primary_key.is_empty() && inline_pk.is_none() {
        let columns = key_columns(table, "PRIMARY", &table.primary_key, pair, diagnostics);
        lines.push(format!("PRIMARY KEY ({})", columns));
    }

    for column in table.columns.iter().filter(|c| needs_unique_constraint(table, c)) {
        let key = format!("uq_{}_{}", table.name, column.name);
        let columns = key_columns(table, &key, std::slice::from_ref(&column.name), pair, diagnostics);
        match target {
            Dialect::Mysql => lines.push(format!(
                "UNIQUE KEY {} ({})",
                target.quote_ident(&key),
                columns
            )),
            Dialect::Postgresql | Dialect::Sqlite => lines.push(format!("UNIQUE ({})", columns)),
        }
    }

    if !defers_foreign_keys(target) {
        for constraint in kept_foreign_keys(table, included_tables, diagnostics) {
            lines.push(foreign_key_clause(&constraint, target));
        }
    }

    let body = lines
        .iter()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join(",\n");

    let suffix = match target {
        Dialect::Mysql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        Dialect::Postgresql | Dialect::Sqlite => "",
    };

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n){};",
        target.quote_ident(&table.name),
        body,
        suffix
    )
}

/// ALTER TABLE statements adding the foreign keys of `table`
///
/// Only PostgreSQL targets get any: there a parent must exist when a
/// constraint is declared, so these run after every CREATE TABLE. MySQL
/// (with FOREIGN_KEY_CHECKS off) and SQLite accept forward references inline.
pub fn foreign_key_statements(
    table: &TableSchema,
    pair: DialectPair,
    included_tables: &[String],
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let target = pair.target;
    if !defers_foreign_keys(target) {
        return Vec::new();
    }
    kept_foreign_keys(table, included_tables, diagnostics)
        .into_iter()
        .map(|constraint| {
            format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}, ADD {};",
                target.quote_ident(&table.name),
                target.quote_ident(&constraint[0].name),
                foreign_key_clause(&constraint, target)
            )
        })
        .collect()
}

fn defers_foreign_keys(target: Dialect) -> bool {
    target == Dialect::Postgresql
}

/// Foreign keys whose parent is in the dump; the rest are reported as dropped
fn kept_foreign_keys<'a>(
    table: &'a TableSchema,
    included_tables: &[String],
    diagnostics: &mut Diagnostics,
) -> Vec<Vec<&'a ForeignKeyEdge>> {
    group_foreign_keys(&table.foreign_keys)
        .into_iter()
        .filter(|constraint| {
            let first = constraint[0];
            let kept = included_tables.iter().any(|t| *t == first.parent_table);
            if !kept {
                diagnostics.push(Diagnostic::DroppedForeignKey {
                    table: table.name.clone(),
                    constraint: first.name.clone(),
                    parent: first.parent_table.clone(),
                });
            }
            kept
        })
        .collect()
}

/// Build the CREATE INDEX statement for one secondary index
pub fn create_index_statement(
    table: &TableSchema,
    index: &IndexDescriptor,
    pair: DialectPair,
    diagnostics: &mut Diagnostics,
) -> String {
    let target = pair.target;
    let name = index_name(index, pair);
    let columns = key_columns(table, &name, &index.columns, pair, diagnostics);
    let unique = if index.unique { "UNIQUE " } else { "" };
    let if_not_exists = match target {
        // MySQL has no IF NOT EXISTS for CREATE INDEX
        Dialect::Mysql => "",
        Dialect::Postgresql | Dialect::Sqlite => "IF NOT EXISTS ",
    };

    format!(
        "CREATE {}INDEX {}{} ON {} ({});",
        unique,
        if_not_exists,
        target.quote_ident(&name),
        target.quote_ident(&table.name),
        columns
    )
}

/// Build the CREATE VIEW statement, or None when the body cannot be ported
pub fn create_view_statement(
    view: &ViewDescriptor,
    pair: DialectPair,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let mut body = view.definition.trim().trim_end_matches(';').trim_end().to_string();
    if body.is_empty() {
        diagnostics.push(Diagnostic::SkippedView {
            view: view.name.clone(),
            reason: "definition is not readable".to_string(),
        });
        return None;
    }

    if !pair.is_same() {
        if let Some(function) = dialect_specific_function(&body, pair.source) {
            tracing::warn!(
                "⚠ Skipping view '{}': uses {}-specific function {}()",
                view.name,
                pair.source,
                function
            );
            diagnostics.push(Diagnostic::SkippedView {
                view: view.name.clone(),
                reason: format!("uses {}-specific function {}()", pair.source, function),
            });
            return None;
        }

        body = match (pair.source, pair.target) {
            (Dialect::Mysql, _) => requote_identifiers(&body, '`', '"'),
            (_, Dialect::Mysql) => requote_identifiers(&body, '"', '`'),
            _ => body,
        };
    }

    let name = pair.target.quote_ident(&view.name);
    Some(match pair.target {
        Dialect::Sqlite => format!("CREATE VIEW IF NOT EXISTS {} AS {};", name, body),
        Dialect::Mysql | Dialect::Postgresql => {
            format!("CREATE OR REPLACE VIEW {} AS {};", name, body)
        }
    })
}

pub fn drop_table_statement(table: &str, target: Dialect) -> String {
    match target {
        Dialect::Postgresql => format!("DROP TABLE IF EXISTS {} CASCADE;", target.quote_ident(table)),
        Dialect::Mysql | Dialect::Sqlite => {
            format!("DROP TABLE IF EXISTS {};", target.quote_ident(table))
        }
    }
}

pub fn drop_view_statement(view: &str, target: Dialect) -> String {
    format!("DROP VIEW IF EXISTS {};", target.quote_ident(view))
}

fn column_definition(
    table: &TableSchema,
    column: &ColumnDescriptor,
    pair: DialectPair,
    inline_pk: Option<&str>,
    diagnostics: &mut Diagnostics,
) -> String {
    let target = pair.target;
    let name = target.quote_ident(&column.name);

    if inline_pk == Some(column.name.as_str()) {
        return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name);
    }

    let kind = ColumnKind::classify(column, pair.source);
    let identity = column.is_auto_increment && kind == ColumnKind::Integer;
    let mut definition = format!("{} {}", name, column_type(column, pair));

    if identity && target == Dialect::Mysql {
        definition.push_str(" AUTO_INCREMENT");
    }
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }

    if let (Some(raw), false) = (&column.default, identity) {
        match translate_default(raw, column, pair) {
            Some(expression) => {
                definition.push_str(" DEFAULT ");
                definition.push_str(&expression);
            }
            None => {
                tracing::debug!(
                    "Dropping default '{}' on {}.{}",
                    raw,
                    table.name,
                    column.name
                );
                diagnostics.push(Diagnostic::UnsupportedDefault {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    expression: raw.clone(),
                });
            }
        }
    }

    definition
}

/// Target column type for a source column
///
/// Unrecognized types come back as TEXT.
pub fn column_type(column: &ColumnDescriptor, pair: DialectPair) -> String {
    let kind = ColumnKind::classify(column, pair.source);
    kind_type(column, &kind, pair)
}

fn kind_type(column: &ColumnDescriptor, kind: &ColumnKind, pair: DialectPair) -> String {
    let target = pair.target;
    let base = base_type_name(&column.native_type);

    match kind {
        ColumnKind::Boolean => match target {
            Dialect::Mysql => "TINYINT(1)".to_string(),
            Dialect::Postgresql | Dialect::Sqlite => "BOOLEAN".to_string(),
        },
        ColumnKind::Integer => integer_type(column, pair),
        ColumnKind::Float => {
            let double = base.starts_with("double") || base == "float8";
            match (target, double) {
                (Dialect::Sqlite, _) => "REAL".to_string(),
                (Dialect::Mysql, true) => "DOUBLE".to_string(),
                (Dialect::Mysql, false) => "FLOAT".to_string(),
                (Dialect::Postgresql, true) => "DOUBLE PRECISION".to_string(),
                (Dialect::Postgresql, false) => "REAL".to_string(),
            }
        }
        ColumnKind::Decimal => {
            let args = match (base.as_str(), parse_precision_scale(&column.native_type)) {
                ("money", _) => Some((19, Some(2))),
                (_, args) => args,
            };
            let name = match target {
                Dialect::Mysql => "DECIMAL",
                Dialect::Postgresql | Dialect::Sqlite => "NUMERIC",
            };
            match (args, target) {
                (Some((p, Some(s))), _) => format!("{}({},{})", name, p, s),
                (Some((p, None)), _) => format!("{}({})", name, p),
                (None, Dialect::Mysql) => "DECIMAL(65,30)".to_string(),
                (None, _) => name.to_string(),
            }
        }
        ColumnKind::Text => text_type(column, &base, pair),
        ColumnKind::Timestamp => match target {
            Dialect::Mysql => "DATETIME".to_string(),
            Dialect::Postgresql | Dialect::Sqlite => "TIMESTAMP".to_string(),
        },
        ColumnKind::Date => "DATE".to_string(),
        ColumnKind::Time => match (base.as_str(), target) {
            ("interval", Dialect::Postgresql) => "INTERVAL".to_string(),
            ("interval", _) => "TEXT".to_string(),
            ("year", Dialect::Mysql) => "YEAR".to_string(),
            ("year", Dialect::Postgresql) => "SMALLINT".to_string(),
            ("year", Dialect::Sqlite) => "INTEGER".to_string(),
            (_, Dialect::Sqlite) => "TEXT".to_string(),
            _ => "TIME".to_string(),
        },
        ColumnKind::Binary => match target {
            Dialect::Postgresql => "BYTEA".to_string(),
            Dialect::Sqlite => "BLOB".to_string(),
            Dialect::Mysql if pair.source == Dialect::Mysql => {
                column.native_type.trim().to_ascii_uppercase()
            }
            Dialect::Mysql => "LONGBLOB".to_string(),
        },
        ColumnKind::Json => match target {
            Dialect::Postgresql => "JSONB".to_string(),
            Dialect::Mysql => "JSON".to_string(),
            Dialect::Sqlite => "TEXT".to_string(),
        },
        ColumnKind::Array(element) => match target {
            Dialect::Postgresql => {
                let element_column = column.element_descriptor();
                format!("{}[]", kind_type(&element_column, element, pair))
            }
            Dialect::Mysql => "JSON".to_string(),
            Dialect::Sqlite => "TEXT".to_string(),
        },
        ColumnKind::Enum => match target {
            Dialect::Mysql if pair.source == Dialect::Mysql => column.native_type.trim().to_string(),
            Dialect::Mysql => "VARCHAR(255)".to_string(),
            Dialect::Postgresql | Dialect::Sqlite => "TEXT".to_string(),
        },
        ColumnKind::Uuid => match target {
            Dialect::Postgresql => "UUID".to_string(),
            Dialect::Mysql => "CHAR(36)".to_string(),
            Dialect::Sqlite => "TEXT".to_string(),
        },
        ColumnKind::Unknown => "TEXT".to_string(),
    }
}

fn integer_width(base: &str) -> IntWidth {
    match base {
        "tinyint" => IntWidth::Tiny,
        "smallint" | "int2" | "smallserial" => IntWidth::Small,
        "mediumint" => IntWidth::Medium,
        "bigint" | "int8" | "bigserial" | "big int" => IntWidth::Big,
        _ => IntWidth::Regular,
    }
}

fn integer_type(column: &ColumnDescriptor, pair: DialectPair) -> String {
    let base = base_type_name(&column.native_type);
    let width = match integer_width(&base) {
        // SQLite INTEGER and INT columns hold 64-bit values
        IntWidth::Regular if pair.source == Dialect::Sqlite => IntWidth::Big,
        w => w,
    };
    let unsigned = pair.source == Dialect::Mysql
        && column.native_type.to_ascii_lowercase().contains("unsigned");

    match pair.target {
        Dialect::Sqlite => "INTEGER".to_string(),
        Dialect::Mysql => {
            let name = match width {
                IntWidth::Tiny => "TINYINT",
                IntWidth::Small => "SMALLINT",
                IntWidth::Medium => "MEDIUMINT",
                IntWidth::Regular => "INT",
                IntWidth::Big => "BIGINT",
            };
            if unsigned {
                format!("{} UNSIGNED", name)
            } else {
                name.to_string()
            }
        }
        Dialect::Postgresql => {
            // Unsigned MySQL ranges need the next wider signed type
            let width = match (width, unsigned) {
                (IntWidth::Tiny, _) => IntWidth::Small,
                (IntWidth::Small, true) | (IntWidth::Medium, _) => IntWidth::Regular,
                (IntWidth::Regular, true) => IntWidth::Big,
                (IntWidth::Big, true) if !column.is_auto_increment => {
                    return "NUMERIC(20)".to_string()
                }
                (w, _) => w,
            };
            match (width, column.is_auto_increment) {
                (IntWidth::Small, true) => "SMALLSERIAL",
                (IntWidth::Big, true) => "BIGSERIAL",
                (_, true) => "SERIAL",
                (IntWidth::Small, false) => "SMALLINT",
                (IntWidth::Big, false) => "BIGINT",
                (_, false) => "INTEGER",
            }
            .to_string()
        }
    }
}

fn text_type(column: &ColumnDescriptor, base: &str, pair: DialectPair) -> String {
    let fixed = matches!(base, "char" | "character" | "nchar" | "bpchar" | "native character");
    let varying = matches!(
        base,
        "varchar" | "character varying" | "nvarchar" | "varying character"
    );
    let length = column.max_length.or_else(|| parse_type_length(&column.native_type));

    match pair.target {
        Dialect::Sqlite => "TEXT".to_string(),
        Dialect::Postgresql => match (fixed, varying, length) {
            (true, _, Some(n)) => format!("CHAR({})", n),
            (_, true, Some(n)) => format!("VARCHAR({})", n),
            (_, true, None) => "VARCHAR".to_string(),
            _ => "TEXT".to_string(),
        },
        Dialect::Mysql => match (fixed, varying, length) {
            (true, _, Some(n)) if n <= 255 => format!("CHAR({})", n),
            (_, _, Some(n)) if (fixed || varying) && n <= MYSQL_MAX_VARCHAR => {
                format!("VARCHAR({})", n)
            }
            _ if pair.source == Dialect::Mysql
                && matches!(base, "tinytext" | "text" | "mediumtext" | "longtext") =>
            {
                base.to_ascii_uppercase()
            }
            (_, _, Some(n)) if n <= 65_535 => "TEXT".to_string(),
            _ => "LONGTEXT".to_string(),
        },
    }
}

/// Translate a source default expression, None when it cannot be carried
pub fn translate_default(raw: &str, column: &ColumnDescriptor, pair: DialectPair) -> Option<String> {
    let kind = ColumnKind::classify(column, pair.source);
    let target = pair.target;
    let expression = strip_casts(strip_parens(raw.trim()));
    let upper = expression.to_ascii_uppercase();

    if upper == "NULL" {
        return Some("NULL".to_string());
    }

    if upper.starts_with("CURRENT_TIMESTAMP")
        || upper == "NOW()"
        || upper.starts_with("LOCALTIMESTAMP")
        || upper == "DATETIME('NOW')"
        || upper == "'NOW'"
    {
        return match kind {
            ColumnKind::Timestamp => Some("CURRENT_TIMESTAMP".to_string()),
            ColumnKind::Date => translate_current_date(target),
            _ => None,
        };
    }
    if upper == "CURRENT_DATE" || upper == "CURDATE()" || upper == "DATE('NOW')" {
        return translate_current_date(target);
    }

    let literal = if kind == ColumnKind::Boolean {
        let token = unquote(expression).unwrap_or_else(|| expression.to_string());
        let token = token.trim_start_matches("b'").trim_end_matches('\'');
        match token.to_ascii_lowercase().as_str() {
            "1" | "true" | "t" => boolean_literal(true, target),
            "0" | "false" | "f" => boolean_literal(false, target),
            _ => return None,
        }
    } else if let Some(text) = unquote(expression) {
        quote_string(&text, target)
    } else if is_number(expression) {
        if kind.is_textual() {
            quote_string(expression, target)
        } else {
            expression.to_string()
        }
    } else if upper == "TRUE" || upper == "FALSE" {
        boolean_literal(upper == "TRUE", target)
    } else {
        return None;
    };

    // MySQL only accepts literal defaults on TEXT/BLOB/JSON as expressions
    let column_type = column_type(column, pair);
    if target == Dialect::Mysql
        && (column_type.contains("TEXT") || column_type.contains("BLOB") || column_type == "JSON")
    {
        return Some(format!("({})", literal));
    }
    Some(literal)
}

fn translate_current_date(target: Dialect) -> Option<String> {
    Some(match target {
        Dialect::Mysql => "(CURRENT_DATE)".to_string(),
        Dialect::Postgresql | Dialect::Sqlite => "CURRENT_DATE".to_string(),
    })
}

fn strip_parens(mut expression: &str) -> &str {
    while expression.len() >= 2
        && expression.starts_with('(')
        && expression.ends_with(')')
        && balanced(&expression[1..expression.len() - 1])
    {
        expression = expression[1..expression.len() - 1].trim();
    }
    expression
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Remove trailing PostgreSQL casts: `'a'::character varying` -> `'a'`
fn strip_casts(mut expression: &str) -> &str {
    while let Some(idx) = expression.rfind("::") {
        let suffix = &expression[idx + 2..];
        let is_type_name = balanced(suffix)
            && suffix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || " _[]\".(),".contains(c));
        if !is_type_name {
            break;
        }
        expression = strip_parens(expression[..idx].trim());
    }
    expression
}

/// Content of a single-quoted SQL string with doubled quotes collapsed
fn unquote(expression: &str) -> Option<String> {
    let inner = expression.strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.replace("''", "").contains('\'') {
        return None;
    }
    Some(inner.replace("''", "'"))
}

fn is_number(expression: &str) -> bool {
    let digits = expression.strip_prefix('-').unwrap_or(expression);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit())
}

/// SQLite keeps a single integer primary key inline so it aliases the rowid
fn sqlite_inline_primary_key(table: &TableSchema, pair: DialectPair) -> Option<&str> {
    if pair.target != Dialect::Sqlite || table.primary_key.len() != 1 {
        return None;
    }
    let column = table.column(&table.primary_key[0])?;
    let is_integer = ColumnKind::classify(column, pair.source) == ColumnKind::Integer;
    (is_integer && column.is_auto_increment).then_some(column.name.as_str())
}

fn needs_unique_constraint(table: &TableSchema, column: &ColumnDescriptor) -> bool {
    if !column.is_unique {
        return false;
    }
    if table.primary_key.len() == 1 && table.primary_key[0] == column.name {
        return false;
    }
    !table
        .indexes
        .iter()
        .any(|idx| idx.unique && idx.columns.len() == 1 && idx.columns[0] == column.name)
}

/// Quote key columns, adding the MySQL prefix where the column is too long
fn key_columns(
    table: &TableSchema,
    key: &str,
    columns: &[String],
    pair: DialectPair,
    diagnostics: &mut Diagnostics,
) -> String {
    columns
        .iter()
        .map(|name| {
            let quoted = pair.target.quote_ident(name);
            if pair.target != Dialect::Mysql {
                return quoted;
            }
            match table.column(name) {
                Some(column) if needs_key_prefix(column, pair) => {
                    diagnostics.push(Diagnostic::KeyPrefixApplied {
                        table: table.name.clone(),
                        key: key.to_string(),
                        column: name.clone(),
                        prefix: MYSQL_KEY_PREFIX_LENGTH,
                    });
                    format!("{}({})", quoted, MYSQL_KEY_PREFIX_LENGTH)
                }
                _ => quoted,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn needs_key_prefix(column: &ColumnDescriptor, pair: DialectPair) -> bool {
    let target_type = column_type(column, pair).to_ascii_uppercase();
    if target_type.contains("TEXT") || target_type.contains("BLOB") {
        return true;
    }
    (target_type.starts_with("VARCHAR") || target_type.starts_with("VARBINARY"))
        && parse_type_length(&target_type).is_some_and(|n| n > MYSQL_KEY_PREFIX_LENGTH)
}

/// Multi-column foreign keys arrive as several edges sharing one name
fn group_foreign_keys(edges: &[ForeignKeyEdge]) -> Vec<Vec<&ForeignKeyEdge>> {
    let mut groups: Vec<Vec<&ForeignKeyEdge>> = Vec::new();
    for edge in edges {
        match groups
            .iter_mut()
            .find(|g| g[0].name == edge.name && g[0].parent_table == edge.parent_table)
        {
            Some(group) => group.push(edge),
            None => groups.push(vec![edge]),
        }
    }
    groups
}

fn foreign_key_clause(constraint: &[&ForeignKeyEdge], target: Dialect) -> String {
    let first = constraint[0];
    let child: Vec<String> = constraint.iter().map(|e| e.child_column.clone()).collect();
    let parent: Vec<String> = constraint.iter().map(|e| e.parent_column.clone()).collect();

    let mut clause = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        target.quote_ident(&first.name),
        target.quote_list(&child),
        target.quote_ident(&first.parent_table),
        target.quote_list(&parent)
    );
    for (keyword, action) in [("ON DELETE", &first.on_delete), ("ON UPDATE", &first.on_update)] {
        if let Some(action) = action {
            let action = action.trim().to_ascii_uppercase();
            if !action.is_empty() && action != "NO ACTION" {
                clause.push_str(&format!(" {} {}", keyword, action));
            }
        }
    }
    clause
}

fn index_name(index: &IndexDescriptor, pair: DialectPair) -> String {
    // MySQL index names are per table; elsewhere they share one namespace
    if pair.source == Dialect::Mysql
        && pair.target != Dialect::Mysql
        && !index.name.contains(&index.table)
    {
        format!("{}_{}", index.table, index.name)
    } else {
        index.name.clone()
    }
}

fn dialect_specific_function(body: &str, source: Dialect) -> Option<&'static str> {
    let functions = match source {
        Dialect::Mysql => MYSQL_VIEW_FUNCTIONS,
        Dialect::Postgresql => POSTGRES_VIEW_FUNCTIONS,
        Dialect::Sqlite => SQLITE_VIEW_FUNCTIONS,
    };
    let lower = body.to_ascii_lowercase();
    if source == Dialect::Postgresql && lower.contains("::") {
        return Some("::");
    }
    functions
        .iter()
        .copied()
        .find(|name| references_function(&lower, name))
}

fn references_function(body: &str, name: &str) -> bool {
    let bytes = body.as_bytes();
    let mut from = 0;
    while let Some(pos) = body[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        let preceded =
            start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_');
        let followed = body[end..].trim_start().starts_with('(');
        if !preceded && followed {
            return true;
        }
        from = end;
    }
    false
}

/// Swap identifier quote characters outside single-quoted strings
fn requote_identifiers(body: &str, from: char, to: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    for c in body.chars() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
        } else if c == from && !in_string {
            out.push(to);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(source: Dialect, target: Dialect) -> DialectPair {
        DialectPair::new(source, target)
    }

    fn users() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDescriptor::new("id", "INTEGER").primary_key().auto_increment(),
                ColumnDescriptor::new("email", "varchar(255)").not_null().unique(),
                ColumnDescriptor::new("active", "BOOLEAN").with_default("1"),
                ColumnDescriptor::new("created_at", "datetime").with_default("CURRENT_TIMESTAMP"),
            ],
        )
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sqlite_create_table() {
        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &users(),
            pair(Dialect::Sqlite, Dialect::Sqlite),
            &names(&["users"]),
            &mut diagnostics,
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (\n  \
             id INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
             email TEXT NOT NULL,\n  \
             active BOOLEAN DEFAULT 1,\n  \
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n  \
             UNIQUE (email)\n);"
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_postgres_create_table() {
        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &users(),
            pair(Dialect::Sqlite, Dialect::Postgresql),
            &names(&["users"]),
            &mut diagnostics,
        );
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"users\" ("));
        assert!(sql.contains("\"id\" BIGSERIAL NOT NULL"));
        assert!(sql.contains("\"email\" VARCHAR(255) NOT NULL"));
        assert!(sql.contains("\"active\" BOOLEAN DEFAULT TRUE"));
        assert!(sql.contains("\"created_at\" TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
        assert!(sql.contains("UNIQUE (\"email\")"));
        assert!(sql.ends_with(");"));
    }

    #[test]
    fn test_mysql_create_table() {
        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &users(),
            pair(Dialect::Sqlite, Dialect::Mysql),
            &names(&["users"]),
            &mut diagnostics,
        );
        assert!(sql.contains("`id` BIGINT AUTO_INCREMENT NOT NULL"));
        assert!(sql.contains("`active` TINYINT(1) DEFAULT 1"));
        assert!(sql.contains("`created_at` DATETIME DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("UNIQUE KEY `uq_users_email` (`email`(191))"));
        assert!(sql.ends_with(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_long_varchar_primary_key_prefix() {
        let table = TableSchema::new(
            "slugs",
            vec![ColumnDescriptor::new("slug", "VARCHAR(500)").primary_key()],
        );
        let included = names(&["slugs"]);

        let mut diagnostics = Diagnostics::new();
        let mysql = create_table_statement(
            &table,
            pair(Dialect::Postgresql, Dialect::Mysql),
            &included,
            &mut diagnostics,
        );
        assert!(mysql.contains("PRIMARY KEY (`slug`(191))"));
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::KeyPrefixApplied { prefix: 191, .. })
        ));

        for target in [Dialect::Postgresql, Dialect::Sqlite] {
            let mut diagnostics = Diagnostics::new();
            let sql = create_table_statement(
                &table,
                pair(Dialect::Postgresql, target),
                &included,
                &mut diagnostics,
            );
            assert!(!sql.contains("(191)"));
            assert!(diagnostics.is_empty());
        }
    }

    #[test]
    fn test_short_varchar_key_is_not_prefixed() {
        let table = TableSchema::new(
            "codes",
            vec![ColumnDescriptor::new("code", "varchar(64)").primary_key()],
        );
        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &table,
            pair(Dialect::Mysql, Dialect::Mysql),
            &names(&["codes"]),
            &mut diagnostics,
        );
        assert!(sql.contains("PRIMARY KEY (`code`)"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_foreign_keys_kept_and_dropped() {
        let table = TableSchema::new(
            "v4_users",
            vec![
                ColumnDescriptor::new("id", "integer").primary_key(),
                ColumnDescriptor::new("project_id", "integer"),
                ColumnDescriptor::new("org_id", "integer"),
            ],
        )
        .with_foreign_key(
            ForeignKeyEdge::new("v4_users", "project_id", "m_projects", "id").on_delete("CASCADE"),
        )
        .with_foreign_key(ForeignKeyEdge::new("v4_users", "org_id", "orgs", "id"));

        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &table,
            pair(Dialect::Postgresql, Dialect::Mysql),
            &names(&["m_projects", "v4_users"]),
            &mut diagnostics,
        );
        assert!(sql.contains(
            "CONSTRAINT `fk_v4_users_project_id` FOREIGN KEY (`project_id`) \
             REFERENCES `m_projects` (`id`) ON DELETE CASCADE"
        ));
        assert!(!sql.contains("`orgs`"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.iter().next(),
            Some(&Diagnostic::DroppedForeignKey {
                table: "v4_users".to_string(),
                constraint: "fk_v4_users_org_id".to_string(),
                parent: "orgs".to_string(),
            })
        );
    }

    #[test]
    fn test_postgres_foreign_keys_deferred_to_alter_table() {
        let table = TableSchema::new(
            "v4_users",
            vec![
                ColumnDescriptor::new("id", "integer").primary_key(),
                ColumnDescriptor::new("project_id", "integer"),
                ColumnDescriptor::new("org_id", "integer"),
            ],
        )
        .with_foreign_key(
            ForeignKeyEdge::new("v4_users", "project_id", "m_projects", "id").on_delete("CASCADE"),
        )
        .with_foreign_key(ForeignKeyEdge::new("v4_users", "org_id", "orgs", "id"));
        let pg = pair(Dialect::Postgresql, Dialect::Postgresql);
        let included = names(&["m_projects", "v4_users"]);

        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(&table, pg, &included, &mut diagnostics);
        assert!(!sql.contains("FOREIGN KEY"));
        assert!(!sql.contains("REFERENCES"));
        assert!(diagnostics.is_empty());

        let statements = foreign_key_statements(&table, pg, &included, &mut diagnostics);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"v4_users\" DROP CONSTRAINT IF EXISTS \"fk_v4_users_project_id\", \
                 ADD CONSTRAINT \"fk_v4_users_project_id\" FOREIGN KEY (\"project_id\") \
                 REFERENCES \"m_projects\" (\"id\") ON DELETE CASCADE;"
                    .to_string()
            ]
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::DroppedForeignKey { parent, .. }) if parent == "orgs"
        ));

        for target in [Dialect::Mysql, Dialect::Sqlite] {
            let mut diagnostics = Diagnostics::new();
            let p = pair(Dialect::Postgresql, target);
            assert!(foreign_key_statements(&table, p, &included, &mut diagnostics).is_empty());
            assert!(diagnostics.is_empty());
        }
    }

    #[test]
    fn test_composite_foreign_key_grouped() {
        let mut a = ForeignKeyEdge::new("lines", "order_id", "orders", "id");
        a.name = "fk_lines_order".to_string();
        let mut b = ForeignKeyEdge::new("lines", "shop_id", "orders", "shop_id");
        b.name = "fk_lines_order".to_string();
        let table = TableSchema::new(
            "lines",
            vec![
                ColumnDescriptor::new("order_id", "int"),
                ColumnDescriptor::new("shop_id", "int"),
            ],
        )
        .with_foreign_key(a)
        .with_foreign_key(b);

        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &table,
            pair(Dialect::Mysql, Dialect::Mysql),
            &names(&["orders", "lines"]),
            &mut diagnostics,
        );
        assert!(sql.contains(
            "CONSTRAINT `fk_lines_order` FOREIGN KEY (`order_id`, `shop_id`) \
             REFERENCES `orders` (`id`, `shop_id`)"
        ));
    }

    #[test]
    fn test_type_translation() {
        let ty = |native: &str, source: Dialect, target: Dialect| {
            column_type(&ColumnDescriptor::new("c", native), pair(source, target))
        };
        assert_eq!(ty("bytea", Dialect::Postgresql, Dialect::Mysql), "LONGBLOB");
        assert_eq!(ty("blob", Dialect::Sqlite, Dialect::Postgresql), "BYTEA");
        assert_eq!(ty("jsonb", Dialect::Postgresql, Dialect::Sqlite), "TEXT");
        assert_eq!(ty("json", Dialect::Mysql, Dialect::Postgresql), "JSONB");
        assert_eq!(ty("_int4", Dialect::Postgresql, Dialect::Postgresql), "INTEGER[]");
        assert_eq!(ty("_text", Dialect::Postgresql, Dialect::Mysql), "JSON");
        assert_eq!(ty("uuid", Dialect::Postgresql, Dialect::Mysql), "CHAR(36)");
        assert_eq!(ty("enum('a','b')", Dialect::Mysql, Dialect::Mysql), "enum('a','b')");
        assert_eq!(ty("enum('a','b')", Dialect::Mysql, Dialect::Postgresql), "TEXT");
        assert_eq!(ty("numeric(10,2)", Dialect::Postgresql, Dialect::Mysql), "DECIMAL(10,2)");
        assert_eq!(ty("int unsigned", Dialect::Mysql, Dialect::Postgresql), "BIGINT");
        assert_eq!(ty("tinyint(4)", Dialect::Mysql, Dialect::Postgresql), "SMALLINT");
        assert_eq!(ty("tinyint(1)", Dialect::Mysql, Dialect::Postgresql), "BOOLEAN");
        assert_eq!(ty("varchar(20000)", Dialect::Postgresql, Dialect::Mysql), "TEXT");
        assert_eq!(ty("text", Dialect::Postgresql, Dialect::Mysql), "LONGTEXT");
        assert_eq!(ty("mediumtext", Dialect::Mysql, Dialect::Mysql), "MEDIUMTEXT");
        assert_eq!(ty("geometry", Dialect::Mysql, Dialect::Postgresql), "TEXT");
        assert_eq!(ty("double", Dialect::Mysql, Dialect::Postgresql), "DOUBLE PRECISION");
        assert_eq!(ty("timestamp with time zone", Dialect::Postgresql, Dialect::Mysql), "DATETIME");
    }

    #[test]
    fn test_sqlite_integer_widened_to_64_bits() {
        let id = ColumnDescriptor::new("id", "INTEGER").primary_key().auto_increment();
        let count = ColumnDescriptor::new("count", "INTEGER");
        let int = ColumnDescriptor::new("n", "INT");
        let small = ColumnDescriptor::new("s", "SMALLINT");
        let to_pg = pair(Dialect::Sqlite, Dialect::Postgresql);
        let to_mysql = pair(Dialect::Sqlite, Dialect::Mysql);

        assert_eq!(column_type(&id, to_pg), "BIGSERIAL");
        assert_eq!(column_type(&count, to_pg), "BIGINT");
        assert_eq!(column_type(&int, to_pg), "BIGINT");
        assert_eq!(column_type(&small, to_pg), "SMALLINT");
        assert_eq!(column_type(&count, to_mysql), "BIGINT");
        assert_eq!(column_type(&id, to_mysql), "BIGINT");
        assert_eq!(column_type(&count, pair(Dialect::Sqlite, Dialect::Sqlite)), "INTEGER");

        // Other sources keep their declared width
        let pg_int = ColumnDescriptor::new("n", "integer");
        assert_eq!(column_type(&pg_int, pair(Dialect::Postgresql, Dialect::Mysql)), "INT");
    }

    #[test]
    fn test_bigint_identity_on_postgres() {
        let column = ColumnDescriptor::new("id", "bigint").primary_key().auto_increment();
        assert_eq!(column_type(&column, pair(Dialect::Mysql, Dialect::Postgresql)), "BIGSERIAL");
    }

    #[test]
    fn test_defaults() {
        let pg = pair(Dialect::Postgresql, Dialect::Postgresql);
        let text = ColumnDescriptor::new("status", "character varying");
        assert_eq!(
            translate_default("'active'::character varying", &text, pg),
            Some("'active'".to_string())
        );
        assert_eq!(translate_default("nextval('users_id_seq'::regclass)", &text, pg), None);

        let ts = ColumnDescriptor::new("at", "timestamp without time zone");
        assert_eq!(translate_default("now()", &ts, pg), Some("CURRENT_TIMESTAMP".to_string()));

        let flag = ColumnDescriptor::new("flag", "boolean");
        assert_eq!(
            translate_default("true", &flag, pair(Dialect::Postgresql, Dialect::Mysql)),
            Some("1".to_string())
        );

        let count = ColumnDescriptor::new("count", "integer");
        assert_eq!(translate_default("(0)", &count, pg), Some("0".to_string()));
        assert_eq!(translate_default("-1", &count, pg), Some("-1".to_string()));

        let notes = ColumnDescriptor::new("notes", "text");
        assert_eq!(
            translate_default("'none'", &notes, pair(Dialect::Sqlite, Dialect::Mysql)),
            Some("('none')".to_string())
        );
    }

    #[test]
    fn test_untranslatable_default_reported() {
        let table = TableSchema::new(
            "tokens",
            vec![ColumnDescriptor::new("value", "text").with_default("gen_random_uuid()")],
        );
        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &table,
            pair(Dialect::Postgresql, Dialect::Sqlite),
            &names(&["tokens"]),
            &mut diagnostics,
        );
        assert!(!sql.contains("DEFAULT"));
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::UnsupportedDefault { .. })
        ));
    }

    #[test]
    fn test_index_statements() {
        let table = TableSchema::new(
            "posts",
            vec![
                ColumnDescriptor::new("title", "text"),
                ColumnDescriptor::new("author_id", "int"),
            ],
        )
        .with_index("idx_author", &["author_id"], false)
        .with_index("idx_title", &["title"], true);

        let mut diagnostics = Diagnostics::new();
        let pg = pair(Dialect::Mysql, Dialect::Postgresql);
        assert_eq!(
            create_index_statement(&table, &table.indexes[0], pg, &mut diagnostics),
            "CREATE INDEX IF NOT EXISTS \"posts_idx_author\" ON \"posts\" (\"author_id\");"
        );

        let mysql = pair(Dialect::Mysql, Dialect::Mysql);
        assert_eq!(
            create_index_statement(&table, &table.indexes[1], mysql, &mut diagnostics),
            "CREATE UNIQUE INDEX `idx_title` ON `posts` (`title`(191));"
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_unique_covered_by_index_is_not_duplicated() {
        let table = TableSchema::new(
            "accounts",
            vec![ColumnDescriptor::new("handle", "varchar(50)").unique()],
        )
        .with_index("accounts_handle_key", &["handle"], true);
        let mut diagnostics = Diagnostics::new();
        let sql = create_table_statement(
            &table,
            pair(Dialect::Postgresql, Dialect::Postgresql),
            &names(&["accounts"]),
            &mut diagnostics,
        );
        assert!(!sql.contains("UNIQUE"));
    }

    #[test]
    fn test_view_same_dialect_kept() {
        let view = ViewDescriptor {
            name: "active_users".to_string(),
            definition: " SELECT id, email FROM users WHERE active = 1;".to_string(),
        };
        let mut diagnostics = Diagnostics::new();
        let sql = create_view_statement(&view, pair(Dialect::Sqlite, Dialect::Sqlite), &mut diagnostics);
        assert_eq!(
            sql.as_deref(),
            Some("CREATE VIEW IF NOT EXISTS active_users AS SELECT id, email FROM users WHERE active = 1;")
        );
    }

    #[test]
    fn test_view_with_dialect_function_skipped() {
        let view = ViewDescriptor {
            name: "user_names".to_string(),
            definition: "select group_concat(`name`) from `users`".to_string(),
        };
        let mut diagnostics = Diagnostics::new();
        assert!(create_view_statement(&view, pair(Dialect::Mysql, Dialect::Postgresql), &mut diagnostics).is_none());
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::SkippedView { .. })
        ));

        let mut diagnostics = Diagnostics::new();
        assert!(create_view_statement(&view, pair(Dialect::Mysql, Dialect::Mysql), &mut diagnostics).is_some());
    }

    #[test]
    fn test_portable_view_requoted() {
        let view = ViewDescriptor {
            name: "names".to_string(),
            definition: "select `name` from `users` where `name` <> 'it''s `x`'".to_string(),
        };
        let mut diagnostics = Diagnostics::new();
        let sql = create_view_statement(&view, pair(Dialect::Mysql, Dialect::Postgresql), &mut diagnostics)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE OR REPLACE VIEW \"names\" AS select \"name\" from \"users\" where \"name\" <> 'it''s `x`';"
        );
    }

    #[test]
    fn test_drop_statements() {
        assert_eq!(
            drop_table_statement("users", Dialect::Postgresql),
            "DROP TABLE IF EXISTS \"users\" CASCADE;"
        );
        assert_eq!(drop_table_statement("users", Dialect::Mysql), "DROP TABLE IF EXISTS `users`;");
        assert_eq!(drop_view_statement("v", Dialect::Sqlite), "DROP VIEW IF EXISTS v;");
    }
}
