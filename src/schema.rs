// ABOUTME: Introspected schema model shared by drivers and the dump generator
// ABOUTME: Also hosts the single column classification function, including the boolean heuristic

use crate::dialect::Dialect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type as reported by the source, e.g. `varchar(255)`, `tinyint(1)`, `_int4`
    pub native_type: String,
    pub max_length: Option<u32>,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_auto_increment: bool,
    /// Raw default expression as reported by the source
    pub default: Option<String>,
}

impl ColumnDescriptor {
    /// Nullable, non-key column with the given native type
    pub fn new(name: &str, native_type: &str) -> Self {
        Self {
            name: name.to_string(),
            native_type: native_type.to_string(),
            max_length: parse_type_length(native_type),
            nullable: true,
            is_primary_key: false,
            is_unique: false,
            is_auto_increment: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn with_max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Descriptor for the elements of an array column
    pub fn element_descriptor(&self) -> ColumnDescriptor {
        let element_type = array_element_type(&self.native_type).unwrap_or("text");
        ColumnDescriptor::new(&self.name, element_type)
    }
}

/// Directed foreign key edge: `child_table.child_column -> parent_table.parent_column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyEdge {
    pub name: String,
    pub child_table: String,
    pub parent_table: String,
    pub child_column: String,
    pub parent_column: String,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKeyEdge {
    pub fn new(child_table: &str, child_column: &str, parent_table: &str, parent_column: &str) -> Self {
        Self {
            name: format!("fk_{}_{}", child_table, child_column),
            child_table: child_table.to_string(),
            parent_table: parent_table.to_string(),
            child_column: child_column.to_string(),
            parent_column: parent_column.to_string(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn on_delete(mut self, action: &str) -> Self {
        self.on_delete = Some(action.to_string());
        self
    }

    pub fn is_self_reference(&self) -> bool {
        self.child_table == self.parent_table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub name: String,
    /// SELECT body of the view, without the CREATE VIEW prefix
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    /// Columns in source schema order
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key column names in key order
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyEdge>,
    /// Secondary indexes, unique or not; never the primary key
    pub indexes: Vec<IndexDescriptor>,
}

impl TableSchema {
    /// Build a table whose primary key is taken from the column flags
    pub fn new(name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            name: name.to_string(),
            columns,
            primary_key,
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_foreign_key(mut self, edge: ForeignKeyEdge) -> Self {
        self.foreign_keys.push(edge);
        self
    }

    pub fn with_index(mut self, name: &str, columns: &[&str], unique: bool) -> Self {
        self.indexes.push(IndexDescriptor {
            name: name.to_string(),
            table: self.name.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        });
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// The identity column, if the table has one
    pub fn identity_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_auto_increment)
    }

    /// Single integer primary key usable for keyset pagination
    pub fn integer_key(&self, source: Dialect) -> Option<&ColumnDescriptor> {
        if self.primary_key.len() != 1 {
            return None;
        }
        let column = self.column(&self.primary_key[0])?;
        (ColumnKind::classify(column, source) == ColumnKind::Integer).then_some(column)
    }
}

/// Semantic category of a column, derived from its native type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Timestamp,
    Date,
    Time,
    Binary,
    Json,
    Array(Box<ColumnKind>),
    Enum,
    Uuid,
    /// Type the exporter does not recognize; treated as text
    Unknown,
}

impl ColumnKind {
    /// Classify a column for conversion and DDL translation
    pub fn classify(column: &ColumnDescriptor, source: Dialect) -> ColumnKind {
        if is_boolean_column(column, source) {
            return ColumnKind::Boolean;
        }
        if array_element_type(&column.native_type).is_some() {
            let element = column.element_descriptor();
            return ColumnKind::Array(Box::new(ColumnKind::classify(&element, source)));
        }
        classify_base_type(&column.native_type)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ColumnKind::Text | ColumnKind::Unknown)
    }
}

/// Boolean detection, kept in one place so exact metadata can replace the
/// heuristic per engine
///
/// PostgreSQL reports a real boolean type and is trusted as-is. MySQL spells
/// booleans as `tinyint(1)` or `bit(1)`. SQLite keeps only the declared type
/// text, so an integer column declared with length 1 is taken as boolean.
pub fn is_boolean_column(column: &ColumnDescriptor, source: Dialect) -> bool {
    let base = base_type_name(&column.native_type);
    if base == "bool" || base == "boolean" {
        return true;
    }

    match source {
        Dialect::Postgresql => false,
        Dialect::Mysql => match base.as_str() {
            "tinyint" => parse_type_length(&column.native_type) == Some(1),
            "bit" => parse_type_length(&column.native_type).unwrap_or(1) == 1,
            _ => false,
        },
        Dialect::Sqlite => is_integer_type(&base) && column.max_length == Some(1),
    }
}

fn classify_base_type(native_type: &str) -> ColumnKind {
    let lower = native_type.trim().to_ascii_lowercase();
    let base = base_type_name(&lower);

    if lower.starts_with("enum(") || lower.starts_with("set(") || lower == "user-defined" {
        return ColumnKind::Enum;
    }
    if is_integer_type(&base) {
        return ColumnKind::Integer;
    }

    match base.as_str() {
        "real" | "float" | "float4" | "float8" | "double" | "double precision" => ColumnKind::Float,
        "numeric" | "decimal" | "money" | "number" => ColumnKind::Decimal,
        "char" | "character" | "varchar" | "character varying" | "nchar" | "nvarchar"
        | "varying character" | "native character" | "text" | "tinytext" | "mediumtext"
        | "longtext" | "clob" | "string" | "name" | "citext" | "bpchar" => ColumnKind::Text,
        "timestamp" | "datetime" | "timestamptz" | "timestamp without time zone"
        | "timestamp with time zone" => ColumnKind::Timestamp,
        "date" => ColumnKind::Date,
        "time" | "timetz" | "time without time zone" | "time with time zone" | "interval"
        | "year" => ColumnKind::Time,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" | "binary" | "varbinary"
        | "bit" | "bit varying" | "varbit" => ColumnKind::Binary,
        "json" | "jsonb" => ColumnKind::Json,
        "uuid" => ColumnKind::Uuid,
        _ => ColumnKind::Unknown,
    }
}

fn is_integer_type(base: &str) -> bool {
    matches!(
        base,
        "int"
            | "integer"
            | "tinyint"
            | "smallint"
            | "mediumint"
            | "bigint"
            | "int2"
            | "int4"
            | "int8"
            | "serial"
            | "smallserial"
            | "bigserial"
            | "big int"
    )
}

/// Lowercased type name with length/precision and modifiers stripped
///
/// `VARCHAR(255)` -> `varchar`, `int(10) unsigned` -> `int`,
/// `timestamp(6) with time zone` -> `timestamp with time zone`
pub fn base_type_name(native_type: &str) -> String {
    let lower = native_type.trim().to_ascii_lowercase();
    let without_args = match (lower.find('('), lower.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            format!("{}{}", &lower[..open], &lower[close + 1..])
        }
        _ => lower,
    };
    without_args
        .split_whitespace()
        .filter(|word| !matches!(*word, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// First numeric argument of a type, e.g. 255 in `varchar(255)`
pub fn parse_type_length(native_type: &str) -> Option<u32> {
    let open = native_type.find('(')?;
    let close = native_type[open..].find(')')? + open;
    native_type[open + 1..close]
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Precision and scale of a numeric type, e.g. (10, 2) in `numeric(10,2)`
pub fn parse_precision_scale(native_type: &str) -> Option<(u32, Option<u32>)> {
    let open = native_type.find('(')?;
    let close = native_type[open..].find(')')? + open;
    let mut parts = native_type[open + 1..close].split(',');
    let precision = parts.next()?.trim().parse().ok()?;
    let scale = parts.next().and_then(|s| s.trim().parse().ok());
    Some((precision, scale))
}

/// Element type name for array types (`_int4`, `integer[]`), None otherwise
pub fn array_element_type(native_type: &str) -> Option<&str> {
    let trimmed = native_type.trim();
    if let Some(element) = trimmed.strip_suffix("[]") {
        return Some(element.trim());
    }
    trimmed
        .strip_prefix('_')
        .filter(|element| !element.is_empty())
}
