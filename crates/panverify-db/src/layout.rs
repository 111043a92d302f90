//! SQL text for a configured table layout.
//!
//! Table and column names are deployment configuration, so statements cannot
//! use `sqlx::query!`. Every name goes through [`Dialect::quote_ident`]
//! before it is spliced in; values are always bound.

use panverify_core::config::is_implicit_rowid;
use panverify_core::types::IDENTIFIER_TRIM_CHARS;
use panverify_core::{ColumnMap, SortOrder, TableConfig};

/// SQL flavour of a record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `SQLite` / `SQLCipher`
    Sqlite,
    /// `MySQL` / `MariaDB`
    MySql,
}

impl Dialect {
    /// Dialect named by the scheme of a connection URL.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':')?.0.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Self::Sqlite),
            "mysql" | "mariadb" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Quote an SQL identifier, doubling embedded quote characters.
    #[must_use]
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Self::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// SQL expression normalizing `column` like `Pan::normalize`.
    ///
    /// `MySQL`'s `TRIM` only strips spaces there; tabs and line breaks
    /// around a stored identifier prevent a match.
    #[must_use]
    pub fn normalized_expr(self, column: &str) -> String {
        match self {
            Self::Sqlite => {
                let codes: Vec<String> = IDENTIFIER_TRIM_CHARS
                    .iter()
                    .map(|c| u32::from(*c).to_string())
                    .collect();
                format!("UPPER(TRIM({column}, char({})))", codes.join(", "))
            }
            Self::MySql => format!("UPPER(TRIM({column}))"),
        }
    }

    /// Whether `column` is an implicit row id this dialect provides.
    #[must_use]
    pub fn is_implicit_key(self, column: &str) -> bool {
        self == Self::Sqlite && is_implicit_rowid(column)
    }

    fn text(self, expr: &str) -> String {
        match self {
            Self::Sqlite => format!("CAST({expr} AS TEXT)"),
            Self::MySql => format!("CAST({expr} AS CHAR)"),
        }
    }

    fn integer(self, expr: &str) -> String {
        match self {
            Self::Sqlite => format!("CAST({expr} AS INTEGER)"),
            Self::MySql => format!("CAST({expr} AS SIGNED)"),
        }
    }

    fn real(self, expr: &str) -> String {
        match self {
            Self::Sqlite => format!("CAST({expr} AS REAL)"),
            Self::MySql => format!("CAST({expr} AS DOUBLE)"),
        }
    }

    /// Column name quoted unless it is the implicit row id.
    fn column(self, name: &str) -> String {
        if self.is_implicit_key(name) {
            // Quoting would hide the alias if a real column shadows it.
            name.to_string()
        } else {
            self.quote_ident(name)
        }
    }
}

/// Pre-quoted names for one table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    dialect: Dialect,
    table_name: String,
    columns: ColumnMap,
    table: String,
    key: String,
    identifier: String,
    priority: Option<String>,
    valid: String,
    message: String,
    checked_at: String,
}

impl TableLayout {
    /// Build the layout for a table configuration.
    #[must_use]
    pub fn new(dialect: Dialect, config: &TableConfig) -> Self {
        let columns = config.columns.clone();
        let quote = |name: &str| dialect.quote_ident(name);
        Self {
            dialect,
            table_name: config.name.clone(),
            table: quote(&config.name),
            key: dialect.column(&columns.key),
            identifier: quote(&columns.identifier),
            priority: columns.priority.as_deref().map(quote),
            valid: quote(&columns.valid),
            message: quote(&columns.message),
            checked_at: quote(&columns.checked_at),
            columns,
        }
    }

    /// SQL flavour the statements are written in.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Columns the schema check must find, `extra` included.
    #[must_use]
    pub fn required_columns<'a>(&'a self, extra: &[&'a str]) -> Vec<&'a str> {
        let mut required = self.columns.required_columns();
        if is_implicit_rowid(&self.columns.key) && !self.dialect.is_implicit_key(&self.columns.key)
        {
            required.insert(0, self.columns.key.as_str());
        }
        required.extend(extra.iter().copied());
        required.retain(|c| !self.dialect.is_implicit_key(c));
        required
    }

    /// Unquoted table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Column mapping this layout was built from.
    #[must_use]
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Everything up to the optional exclusion filter.
    ///
    /// The caller appends `AND key NOT IN (...)` if needed, then
    /// [`TableLayout::order_clause`] and the paging binds.
    #[must_use]
    pub fn select_head(&self) -> String {
        let d = self.dialect;
        let priority = self
            .priority
            .as_ref()
            .map_or_else(|| "NULL".to_string(), |p| d.real(p));
        format!(
            "SELECT {key} AS rec_key, \
                    {ident} AS rec_identifier, \
                    {priority} AS rec_priority, \
                    {valid} AS rec_valid, \
                    {message} AS rec_message, \
                    {checked} AS rec_checked \
             FROM {table} \
             WHERE {raw_message} IS NULL",
            key = self.key,
            ident = d.text(&self.identifier),
            valid = d.integer(&self.valid),
            message = d.text(&self.message),
            checked = d.text(&self.checked_at),
            table = self.table,
            raw_message = self.message,
        )
    }

    /// Start of the exclusion filter; close it with `)`.
    #[must_use]
    pub fn exclusion_open(&self) -> String {
        format!(" AND {} NOT IN (", self.key)
    }

    /// Ordering clause with the key as tie-breaker.
    #[must_use]
    pub fn order_clause(&self, order_by: &str, direction: SortOrder) -> String {
        let order_column = self.dialect.column(order_by);
        format!(
            " ORDER BY {order_column} {dir}, {key} ASC",
            dir = direction.as_sql(),
            key = self.key,
        )
    }

    /// Update statement matching one row by key.
    ///
    /// Binds: validity, message, checked-at, key.
    #[must_use]
    pub fn update_by_key(&self) -> String {
        format!(
            "UPDATE {table} SET {valid} = ?, {message} = ?, {checked} = ? WHERE {key} = ?",
            table = self.table,
            valid = self.valid,
            message = self.message,
            checked = self.checked_at,
            key = self.key,
        )
    }

    /// Update statement matching every row with the same normalized identifier.
    ///
    /// Binds: validity, message, checked-at, normalized identifier.
    #[must_use]
    pub fn update_by_identifier(&self) -> String {
        format!(
            "UPDATE {table} SET {valid} = ?, {message} = ?, {checked} = ? WHERE {matcher} = ?",
            table = self.table,
            valid = self.valid,
            message = self.message,
            checked = self.checked_at,
            matcher = self.dialect.normalized_expr(&self.identifier),
        )
    }

    /// Aggregate counts: total, unchecked, valid, invalid.
    #[must_use]
    pub fn counts(&self) -> String {
        let d = self.dialect;
        let tally = |condition: String| {
            d.integer(&format!(
                "COALESCE(SUM(CASE WHEN {condition} THEN 1 ELSE 0 END), 0)"
            ))
        };
        format!(
            "SELECT {total}, {unchecked}, {valid}, {invalid} FROM {table}",
            total = d.integer("COUNT(*)"),
            unchecked = tally(format!("{m} IS NULL", m = self.message)),
            valid = tally(format!(
                "{m} IS NOT NULL AND {v} = 1",
                m = self.message,
                v = self.valid
            )),
            invalid = tally(format!(
                "{m} IS NOT NULL AND ({v} IS NULL OR {v} <> 1)",
                m = self.message,
                v = self.valid
            )),
            table = self.table,
        )
    }
}
