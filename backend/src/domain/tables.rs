//! Table identifiers and the tracked table set.
//!
//! Table names travel from untrusted HTTP payloads into SQL, so the only way
//! to obtain a [`TableName`] is through validation: a lowercase identifier of
//! at most 63 bytes (the PostgreSQL identifier limit).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Longest identifier PostgreSQL accepts without truncation.
pub const MAX_TABLE_NAME_LEN: usize = 63;

/// Tables the relay polls and snapshots unless configuration narrows the set.
///
/// Every entry must carry an `updated_at` mutation timestamp column.
pub const DEFAULT_TRACKED_TABLES: [&str; 8] = [
    "announcements",
    "comreqs",
    "emergencies",
    "faqs",
    "feedback",
    "visitor_logs",
    "officials",
    "users",
];

/// One relational table row, rendered as a JSON object.
pub type Row = serde_json::Value;

/// Validation failures for [`TableName`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableNameError {
    #[error("table name must not be empty")]
    Empty,
    #[error("table name must be at most {MAX_TABLE_NAME_LEN} bytes, got {length}")]
    TooLong { length: usize },
    #[error("table name `{name}` must match [a-z_][a-z0-9_]*")]
    InvalidCharacters { name: String },
}

/// Validated relational table identifier.
///
/// # Examples
/// ```
/// use villagelink::domain::TableName;
///
/// let table = TableName::new("announcements").expect("valid table");
/// assert_eq!(table.quoted(), "\"announcements\"");
/// assert!(TableName::new("users; drop table users").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Validate and wrap a table identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, TableNameError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TableNameError::Empty);
        }
        if value.len() > MAX_TABLE_NAME_LEN {
            return Err(TableNameError::TooLong {
                length: value.len(),
            });
        }
        if !is_identifier(&value) {
            return Err(TableNameError::InvalidCharacters { name: value });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier ready for interpolation into SQL.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered, duplicate-free set of tables the relay polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTables(Vec<TableName>);

impl TrackedTables {
    /// Build a set from validated names, keeping first-seen order.
    pub fn new(tables: impl IntoIterator<Item = TableName>) -> Self {
        let mut unique: Vec<TableName> = Vec::new();
        for table in tables {
            if !unique.contains(&table) {
                unique.push(table);
            }
        }
        Self(unique)
    }

    /// Parse a comma-separated list such as `"announcements, faqs"`.
    ///
    /// Blank segments are ignored.
    pub fn parse_list(raw: &str) -> Result<Self, TableNameError> {
        raw.split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(TableName::new)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn contains(&self, table: &TableName) -> bool {
        self.0.contains(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableName> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TrackedTables {
    fn default() -> Self {
        // The constant list is checked by `default_tables_are_valid_identifiers`.
        Self::new(
            DEFAULT_TRACKED_TABLES
                .iter()
                .map(|name| TableName((*name).to_owned())),
        )
    }
}
