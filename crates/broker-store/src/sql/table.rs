//! Table name validation and statement text.

use std::fmt;

use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;

/// PostgreSQL's identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Prefix of the table name derived from a store id.
const DEFAULT_PREFIX: &str = "broker_";

/// A validated, unquoted table identifier.
///
/// Only ASCII letters, digits and underscores are allowed, and the name must
/// not start with a digit, so it can be interpolated into statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Validate an explicitly configured table name.
    pub fn parse(name: &str) -> BrokerResult<Self> {
        let valid = !name.is_empty()
            && name.len() <= MAX_IDENTIFIER_LEN
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(BrokerError::configuration(format!(
                "Invalid table name '{name}': use letters, digits and underscores"
            )));
        }
        Ok(Self(name.to_ascii_lowercase()))
    }

    /// Derive a table name from a store id, replacing anything that is not
    /// a letter or digit with an underscore.
    pub fn for_store(store_id: &str) -> BrokerResult<Self> {
        let sanitized: String = store_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let mut name = format!("{DEFAULT_PREFIX}{sanitized}");
        name.truncate(MAX_IDENTIFIER_LEN);
        Self::parse(&name)
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn create_statements(&self) -> [String; 2] {
        let t = &self.0;
        [
            format!(
                "CREATE TABLE IF NOT EXISTS {t} (\
                 key TEXT PRIMARY KEY, \
                 value JSONB NOT NULL, \
                 stored_at TIMESTAMPTZ NOT NULL)"
            ),
            format!("CREATE INDEX IF NOT EXISTS {t}_stored_at_idx ON {t} (stored_at)"),
        ]
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Statement text for one table, built once at init.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub select_value: String,
    pub select_all: String,
    pub select_stamp: String,
    pub count: String,
    pub exists: String,
    pub insert_only: String,
    pub upsert: String,
    pub update: String,
    pub delete: String,
    pub delete_all: String,
    pub delete_older: String,
}

impl Statements {
    pub(crate) fn new(table: &TableName) -> Self {
        let t = table.as_str();
        Self {
            select_value: format!("SELECT value FROM {t} WHERE key = $1"),
            select_all: format!("SELECT key, value FROM {t}"),
            select_stamp: format!("SELECT stored_at FROM {t} WHERE key = $1"),
            count: format!("SELECT COUNT(*) FROM {t}"),
            exists: format!("SELECT EXISTS (SELECT 1 FROM {t} WHERE key = $1)"),
            insert_only: format!(
                "INSERT INTO {t} (key, value, stored_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (key) DO NOTHING"
            ),
            upsert: format!(
                "INSERT INTO {t} (key, value, stored_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, stored_at = EXCLUDED.stored_at"
            ),
            update: format!("UPDATE {t} SET value = $2, stored_at = $3 WHERE key = $1"),
            delete: format!("DELETE FROM {t} WHERE key = $1"),
            delete_all: format!("DELETE FROM {t}"),
            delete_older: format!("DELETE FROM {t} WHERE stored_at < $1"),
        }
    }
}
