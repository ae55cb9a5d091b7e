//! Statement and table safety guards
//!
//! `KeywordDenylist` is a case-insensitive substring check, not a SQL parser.
//! It can reject a harmless query that mentions a keyword inside a string
//! literal, and it misses destructive statements phrased differently
//! (`DROP  TABLE` with two spaces, `DROP VIEW`, ...). Callers reach it only
//! through `StatementGuard`, so a parser-based guard can replace it without
//! touching call sites.
//!
//! `TableAllowList` is the stricter guard for the generic insert/select
//! helpers: only listed tables are reachable.

use std::collections::HashSet;

use crate::error::PoolError;

/// Keywords rejected by the default statement guard
pub const DENIED_KEYWORDS: &[&str] = &[
    "CREATE TABLE",
    "DROP TABLE",
    "ALTER TABLE",
    "TRUNCATE",
    "DELETE FROM",
];

/// Decides whether a relational statement may run
pub trait StatementGuard: Send + Sync {
    fn check(&self, sql: &str) -> Result<(), PoolError>;
}

#[derive(Debug, Clone)]
pub struct KeywordDenylist {
    keywords: Vec<String>,
}

impl Default for KeywordDenylist {
    fn default() -> Self {
        Self::new(DENIED_KEYWORDS.iter().copied())
    }
}

impl KeywordDenylist {
    pub fn new<'a>(keywords: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            keywords: keywords.into_iter().map(str::to_uppercase).collect(),
        }
    }
}

impl StatementGuard for KeywordDenylist {
    fn check(&self, sql: &str) -> Result<(), PoolError> {
        let upper = sql.to_uppercase();
        match self.keywords.iter().find(|k| upper.contains(k.as_str())) {
            Some(keyword) => Err(PoolError::ForbiddenOperation(format!(
                "statement contains '{}'",
                keyword
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableAllowList {
    tables: HashSet<String>,
}

impl TableAllowList {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tables: tables
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn check(&self, table: &str) -> Result<(), PoolError> {
        if self.tables.contains(&table.to_lowercase()) && is_identifier(table) {
            Ok(())
        } else {
            Err(PoolError::ForbiddenTable(table.to_string()))
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject column names that cannot be spliced into a statement
pub fn check_column(name: &str) -> Result<(), PoolError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(PoolError::ForbiddenOperation(format!(
            "invalid column name '{}'",
            name
        )))
    }
}
