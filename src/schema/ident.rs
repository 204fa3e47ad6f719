use std::collections::HashSet;

use crate::error::SchemaGenError;

/// Surrogate key column created with every table.
pub const KEY_COLUMN: &str = "id";

/// Prefix of the engine's temporary tables; user names may not start with it.
pub const SHADOW_PREFIX: &str = "__";

const MAX_IDENTIFIER_LEN: usize = 64;

/// SQLite keywords, upper-cased and sorted for binary search.
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY",
    "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT", "NOTHING",
    "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS", "OUTER", "OVER",
    "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE", "RANGE",
    "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE", "RESTRICT",
    "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET", "TABLE",
    "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED", "UNION",
    "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE", "WINDOW",
    "WITH", "WITHOUT",
];

/// Names SQLite resolves to the rowid when no real column shadows them.
const ROWID_ALIASES: &[&str] = &["_ROWID_", "OID", "ROWID"];

/// Rejects any resource or field name that could not be embedded verbatim in DDL.
///
/// There is no sanitizing: a name is either used exactly as given or refused.
pub fn check_identifier(name: &str) -> Result<(), SchemaGenError> {
    let reject = |reason: &'static str| {
        Err(SchemaGenError::InvalidIdentifier {
            name: name.to_string(),
            reason,
        })
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return reject("empty"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return reject("must start with an ASCII letter or underscore");
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return reject("only ASCII letters, digits and underscores are allowed");
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return reject("longer than 64 bytes");
    }

    let upper = name.to_ascii_uppercase();
    if SQLITE_KEYWORDS.binary_search(&upper.as_str()).is_ok() {
        return reject("reserved keyword");
    }
    if ROWID_ALIASES.contains(&upper.as_str()) {
        return reject("rowid alias");
    }
    if upper.starts_with("SQLITE_") {
        return reject("reserved for the store's internal tables");
    }
    if name.starts_with(SHADOW_PREFIX) {
        return reject("reserved for engine tables");
    }
    Ok(())
}

/// Whether `name` addresses the surrogate key. SQLite ignores ASCII case in identifiers.
pub fn is_key_column(name: &str) -> bool {
    name.eq_ignore_ascii_case(KEY_COLUMN)
}

/// Rejects a set of names in which two entries differ only by ASCII case.
pub fn check_distinct<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), SchemaGenError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(SchemaGenError::InvalidIdentifier {
                name: name.to_string(),
                reason: "differs only by case from another field",
            });
        }
    }
    Ok(())
}

/// Double-quotes an already-checked identifier.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}
