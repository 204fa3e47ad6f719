use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::FieldValue;

/// Column-level type category used for DDL typing.
///
/// `Unknown` is what a null infers to. It never appears as a declared column type and acts as
/// the identity element of [`StorageClass::widen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Integer,
    Real,
    Text,
    Blob,
    Unknown,
}

impl StorageClass {
    /// Narrowest class able to hold `value`.
    pub fn infer(value: &FieldValue) -> Self {
        match value {
            FieldValue::Integer(_) => StorageClass::Integer,
            FieldValue::Real(_) => StorageClass::Real,
            FieldValue::Text(_) => StorageClass::Text,
            FieldValue::Blob(_) => StorageClass::Blob,
            FieldValue::Null => StorageClass::Unknown,
        }
    }

    /// Most general of the two classes.
    ///
    /// `integer < real < text`. `blob` only joins with itself (or `unknown`); any other
    /// combination involving it collapses to `text`.
    pub fn widen(self, other: Self) -> Self {
        use StorageClass::*;
        match (self, other) {
            (Unknown, c) | (c, Unknown) => c,
            (a, b) if a == b => a,
            (Integer, Real) | (Real, Integer) => Real,
            _ => Text,
        }
    }

    /// Class the stored column must be widened to so it can hold `incoming`, if any.
    pub fn widening_for(self, incoming: Self) -> Option<Self> {
        let joined = self.widen(incoming);
        (joined != self).then_some(joined)
    }

    /// Keyword used when declaring a column of this class.
    pub fn sql_type(self) -> &'static str {
        match self {
            StorageClass::Integer => "INTEGER",
            StorageClass::Real => "REAL",
            StorageClass::Text => "TEXT",
            // A column declared without a type has BLOB (none) affinity.
            StorageClass::Blob | StorageClass::Unknown => "BLOB",
        }
    }

    /// Maps a declared column type from the catalog to a class, following SQLite's
    /// affinity rules (section 3.1 of the datatype docs). NUMERIC affinity maps to `Real`.
    pub fn from_declared(decl: &str) -> Self {
        let upper = decl.to_ascii_uppercase();
        if upper.contains("INT") {
            StorageClass::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            StorageClass::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            StorageClass::Blob
        } else {
            StorageClass::Real
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageClass::Integer => "integer",
            StorageClass::Real => "real",
            StorageClass::Text => "text",
            StorageClass::Blob => "blob",
            StorageClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
