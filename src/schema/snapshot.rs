use sqlx::SqliteConnection;

use super::ident::{KEY_COLUMN, quote};
use super::reconcile::Change;
use super::storage_class::StorageClass;
use crate::error::SchemaGenError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub class: StorageClass,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, class: StorageClass) -> Self {
        Self {
            name: name.into(),
            class,
            primary_key: false,
        }
    }

    pub fn key() -> Self {
        Self {
            name: KEY_COLUMN.to_string(),
            class: StorageClass::Integer,
            primary_key: true,
        }
    }

    /// Column definition as it appears inside `CREATE TABLE` / `ADD COLUMN`.
    pub(crate) fn to_sql(&self) -> String {
        if self.primary_key {
            format!("{} INTEGER PRIMARY KEY", quote(&self.name))
        } else {
            format!("{} {}", quote(&self.name), self.class.sql_type())
        }
    }
}

/// Introspected shape of one table. SQLite tables always have at least one column, so an
/// empty column list means the table does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Looks a column up the way SQLite resolves names, ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn class_of(&self, name: &str) -> Option<StorageClass> {
        self.column(name).map(|c| c.class)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Schema the table has once `changes` have been executed against it.
    pub fn apply(&self, changes: &[Change]) -> TableSchema {
        let mut next = self.clone();
        for change in changes {
            match change {
                Change::CreateTable { columns } => next.columns = columns.clone(),
                Change::AddColumn(column) => next.columns.push(column.clone()),
                Change::WidenColumn { name, to, .. } => {
                    let widened = next
                        .columns
                        .iter_mut()
                        .find(|c| c.name.eq_ignore_ascii_case(name));
                    if let Some(column) = widened {
                        column.class = *to;
                    }
                }
            }
        }
        next
    }
}

/// Reads the current columns of `table` from the catalog.
pub async fn introspect(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<TableSchema, SchemaGenError> {
    let rows: Vec<(String, String, i64)> =
        sqlx::query_as("SELECT name, type, pk FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

    Ok(TableSchema::from_columns(rows.into_iter().map(
        |(name, decl, pk)| ColumnDef {
            name,
            class: StorageClass::from_declared(&decl),
            primary_key: pk > 0,
        },
    )))
}

/// Every user-visible table with its stored `CREATE` statement, ordered by name.
/// Store-internal (`sqlite_*`) and engine shadow (`__*`) tables are skipped.
pub async fn list_tables(
    conn: &mut SqliteConnection,
) -> Result<Vec<(String, String)>, SchemaGenError> {
    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT name, sql
        FROM sqlite_master
        WHERE type = 'table'
          AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
          AND name NOT LIKE '\_\_%' ESCAPE '\'
        ORDER BY name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, sql)| (name, sql.unwrap_or_default()))
        .collect())
}
