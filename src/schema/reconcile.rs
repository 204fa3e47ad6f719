//! Schema reconciliation: diff a request's fields against the table's current shape.
//!
//! The reconciler only ever grows a table. It creates the table when it is missing, adds a
//! column for every new non-null field, and widens a column when an incoming value does not
//! fit its stored class. Nothing is dropped, renamed or narrowed.
//!
//! ## Widening
//!
//! SQLite cannot change a column's declared type in place, so all widenings of one plan are
//! rendered as a single rebuild:
//!
//! ```sql
//! CREATE TABLE "__rebuild_users" ("id" INTEGER PRIMARY KEY, "name" TEXT, "age" REAL);
//! INSERT INTO "__rebuild_users" ("id", "name", "age")
//!     SELECT "id", "name", CAST("age" AS REAL) FROM "users";
//! DROP TABLE "users";
//! ALTER TABLE "__rebuild_users" RENAME TO "users";
//! ```
//!
//! The executor runs these inside the request's write transaction.

use super::ident::{SHADOW_PREFIX, check_distinct, check_identifier, is_key_column, quote};
use super::snapshot::{ColumnDef, TableSchema};
use super::storage_class::StorageClass;
use super::value::FieldMap;
use crate::error::SchemaGenError;

/// A single schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create the table with its surrogate key and the given columns.
    CreateTable { columns: Vec<ColumnDef> },
    /// Add a new nullable column.
    AddColumn(ColumnDef),
    /// Change a column's class to a more general one.
    WidenColumn {
        name: String,
        from: StorageClass,
        to: StorageClass,
    },
}

/// Ordered changes for one resource plus the schema they lead to.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    resource: String,
    changes: Vec<Change>,
    target: TableSchema,
}

impl Plan {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Schema of the table after the plan has run.
    pub fn target(&self) -> &TableSchema {
        &self.target
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// DDL statements in execution order.
    pub fn statements(&self) -> Vec<String> {
        let table = quote(&self.resource);
        let mut stmts = Vec::new();
        let mut widened = Vec::new();

        for change in &self.changes {
            match change {
                Change::CreateTable { columns } => {
                    stmts.push(format!("CREATE TABLE {table} ({})", column_list(columns)));
                }
                Change::AddColumn(column) => {
                    stmts.push(format!("ALTER TABLE {table} ADD COLUMN {}", column.to_sql()));
                }
                Change::WidenColumn { name, to, .. } => widened.push((name.as_str(), *to)),
            }
        }

        if !widened.is_empty() {
            stmts.extend(self.rebuild_statements(&widened));
        }
        stmts
    }

    fn rebuild_statements(&self, widened: &[(&str, StorageClass)]) -> Vec<String> {
        let table = quote(&self.resource);
        let shadow = quote(&format!("{SHADOW_PREFIX}rebuild_{}", self.resource));
        let columns = self.target.columns();

        let names = columns
            .iter()
            .map(|c| quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let exprs = columns
            .iter()
            .map(|c| match widened.iter().find(|(name, _)| name.eq_ignore_ascii_case(&c.name)) {
                Some((_, to)) => format!("CAST({} AS {})", quote(&c.name), to.sql_type()),
                None => quote(&c.name),
            })
            .collect::<Vec<_>>()
            .join(", ");

        vec![
            format!("CREATE TABLE {shadow} ({})", column_list(columns)),
            format!("INSERT INTO {shadow} ({names}) SELECT {exprs} FROM {table}"),
            format!("DROP TABLE {table}"),
            format!("ALTER TABLE {shadow} RENAME TO {table}"),
        ]
    }
}

fn column_list(columns: &[ColumnDef]) -> String {
    columns
        .iter()
        .map(ColumnDef::to_sql)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Computes the changes needed before `fields` can be written to `resource`.
///
/// All names are checked first; an invalid one, or two that differ only by case, fails the
/// whole call before any change is produced. Field names match existing columns without
/// regard to case and widenings keep the stored spelling. Null values never produce changes. Primary key columns are never altered.
pub fn reconcile(
    resource: &str,
    fields: &FieldMap,
    current: &TableSchema,
) -> Result<Plan, SchemaGenError> {
    check_identifier(resource)?;
    for name in fields.keys() {
        check_identifier(name)?;
    }
    check_distinct(fields.keys().map(String::as_str))?;

    let mut changes = Vec::new();

    if !current.exists() {
        let columns = std::iter::once(ColumnDef::key())
            .chain(
                fields
                    .iter()
                    .filter(|(name, value)| !is_key_column(name) && !value.is_null())
                    .map(|(name, value)| ColumnDef::new(name, value.storage_class())),
            )
            .collect();
        changes.push(Change::CreateTable { columns });
    } else {
        let mut widenings = Vec::new();
        for (name, value) in fields {
            if value.is_null() {
                continue;
            }
            let incoming = value.storage_class();
            match current.column(name) {
                None => changes.push(Change::AddColumn(ColumnDef::new(name, incoming))),
                Some(column) if column.primary_key => {}
                Some(column) => {
                    if let Some(to) = column.class.widening_for(incoming) {
                        widenings.push(Change::WidenColumn {
                            name: column.name.clone(),
                            from: column.class,
                            to,
                        });
                    }
                }
            }
        }
        changes.extend(widenings);
    }

    let target = current.apply(&changes);
    Ok(Plan {
        resource: resource.to_string(),
        changes,
        target,
    })
}
