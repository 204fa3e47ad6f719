use backon::ExponentialBuilder;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::retry::with_conflict_retry;
use crate::config::EngineConfig;
use crate::error::SchemaGenError;
use crate::schema::ident::quote;
use crate::schema::snapshot::{introspect, list_tables};
use crate::schema::{
    ColumnDef, FieldMap, FieldValue, KEY_COLUMN, Plan, StorageClass, TableSchema,
    check_distinct, check_identifier, is_key_column, reconcile,
};

/// One stored row: column name -> value, in column order.
pub type Record = FieldMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub id: i64,
    /// DDL executed before the insert.
    pub ddl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub id: i64,
    pub ddl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub name: String,
    pub sql: String,
    pub schema: TableSchema,
}

/// Runs CRUD operations against one SQLite database, reconciling the schema first.
///
/// Every write runs in a `BEGIN IMMEDIATE` transaction: the catalog is read, DDL is applied
/// and the row is written while holding the database's write lock, and everything is rolled
/// back together on failure. A write that loses a schema race is retried from scratch.
pub struct Executor {
    pool: SqlitePool,
    retry_policy: ExponentialBuilder,
}

impl Executor {
    pub async fn connect(database_url: &str, cfg: &EngineConfig) -> Result<Self, SchemaGenError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(cfg.busy_timeout())
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;

        info!(database_url, "schema engine connected");
        Ok(Self::with_pool(pool, cfg.conflict_retry_policy()))
    }

    pub fn with_pool(pool: SqlitePool, retry_policy: ExponentialBuilder) -> Self {
        Self { pool, retry_policy }
    }

    /// Inserts one record, creating the table and columns it needs.
    pub async fn create(
        &self,
        resource: &str,
        fields: &FieldMap,
    ) -> Result<CreateOutcome, SchemaGenError> {
        check_write(resource, fields)?;
        match fields.iter().find(|(name, _)| is_key_column(name)) {
            None | Some((_, FieldValue::Null | FieldValue::Integer(_))) => {}
            Some((name, _)) => {
                return Err(SchemaGenError::UnsupportedValue {
                    field: name.clone(),
                    reason: "the surrogate key must be an integer".to_string(),
                });
            }
        }

        let pool = &self.pool;
        with_conflict_retry(self.retry_policy, "create", resource, move || {
            create_once(pool, resource, fields)
        })
        .await
    }

    /// Returns every record matching all `filters` (equality; null matches `IS NULL`).
    ///
    /// A missing table or a filter on a missing column yields no records. Filter names match
    /// columns without regard to ASCII case.
    pub async fn read(
        &self,
        resource: &str,
        filters: &FieldMap,
    ) -> Result<Vec<Record>, SchemaGenError> {
        check_identifier(resource)?;
        for name in filters.keys() {
            check_identifier(name)?;
        }

        let mut conn = self.pool.acquire().await?;
        let schema = introspect(&mut conn, resource).await?;
        if !schema.exists() {
            debug!(resource, "read on missing resource");
            return Ok(Vec::new());
        }
        if let Some(missing) = filters.keys().find(|name| !schema.has_column(name)) {
            debug!(resource, column = %missing, "read filters on missing column");
            return Ok(Vec::new());
        }

        let columns = schema.columns();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns
                .iter()
                .map(|c| quote(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            quote(resource)
        );

        let mut conditions = Vec::with_capacity(filters.len());
        let mut binds = Vec::with_capacity(filters.len());
        for (name, value) in filters {
            if value.is_null() {
                conditions.push(format!("{} IS NULL", quote(name)));
            } else {
                conditions.push(format!("{} = ?", quote(name)));
                let class = schema.class_of(name).unwrap_or(StorageClass::Unknown);
                binds.push(value.clone().coerce_for(class));
            }
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = bind_value(query, value);
        }
        let rows = query.fetch_all(&mut *conn).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(decode_row(row, columns)?);
        }
        debug!(resource, matched = records.len(), "records read");
        Ok(records)
    }

    /// Updates the columns named in `fields` on record `id`. Never inserts.
    pub async fn update(
        &self,
        resource: &str,
        id: i64,
        fields: &FieldMap,
    ) -> Result<UpdateOutcome, SchemaGenError> {
        check_write(resource, fields)?;
        if let Some(name) = fields.keys().find(|name| is_key_column(name)) {
            return Err(SchemaGenError::InvalidIdentifier {
                name: name.clone(),
                reason: "the surrogate key cannot be updated",
            });
        }

        let pool = &self.pool;
        with_conflict_retry(self.retry_policy, "update", resource, move || {
            update_once(pool, resource, id, fields)
        })
        .await
    }

    /// Removes record `id`. The table and its columns stay.
    pub async fn delete(&self, resource: &str, id: i64) -> Result<i64, SchemaGenError> {
        check_identifier(resource)?;

        let mut tx = begin_immediate(&self.pool).await?;
        let res = delete_in_scope(&mut tx, resource, id).await;
        commit_or_rollback(tx, res).await
    }

    /// Every user table with its `CREATE` statement and introspected columns.
    pub async fn describe(&self) -> Result<Vec<TableDescription>, SchemaGenError> {
        let mut conn = self.pool.acquire().await?;
        let tables = list_tables(&mut conn).await?;

        let mut out = Vec::with_capacity(tables.len());
        for (name, sql) in tables {
            let schema = introspect(&mut conn, &name).await?;
            out.push(TableDescription { name, sql, schema });
        }
        Ok(out)
    }
}

fn check_write(resource: &str, fields: &FieldMap) -> Result<(), SchemaGenError> {
    check_identifier(resource)?;
    for name in fields.keys() {
        check_identifier(name)?;
    }
    check_distinct(fields.keys().map(String::as_str))
}

async fn create_once(
    pool: &SqlitePool,
    resource: &str,
    fields: &FieldMap,
) -> Result<CreateOutcome, SchemaGenError> {
    let mut tx = begin_immediate(pool).await?;
    let res = create_in_scope(&mut tx, resource, fields).await;
    commit_or_rollback(tx, res).await
}

async fn create_in_scope(
    conn: &mut SqliteConnection,
    resource: &str,
    fields: &FieldMap,
) -> Result<CreateOutcome, SchemaGenError> {
    let current = introspect(conn, resource).await?;
    let plan = reconcile(resource, fields, &current)?;
    let ddl = apply_plan(conn, &plan).await?;
    let target = plan.target();

    let values: Vec<(&str, FieldValue)> = fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(name, value)| {
            target
                .column(name)
                .map(|column| (column.name.as_str(), value.clone().coerce_for(column.class)))
        })
        .collect();

    let table = quote(resource);
    let sql = if values.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        let names = values
            .iter()
            .map(|(name, _)| quote(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; values.len()].join(", ");
        format!("INSERT INTO {table} ({names}) VALUES ({placeholders})")
    };

    let mut query = sqlx::query(&sql);
    for (_, value) in values {
        query = bind_value(query, value);
    }
    let id = query.execute(&mut *conn).await?.last_insert_rowid();

    debug!(resource, id, ddl = ddl.len(), "record created");
    Ok(CreateOutcome { id, ddl })
}

async fn update_once(
    pool: &SqlitePool,
    resource: &str,
    id: i64,
    fields: &FieldMap,
) -> Result<UpdateOutcome, SchemaGenError> {
    let mut tx = begin_immediate(pool).await?;
    let res = update_in_scope(&mut tx, resource, id, fields).await;
    commit_or_rollback(tx, res).await
}

async fn update_in_scope(
    conn: &mut SqliteConnection,
    resource: &str,
    id: i64,
    fields: &FieldMap,
) -> Result<UpdateOutcome, SchemaGenError> {
    let not_found = || SchemaGenError::RecordNotFound {
        resource: resource.to_string(),
        id,
    };

    // Existence is checked before reconciling so a missing row never leaves DDL behind.
    let current = introspect(conn, resource).await?;
    if !current.exists() || !row_exists(conn, resource, id).await? {
        return Err(not_found());
    }

    let plan = reconcile(resource, fields, &current)?;
    let ddl = apply_plan(conn, &plan).await?;
    let target = plan.target();

    let assignments: Vec<(&str, FieldValue)> = fields
        .iter()
        .filter_map(|(name, value)| {
            target
                .column(name)
                .map(|column| (column.name.as_str(), value.clone().coerce_for(column.class)))
        })
        .collect();
    if assignments.is_empty() {
        return Ok(UpdateOutcome { id, ddl });
    }

    let set_list = assignments
        .iter()
        .map(|(name, _)| format!("{} = ?", quote(name)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {set_list} WHERE {} = ?",
        quote(resource),
        quote(KEY_COLUMN)
    );

    let mut query = sqlx::query(&sql);
    for (_, value) in assignments {
        query = bind_value(query, value);
    }
    let affected = query.bind(id).execute(&mut *conn).await?.rows_affected();
    if affected == 0 {
        return Err(not_found());
    }

    debug!(resource, id, ddl = ddl.len(), "record updated");
    Ok(UpdateOutcome { id, ddl })
}

async fn delete_in_scope(
    conn: &mut SqliteConnection,
    resource: &str,
    id: i64,
) -> Result<i64, SchemaGenError> {
    let not_found = || SchemaGenError::RecordNotFound {
        resource: resource.to_string(),
        id,
    };

    if !introspect(conn, resource).await?.exists() {
        return Err(not_found());
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote(resource),
        quote(KEY_COLUMN)
    );
    let affected = sqlx::query(&sql)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(not_found());
    }

    debug!(resource, id, "record deleted");
    Ok(id)
}

async fn row_exists(
    conn: &mut SqliteConnection,
    resource: &str,
    id: i64,
) -> Result<bool, SchemaGenError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)",
        quote(resource),
        quote(KEY_COLUMN)
    );
    let exists: i64 = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists != 0)
}

/// Executes the plan's DDL and returns the statements that ran.
async fn apply_plan(
    conn: &mut SqliteConnection,
    plan: &Plan,
) -> Result<Vec<String>, SchemaGenError> {
    let statements = plan.statements();
    for stmt in &statements {
        sqlx::query(stmt.as_str())
            .persistent(false)
            .execute(&mut *conn)
            .await?;
    }

    if !plan.is_empty() {
        info!(
            resource = plan.resource(),
            changes = ?plan.changes(),
            statements = statements.len(),
            "schema reconciled"
        );
    }
    Ok(statements)
}

/// Opens a write transaction holding the database's write lock.
///
/// The returned transaction rolls back when dropped uncommitted, so its connection never
/// goes back to the pool mid-transaction.
async fn begin_immediate(
    pool: &SqlitePool,
) -> Result<Transaction<'static, Sqlite>, SchemaGenError> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Commits on success, rolls back on failure.
async fn commit_or_rollback<T>(
    tx: Transaction<'static, Sqlite>,
    res: Result<T, SchemaGenError>,
) -> Result<T, SchemaGenError> {
    match res {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: FieldValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        FieldValue::Integer(i) => query.bind(i),
        FieldValue::Real(r) => query.bind(r),
        FieldValue::Text(s) => query.bind(s),
        FieldValue::Blob(b) => query.bind(b),
        FieldValue::Null => query.bind(None::<i64>),
    }
}

/// Decodes a row per each column's class; the store converts on read if needed.
fn decode_row(row: &SqliteRow, columns: &[ColumnDef]) -> Result<Record, SchemaGenError> {
    let mut record = Record::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let value = match column.class {
            StorageClass::Integer => row
                .try_get_unchecked::<Option<i64>, _>(idx)?
                .map(FieldValue::Integer),
            StorageClass::Real => row
                .try_get_unchecked::<Option<f64>, _>(idx)?
                .map(FieldValue::Real),
            // Text widened from a blob column may hold bytes that are not UTF-8.
            StorageClass::Text => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(idx)?
                .map(|bytes| FieldValue::Text(String::from_utf8_lossy(&bytes).into_owned())),
            StorageClass::Blob | StorageClass::Unknown => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(idx)?
                .map(FieldValue::Blob),
        };
        record.insert(column.name.clone(), value.unwrap_or(FieldValue::Null));
    }
    Ok(record)
}
