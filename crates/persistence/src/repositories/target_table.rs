//! Access to the whitelisted target tables: column introspection, read-only
//! trial queries and transactional propagation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use domain::services::{ColumnWrite, TableWrite, WriteValue};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Column, Executor, PgConnection, PgPool, Row};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::metrics::QueryTimer;

/// Failure while writing a submission's mapped values.
#[derive(Debug, Error)]
pub enum PropagationStoreError {
    #[error("Target table '{0}' does not exist")]
    UnknownTable(String),

    #[error("Column '{column}' does not exist in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Mapping query for '{table}.{column}' failed: {message}")]
    MappingQuery {
        table: String,
        column: String,
        message: String,
    },

    #[error("Submission is no longer eligible for propagation")]
    NotEligible,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Result of a bounded read-only trial execution.
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub columns: Vec<String>,
    pub sample_row: Option<Map<String, Value>>,
}

/// Repository for the tables forms write into.
#[derive(Clone)]
pub struct TargetTableRepository {
    pool: PgPool,
}

impl TargetTableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Column names of a table in the current schema, in ordinal order.
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("target_table_columns");
        let mut conn = self.pool.acquire().await?;
        let result = fetch_columns(&mut *conn, table).await;
        timer.record();
        result
    }

    /// Runs `SELECT * FROM (<query>) LIMIT 1` in a read-only transaction that is always rolled back.
    ///
    /// When the query references `$1`, it is bound to NULL. An empty result
    /// still reports the statement's columns, without a sample row.
    pub async fn trial_select(
        &self,
        query: &str,
        timeout_ms: u64,
    ) -> Result<TrialResult, sqlx::Error> {
        let timer = QueryTimer::new("trial_select");
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout_ms))
            .execute(&mut *tx)
            .await?;

        let wrapped = format!("SELECT * FROM ({}) AS trial LIMIT 1", query);
        let mut statement = sqlx::query(&wrapped);
        if query.contains("$1") {
            statement = statement.bind(None::<String>);
        }
        let row = statement.fetch_optional(&mut *tx).await?;
        let Some(row) = row else {
            // No row to read names from; ask the server for the statement's shape.
            let described = (&mut *tx).describe(&wrapped).await?;
            tx.rollback().await?;
            timer.record();
            return Ok(TrialResult {
                columns: described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                sample_row: None,
            });
        };
        tx.rollback().await?;
        timer.record();

        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let sample_row = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), decode_column(&row, i)))
            .collect();
        Ok(TrialResult {
            columns,
            sample_row: Some(sample_row),
        })
    }

    /// Runs the plan's mapping queries and returns the plan with literal values only.
    ///
    /// Queries run in a read-only transaction with the statement timeout set,
    /// the submitted value bound as `$1` text, and the transaction is rolled back.
    pub async fn resolve_queries(
        &self,
        plan: &[TableWrite],
        timeout_ms: u64,
    ) -> Result<Vec<TableWrite>, PropagationStoreError> {
        let has_queries = plan
            .iter()
            .flat_map(|w| &w.columns)
            .any(|c| matches!(c.value, WriteValue::Query { .. }));
        if !has_queries {
            return Ok(plan.to_vec());
        }

        let timer = QueryTimer::new("resolve_mapping_queries");
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout_ms))
            .execute(&mut *tx)
            .await?;

        let mut resolved = Vec::with_capacity(plan.len());
        for write in plan {
            let mut columns = Vec::with_capacity(write.columns.len());
            for column in &write.columns {
                let value = match &column.value {
                    WriteValue::Value(v) => v.clone(),
                    WriteValue::Query { sql_query, param } => {
                        run_mapping_query(&mut *tx, sql_query, param)
                            .await
                            .map_err(|e| match e {
                                sqlx::Error::Database(db_err) => {
                                    PropagationStoreError::MappingQuery {
                                        table: write.table.clone(),
                                        column: column.column.clone(),
                                        message: db_err.message().to_string(),
                                    }
                                }
                                other => PropagationStoreError::Database(other),
                            })?
                    }
                };
                columns.push(ColumnWrite {
                    column: column.column.clone(),
                    value: WriteValue::Value(value),
                });
            }
            resolved.push(TableWrite {
                table: write.table.clone(),
                columns,
            });
        }

        tx.rollback().await?;
        timer.record();
        Ok(resolved)
    }

    /// Inserts one row per planned table and marks the submission processed, atomically.
    ///
    /// Mapping queries are resolved first, outside the write transaction (see
    /// [`Self::resolve_queries`]). Every column is checked against the table's
    /// introspected columns. Values are cast by PostgreSQL through
    /// `jsonb_populate_record`. Any failure rolls everything back.
    pub async fn propagate(
        &self,
        submission_id: Uuid,
        plan: &[TableWrite],
        statement_timeout_ms: u64,
    ) -> Result<usize, PropagationStoreError> {
        let plan = self.resolve_queries(plan, statement_timeout_ms).await?;

        let timer = QueryTimer::new("propagate_submission");
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("SET LOCAL statement_timeout = {}", statement_timeout_ms))
            .execute(&mut *tx)
            .await?;

        let mut written = 0;
        for write in &plan {
            if write.columns.is_empty() {
                continue;
            }
            let known = fetch_columns(&mut *tx, &write.table).await?;
            if known.is_empty() {
                return Err(PropagationStoreError::UnknownTable(write.table.clone()));
            }

            let mut record = Map::new();
            for column in &write.columns {
                if !known.iter().any(|k| k == &column.column) {
                    return Err(PropagationStoreError::UnknownColumn {
                        table: write.table.clone(),
                        column: column.column.clone(),
                    });
                }
                if let WriteValue::Value(v) = &column.value {
                    record.insert(column.column.clone(), v.clone());
                }
            }

            let column_list = write
                .columns
                .iter()
                .map(|c| format!("\"{}\"", c.column))
                .collect::<Vec<_>>()
                .join(", ");
            let insert = format!(
                r#"INSERT INTO "{table}" ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::"{table}", $1::jsonb)"#,
                table = write.table,
                cols = column_list,
            );
            sqlx::query(&insert)
                .bind(Json(&record))
                .execute(&mut *tx)
                .await?;
            debug!(table = %write.table, columns = write.columns.len(), "Propagated row");
            written += 1;
        }

        let updated = sqlx::query(
            r#"
            UPDATE form_submissions
            SET status = 'processed', processed_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'validated')
            "#,
        )
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(PropagationStoreError::NotEligible);
        }

        tx.commit().await?;
        timer.record();
        info!(submission_id = %submission_id, tables = written, "Submission propagated");
        Ok(written)
    }
}

async fn fetch_columns(conn: &mut PgConnection, table: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(conn)
    .await
}

/// First column of the first row, or NULL when the query returns nothing.
async fn run_mapping_query(
    conn: &mut PgConnection,
    sql_query: &str,
    param: &Value,
) -> Result<Value, sqlx::Error> {
    let bound = match param {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    };
    let mut statement = sqlx::query(sql_query);
    if sql_query.contains("$1") {
        statement = statement.bind(bound);
    }
    let row = statement.fetch_optional(conn).await?;
    Ok(row.map_or(Value::Null, |r| decode_column(&r, 0)))
}

/// Decodes a column of unknown type to JSON by trying common types in turn.
fn decode_column(row: &PgRow, index: usize) -> Value {
    if row.columns().len() <= index {
        return Value::Null;
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::String);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v.map_or(Value::Null, |f| Value::from(f as f64));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map_or(Value::Null, Value::Bool);
    }
    if let Ok(v) = row.try_get::<Option<Uuid>, _>(index) {
        return v.map_or(Value::Null, |u| Value::String(u.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(index) {
        return v.map_or(Value::Null, |d| Value::String(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return v.map_or(Value::Null, |d| Value::String(d.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return v.map_or(Value::Null, |d| Value::String(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(index) {
        return v.unwrap_or(Value::Null);
    }
    Value::Null
}
