//! Database handle and sqlx-backed execution
//!
//! `Database` owns the connection lifecycle as a single exclusive resource:
//! connect (or connect a pool), use, disconnect. Connecting twice and using a
//! disconnected handle are both errors, never silently papered over. The
//! handle is constructed explicitly and passed where it is needed; nothing in
//! the crate reaches for a process-wide instance.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row, TypeInfo};

use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::row::RawRow;
use crate::statement::Statement;
use crate::transaction::Transaction;
use crate::value::SqlValue;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout: u64,
    /// Seconds an idle connection may linger
    pub idle_timeout: Option<u64>,
    /// Seconds before a connection is recycled
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),
            max_lifetime: Some(1800),
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    fn pool_options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout))
            .test_before_acquire(self.test_before_acquire);
        options = options.idle_timeout(self.idle_timeout.map(Duration::from_secs));
        options = options.max_lifetime(self.max_lifetime.map(Duration::from_secs));
        options
    }
}

/// Handle to a PostgreSQL database
///
/// All operations run through the [`Executor`] surface this type implements.
pub struct Database {
    pool: RwLock<Option<Pool<Postgres>>>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            pool: RwLock::new(None),
        }
    }

    /// Establish a single exclusive connection
    ///
    /// Realized as a pool of size one: sqlx keeps the connection alive and
    /// hands it to one statement at a time.
    pub async fn connect(&self, url: &str) -> OrmResult<()> {
        let config = PoolConfig {
            max_connections: 1,
            min_connections: 1,
            ..PoolConfig::default()
        };
        self.establish(url, &config).await
    }

    /// Establish a bounded connection pool
    pub async fn connect_pool(&self, url: &str, config: &PoolConfig) -> OrmResult<()> {
        self.establish(url, config).await
    }

    async fn establish(&self, url: &str, config: &PoolConfig) -> OrmResult<()> {
        if self.is_connected() {
            return Err(OrmError::AlreadyConnected);
        }

        let pool = config
            .pool_options()
            .connect(url)
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))?;

        let mut slot = self.pool.write().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(OrmError::AlreadyConnected);
        }
        tracing::debug!(max_connections = config.max_connections, "database connected");
        *slot = Some(pool);
        Ok(())
    }

    /// Close the connection or pool
    pub async fn disconnect(&self) -> OrmResult<()> {
        let pool = {
            let mut slot = self.pool.write().unwrap_or_else(|e| e.into_inner());
            slot.take().ok_or(OrmError::NotConnected)?
        };
        pool.close().await;
        tracing::debug!("database disconnected");
        Ok(())
    }

    /// True while a connection or pool is established
    pub fn is_connected(&self) -> bool {
        self.pool
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Begin an explicit scoped transaction
    pub async fn begin(&self) -> OrmResult<Transaction> {
        let pool = self.pool()?;
        let tx = pool
            .begin()
            .await
            .map_err(|e| OrmError::Transaction(e.to_string()))?;
        Ok(Transaction::new(tx))
    }

    fn pool(&self) -> OrmResult<Pool<Postgres>> {
        self.pool
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(OrmError::NotConnected)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for Database {
    async fn fetch_rows(&self, statement: Statement) -> OrmResult<Vec<RawRow>> {
        let pool = self.pool()?;
        tracing::debug!(
            sql = %statement.sql,
            params = statement.args.len(),
            "executing statement"
        );

        let mut query = sqlx::query(&statement.sql);
        for arg in &statement.args {
            query = bind_value(query, arg);
        }

        let rows = query
            .fetch_all(&pool)
            .await
            .map_err(|source| OrmError::Database {
                statement: statement.sql.clone(),
                source,
            })?;
        rows.iter().map(decode_row).collect()
    }
}

/// Bind one dynamic value onto a prepared query
pub(crate) fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Uuid(u) => query.bind(*u),
        SqlValue::DateTime(t) => query.bind(*t),
        SqlValue::Json(j) => query.bind(j.clone()),
    }
}

/// Decode a driver row into the crate's dynamic row representation
pub(crate) fn decode_row(row: &PgRow) -> OrmResult<RawRow> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = decode_column(row, i, column.type_info().name())
            .map_err(|message| OrmError::decode(&name, message))?;
        columns.push((name, value));
    }
    Ok(RawRow::new(columns))
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<SqlValue, String> {
    let value = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(|e| e.to_string())?
            .map(|naive| chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
            .into(),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map_err(|e| e.to_string())?
            .into(),
        other => return Err(format!("unsupported column type {other}")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_handle_is_disconnected() {
        let db = Database::new();
        assert!(!db.is_connected());
        assert!(matches!(db.pool(), Err(OrmError::NotConnected)));
    }

    #[tokio::test]
    async fn operations_on_a_disconnected_handle_fail() {
        let db = Database::new();
        let statement = Statement {
            sql: "SELECT 1".to_string(),
            args: Vec::new(),
        };
        assert!(matches!(
            db.fetch_rows(statement).await,
            Err(OrmError::NotConnected)
        ));
        assert!(matches!(db.disconnect().await, Err(OrmError::NotConnected)));
        assert!(matches!(db.begin().await, Err(OrmError::NotConnected)));
    }

    #[test]
    fn default_pool_config_matches_documented_bounds() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, 30);
        assert!(config.test_before_acquire);
    }
}
