//! Scoped transactions
//!
//! Nothing in this crate opens a transaction implicitly; a caller that needs
//! atomicity asks the database handle to `begin()` and runs operations on the
//! returned `Transaction`, which carries the full [`Executor`] surface.
//! Dropping the transaction without committing rolls it back (driver
//! semantics).

use async_trait::async_trait;
use sqlx::Postgres;
use tokio::sync::Mutex;

use crate::database::{bind_value, decode_row};
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::row::RawRow;
use crate::statement::Statement;

/// An explicit scoped transaction over one pooled connection
pub struct Transaction {
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl Transaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self {
            inner: Mutex::new(Some(tx)),
        }
    }

    /// Commit the transaction, consuming it
    pub async fn commit(self) -> OrmResult<()> {
        let tx = self
            .inner
            .into_inner()
            .ok_or_else(|| OrmError::Transaction("transaction already completed".to_string()))?;
        tracing::debug!("committing transaction");
        tx.commit()
            .await
            .map_err(|e| OrmError::Transaction(e.to_string()))
    }

    /// Roll the transaction back, consuming it
    pub async fn rollback(self) -> OrmResult<()> {
        let tx = self
            .inner
            .into_inner()
            .ok_or_else(|| OrmError::Transaction("transaction already completed".to_string()))?;
        tracing::debug!("rolling back transaction");
        tx.rollback()
            .await
            .map_err(|e| OrmError::Transaction(e.to_string()))
    }
}

#[async_trait]
impl Executor for Transaction {
    async fn fetch_rows(&self, statement: Statement) -> OrmResult<Vec<RawRow>> {
        let mut guard = self.inner.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("transaction already completed".to_string()))?;

        tracing::debug!(
            sql = %statement.sql,
            params = statement.args.len(),
            "executing statement in transaction"
        );
        let mut query = sqlx::query(&statement.sql);
        for arg in &statement.args {
            query = bind_value(query, arg);
        }

        let rows = query
            .fetch_all(&mut **tx)
            .await
            .map_err(|source| OrmError::Database {
                statement: statement.sql.clone(),
                source,
            })?;
        rows.iter().map(decode_row).collect()
    }
}
