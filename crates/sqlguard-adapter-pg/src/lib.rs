//! PostgreSQL executor for guardrailed queries.
//!
//! Each query runs in its own transaction: `SET LOCAL statement_timeout`
//! and the query share that transaction's session, so the timeout cannot
//! leak to, or be lost to, another query on the pool.

use async_trait::async_trait;
use sqlguard_core::UpstreamConfig;
use sqlguard_runtime::{BoundedQuery, ExecutorError, QueryExecutor, Row};
use sqlx::postgres::PgPoolOptions;

mod params;
mod row;

/// SQLSTATE of a statement cancelled by `statement_timeout`.
const QUERY_CANCELED: &str = "57014";

pub struct PostgresExecutor {
    pool: sqlx::PgPool,
}

impl PostgresExecutor {
    /// Connect a pool for the configured warehouse.
    pub async fn connect(config: &UpstreamConfig) -> Result<Self, ExecutorError> {
        let url = config
            .connection_string()
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&url)
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        tracing::info!(
            warehouse = %config.display_target(),
            max_connections = config.max_connections,
            "Connected to warehouse"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn run(&self, query: &BoundedQuery) -> Result<Vec<Row>, ExecutorError> {
        let args = params::bind_params(&query.params)?;
        let map_err = |e: sqlx::Error| classify_error(e, query);

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(&format!("SET LOCAL statement_timeout = {}", query.timeout_ms()))
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        let recs = sqlx::query_with(&query.sql, args)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;

        recs.iter().map(row::row_to_json).collect()
    }
}

fn classify_error(err: sqlx::Error, query: &BoundedQuery) -> ExecutorError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
            tracing::warn!(
                role = %query.role,
                timeout_ms = query.timeout_ms(),
                "Statement timed out"
            );
            ExecutorError::Timeout(query.timeout)
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => ExecutorError::Connection(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::Encode(_) => {
            ExecutorError::Conversion(err.to_string())
        }
        _ => ExecutorError::Database(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn query() -> BoundedQuery {
        BoundedQuery {
            role: "CFO".to_string(),
            sql: "SELECT 1 LIMIT 5000".to_string(),
            params: vec![],
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_pool_errors_are_connection_errors() {
        assert!(matches!(
            classify_error(sqlx::Error::PoolTimedOut, &query()),
            ExecutorError::Connection(_)
        ));
    }

    #[test]
    fn test_other_errors_are_database_errors() {
        assert!(matches!(
            classify_error(sqlx::Error::RowNotFound, &query()),
            ExecutorError::Database(_)
        ));
    }
}
