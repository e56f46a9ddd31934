//! PostgreSQL interaction repository for ExhibitStream
//!
//! Ratings and requests live in separate tables; the record variant decides
//! which one a row goes to. Transient connection failures are retried with
//! exponential backoff, everything else is returned to the caller at once.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};

use crate::db::{
    repository::{InteractionRepository, RepositoryError, RepositoryResult, RetryConfig},
    DbPool,
};
use crate::models::{InteractionKind, NormalizedRecord};

const INSERT_RATING: &str = r#"
    INSERT INTO rating_interaction (exhibition_id, rating_id, event_at)
    VALUES ($1, $2, $3)
"#;

const INSERT_REQUEST: &str = r#"
    INSERT INTO request_interaction (exhibition_id, request_id, event_at)
    VALUES ($1, $2, $3)
"#;

const COUNT_RATINGS: &str = "SELECT COUNT(*) FROM rating_interaction";
const COUNT_REQUESTS: &str = "SELECT COUNT(*) FROM request_interaction";

fn insert_statement(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => INSERT_RATING,
        InteractionKind::Request => INSERT_REQUEST,
    }
}

fn count_statement(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => COUNT_RATINGS,
        InteractionKind::Request => COUNT_REQUESTS,
    }
}

/// PostgreSQL implementation of InteractionRepository
pub struct PgInteractionRepository {
    pool: DbPool,
    retry_config: RetryConfig,
}

impl PgInteractionRepository {
    /// Create a new PostgreSQL interaction repository
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            retry_config: RetryConfig::default(),
        }
    }

    /// Create with custom retry configuration
    pub fn with_retry_config(pool: DbPool, retry_config: RetryConfig) -> Self {
        Self { pool, retry_config }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.retry_config.initial_backoff_ms),
            max_interval: Duration::from_millis(self.retry_config.max_backoff_ms),
            multiplier: self.retry_config.multiplier,
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    /// Execute a query, retrying transient failures up to `max_retries` times
    async fn execute_with_retry<F, T>(&self, operation: F) -> RepositoryResult<T>
    where
        F: Fn() -> futures::future::BoxFuture<'static, Result<T, RepositoryError>>,
    {
        let attempts = AtomicU32::new(0);
        let max_retries = self.retry_config.max_retries;

        retry(self.backoff(), || async {
            match operation().await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    if attempt > max_retries {
                        return Err(backoff::Error::permanent(e));
                    }
                    tracing::warn!(error = %e, attempt, "Retrying database operation");
                    Err(backoff::Error::transient(e))
                },
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}

#[async_trait]
impl InteractionRepository for PgInteractionRepository {
    async fn insert(&self, record: &NormalizedRecord) -> RepositoryResult<()> {
        let pool = self.pool.clone();
        let record = record.clone();

        self.execute_with_retry(|| {
            let pool = pool.clone();
            let record = record.clone();
            Box::pin(async move {
                sqlx::query(insert_statement(record.kind()))
                    .bind(record.exhibition_id())
                    .bind(record.type_id())
                    .bind(record.recorded_at())
                    .execute(&pool)
                    .await?;

                Ok(())
            })
        })
        .await
    }

    async fn count(&self, kind: InteractionKind) -> RepositoryResult<i64> {
        let pool = self.pool.clone();

        self.execute_with_retry(|| {
            let pool = pool.clone();
            Box::pin(async move {
                let count = sqlx::query_scalar::<_, i64>(count_statement(kind))
                    .fetch_one(&pool)
                    .await?;

                Ok(count)
            })
        })
        .await
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| RepositoryError::Connection(format!("Health check failed: {}", e)))
    }
}
