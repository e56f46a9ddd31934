//! Repository abstractions for ExhibitStream
//!
//! This module defines the interaction repository trait the pipeline writes
//! through, its error type and the retry policy for transient failures.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{InteractionKind, NormalizedRecord};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database connection error
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Check if the error is a transient connection-class failure
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Connection(_) => true,
            RepositoryError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
            ),
            RepositoryError::QueryExecution(_) => false,
        }
    }

    /// Check if a constraint on the interaction tables rejected the row
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            // PostgreSQL class 23: integrity constraint violation
            RepositoryError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .map_or(false, |code| code.starts_with("23")),
            _ => false,
        }
    }
}

/// Convert repository errors to application errors
impl From<RepositoryError> for crate::error::Error {
    fn from(err: RepositoryError) -> Self {
        crate::error::Error::database(err.to_string())
    }
}

/// Durable store for normalized interactions
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Store one interaction in the table for its kind
    async fn insert(&self, record: &NormalizedRecord) -> RepositoryResult<()>;

    /// Count stored interactions of one kind
    async fn count(&self, kind: InteractionKind) -> RepositoryResult<i64>;

    /// Health check for the repository
    async fn health_check(&self) -> RepositoryResult<()>;
}

/// Retry configuration for repository operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the initial backoff
    pub fn with_initial_backoff(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Set the maximum backoff
    pub fn with_max_backoff(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    /// Build the retry policy from database settings
    pub fn from_database_config(config: &crate::config::DatabaseConfig) -> Self {
        Self::new(config.max_retries).with_initial_backoff(config.retry_backoff_ms)
    }
}
