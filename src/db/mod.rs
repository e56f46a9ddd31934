//! Database module for ExhibitStream
//!
//! This module provides database connectivity, connection pooling, schema
//! migrations and the interaction repository the pipeline writes through.

pub mod interaction_repo;
pub mod pool;
pub mod repository;

// Re-export commonly used types
pub use interaction_repo::PgInteractionRepository;
pub use pool::{create_pool, DbPool};
pub use repository::{InteractionRepository, RepositoryError, RepositoryResult, RetryConfig};

use sqlx::migrate::Migrator;

/// Database migrator for running schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
