//! Composition utilities for building `Repos` with `SQLite` backends.
//!
//! Focused purely on construction; no domain logic.

use sqlx::SqlitePool;
use std::sync::Arc;

use callrelay_core::ports::Repos;

use crate::repositories::{
    SqliteDispositionRepository, SqliteIntentRepository, SqliteKbRepository,
    SqliteUtteranceRepository,
};

pub struct CoreFactory;

impl CoreFactory {
    /// Creates a `SQLite` connection pool.
    pub async fn create_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
        let pool = SqlitePool::connect(db_url).await?;
        Ok(pool)
    }

    /// Creates an in-memory `SQLite` pool for testing.
    pub async fn create_test_pool() -> anyhow::Result<SqlitePool> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Ok(pool)
    }

    /// Builds all `SQLite` repositories from a pool into the `Repos`
    /// container from `callrelay-core`.
    pub fn build_repos(pool: SqlitePool) -> Repos {
        Repos {
            utterances: Arc::new(SqliteUtteranceRepository::new(pool.clone())),
            intents: Arc::new(SqliteIntentRepository::new(pool.clone())),
            dispositions: Arc::new(SqliteDispositionRepository::new(pool.clone())),
            kb: Arc::new(SqliteKbRepository::new(pool)),
        }
    }
}

/// Test database helper for integration tests: an in-memory `SQLite`
/// database with the full production schema applied.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn repos(&self) -> Repos {
        CoreFactory::build_repos(self.pool.clone())
    }
}
