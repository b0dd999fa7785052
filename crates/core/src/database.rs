//! PostgreSQL connection pool shared by the engine stores

use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, Error as SqlxError, Executor, PgPool};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, SqlxError> {
        info!(
            max_connections = config.max_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Some(Duration::from_secs(600)))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_sec))
            .connect(&config.url)
            .await?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Apply the engine schema. Statements are idempotent.
    pub async fn run_migrations(&self) -> Result<(), SqlxError> {
        // A plain &str runs over the simple query protocol, which accepts
        // multiple statements.
        self.pool
            .execute(include_str!("../migrations/0001_recommendation_core.sql"))
            .await?;
        info!("Schema migrations applied");
        Ok(())
    }
}
