use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{TreeRecord, TreeStore};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed tree store, one row per tree
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `config.path`
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Open a private in-memory database (one pinned connection)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TreeStore for SqliteStore {
    async fn save(&self, record: &TreeRecord) -> StorageResult<()> {
        let name = record.name();
        let document = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT INTO tree_records (name, role, query, model, created_at, last_updated, document)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                last_updated = excluded.last_updated,
                document = excluded.document
            "#,
        )
        .bind(&name)
        .bind(&record.meta.role)
        .bind(&record.meta.query)
        .bind(&record.meta.model)
        .bind(record.meta.created_at.to_rfc3339())
        .bind(record.meta.last_updated.to_rfc3339())
        .bind(&document)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed {
            name: name.clone(),
            message: e.to_string(),
        })?;

        debug!(name = %name, bytes = document.len(), "Tree record upserted");
        Ok(())
    }

    async fn load(&self, name: &str) -> StorageResult<Option<TreeRecord>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM tree_records WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((document,)) => Ok(Some(serde_json::from_str(&document)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM tree_records ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
