//! PostgreSQL image repository
//!
//! Every statement acquires its own pooled connection and returns it on drop,
//! so no exit path leaks a connection.

use crate::config::DbConfig;
use crate::models::{ImageRecord, ImageRow};
use async_trait::async_trait;
use pipeline_core::{
    codes, defer, ArtifactKind, Deferred, PipelineError, RecordKey, Result, StatusStore,
    StatusUpdate,
};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str = "id, business_key, filename, thumbnail_ref, thumbnail_status, \
     caption_text, caption_status, created_at, updated_at";

const MAX_LIST_LIMIT: i64 = 500;

/// Image records read and written by the pipeline and its frontend
#[async_trait]
pub trait ImageRepository: StatusStore {
    /// Insert a row with both artifacts pending; an existing row is left as is
    async fn create_pending(&self, record: &RecordKey) -> Result<ImageRecord>;

    /// Update an existing row only; returns 0 when no row matches
    async fn update_status(&self, business_key: &str, update: &StatusUpdate) -> Result<u64>;

    async fn find_by_key(&self, business_key: &str) -> Result<Option<ImageRecord>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ImageRecord>>;

    /// Most recently created rows first, at most `limit` (clamped to 1..=500)
    async fn list_recent(&self, limit: i64) -> Result<Vec<ImageRecord>>;
}

/// Create a lazily connecting pool; connection errors surface on first use
pub fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let options = config.connect_options()?;

    debug!(
        max_connections = config.db_max_connections,
        acquire_timeout_secs = config.db_acquire_timeout_secs,
        "Creating database pool"
    );

    Ok(PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_lazy_with(options))
}

/// Status store for a handler whose database settings may be invalid.
///
/// A bad configuration yields a store that fails every write with the
/// configuration error, so the event is still decoded and skip-filtered.
/// A failed migration is logged and the repository is returned anyway.
pub async fn connect_status_store(
    config: Deferred<DbConfig>,
    run_migrations: bool,
) -> Arc<dyn StatusStore> {
    let repository = match config.and_then(|c| defer(PgImageRepository::from_config(&c))) {
        Ok(repository) => repository,
        Err(fault) => return Arc::new(fault),
    };

    if run_migrations {
        if let Err(e) = repository.run_migrations().await {
            warn!(error = %e, "Continuing without migrations");
        }
    }

    Arc::new(repository)
}

pub struct PgImageRepository {
    pool: PgPool,
    connect_timeout: Duration,
}

impl PgImageRepository {
    pub fn new(pool: PgPool, connect_timeout: Duration) -> Self {
        Self {
            pool,
            connect_timeout,
        }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self> {
        Ok(Self::new(create_pool(config)?, config.connect_timeout()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn run_migrations(&self) -> Result<()> {
        debug!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Database migration failed");
                PipelineError::status_store(
                    codes::DB_MIGRATION_FAILED,
                    "Database migration failed",
                    e,
                )
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    async fn connection(&self) -> Result<PoolConnection<Postgres>> {
        let connection_error = |e: sqlx::Error| {
            error!(error = %e, "Failed to acquire database connection");
            PipelineError::status_store(
                codes::DB_CONNECTION_FAILED,
                "Failed to acquire database connection",
                e,
            )
        };

        match tokio::time::timeout(self.connect_timeout, self.pool.acquire()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(connection_error(e)),
            Err(_) => Err(connection_error(sqlx::Error::PoolTimedOut)),
        }
    }
}

/// Upsert that writes only the columns owned by `artifact`.
///
/// The `WHERE ... IS DISTINCT FROM` guard turns identical rewrites into
/// no-ops, which Postgres reports as zero affected rows.
pub(crate) fn upsert_sql(artifact: ArtifactKind) -> String {
    let value = artifact.value_column();
    let status = artifact.status_column();
    format!(
        "INSERT INTO images (business_key, filename, {value}, {status}) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (business_key) DO UPDATE \
         SET {value} = EXCLUDED.{value}, {status} = EXCLUDED.{status}, updated_at = NOW() \
         WHERE images.{value} IS DISTINCT FROM EXCLUDED.{value} \
            OR images.{status} IS DISTINCT FROM EXCLUDED.{status}"
    )
}

pub(crate) fn update_sql(artifact: ArtifactKind) -> String {
    let value = artifact.value_column();
    let status = artifact.status_column();
    format!(
        "UPDATE images SET {value} = $2, {status} = $3, updated_at = NOW() \
         WHERE business_key = $1"
    )
}

fn query_failed(context: &str, e: sqlx::Error) -> PipelineError {
    error!(error = %e, "{context}");
    PipelineError::status_store(codes::DB_QUERY_FAILED, context.to_string(), e)
}

#[async_trait]
impl StatusStore for PgImageRepository {
    async fn upsert(&self, record: &RecordKey, update: &StatusUpdate) -> Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query(&upsert_sql(update.artifact()))
            .bind(&record.business_key)
            .bind(&record.filename)
            .bind(update.value())
            .bind(update.status().as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                error!(key = %record.business_key, error = %e, "Status upsert failed");
                PipelineError::status_store(
                    codes::DB_UPSERT_FAILED,
                    format!("Failed to upsert status for {}", record.business_key),
                    e,
                )
            })?;

        debug!(
            key = %record.business_key,
            artifact = %update.artifact(),
            status = %update.status(),
            rows = result.rows_affected(),
            "Status upserted"
        );
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create_pending(&self, record: &RecordKey) -> Result<ImageRecord> {
        let mut conn = self.connection().await?;

        sqlx::query(
            "INSERT INTO images (business_key, filename) VALUES ($1, $2) \
             ON CONFLICT (business_key) DO NOTHING",
        )
        .bind(&record.business_key)
        .bind(&record.filename)
        .execute(&mut *conn)
        .await
        .map_err(|e| query_failed("Failed to create image record", e))?;

        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM images WHERE business_key = $1"
        ))
        .bind(&record.business_key)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| query_failed("Failed to load created image record", e))?;

        row.try_into()
    }

    async fn update_status(&self, business_key: &str, update: &StatusUpdate) -> Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query(&update_sql(update.artifact()))
            .bind(business_key)
            .bind(update.value())
            .bind(update.status().as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| query_failed("Failed to update image status", e))?;

        Ok(result.rows_affected())
    }

    async fn find_by_key(&self, business_key: &str) -> Result<Option<ImageRecord>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM images WHERE business_key = $1"
        ))
        .bind(business_key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| query_failed("Failed to load image record", e))?;

        row.map(ImageRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ImageRecord>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| query_failed("Failed to load image record", e))?;

        row.map(ImageRecord::try_from).transpose()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ImageRecord>> {
        let mut conn = self.connection().await?;

        sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM images ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| query_failed("Failed to list image records", e))?
        .into_iter()
        .map(ImageRecord::try_from)
        .collect()
    }
}
