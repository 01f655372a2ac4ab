use crate::features::system_metrics::{AverageMetrics, MetricSample, Page, PageRequest, TimeWindow};
use crate::shared::error::StorageError;
use crate::shared::traits::MetricsStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn, LevelFilter};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, Connection, PgConnection, Row};
use std::time::Duration;

const MAINTENANCE_DATABASE: &str = "postgres";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS metrics (
        id UUID PRIMARY KEY,
        cpu_percent DOUBLE PRECISION NOT NULL,
        mem_percent DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_metrics_created_at ON metrics (created_at)",
];

const WINDOW_FILTER: &str = "($1::timestamptz IS NULL OR created_at >= $1) \
                             AND ($2::timestamptz IS NULL OR created_at <= $2)";

/// Sample storage on PostgreSQL.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connects, creating `database` first if the server does not have it,
    /// and brings the schema up to date.
    pub async fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, StorageError> {
        let base = PgConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .password(password)
            .log_statements(LevelFilter::Debug);

        Self::create_database_if_missing(&base, database).await?;

        info!("Connecting to Postgres at {}:{}/{}", host, port, database);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(base.database(database))
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    async fn create_database_if_missing(
        base: &PgConnectOptions,
        database: &str,
    ) -> Result<(), StorageError> {
        let mut conn = PgConnection::connect_with(&base.clone().database(MAINTENANCE_DATABASE))
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(database)
                .fetch_one(&mut conn)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;

        if !exists {
            let statement = format!("CREATE DATABASE \"{}\"", database.replace('"', "\"\""));
            sqlx::query(&statement)
                .execute(&mut conn)
                .await
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            info!("Created database {}", database);
        }

        if let Err(e) = conn.close().await {
            warn!("Failed to close maintenance connection: {}", e);
        }
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Migration(e.to_string()))?;
        }
        info!("Database schema is up to date");
        Ok(())
    }
}

fn sample_from_row(row: &PgRow) -> Result<MetricSample, sqlx::Error> {
    Ok(MetricSample {
        id: row.try_get("id")?,
        cpu_percent: row.try_get("cpu_percent")?,
        mem_percent: row.try_get("mem_percent")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn read_error(e: sqlx::Error) -> StorageError {
    StorageError::Read(e.to_string())
}

#[async_trait]
impl MetricsStore for PostgresStorage {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO metrics (id, cpu_percent, mem_percent, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(sample.id)
        .bind(sample.cpu_percent)
        .bind(sample.mem_percent)
        .bind(sample.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write(e.to_string()))?;
        Ok(())
    }

    async fn list_page(
        &self,
        page: PageRequest,
        window: Option<TimeWindow>,
    ) -> Result<Page, StorageError> {
        let start = window.map(|w| w.start);
        let end = window.map(|w| w.end);

        let total_records: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM metrics WHERE {}", WINDOW_FILTER))
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await
                .map_err(read_error)?;

        let rows = sqlx::query(&format!(
            "SELECT id, cpu_percent, mem_percent, created_at FROM metrics WHERE {} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            WINDOW_FILTER
        ))
        .bind(start)
        .bind(end)
        .bind(page.page_size as i64)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error)?;

        let samples = rows
            .iter()
            .map(sample_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_error)?;

        Ok(Page { samples, total_records })
    }

    async fn list_range(&self, window: TimeWindow) -> Result<Vec<MetricSample>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, cpu_percent, mem_percent, created_at FROM metrics \
             WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at ASC, id ASC",
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error)?;

        rows.iter()
            .map(sample_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_error)
    }

    async fn average(&self, window: TimeWindow) -> Result<AverageMetrics, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS sample_count, AVG(cpu_percent) AS cpu_percent, \
             AVG(mem_percent) AS mem_percent FROM metrics WHERE created_at BETWEEN $1 AND $2",
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
        .map_err(read_error)?;

        Ok(AverageMetrics {
            cpu_percent: row.try_get("cpu_percent").map_err(read_error)?,
            mem_percent: row.try_get("mem_percent").map_err(read_error)?,
            sample_count: row.try_get("sample_count").map_err(read_error)?,
        })
    }

    async fn close(&self) {
        info!("Closing Postgres connection pool");
        self.pool.close().await;
    }
}
