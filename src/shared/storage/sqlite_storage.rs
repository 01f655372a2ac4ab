use crate::features::system_metrics::{AverageMetrics, MetricSample, Page, PageRequest, TimeWindow};
use crate::shared::error::StorageError;
use crate::shared::traits::MetricsStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, LevelFilter};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

const MEMORY: &str = ":memory:";

// Timestamps are stored as microseconds since the epoch so range scans and
// ordering compare integers rather than formatted text.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS metrics (
        id TEXT PRIMARY KEY,
        cpu_percent REAL NOT NULL,
        mem_percent REAL NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_metrics_created_at ON metrics (created_at)",
];

const WINDOW_FILTER: &str = "(? IS NULL OR created_at >= ?) AND (? IS NULL OR created_at <= ?)";

/// Sample storage on SQLite, for single-host deployments and tests.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::open(MEMORY).await
    }

    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref();
        let in_memory = db_path == Path::new(MEMORY);
        info!("Opening SQLite database at {:?}", db_path);

        if !in_memory {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StorageError::Connection(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let path = db_path
            .to_str()
            .ok_or_else(|| StorageError::Connection("Invalid database path".to_string()))?;
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true)
            .log_statements(LevelFilter::Debug);

        // An in-memory database lives only as long as its connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Migration(e.to_string()))?;
        }
        Ok(())
    }
}

fn sample_from_row(row: &SqliteRow) -> Result<MetricSample, StorageError> {
    let id: String = row.try_get("id").map_err(read_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(read_error)?;

    Ok(MetricSample {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::InvalidRecord(e.to_string()))?,
        cpu_percent: row.try_get("cpu_percent").map_err(read_error)?,
        mem_percent: row.try_get("mem_percent").map_err(read_error)?,
        created_at: DateTime::<Utc>::from_timestamp_micros(created_at).ok_or_else(|| {
            StorageError::InvalidRecord(format!("timestamp out of range: {}", created_at))
        })?,
    })
}

fn read_error(e: sqlx::Error) -> StorageError {
    StorageError::Read(e.to_string())
}

#[async_trait]
impl MetricsStore for SqliteStorage {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO metrics (id, cpu_percent, mem_percent, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(sample.id.to_string())
        .bind(sample.cpu_percent)
        .bind(sample.mem_percent)
        .bind(sample.created_at.timestamp_micros())
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
        let start = window.map(|w| w.start.timestamp_micros());
        let end = window.map(|w| w.end.timestamp_micros());

        let total_records: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM metrics WHERE {}", WINDOW_FILTER))
                .bind(start)
                .bind(start)
                .bind(end)
                .bind(end)
                .fetch_one(&self.pool)
                .await
                .map_err(read_error)?;

        let rows = sqlx::query(&format!(
            "SELECT id, cpu_percent, mem_percent, created_at FROM metrics WHERE {} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            WINDOW_FILTER
        ))
        .bind(start)
        .bind(start)
        .bind(end)
        .bind(end)
        .bind(page.page_size as i64)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error)?;

        let samples = rows.iter().map(sample_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page { samples, total_records })
    }

    async fn list_range(&self, window: TimeWindow) -> Result<Vec<MetricSample>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, cpu_percent, mem_percent, created_at FROM metrics \
             WHERE created_at BETWEEN ? AND ? ORDER BY created_at ASC, id ASC",
        )
        .bind(window.start.timestamp_micros())
        .bind(window.end.timestamp_micros())
        .fetch_all(&self.pool)
        .await
        .map_err(read_error)?;

        rows.iter().map(sample_from_row).collect()
    }

    async fn average(&self, window: TimeWindow) -> Result<AverageMetrics, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS sample_count, AVG(cpu_percent) AS cpu_percent, \
             AVG(mem_percent) AS mem_percent FROM metrics WHERE created_at BETWEEN ? AND ?",
        )
        .bind(window.start.timestamp_micros())
        .bind(window.end.timestamp_micros())
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
        info!("Closing SQLite connection pool");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::system_metrics::MetricSampleBuilder;
    use chrono::Duration;

    fn sample_at(cpu: f64, mem: f64, created_at: DateTime<Utc>) -> MetricSample {
        MetricSampleBuilder::new()
            .cpu_percent(cpu)
            .mem_percent(mem)
            .created_at(created_at)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn save_and_read_back() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let now = Utc::now();
        let sample = sample_at(12.34, 56.78, now);
        storage.save(&sample).await.unwrap();

        let window = TimeWindow::new(now - Duration::seconds(1), now + Duration::seconds(1));
        let found = storage.list_range(window).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, sample.id);
        assert_eq!(found[0].cpu_percent, 12.34);
        assert_eq!(found[0].mem_percent, 56.78);
        assert_eq!(found[0].created_at.timestamp_micros(), now.timestamp_micros());
    }

    #[tokio::test]
    async fn duplicate_id_is_a_write_error() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let sample = sample_at(1.0, 2.0, Utc::now());
        storage.save(&sample).await.unwrap();

        assert!(matches!(storage.save(&sample).await, Err(StorageError::Write(_))));
    }

    #[tokio::test]
    async fn average_of_empty_window_has_no_values() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let now = Utc::now();
        let avg = storage
            .average(TimeWindow::new(now - Duration::hours(1), now))
            .await
            .unwrap();

        assert!(avg.is_empty());
        assert_eq!(avg.cpu_percent, None);
        assert_eq!(avg.mem_percent, None);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.run_migrations().await.unwrap();
    }
}
