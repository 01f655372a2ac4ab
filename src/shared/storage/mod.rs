mod postgres_storage;
mod sqlite_storage;

pub use postgres_storage::PostgresStorage;
pub use sqlite_storage::SqliteStorage;

use crate::shared::config::DatabaseTarget;
use crate::shared::error::StorageError;
use crate::shared::traits::MetricsStore;
use std::sync::Arc;

/// Opens the configured backend. Called once by the process owner, which
/// also closes it.
pub async fn open(target: &DatabaseTarget) -> Result<Arc<dyn MetricsStore>, StorageError> {
    match target {
        DatabaseTarget::Postgres {
            host,
            port,
            user,
            password,
            database,
        } => {
            let storage = PostgresStorage::connect(host, *port, user, password, database).await?;
            Ok(Arc::new(storage))
        }
        DatabaseTarget::Sqlite(path) => Ok(Arc::new(SqliteStorage::open(path).await?)),
    }
}
