use async_trait::async_trait;
use crate::features::system_metrics::{
    AverageMetrics, MetricSample, Page, PageRequest, TimeWindow,
};
use crate::shared::error::{SampleError, StorageError};

/// Host utilization readings, both as percentages.
pub trait MetricsSource: Send + Sync {
    fn cpu_percent(&self) -> Result<f64, SampleError>;
    fn mem_percent(&self) -> Result<f64, SampleError>;
}

/// Append-only sample storage plus the read queries served over HTTP.
///
/// Attempts may call `save` concurrently and out of timestamp order, so every
/// query sorts explicitly.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError>;

    /// Newest first, with the total number of rows matching `window`.
    async fn list_page(
        &self,
        page: PageRequest,
        window: Option<TimeWindow>,
    ) -> Result<Page, StorageError>;

    /// Oldest first; ties are broken by id so repeated queries agree.
    async fn list_range(&self, window: TimeWindow) -> Result<Vec<MetricSample>, StorageError>;

    async fn average(&self, window: TimeWindow) -> Result<AverageMetrics, StorageError>;

    /// Closes the underlying connections. Callers bound this with a timeout.
    async fn close(&self);
}

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
