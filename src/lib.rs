pub mod features;
pub mod shared;

// Re-export commonly used items from features
pub use features::api::{create_router, ApiError, AppState};
pub use features::system_metrics::{
    collect_and_save,
    round2,
    AverageMetrics,
    MetricSample,
    MetricSampleBuilder,
    Page,
    PageRequest,
    SysinfoSource,
    TimeWindow,
};

// Re-export shared functionality
pub use shared::collector::{error_channel, Collector, ErrorReceiver, ErrorSink, RunSummary};
pub use shared::config::{load_env_file, CollectorConfig, Config, DatabaseTarget};
pub use shared::error::{
    CollectionError,
    CollectionStage,
    ConfigError,
    MonitorError,
    SampleError,
    StorageError,
};
pub use shared::shutdown::{listen_for_signals, ShutdownCoordinator, ShutdownReport};
pub use shared::storage::{PostgresStorage, SqliteStorage};
pub use shared::traits::{MetricsSource, MetricsStore, Validatable};
