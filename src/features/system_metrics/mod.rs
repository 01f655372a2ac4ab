mod collector;
mod models;

pub use collector::{collect_and_save, SysinfoSource};
pub use models::{
    round2,
    AverageMetrics,
    MetricSample,
    MetricSampleBuilder,
    Page,
    PageRequest,
    TimeWindow,
    DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
