pub mod api;
pub mod system_metrics;
