use crate::features::api::handlers::{average_metrics, health, list_metrics, metrics_by_time_range};
use crate::shared::traits::MetricsStore;
use axum::{routing::get, Router};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetricsStore>,
}

pub fn create_router(store: Arc<dyn MetricsStore>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/health", get(health))
        .route("/metrics/", get(list_metrics))
        .route("/metrics", get(metrics_by_time_range))
        .route("/metrics/average", get(average_metrics))
        .with_state(state)
}
