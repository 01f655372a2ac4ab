//! Periodic sampling loop.
//!
//! Each tick spawns an independent attempt onto a [`TaskTracker`], so a slow
//! persist never delays the next tick and attempts may overlap. The loop
//! itself is the observer for the error sink: it logs whatever attempts
//! report but never changes course because of it.

mod sink;

pub use sink::{error_channel, ErrorReceiver, ErrorSink, DEFAULT_SINK_CAPACITY};

use crate::features::system_metrics::collect_and_save;
use crate::shared::config::CollectorConfig;
use crate::shared::traits::{MetricsSource, MetricsStore};
use log::{debug, info, warn};
use sink::log_collection_error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks fired, which is also the number of attempts started.
    pub ticks: u64,
    pub errors_observed: u64,
}

#[derive(Clone)]
pub struct Collector {
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn MetricsStore>,
    config: CollectorConfig,
    in_flight: TaskTracker,
}

impl Collector {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        store: Arc<dyn MetricsStore>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            in_flight: TaskTracker::new(),
        }
    }

    /// Runs until `token` is cancelled. The first tick fires one full
    /// interval after start. Returns without waiting for in-flight attempts;
    /// see [`Collector::wait_for_in_flight`].
    pub async fn run(
        &self,
        token: CancellationToken,
        sink: ErrorSink,
        errors: &mut ErrorReceiver,
    ) -> RunSummary {
        let period = self.config.interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = RunSummary::default();
        info!("Starting metrics collection every {:?}", period);

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Stopping metrics collector after {} tick(s)", summary.ticks);
                    break;
                }

                _ = ticker.tick() => {
                    summary.ticks += 1;
                    debug!("Collecting system metrics (tick {})", summary.ticks);
                    self.spawn_attempt(sink.clone());
                }

                Some(err) = errors.recv() => {
                    summary.errors_observed += 1;
                    log_collection_error(&err);
                }
            }
        }

        summary
    }

    fn spawn_attempt(&self, sink: ErrorSink) {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        self.in_flight.spawn(async move {
            collect_and_save(source.as_ref(), store.as_ref(), &sink).await;
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stops accepting attempts and waits at most `grace` for the running
    /// ones. Returns `false` if some were still running when time ran out;
    /// those are abandoned, possibly mid-write.
    pub async fn wait_for_in_flight(&self, grace: Duration) -> bool {
        self.in_flight.close();
        let pending = self.in_flight.len();
        if pending == 0 {
            return true;
        }

        info!("Waiting up to {:?} for {} in-flight attempt(s)", grace, pending);
        match time::timeout(grace, self.in_flight.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Grace period elapsed, abandoning {} in-flight attempt(s)",
                    self.in_flight.len()
                );
                false
            }
        }
    }
}
