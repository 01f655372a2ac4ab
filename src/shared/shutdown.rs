//! Graceful shutdown.
//!
//! A single [`CancellationToken`] is cancelled by the signal handler. The
//! collector loop and the HTTP server both watch it; the coordinator then
//! tears down the rest with bounded waits so a hung write or connection can
//! never keep the process alive.

use crate::shared::collector::{Collector, ErrorReceiver, RunSummary};
use crate::shared::traits::MetricsStore;
use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Cancels `token` on SIGINT or, on unix, SIGTERM.
pub fn listen_for_signals(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
            _ = token.cancelled() => return,
        }

        token.cancel();
    })
}

/// What happened during teardown, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub collector: RunSummary,
    pub in_flight_completed: bool,
    pub server_stopped: bool,
    pub store_closed: bool,
    pub errors_drained: usize,
}

pub struct ShutdownCoordinator {
    grace_period: Duration,
    close_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration, close_timeout: Duration) -> Self {
        Self {
            grace_period,
            close_timeout,
        }
    }

    /// Tears everything down once `token` has been cancelled.
    ///
    /// 1. waits for the collector loop to return,
    /// 2. gives in-flight attempts up to the grace period,
    /// 3. gives the HTTP server up to the close timeout to drain,
    /// 4. closes the store within the close timeout,
    /// 5. logs any collection errors still queued.
    pub async fn shutdown<S>(
        &self,
        token: &CancellationToken,
        collector: &Collector,
        collector_task: JoinHandle<(RunSummary, ErrorReceiver)>,
        server: S,
        store: &dyn MetricsStore,
    ) -> ShutdownReport
    where
        S: Future<Output = ()>,
    {
        token.cancelled().await;
        info!("Shutting down...");

        let mut report = ShutdownReport::default();

        let mut errors = match collector_task.await {
            Ok((summary, errors)) => {
                report.collector = summary;
                Some(errors)
            }
            Err(e) => {
                error!("Collector task failed: {}", e);
                None
            }
        };

        report.in_flight_completed = collector.wait_for_in_flight(self.grace_period).await;

        report.server_stopped = match time::timeout(self.close_timeout, server).await {
            Ok(()) => {
                info!("HTTP server shut down successfully");
                true
            }
            Err(_) => {
                warn!("HTTP server did not stop within {:?}", self.close_timeout);
                false
            }
        };

        report.store_closed = match time::timeout(self.close_timeout, store.close()).await {
            Ok(()) => {
                info!("Database shut down successfully");
                true
            }
            Err(_) => {
                warn!("Database close timed out after {:?}", self.close_timeout);
                false
            }
        };

        if let Some(errors) = errors.as_mut() {
            report.errors_drained = errors.drain();
        }

        info!(
            "Shutdown complete after {} collection tick(s)",
            report.collector.ticks
        );
        report
    }
}
