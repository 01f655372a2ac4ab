#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics_monitor::{
    AverageMetrics, MetricSample, MetricSampleBuilder, MetricsSource, MetricsStore, Page,
    PageRequest, SampleError, StorageError, TimeWindow,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns fixed readings, or fails on demand.
pub struct StubSource {
    cpu: Option<f64>,
    mem: Option<f64>,
    cpu_calls: AtomicUsize,
    mem_calls: AtomicUsize,
}

impl StubSource {
    pub fn new(cpu: f64, mem: f64) -> Self {
        Self {
            cpu: Some(cpu),
            mem: Some(mem),
            cpu_calls: AtomicUsize::new(0),
            mem_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_cpu() -> Self {
        Self { cpu: None, ..Self::new(0.0, 50.0) }
    }

    pub fn failing_mem() -> Self {
        Self { mem: None, ..Self::new(25.0, 0.0) }
    }

    pub fn cpu_calls(&self) -> usize {
        self.cpu_calls.load(Ordering::SeqCst)
    }

    pub fn mem_calls(&self) -> usize {
        self.mem_calls.load(Ordering::SeqCst)
    }
}

impl MetricsSource for StubSource {
    fn cpu_percent(&self) -> Result<f64, SampleError> {
        self.cpu_calls.fetch_add(1, Ordering::SeqCst);
        self.cpu
            .ok_or_else(|| SampleError::SystemApi("cpu counters unavailable".to_string()))
    }

    fn mem_percent(&self) -> Result<f64, SampleError> {
        self.mem_calls.fetch_add(1, Ordering::SeqCst);
        self.mem
            .ok_or_else(|| SampleError::SystemApi("meminfo unavailable".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Records saved samples in memory. `close` can be made to hang too.
pub struct RecordingStore {
    saved: Mutex<Vec<MetricSample>>,
    save_behavior: SaveBehavior,
    hang_on_close: bool,
}

impl RecordingStore {
    pub fn new(save_behavior: SaveBehavior) -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            save_behavior,
            hang_on_close: false,
        }
    }

    pub fn hanging_on_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }

    pub fn saved(&self) -> Vec<MetricSample> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsStore for RecordingStore {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError> {
        match self.save_behavior {
            SaveBehavior::Succeed => {
                self.saved.lock().unwrap().push(sample.clone());
                Ok(())
            }
            SaveBehavior::Fail => Err(StorageError::Write("connection refused".to_string())),
            SaveBehavior::Hang => std::future::pending().await,
        }
    }

    async fn list_page(
        &self,
        _page: PageRequest,
        _window: Option<TimeWindow>,
    ) -> Result<Page, StorageError> {
        Ok(Page { samples: self.saved(), total_records: self.saved().len() as i64 })
    }

    async fn list_range(&self, _window: TimeWindow) -> Result<Vec<MetricSample>, StorageError> {
        Ok(self.saved())
    }

    async fn average(&self, _window: TimeWindow) -> Result<AverageMetrics, StorageError> {
        Err(StorageError::Read("not supported".to_string()))
    }

    async fn close(&self) {
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
    }
}

pub fn sample_at(cpu: f64, mem: f64, created_at: DateTime<Utc>) -> MetricSample {
    MetricSampleBuilder::new()
        .cpu_percent(cpu)
        .mem_percent(mem)
        .created_at(created_at)
        .build()
        .unwrap()
}
