use crate::features::system_metrics::models::{round2, MetricSample, MetricSampleBuilder};
use crate::shared::collector::ErrorSink;
use crate::shared::error::{CollectionError, SampleError, StorageError};
use crate::shared::traits::{MetricsSource, MetricsStore};
use chrono::Utc;
use log::{debug, info};
use std::sync::{Mutex, MutexGuard};
use sysinfo::System;
use uuid::Uuid;

/// Reads host utilization through `sysinfo`.
///
/// CPU usage is measured between consecutive refreshes, so each reading
/// covers the time since the previous one (or since construction).
pub struct SysinfoSource {
    sys: Mutex<System>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self { sys: Mutex::new(sys) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, System>, SampleError> {
        self.sys
            .lock()
            .map_err(|_| SampleError::SystemApi("sampler state poisoned".to_string()))
    }
}

impl MetricsSource for SysinfoSource {
    fn cpu_percent(&self) -> Result<f64, SampleError> {
        let mut sys = self.lock()?;
        sys.refresh_cpu_usage();
        if sys.cpus().is_empty() {
            return Err(SampleError::SystemApi("No CPU information available".to_string()));
        }
        let usage = sys.global_cpu_usage() as f64;
        if !usage.is_finite() {
            return Err(SampleError::SystemApi(format!("CPU usage not a number: {}", usage)));
        }
        Ok(usage)
    }

    fn mem_percent(&self) -> Result<f64, SampleError> {
        let mut sys = self.lock()?;
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(SampleError::SystemApi("Total memory reported as zero".to_string()));
        }
        Ok(sys.used_memory() as f64 / total as f64 * 100.0)
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

/// One sampling attempt: read, round, build, persist.
///
/// Failures go to `sink` and never abort the caller. A failed read stops the
/// attempt before anything is written.
pub async fn collect_and_save(
    source: &dyn MetricsSource,
    store: &dyn MetricsStore,
    sink: &ErrorSink,
) -> Option<MetricSample> {
    match try_collect_and_save(source, store).await {
        Ok(sample) => {
            info!(
                "Stored sample {} (cpu {}%, mem {}%)",
                sample.id, sample.cpu_percent, sample.mem_percent
            );
            Some(sample)
        }
        Err(err) => {
            debug!("Sampling attempt failed at {}", err.stage());
            sink.report(err);
            None
        }
    }
}

async fn try_collect_and_save(
    source: &dyn MetricsSource,
    store: &dyn MetricsStore,
) -> Result<MetricSample, CollectionError> {
    let cpu = source.cpu_percent().map_err(CollectionError::CpuRead)?;
    debug!("CPU percent: {}", cpu);

    let mem = source.mem_percent().map_err(CollectionError::MemRead)?;
    debug!("Memory percent: {}", mem);

    let sample = MetricSampleBuilder::new()
        .id(Uuid::new_v4())
        .created_at(Utc::now())
        .cpu_percent(round2(cpu))
        .mem_percent(round2(mem))
        .build()
        .map_err(|e| CollectionError::Persist(StorageError::InvalidRecord(e)))?;

    store.save(&sample).await.map_err(CollectionError::Persist)?;
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysinfo_readings_are_percentages() {
        let source = SysinfoSource::new();
        let cpu = source.cpu_percent().unwrap();
        let mem = source.mem_percent().unwrap();

        assert!((0.0..=100.0).contains(&cpu), "cpu {}", cpu);
        assert!((0.0..=100.0).contains(&mem), "mem {}", mem);
    }
}
