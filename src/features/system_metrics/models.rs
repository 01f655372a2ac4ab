use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::shared::traits::Validatable;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Rounds to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One CPU/memory reading. Never mutated after it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub id: Uuid,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub created_at: DateTime<Utc>,
}

impl Validatable for MetricSample {
    fn validate(&self) -> Result<(), String> {
        check_percent("cpu_percent", self.cpu_percent)?;
        check_percent("mem_percent", self.mem_percent)?;
        Ok(())
    }
}

fn check_percent(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(format!("{} must be between 0 and 100, got {}", name, value));
    }
    Ok(())
}

#[derive(Default)]
pub struct MetricSampleBuilder {
    id: Option<Uuid>,
    cpu_percent: Option<f64>,
    mem_percent: Option<f64>,
    created_at: Option<DateTime<Utc>>,
}

impl MetricSampleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn cpu_percent(mut self, cpu_percent: f64) -> Self {
        self.cpu_percent = Some(cpu_percent);
        self
    }

    pub fn mem_percent(mut self, mem_percent: f64) -> Self {
        self.mem_percent = Some(mem_percent);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Missing id and timestamp default to a fresh v4 id and now.
    pub fn build(self) -> Result<MetricSample, String> {
        let sample = MetricSample {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            cpu_percent: self.cpu_percent.ok_or("cpu_percent is required")?,
            mem_percent: self.mem_percent.ok_or("mem_percent is required")?,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        };

        sample.validate()?;
        Ok(sample)
    }
}

/// Means over a window. The averages are `None` when no rows matched, which
/// keeps "no data" apart from a genuine 0% reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
    pub sample_count: i64,
}

impl AverageMetrics {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Inclusive `[start, end]` filter on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: u32,
    pub offset: i64,
}

impl PageRequest {
    /// `page` is 1-based. Out-of-range values are normalised rather than
    /// rejected: a page below 1 becomes 1, a size below 1 falls back to the
    /// default and a size above the maximum is clamped. An offset past
    /// `i64::MAX` saturates, which still lands past the last row.
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = page.max(1);
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size.min(MAX_PAGE_SIZE as i64) as u32
        };

        Self {
            page_size,
            offset: (page - 1).saturating_mul(page_size as i64),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub samples: Vec<MetricSample>,
    pub total_records: i64,
}
