//! Baseline computation
//!
//! Baselines are per-metric averages over a user's recent check-ins. They are
//! never stored; each analysis recomputes them from history so the reference
//! point always reflects the current lookback window.

use crate::types::{CheckInRecord, MetricCategory};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default lookback window in days
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Which slice of history feeds a baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineWindow {
    /// Days before the analysis date to include
    pub lookback_days: u32,
    /// Keep only the N most recent records, when set
    pub max_records: Option<usize>,
}

impl Default for BaselineWindow {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_records: None,
        }
    }
}

impl BaselineWindow {
    pub fn with_cap(lookback_days: u32, max_records: usize) -> Self {
        Self {
            lookback_days,
            max_records: Some(max_records),
        }
    }

    /// First date included in the window ending (exclusively) at `as_of`
    pub fn since(&self, as_of: NaiveDate) -> NaiveDate {
        as_of - Duration::days(i64::from(self.lookback_days))
    }
}

/// Per-metric rolling averages; `None` means no qualifying data points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub avg_mood_score: Option<f64>,
    pub avg_energy_level: Option<f64>,
    pub avg_sleep_quality: Option<f64>,
    pub avg_pain_level: Option<f64>,
    pub avg_stress_level: Option<f64>,
    /// Number of check-ins that fed the baseline
    pub check_in_count: usize,
}

impl BaselineMetrics {
    /// Baseline for a metric; symptoms never have one
    pub fn get(&self, category: MetricCategory) -> Option<f64> {
        match category {
            MetricCategory::Mood => self.avg_mood_score,
            MetricCategory::Energy => self.avg_energy_level,
            MetricCategory::Sleep => self.avg_sleep_quality,
            MetricCategory::Pain => self.avg_pain_level,
            MetricCategory::Stress => self.avg_stress_level,
            MetricCategory::Symptoms => None,
        }
    }

    /// True when no metric has a baseline
    pub fn is_unavailable(&self) -> bool {
        MetricCategory::SCORED.iter().all(|c| self.get(*c).is_none())
    }
}

/// Computes baselines from check-in history
pub struct BaselineCalculator;

impl BaselineCalculator {
    /// Select the records inside `window`, newest first.
    ///
    /// Records on or after `as_of` are excluded so the current check-in never
    /// contributes to its own baseline.
    pub fn window_records(
        records: &[CheckInRecord],
        as_of: NaiveDate,
        window: BaselineWindow,
    ) -> Vec<CheckInRecord> {
        let since = window.since(as_of);
        let mut selected: Vec<CheckInRecord> = records
            .iter()
            .filter(|r| r.date >= since && r.date < as_of)
            .cloned()
            .collect();

        selected.sort_by(|a, b| b.date.cmp(&a.date));

        if let Some(cap) = window.max_records {
            selected.truncate(cap);
        }

        selected
    }

    /// Compute a baseline over the windowed history ending at `as_of`
    pub fn calculate(
        records: &[CheckInRecord],
        as_of: NaiveDate,
        window: BaselineWindow,
    ) -> BaselineMetrics {
        let selected = Self::window_records(records, as_of, window);
        Self::from_records(&selected)
    }

    /// Compute a baseline over every record given
    pub fn from_records(records: &[CheckInRecord]) -> BaselineMetrics {
        BaselineMetrics {
            avg_mood_score: Self::average(records, MetricCategory::Mood),
            avg_energy_level: Self::average(records, MetricCategory::Energy),
            avg_sleep_quality: Self::average(records, MetricCategory::Sleep),
            avg_pain_level: Self::average(records, MetricCategory::Pain),
            avg_stress_level: Self::average(records, MetricCategory::Stress),
            check_in_count: records.len(),
        }
    }

    fn average(records: &[CheckInRecord], category: MetricCategory) -> Option<f64> {
        let values: Vec<f64> = records.iter().filter_map(|r| r.metric(category)).collect();
        mean(&values)
    }
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean and population standard deviation, `None` for an empty slice
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some((mean, variance.sqrt()))
}
