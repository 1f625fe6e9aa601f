//! Metrics snapshots sent with every heartbeat.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Source drained once per heartbeat tick.
pub trait MetricsSource: Send + Sync {
    /// Take and clear the current observations.
    fn take_observations(&self) -> MetricsSnapshot;
}

/// Observations of one named metric over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricObservation {
    pub name: String,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    pub observation: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsSnapshot(Vec<MetricObservation>);

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&MetricObservation> {
        self.0.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricObservation> {
        self.0.iter()
    }
}

struct Period {
    start: DateTime<Utc>,
    series: BTreeMap<String, BTreeMap<String, u64>>,
}

/// In-memory counters keyed by metric name then observation key.
pub struct MetricsStore {
    period: Mutex<Period>,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore {
    pub fn new() -> Self {
        Self {
            period: Mutex::new(Period {
                start: Utc::now(),
                series: BTreeMap::new(),
            }),
        }
    }

    /// Discard pending observations and open a new period.
    pub fn start(&self) {
        let mut period = self.period.lock().unwrap_or_else(|e| e.into_inner());
        period.start = Utc::now();
        period.series.clear();
    }

    pub fn add(&self, metric: &str, key: &str, delta: u64) {
        let mut period = self.period.lock().unwrap_or_else(|e| e.into_inner());
        let value = period
            .series
            .entry(metric.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert(0);
        *value = value.saturating_add(delta);
    }
}

impl MetricsSource for MetricsStore {
    fn take_observations(&self) -> MetricsSnapshot {
        let finish = Utc::now();
        let mut period = self.period.lock().unwrap_or_else(|e| e.into_inner());
        let start = std::mem::replace(&mut period.start, finish);
        let series = std::mem::take(&mut period.series);
        drop(period);

        MetricsSnapshot(
            series
                .into_iter()
                .map(|(name, observation)| MetricObservation {
                    name,
                    start,
                    finish,
                    observation,
                })
                .collect(),
        )
    }
}
