//! Per-channel resource history
//!
//! Fixed-capacity sample buffers recorded at a configurable interval. The
//! frame builder and post-run analysis read these; nothing in the engine
//! feeds back from history into state.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::HistoryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub seconds: f64,
    pub value: f64,
}

/// Snapshot metadata; `enabled: false` snapshots carry no channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMeta {
    pub enabled: bool,
    #[serde(default)]
    pub sample_interval_seconds: f64,
    #[serde(default)]
    pub max_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub meta: HistoryMeta,
    #[serde(default)]
    pub channels: BTreeMap<String, Vec<HistorySample>>,
}

pub struct ResourceHistory {
    config: HistoryConfig,
    /// GET at or after which the next sample records.
    next_sample_at: f64,
    channels: BTreeMap<String, VecDeque<HistorySample>>,
}

impl ResourceHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            next_sample_at: 0.0,
            channels: BTreeMap::new(),
        }
    }

    /// Record one sample per channel if the interval has elapsed.
    ///
    /// Called once per tick with the already-derived channel values; the
    /// interval check keeps the buffers sparse.
    pub fn observe(&mut self, now_seconds: f64, values: &BTreeMap<String, f64>) {
        if !self.config.enabled || now_seconds < self.next_sample_at {
            return;
        }
        self.next_sample_at = now_seconds + self.config.sample_interval_seconds;
        for (channel, value) in values {
            let buffer = self
                .channels
                .entry(channel.clone())
                .or_insert_with(|| VecDeque::with_capacity(self.config.max_samples.min(64)));
            if buffer.len() >= self.config.max_samples {
                buffer.pop_front();
            }
            buffer.push_back(HistorySample {
                seconds: now_seconds,
                value: *value,
            });
        }
    }

    /// Owned snapshot. Two consecutive calls with no intervening tick are
    /// equal (idempotence).
    pub fn snapshot(&self) -> HistorySnapshot {
        if !self.config.enabled {
            return HistorySnapshot {
                meta: HistoryMeta {
                    enabled: false,
                    sample_interval_seconds: 0.0,
                    max_samples: 0,
                },
                channels: BTreeMap::new(),
            };
        }
        HistorySnapshot {
            meta: HistoryMeta {
                enabled: true,
                sample_interval_seconds: self.config.sample_interval_seconds,
                max_samples: self.config.max_samples,
            },
            channels: self
                .channels
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().copied().collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: f64) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("power_margin_pct".to_string(), v);
        map
    }

    #[test]
    fn samples_respect_interval() {
        let mut history = ResourceHistory::new(HistoryConfig {
            enabled: true,
            sample_interval_seconds: 10.0,
            max_samples: 8,
        });
        history.observe(0.0, &values(50.0));
        history.observe(5.0, &values(49.0)); // inside interval, skipped
        history.observe(10.0, &values(48.0));
        let snap = history.snapshot();
        assert_eq!(snap.channels["power_margin_pct"].len(), 2);
    }

    #[test]
    fn buffer_is_bounded() {
        let mut history = ResourceHistory::new(HistoryConfig {
            enabled: true,
            sample_interval_seconds: 1.0,
            max_samples: 3,
        });
        for i in 0..10 {
            history.observe(i as f64, &values(i as f64));
        }
        let snap = history.snapshot();
        let samples = &snap.channels["power_margin_pct"];
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].seconds, 7.0);
    }

    #[test]
    fn disabled_snapshot_is_bare_meta() {
        let history = ResourceHistory::new(HistoryConfig {
            enabled: false,
            sample_interval_seconds: 60.0,
            max_samples: 8,
        });
        let snap = history.snapshot();
        assert!(!snap.meta.enabled);
        assert!(snap.channels.is_empty());
    }

    #[test]
    fn snapshot_is_idempotent() {
        let mut history = ResourceHistory::new(HistoryConfig {
            enabled: true,
            sample_interval_seconds: 1.0,
            max_samples: 8,
        });
        history.observe(0.0, &values(1.0));
        assert_eq!(history.snapshot(), history.snapshot());
    }
}
