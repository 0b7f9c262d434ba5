//! Audio Trigger Binder
//!
//! Observes subsystem transitions and emits a chronologically ordered
//! stream of cue triggers. The binder owns bus concurrency (priority
//! pre-emption), per-category and per-cue cooldowns, and a ledger of every
//! emitted trigger for validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AudioConfig;

/// Bus occupancy per emitted cue (seconds of GET).
const CUE_PLAYBACK_SECONDS: f64 = 4.0;

// ============================================================================
// Cue Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueSeverity {
    Info,
    Caution,
    Warning,
    Failure,
}

impl CueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            CueSeverity::Info => "info",
            CueSeverity::Caution => "caution",
            CueSeverity::Warning => "warning",
            CueSeverity::Failure => "failure",
        }
    }

    /// Default priority: severer cues pre-empt.
    pub fn priority(self) -> u8 {
        match self {
            CueSeverity::Info => 1,
            CueSeverity::Caution => 2,
            CueSeverity::Warning => 3,
            CueSeverity::Failure => 4,
        }
    }
}

/// A cue some subsystem wants played.
#[derive(Debug, Clone, PartialEq)]
pub struct CueRequest {
    pub cue_id: String,
    pub severity: CueSeverity,
    pub category: String,
    pub bus_id: String,
    pub source_type: String,
    pub source_id: String,
    pub metadata: serde_json::Value,
}

/// One emitted trigger, as the ledger and frame stream see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrigger {
    pub cue_id: String,
    pub severity: String,
    pub bus_id: String,
    pub source_type: String,
    pub source_id: String,
    pub triggered_at_seconds: f64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioStats {
    pub emitted: u32,
    pub dropped: u32,
    pub suppressed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudioSnapshot {
    pub last_cue_id: Option<String>,
    pub emitted: u32,
    pub dropped: u32,
    pub suppressed: u32,
    pub active_buses: BTreeMap<String, u32>,
}

// ============================================================================
// Binder
// ============================================================================

#[derive(Debug, Clone)]
struct PlayingCue {
    priority: u8,
    until_seconds: f64,
}

#[derive(Debug, Clone)]
struct BusState {
    concurrency: usize,
    playing: Vec<PlayingCue>,
}

pub struct AudioBinder {
    config: AudioConfig,
    buses: BTreeMap<String, BusState>,
    cue_last_fired: BTreeMap<String, f64>,
    category_last_fired: BTreeMap<String, f64>,
    ledger: Vec<AudioTrigger>,
    stats: AudioStats,
}

impl AudioBinder {
    pub fn new(config: &AudioConfig) -> Self {
        let buses = config
            .buses
            .iter()
            .map(|bus| {
                (
                    bus.id.clone(),
                    BusState {
                        concurrency: bus.concurrency as usize,
                        playing: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            config: config.clone(),
            buses,
            cue_last_fired: BTreeMap::new(),
            category_last_fired: BTreeMap::new(),
            ledger: Vec::new(),
            stats: AudioStats::default(),
        }
    }

    /// Expire finished playbacks. Call once per tick before ingesting.
    pub fn tick(&mut self, now: f64) {
        for bus in self.buses.values_mut() {
            bus.playing.retain(|cue| cue.until_seconds > now);
        }
    }

    /// Offer a cue. Returns true when it was emitted to the ledger.
    pub fn ingest(&mut self, now: f64, request: CueRequest) -> bool {
        // Cooldowns first: a suppressed cue never contends for a bus.
        if let Some(&last) = self.cue_last_fired.get(&request.cue_id) {
            if now - last < self.config.cue_cooldown_seconds {
                self.stats.suppressed += 1;
                return false;
            }
        }
        if let Some(&last) = self.category_last_fired.get(&request.category) {
            if now - last < self.config.category_cooldown_seconds {
                self.stats.suppressed += 1;
                return false;
            }
        }

        let priority = request.severity.priority();
        let bus = self
            .buses
            .entry(request.bus_id.clone())
            .or_insert_with(|| BusState {
                concurrency: 1,
                playing: Vec::new(),
            });

        if bus.playing.len() >= bus.concurrency {
            // Pre-empt the lowest-priority playback if we outrank it.
            let lowest = bus
                .playing
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.priority)
                .map(|(i, c)| (i, c.priority));
            match lowest {
                Some((index, lowest_priority)) if priority > lowest_priority => {
                    bus.playing.remove(index);
                }
                _ => {
                    self.stats.dropped += 1;
                    return false;
                }
            }
        }

        bus.playing.push(PlayingCue {
            priority,
            until_seconds: now + CUE_PLAYBACK_SECONDS,
        });
        self.cue_last_fired.insert(request.cue_id.clone(), now);
        self.category_last_fired.insert(request.category.clone(), now);
        self.stats.emitted += 1;
        self.ledger.push(AudioTrigger {
            cue_id: request.cue_id,
            severity: request.severity.as_str().to_string(),
            bus_id: request.bus_id,
            source_type: request.source_type,
            source_id: request.source_id,
            triggered_at_seconds: now,
            metadata: request.metadata,
        });
        true
    }

    pub fn stats(&self) -> AudioStats {
        self.stats
    }

    pub fn ledger(&self) -> &[AudioTrigger] {
        &self.ledger
    }

    pub fn snapshot(&self) -> AudioSnapshot {
        AudioSnapshot {
            last_cue_id: self.ledger.last().map(|t| t.cue_id.clone()),
            emitted: self.stats.emitted,
            dropped: self.stats.dropped,
            suppressed: self.stats.suppressed,
            active_buses: self
                .buses
                .iter()
                .filter(|(_, bus)| !bus.playing.is_empty())
                .map(|(id, bus)| (id.clone(), bus.playing.len() as u32))
                .collect(),
        }
    }
}
