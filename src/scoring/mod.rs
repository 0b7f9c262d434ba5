//! Scoring Aggregator
//!
//! Tracks running minima/maxima, fault counters, and manual participation,
//! then folds them into the weighted commander score and letter grade.
//!
//! Scoring decisions (see DESIGN.md): skipped optional events count in
//! neither the numerator nor the denominator of the events sub-score, and
//! `manual_bonus = manual_bonus_weight x manual_fraction`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::resources::ResourceSnapshot;
use crate::scheduler::{EventTransition, TransitionKind};
use crate::types::{Actor, FailureClass};

// ============================================================================
// Summary Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub events: f64,
    pub resources: f64,
    pub faults: f64,
    pub manual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventScoreCounts {
    pub completed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub missed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FaultCounts {
    pub event_failures: u32,
    pub resource_failures: u32,
    pub recoverable: u32,
    pub hard: u32,
    pub by_id: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub commander_score: f64,
    pub grade: String,
    pub breakdown: ScoreBreakdown,
    pub manual_fraction: f64,
    pub manual_bonus: f64,
    pub events: EventScoreCounts,
    pub faults: FaultCounts,
    pub min_power_margin_pct: f64,
    pub max_power_margin_pct: f64,
    pub min_delta_v_margin_mps: f64,
    pub thermal_violation_seconds: f64,
    pub propellant_used_kg: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryEntry {
    pub seconds: f64,
    pub commander_score: f64,
    pub breakdown: ScoreBreakdown,
    /// Per-category change since the previous history entry.
    pub deltas: ScoreBreakdown,
}

// ============================================================================
// Aggregator
// ============================================================================

pub struct ScoreAggregator {
    config: ScoringConfig,
    min_power_margin_pct: f64,
    max_power_margin_pct: f64,
    min_dv_margin_mps: f64,
    baseline_dv_margin_mps: Option<f64>,
    thermal_violation_seconds: f64,
    propellant_used_kg: BTreeMap<String, f64>,
    propellant_initial_kg: BTreeMap<String, f64>,
    events: EventScoreCounts,
    faults: FaultCounts,
    manual_acks: u32,
    auto_acks: u32,
    history: Vec<ScoreHistoryEntry>,
    next_history_at: f64,
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            next_history_at: config.history_interval_seconds,
            config,
            min_power_margin_pct: f64::INFINITY,
            max_power_margin_pct: f64::NEG_INFINITY,
            min_dv_margin_mps: f64::INFINITY,
            baseline_dv_margin_mps: None,
            thermal_violation_seconds: 0.0,
            propellant_used_kg: BTreeMap::new(),
            propellant_initial_kg: BTreeMap::new(),
            events: EventScoreCounts::default(),
            faults: FaultCounts::default(),
            manual_acks: 0,
            auto_acks: 0,
            history: Vec::new(),
        }
    }

    pub fn tick(&mut self, now: f64, dt: f64, resources: &ResourceSnapshot) {
        self.min_power_margin_pct = self.min_power_margin_pct.min(resources.power.margin_pct);
        self.max_power_margin_pct = self.max_power_margin_pct.max(resources.power.margin_pct);

        let dv_margin = resources.delta_v_total_margin_mps;
        self.min_dv_margin_mps = self.min_dv_margin_mps.min(dv_margin);
        if self.baseline_dv_margin_mps.is_none() {
            self.baseline_dv_margin_mps = Some(dv_margin);
        }

        if resources.thermal.violation {
            self.thermal_violation_seconds += dt;
        }

        for (tank, state) in &resources.tanks {
            self.propellant_used_kg
                .insert(tank.clone(), state.used_kg);
            self.propellant_initial_kg
                .entry(tank.clone())
                .or_insert(state.initial_kg);
        }

        if now >= self.next_history_at {
            self.next_history_at = now + self.config.history_interval_seconds;
            let summary = self.summary();
            let previous = self.history.last().map(|e| e.breakdown).unwrap_or_default();
            self.history.push(ScoreHistoryEntry {
                seconds: now,
                commander_score: summary.commander_score,
                breakdown: summary.breakdown,
                deltas: ScoreBreakdown {
                    events: summary.breakdown.events - previous.events,
                    resources: summary.breakdown.resources - previous.resources,
                    faults: summary.breakdown.faults - previous.faults,
                    manual: summary.breakdown.manual - previous.manual,
                },
            });
        }
    }

    pub fn record_transition(&mut self, transition: &EventTransition) {
        match &transition.kind {
            TransitionKind::Completed { missed } => {
                self.events.completed += 1;
                if *missed {
                    self.events.missed += 1;
                }
            }
            TransitionKind::Skipped => self.events.skipped += 1,
            TransitionKind::Failed { .. } => {
                self.events.failed += 1;
                self.faults.event_failures += 1;
            }
            TransitionKind::Armed | TransitionKind::Activated => {}
        }
    }

    /// Count a raised fault. Event-failure counting rides on
    /// `record_transition`; this covers the resource/autopilot paths.
    pub fn record_fault(&mut self, id: &str, classification: FailureClass, from_resources: bool) {
        if from_resources {
            self.faults.resource_failures += 1;
        }
        match classification {
            FailureClass::Recoverable => self.faults.recoverable += 1,
            FailureClass::Hard => self.faults.hard += 1,
        }
        *self.faults.by_id.entry(id.to_string()).or_default() += 1;
    }

    /// Mirror the checklist manager's cumulative ack counters. Idempotent;
    /// the tick loop calls this every tick.
    pub fn sync_acks(&mut self, manual: u32, auto: u32) {
        self.manual_acks = manual;
        self.auto_acks = auto;
    }

    pub fn record_ack(&mut self, actor: Actor) {
        match actor {
            Actor::ManualCrew => self.manual_acks += 1,
            Actor::AutoCrew => self.auto_acks += 1,
        }
    }

    pub fn history(&self) -> &[ScoreHistoryEntry] {
        &self.history
    }

    fn manual_fraction(&self) -> f64 {
        let total = self.manual_acks + self.auto_acks;
        if total == 0 {
            0.0
        } else {
            f64::from(self.manual_acks) / f64::from(total)
        }
    }

    fn events_score(&self) -> f64 {
        // Skipped optional events sit outside both sides of the ratio:
        // the scheduler reports them as Skipped, never Completed.
        let graded = self.events.completed + self.events.failed;
        if graded == 0 {
            1.0
        } else {
            f64::from(self.events.completed) / f64::from(graded)
        }
    }

    fn resources_score(&self) -> f64 {
        let power = if self.min_power_margin_pct.is_finite() {
            (self.min_power_margin_pct / 50.0).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let dv = match (self.baseline_dv_margin_mps, self.min_dv_margin_mps) {
            (Some(baseline), min) if baseline > 0.0 && min.is_finite() => {
                (min / baseline).clamp(0.0, 1.0)
            }
            _ => 1.0,
        };
        let propellant = if self.propellant_initial_kg.is_empty() {
            1.0
        } else {
            let mut total_used = 0.0;
            let mut total_initial = 0.0;
            for (tank, initial) in &self.propellant_initial_kg {
                total_initial += initial;
                total_used += self.propellant_used_kg.get(tank).copied().unwrap_or(0.0);
            }
            if total_initial > 0.0 {
                (1.0 - total_used / total_initial).clamp(0.0, 1.0)
            } else {
                1.0
            }
        };
        let thermal = (1.0 - self.thermal_violation_seconds / 3_600.0).clamp(0.0, 1.0);
        (power + dv + propellant + thermal) / 4.0
    }

    fn faults_score(&self) -> f64 {
        let penalty = 0.25 * f64::from(self.faults.hard) + 0.1 * f64::from(self.faults.recoverable);
        (1.0 - penalty).clamp(0.0, 1.0)
    }

    fn grade_for(&self, score: f64) -> &'static str {
        let g = &self.config;
        if score >= g.grade_a_floor {
            "A"
        } else if score >= g.grade_b_floor {
            "B"
        } else if score >= g.grade_c_floor {
            "C"
        } else if score >= g.grade_d_floor {
            "D"
        } else {
            "F"
        }
    }

    pub fn summary(&self) -> ScoreSummary {
        let manual_fraction = self.manual_fraction();
        let breakdown = ScoreBreakdown {
            events: self.events_score(),
            resources: self.resources_score(),
            faults: self.faults_score(),
            manual: manual_fraction,
        };
        let weighted = self.config.weight_events * breakdown.events
            + self.config.weight_resources * breakdown.resources
            + self.config.weight_faults * breakdown.faults
            + self.config.weight_manual * breakdown.manual;
        let manual_bonus = self.config.manual_bonus_weight * manual_fraction;
        let commander_score = (100.0 * weighted + manual_bonus).clamp(0.0, 100.0);

        ScoreSummary {
            commander_score,
            grade: self.grade_for(commander_score).to_string(),
            breakdown,
            manual_fraction,
            manual_bonus,
            events: self.events,
            faults: self.faults.clone(),
            min_power_margin_pct: finite_or_zero(self.min_power_margin_pct),
            max_power_margin_pct: finite_or_zero(self.max_power_margin_pct),
            min_delta_v_margin_mps: finite_or_zero(self.min_dv_margin_mps),
            thermal_violation_seconds: self.thermal_violation_seconds,
            propellant_used_kg: self.propellant_used_kg.clone(),
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
