//! Communications pass state machine
//!
//! Each scheduled ground-station pass steps `idle → acquiring → active →
//! losing → idle` from GET comparisons alone. Signal strength ramps linearly
//! over the handover window at each end of the pass; acquire/loss cues fire
//! exactly once per pass.

use serde::{Deserialize, Serialize};

use crate::types::CommsPassDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    #[default]
    Idle,
    Acquiring,
    Active,
    Losing,
}

impl PassState {
    pub fn as_str(self) -> &'static str {
        match self {
            PassState::Idle => "idle",
            PassState::Acquiring => "acquiring",
            PassState::Active => "active",
            PassState::Losing => "losing",
        }
    }
}

impl std::fmt::Display for PassState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommsCueKind {
    Acquire,
    Loss,
}

/// Cue emitted on a pass transition, consumed by the audio binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommsCue {
    pub cue_id: String,
    pub pass_id: String,
    pub station: String,
    pub kind: CommsCueKind,
}

#[derive(Debug, Clone)]
struct PassRuntime {
    def: CommsPassDef,
    handover_seconds: f64,
    state: PassState,
    acquire_fired: bool,
    loss_fired: bool,
}

impl PassRuntime {
    /// Phase of this pass at `now`, from GET comparisons only.
    fn phase_at(&self, now: f64) -> PassState {
        let open = self.def.open_at.seconds();
        let close = self.def.close_at.seconds();
        if now < open || now >= close {
            return PassState::Idle;
        }
        // Short passes split at the midpoint so ramps never cross.
        let mid = (open + close) / 2.0;
        let plateau_start = (open + self.handover_seconds).min(mid);
        let plateau_end = (close - self.handover_seconds).max(mid);
        if now < plateau_start {
            PassState::Acquiring
        } else if now < plateau_end {
            PassState::Active
        } else {
            PassState::Losing
        }
    }

    fn signal_strength(&self, now: f64) -> f64 {
        let open = self.def.open_at.seconds();
        let close = self.def.close_at.seconds();
        match self.phase_at(now) {
            PassState::Idle => 0.0,
            PassState::Active => 1.0,
            PassState::Acquiring => ((now - open) / self.handover_seconds).clamp(0.0, 1.0),
            PassState::Losing => ((close - now) / self.handover_seconds).clamp(0.0, 1.0),
        }
    }
}

/// Read-only comms view embedded in the resource snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommsSnapshot {
    pub state: PassState,
    pub current_pass_id: Option<String>,
    pub station: Option<String>,
    pub signal_strength: f64,
    pub next_pass: Option<NextPassInfo>,
    pub passes_completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPassInfo {
    pub id: String,
    pub station: String,
    pub open_at_seconds: f64,
}

pub struct CommsController {
    passes: Vec<PassRuntime>,
    passes_completed: u32,
}

impl CommsController {
    pub fn new(defs: &[CommsPassDef], default_handover_minutes: f64) -> Self {
        let mut passes: Vec<PassRuntime> = defs
            .iter()
            .map(|def| PassRuntime {
                handover_seconds: def.handover_minutes.unwrap_or(default_handover_minutes) * 60.0,
                def: def.clone(),
                state: PassState::Idle,
                acquire_fired: false,
                loss_fired: false,
            })
            .collect();
        passes.sort_by(|a, b| {
            a.def
                .open_at
                .seconds()
                .partial_cmp(&b.def.open_at.seconds())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            passes,
            passes_completed: 0,
        }
    }

    /// Advance every pass to `now`, returning cues for transitions that
    /// occurred this tick.
    pub fn tick(&mut self, now: f64) -> Vec<CommsCue> {
        let mut cues = Vec::new();
        for pass in &mut self.passes {
            let next_state = pass.phase_at(now);
            if next_state == pass.state {
                continue;
            }
            // Acquire fires on leaving idle into the pass.
            if pass.state == PassState::Idle
                && next_state != PassState::Idle
                && !pass.acquire_fired
            {
                pass.acquire_fired = true;
                if let Some(cue_id) = &pass.def.cue_on_acquire {
                    cues.push(CommsCue {
                        cue_id: cue_id.clone(),
                        pass_id: pass.def.id.clone(),
                        station: pass.def.station.clone(),
                        kind: CommsCueKind::Acquire,
                    });
                }
            }
            if next_state == PassState::Losing && !pass.loss_fired {
                pass.loss_fired = true;
                if let Some(cue_id) = &pass.def.cue_on_loss {
                    cues.push(CommsCue {
                        cue_id: cue_id.clone(),
                        pass_id: pass.def.id.clone(),
                        station: pass.def.station.clone(),
                        kind: CommsCueKind::Loss,
                    });
                }
            }
            if next_state == PassState::Idle && pass.state != PassState::Idle {
                self.passes_completed += 1;
            }
            pass.state = next_state;
        }
        cues
    }

    pub fn snapshot(&self, now: f64) -> CommsSnapshot {
        // At most one pass is non-idle at a time; overlapping schedule
        // entries resolve to the earliest-opening pass.
        let current = self.passes.iter().find(|p| p.state != PassState::Idle);
        let next_pass = self
            .passes
            .iter()
            .filter(|p| p.def.open_at.seconds() > now)
            .min_by(|a, b| {
                a.def
                    .open_at
                    .seconds()
                    .partial_cmp(&b.def.open_at.seconds())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|p| NextPassInfo {
                id: p.def.id.clone(),
                station: p.def.station.clone(),
                open_at_seconds: p.def.open_at.seconds(),
            });

        CommsSnapshot {
            state: current.map_or(PassState::Idle, |p| p.state),
            current_pass_id: current.map(|p| p.def.id.clone()),
            station: current.map(|p| p.def.station.clone()),
            signal_strength: current.map_or(0.0, |p| p.signal_strength(now)),
            next_pass,
            passes_completed: self.passes_completed,
        }
    }
}
