//! Docking Context
//!
//! Derives rendezvous progress from the bound event, walks the configured
//! gates through `pending → active → complete`, interpolates range along
//! the current gate segment, and tracks per-quad RCS duty cycle as an
//! exponentially decaying running mean.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scheduler::event::EventStatus;
use crate::scheduler::EventScheduler;
use crate::types::{DockingConfigDef, DockingGateDef};

// ============================================================================
// Event Source Seam
// ============================================================================

/// The slice of an event the docking context needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DockingEventView {
    pub status: EventStatus,
    pub activation_time_seconds: Option<f64>,
    pub opens_at_seconds: f64,
    pub closes_at_seconds: f64,
    pub expected_duration_seconds: Option<f64>,
}

/// Scheduler-like contract, narrow enough for test stubs.
pub trait EventSource {
    fn docking_event(&self, id: &str) -> Option<DockingEventView>;
}

impl EventSource for EventScheduler {
    fn docking_event(&self, id: &str) -> Option<DockingEventView> {
        self.get_event_by_id(id).map(|e| DockingEventView {
            status: e.status,
            activation_time_seconds: e.activation_time_seconds,
            opens_at_seconds: e.def.opens_at.seconds(),
            closes_at_seconds: e.def.closes_at.seconds(),
            expected_duration_seconds: e.def.expected_duration_seconds,
        })
    }
}

// ============================================================================
// Gate Runtime
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    #[default]
    Pending,
    Active,
    Complete,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GateStatus::Pending => "pending",
            GateStatus::Active => "active",
            GateStatus::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone)]
struct GateRuntime {
    def: DockingGateDef,
    status: GateStatus,
    activated_at_seconds: Option<f64>,
    completed_at_seconds: Option<f64>,
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSnapshot {
    pub id: String,
    pub status: String,
    pub range_meters: f64,
    pub target_rate_mps: f64,
    pub tolerance_mps: f64,
    pub progress: f64,
    /// GET by which this gate must complete: window open plus the gate's
    /// completion share of the window.
    pub deadline_seconds: f64,
    pub activated_at_seconds: Option<f64>,
    pub completed_at_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockingSnapshot {
    pub event_id: String,
    pub status: String,
    pub progress: f64,
    pub active_gate_id: Option<String>,
    pub range_meters: f64,
    /// Negative while closing; the active gate's target.
    pub closing_rate_mps: f64,
    pub gates: Vec<GateSnapshot>,
    pub rcs_duty_pct_by_quad: BTreeMap<String, f64>,
}

// ============================================================================
// Context
// ============================================================================

pub struct DockingContext {
    config: DockingConfigDef,
    gates: Vec<GateRuntime>,
    /// Raw duty accumulator per quad; snapshot renders `clamp(x*100, 0, 100)`.
    duty: BTreeMap<String, f64>,
    progress: f64,
    event_status: EventStatus,
    /// Bound event's open/close window, for gate deadlines.
    window: (f64, f64),
}

impl DockingContext {
    pub fn new(config: &DockingConfigDef) -> Self {
        let duty = config.quads.iter().map(|q| (q.clone(), 0.0)).collect();
        Self {
            gates: config
                .gates
                .iter()
                .map(|def| GateRuntime {
                    def: def.clone(),
                    status: GateStatus::Pending,
                    activated_at_seconds: None,
                    completed_at_seconds: None,
                })
                .collect(),
            config: config.clone(),
            duty,
            progress: 0.0,
            event_status: EventStatus::Pending,
            window: (0.0, 0.0),
        }
    }

    /// Fold an RCS burst into the duty accumulators (decay is applied in
    /// `tick`, contributions land instantly).
    pub fn record_rcs_usage(&mut self, quad_id: &str, pulses: u32, duration_seconds: f64) {
        let window = self.config.duty_cycle_window_seconds.max(1e-6);
        let contribution = f64::from(pulses) * duration_seconds / window;
        *self.duty.entry(quad_id.to_string()).or_insert(0.0) += contribution;
    }

    /// Advance progress and gate states; returns ids of gates that
    /// completed this tick (audio cue fodder).
    pub fn tick(&mut self, now: f64, dt: f64, events: &impl EventSource) -> Vec<String> {
        // Duty cycle decay: duty_t = duty_{t-dt} * exp(-dt/tau)
        let tau = self.config.duty_cycle_window_seconds.max(1e-6);
        let decay = (-dt / tau).exp();
        for value in self.duty.values_mut() {
            *value *= decay;
        }

        let Some(event) = events.docking_event(&self.config.event_id) else {
            return Vec::new();
        };
        self.event_status = event.status;
        self.window = (event.opens_at_seconds, event.closes_at_seconds);
        self.progress = derive_progress(&event, now);
        if !matches!(event.status, EventStatus::Active | EventStatus::Complete) {
            return Vec::new();
        }

        let mut completed = Vec::new();
        for gate in &mut self.gates {
            let next = if self.progress >= gate.def.completion_progress {
                GateStatus::Complete
            } else if self.progress >= gate.def.activation_progress {
                GateStatus::Active
            } else {
                GateStatus::Pending
            };
            if next != gate.status {
                match next {
                    GateStatus::Active => gate.activated_at_seconds = Some(now),
                    GateStatus::Complete => {
                        if gate.activated_at_seconds.is_none() {
                            gate.activated_at_seconds = Some(now);
                        }
                        gate.completed_at_seconds = Some(now);
                        completed.push(gate.def.id.clone());
                    }
                    GateStatus::Pending => {}
                }
                gate.status = next;
            }
        }
        completed
    }

    fn active_gate(&self) -> Option<&GateRuntime> {
        self.gates.iter().find(|g| g.status == GateStatus::Active)
    }

    /// Range interpolated along the current segment of the gate ladder.
    fn range_meters(&self) -> f64 {
        let start = self.config.start_range_m;
        let end = self.config.end_range_m;
        if self.gates.is_empty() {
            return lerp(start, end, self.progress);
        }

        // Segment boundaries: (progress, range) knots walked in order.
        let mut knots: Vec<(f64, f64)> = Vec::with_capacity(self.gates.len() * 2 + 2);
        knots.push((0.0, start));
        for gate in &self.gates {
            knots.push((gate.def.completion_progress, gate.def.range_m));
        }
        knots.push((1.0, end));

        let p = self.progress.clamp(0.0, 1.0);
        for pair in knots.windows(2) {
            let (p0, r0) = pair[0];
            let (p1, r1) = pair[1];
            if p <= p1 {
                let span = p1 - p0;
                let t = if span > 0.0 { (p - p0) / span } else { 1.0 };
                return lerp(r0, r1, t);
            }
        }
        end
    }

    pub fn snapshot(&self) -> DockingSnapshot {
        let closing_rate = self
            .active_gate()
            .map(|g| -g.def.target_closing_rate_mps)
            .or_else(|| {
                self.gates
                    .iter()
                    .find(|g| g.status == GateStatus::Pending)
                    .map(|g| -g.def.target_closing_rate_mps)
            })
            .unwrap_or(0.0);

        let (open, close) = self.window;

        DockingSnapshot {
            event_id: self.config.event_id.clone(),
            status: self.event_status.as_str().to_string(),
            progress: self.progress,
            active_gate_id: self.active_gate().map(|g| g.def.id.clone()),
            range_meters: self.range_meters(),
            closing_rate_mps: closing_rate,
            gates: self
                .gates
                .iter()
                .map(|gate| {
                    let span = gate.def.completion_progress - gate.def.activation_progress;
                    let gate_progress = if span > 0.0 {
                        ((self.progress - gate.def.activation_progress) / span).clamp(0.0, 1.0)
                    } else if self.progress >= gate.def.completion_progress {
                        1.0
                    } else {
                        0.0
                    };
                    GateSnapshot {
                        id: gate.def.id.clone(),
                        status: gate.status.as_str().to_string(),
                        range_meters: gate.def.range_m,
                        target_rate_mps: gate.def.target_closing_rate_mps,
                        tolerance_mps: gate.def.tolerance_mps,
                        progress: gate_progress,
                        deadline_seconds: open + (close - open) * gate.def.completion_progress,
                        activated_at_seconds: gate.activated_at_seconds,
                        completed_at_seconds: gate.completed_at_seconds,
                    }
                })
                .collect(),
            rcs_duty_pct_by_quad: self
                .duty
                .iter()
                .map(|(quad, value)| (quad.clone(), (value * 100.0).clamp(0.0, 100.0)))
                .collect(),
        }
    }

}

fn derive_progress(event: &DockingEventView, now: f64) -> f64 {
    match event.status {
        EventStatus::Complete => 1.0,
        EventStatus::Active => {
            if let (Some(activation), Some(duration)) =
                (event.activation_time_seconds, event.expected_duration_seconds)
            {
                if duration > 0.0 {
                    return ((now - activation) / duration).clamp(0.0, 1.0);
                }
            }
            let span = event.closes_at_seconds - event.opens_at_seconds;
            if span > 0.0 {
                ((now - event.opens_at_seconds) / span).clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GetTime;

    /// Stub event source: one active docking event.
    struct StubEvents {
        view: DockingEventView,
    }

    impl EventSource for StubEvents {
        fn docking_event(&self, _id: &str) -> Option<DockingEventView> {
            Some(self.view)
        }
    }

    fn gate(id: &str, range: f64, rate: f64, activation: f64, completion: f64) -> DockingGateDef {
        DockingGateDef {
            id: id.to_string(),
            range_m: range,
            target_closing_rate_mps: rate,
            tolerance_mps: 0.2,
            activation_progress: activation,
            completion_progress: completion,
            checklist_id: None,
        }
    }

    fn ascent_config() -> DockingConfigDef {
        DockingConfigDef {
            event_id: "LM_ASCENT_030".to_string(),
            start_range_m: 1_000.0,
            end_range_m: 0.0,
            duty_cycle_window_seconds: 60.0,
            quads: vec!["LM_RCS_QUAD_A".to_string(), "LM_RCS_QUAD_B".to_string()],
            gates: vec![
                gate("GATE_500M", 500.0, 2.0, 0.0, 0.3),
                gate("GATE_150M", 150.0, 0.9, 0.3, 0.7),
                gate("GATE_DOCK", 10.0, 0.3, 0.9, 1.0),
            ],
        }
    }

    fn ascent_event() -> DockingEventView {
        DockingEventView {
            status: EventStatus::Active,
            activation_time_seconds: Some(GetTime::parse("125:50:00").unwrap().seconds()),
            opens_at_seconds: GetTime::parse("125:40:00").unwrap().seconds(),
            closes_at_seconds: GetTime::parse("128:30:00").unwrap().seconds(),
            expected_duration_seconds: Some(7_200.0),
        }
    }

    #[test]
    fn gate_traversal_mid_sequence() {
        let mut docking = DockingContext::new(&ascent_config());
        let events = StubEvents {
            view: ascent_event(),
        };
        let now = GetTime::parse("126:45:00").unwrap().seconds();
        docking.tick(now, 0.05, &events);

        let snap = docking.snapshot();
        // 55 minutes into a 7200 s window
        assert!((snap.progress - 3_300.0 / 7_200.0).abs() < 1e-9);
        assert_eq!(snap.active_gate_id.as_deref(), Some("GATE_150M"));
        assert!(snap.range_meters < 500.0);
        assert!((snap.closing_rate_mps - (-0.9)).abs() < 1e-9);

        let first = &snap.gates[0];
        assert_eq!(first.id, "GATE_500M");
        assert_eq!(first.status, "complete");
        let open = ascent_event().opens_at_seconds;
        let close = ascent_event().closes_at_seconds;
        assert!((first.deadline_seconds - (open + (close - open) * 0.3)).abs() < 1e-6);

        let last = &snap.gates[2];
        assert_eq!(last.status, "pending");
    }

    #[test]
    fn earlier_gates_complete_before_later_activate() {
        let mut docking = DockingContext::new(&ascent_config());
        let mut view = ascent_event();
        let open = view.activation_time_seconds.unwrap();
        // Walk progress forward and check ordering at each step
        for minutes in (0..120).step_by(5) {
            let now = open + f64::from(minutes) * 60.0;
            docking.tick(now, 0.05, &StubEvents { view });
            let snap = docking.snapshot();
            for (i, g) in snap.gates.iter().enumerate() {
                if g.status != "pending" {
                    for earlier in &snap.gates[..i] {
                        assert_eq!(earlier.status, "complete", "gate ordering broken");
                    }
                }
            }
        }
        view.status = EventStatus::Complete;
        docking.tick(open + 7_300.0, 0.05, &StubEvents { view });
        let snap = docking.snapshot();
        assert!(snap.gates.iter().all(|g| g.status == "complete"));
    }

    #[test]
    fn rcs_duty_decays_to_e_inverse_after_window() {
        let mut docking = DockingContext::new(&ascent_config());
        let events = StubEvents {
            view: ascent_event(),
        };
        let start = GetTime::parse("126:44:00").unwrap().seconds();
        docking.record_rcs_usage("LM_RCS_QUAD_A", 4, 0.4);
        docking.tick(start, 0.05, &events);
        let initial = docking.snapshot().rcs_duty_pct_by_quad["LM_RCS_QUAD_A"];
        assert!(initial > 0.0);

        let dt = 0.05;
        let ticks = (60.0 / dt) as u64;
        for i in 1..=ticks {
            docking.tick(start + i as f64 * dt, dt, &events);
        }
        let after = docking.snapshot().rcs_duty_pct_by_quad["LM_RCS_QUAD_A"];
        let expected = initial * (-1.0f64).exp();
        assert!(
            (after - expected).abs() < expected * 0.01,
            "after {after}, expected ~{expected}"
        );
    }

    #[test]
    fn pending_event_reports_zero_progress() {
        let mut docking = DockingContext::new(&ascent_config());
        let mut view = ascent_event();
        view.status = EventStatus::Pending;
        view.activation_time_seconds = None;
        docking.tick(0.0, 0.05, &StubEvents { view });
        let snap = docking.snapshot();
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.range_meters, 1_000.0);
        assert!(snap.active_gate_id.is_none());
    }
}
