//! Entry / Recovery Monitor
//!
//! Derives the entry corridor angle, blackout-window status, g-load, EMS
//! velocity/altitude (orbit summary with PAD-target fallback), and the
//! recovery timeline from scheduler status and GET bounds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::orbit::OrbitSummary;
use crate::scheduler::event::EventStatus;
use crate::types::{EntryTimelineDef, PadDef};

/// A GET-offset recovery step completes this long after it acknowledges.
const RECOVERY_STEP_COMPLETE_SECONDS: f64 = 60.0;

// ============================================================================
// Snapshot Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    #[default]
    Pending,
    Active,
    Complete,
}

impl WindowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowStatus::Pending => "pending",
            WindowStatus::Active => "active",
            WindowStatus::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStepStatus {
    #[default]
    Pending,
    Acknowledged,
    Complete,
}

impl RecoveryStepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStepStatus::Pending => "pending",
            RecoveryStepStatus::Acknowledged => "acknowledged",
            RecoveryStepStatus::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorSnapshot {
    pub target_deg: f64,
    pub current_deg: f64,
    pub tolerance_deg: f64,
    pub in_corridor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutSnapshot {
    pub status: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmsSnapshot {
    pub velocity_mps: f64,
    pub altitude_km: f64,
    /// `orbit` or `pad`, whichever supplied the numbers.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStepSnapshot {
    pub id: String,
    pub label: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub corridor: CorridorSnapshot,
    pub blackout: BlackoutSnapshot,
    pub current_g: f64,
    pub max_g: f64,
    pub ems: EmsSnapshot,
    pub recovery: Vec<RecoveryStepSnapshot>,
}

// ============================================================================
// Monitor
// ============================================================================

pub struct EntryMonitor {
    config: EntryTimelineDef,
    ems_pad: Option<PadDef>,
    recovery: Vec<RecoveryStepStatus>,
    blackout: WindowStatus,
    current_g: f64,
    max_g: f64,
    corridor_current_deg: f64,
    ems: EmsSnapshot,
}

impl EntryMonitor {
    pub fn new(config: &EntryTimelineDef, ems_pad: Option<&PadDef>) -> Self {
        Self {
            recovery: vec![RecoveryStepStatus::Pending; config.recovery_steps.len()],
            config: config.clone(),
            ems_pad: ems_pad.cloned(),
            blackout: WindowStatus::Pending,
            current_g: 0.0,
            max_g: 0.0,
            corridor_current_deg: 0.0,
            ems: EmsSnapshot {
                velocity_mps: 0.0,
                altitude_km: 0.0,
                source: "orbit".to_string(),
            },
        }
    }

    pub fn tick(
        &mut self,
        now: f64,
        statuses: &BTreeMap<String, EventStatus>,
        orbit: &OrbitSummary,
    ) {
        let keyed_active = self
            .config
            .event_id
            .as_ref()
            .and_then(|id| statuses.get(id))
            .is_some_and(|s| *s == EventStatus::Active);

        // Corridor: offset applies while the keyed entry event is active.
        self.corridor_current_deg = self.config.corridor_target_deg
            + if keyed_active {
                self.config.corridor_active_offset_deg
            } else {
                0.0
            };

        // Blackout window from GET bounds alone.
        self.blackout = if now < self.config.blackout_start.seconds() {
            WindowStatus::Pending
        } else if now < self.config.blackout_end.seconds() {
            WindowStatus::Active
        } else {
            WindowStatus::Complete
        };

        // G-load follows the keyed event.
        self.current_g = if keyed_active { self.config.active_g_load } else { 0.0 };
        self.max_g = self.max_g.max(self.current_g);

        // EMS: orbit summary when it carries a solution, PAD targets otherwise.
        self.ems = if orbit.velocity_mps > 0.0 {
            EmsSnapshot {
                velocity_mps: orbit.velocity_mps,
                altitude_km: orbit.altitude_km,
                source: "orbit".to_string(),
            }
        } else {
            let params = self.ems_pad.as_ref().map(|p| &p.parameters);
            EmsSnapshot {
                velocity_mps: params.and_then(|p| p.entry_velocity_mps).unwrap_or(0.0),
                altitude_km: params.and_then(|p| p.entry_altitude_km).unwrap_or(0.0),
                source: "pad".to_string(),
            }
        };

        // Recovery timeline: companion events drive a step when declared,
        // GET offsets from blackout end otherwise.
        let blackout_end = self.config.blackout_end.seconds();
        for (index, step) in self.config.recovery_steps.iter().enumerate() {
            let next = if let Some(companion) = &step.companion_event {
                match statuses.get(companion) {
                    Some(EventStatus::Active) => RecoveryStepStatus::Acknowledged,
                    Some(EventStatus::Complete) => RecoveryStepStatus::Complete,
                    _ => RecoveryStepStatus::Pending,
                }
            } else {
                let ack_at = blackout_end + step.offset_seconds;
                if now >= ack_at + RECOVERY_STEP_COMPLETE_SECONDS {
                    RecoveryStepStatus::Complete
                } else if now >= ack_at {
                    RecoveryStepStatus::Acknowledged
                } else {
                    RecoveryStepStatus::Pending
                }
            };
            // Statuses only move forward.
            if next as u8 > self.recovery[index] as u8 {
                self.recovery[index] = next;
            }
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            corridor: CorridorSnapshot {
                target_deg: self.config.corridor_target_deg,
                current_deg: self.corridor_current_deg,
                tolerance_deg: self.config.corridor_tolerance_deg,
                in_corridor: (self.corridor_current_deg - self.config.corridor_target_deg).abs()
                    <= self.config.corridor_tolerance_deg,
            },
            blackout: BlackoutSnapshot {
                status: self.blackout.as_str().to_string(),
                start_seconds: self.config.blackout_start.seconds(),
                end_seconds: self.config.blackout_end.seconds(),
            },
            current_g: self.current_g,
            max_g: self.max_g,
            ems: self.ems.clone(),
            recovery: self
                .config
                .recovery_steps
                .iter()
                .zip(&self.recovery)
                .map(|(step, status)| RecoveryStepSnapshot {
                    id: step.id.clone(),
                    label: step.label.clone(),
                    status: status.as_str().to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GetTime, RecoveryStepDef};

    fn make_config() -> EntryTimelineDef {
        EntryTimelineDef {
            event_id: Some("ENTRY_001".to_string()),
            corridor_target_deg: -6.5,
            corridor_tolerance_deg: 1.0,
            corridor_active_offset_deg: 0.4,
            blackout_start: GetTime::from_seconds(1_000.0),
            blackout_end: GetTime::from_seconds(1_240.0),
            active_g_load: 6.0,
            ems_pad_id: None,
            recovery_steps: vec![
                RecoveryStepDef {
                    id: "DROGUE".into(),
                    label: "Drogue deploy".into(),
                    companion_event: None,
                    offset_seconds: 60.0,
                },
                RecoveryStepDef {
                    id: "MAINS".into(),
                    label: "Main chutes".into(),
                    companion_event: None,
                    offset_seconds: 120.0,
                },
            ],
        }
    }

    fn statuses_with(status: EventStatus) -> BTreeMap<String, EventStatus> {
        let mut map = BTreeMap::new();
        map.insert("ENTRY_001".to_string(), status);
        map
    }

    #[test]
    fn blackout_walks_window_states() {
        let mut monitor = EntryMonitor::new(&make_config(), None);
        let orbit = OrbitSummary::default();
        let statuses = statuses_with(EventStatus::Pending);

        monitor.tick(500.0, &statuses, &orbit);
        assert_eq!(monitor.snapshot().blackout.status, "pending");
        monitor.tick(1_100.0, &statuses, &orbit);
        assert_eq!(monitor.snapshot().blackout.status, "active");
        monitor.tick(1_300.0, &statuses, &orbit);
        assert_eq!(monitor.snapshot().blackout.status, "complete");
    }

    #[test]
    fn corridor_offset_applies_while_event_active() {
        let mut monitor = EntryMonitor::new(&make_config(), None);
        let orbit = OrbitSummary::default();

        monitor.tick(900.0, &statuses_with(EventStatus::Active), &orbit);
        let snap = monitor.snapshot();
        assert!((snap.corridor.current_deg - (-6.1)).abs() < 1e-9);
        assert!(snap.corridor.in_corridor);
        assert_eq!(snap.current_g, 6.0);

        monitor.tick(2_000.0, &statuses_with(EventStatus::Complete), &orbit);
        let snap = monitor.snapshot();
        assert_eq!(snap.corridor.current_deg, -6.5);
        assert_eq!(snap.current_g, 0.0);
        assert_eq!(snap.max_g, 6.0);
    }

    #[test]
    fn recovery_steps_follow_get_offsets() {
        let mut monitor = EntryMonitor::new(&make_config(), None);
        let orbit = OrbitSummary::default();
        let statuses = statuses_with(EventStatus::Complete);

        monitor.tick(1_299.0, &statuses, &orbit);
        assert_eq!(monitor.snapshot().recovery[0].status, "pending");
        monitor.tick(1_301.0, &statuses, &orbit);
        assert_eq!(monitor.snapshot().recovery[0].status, "acknowledged");
        monitor.tick(1_365.0, &statuses, &orbit);
        let snap = monitor.snapshot();
        assert_eq!(snap.recovery[0].status, "complete");
        assert_eq!(snap.recovery[1].status, "acknowledged");
    }

    #[test]
    fn ems_falls_back_to_pad_targets() {
        let pad = PadDef {
            id: "ENTRY_PAD".into(),
            purpose: "Entry targets".into(),
            parameters: crate::types::PadParameters {
                entry_velocity_mps: Some(11_032.0),
                entry_altitude_km: Some(121.9),
                ..Default::default()
            },
        };
        let mut monitor = EntryMonitor::new(&make_config(), Some(&pad));
        let orbit = OrbitSummary {
            velocity_mps: 0.0,
            ..OrbitSummary::default()
        };
        monitor.tick(900.0, &statuses_with(EventStatus::Pending), &orbit);
        let ems = monitor.snapshot().ems;
        assert_eq!(ems.source, "pad");
        assert!((ems.velocity_mps - 11_032.0).abs() < 1e-9);
    }
}
