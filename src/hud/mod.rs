//! UI frame types
//!
//! One immutable, JSON-serializable snapshot per HUD interval. Every float
//! is either a finite rounded number or `null`; nothing in a frame aliases
//! mutable subsystem state.

pub mod builder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agc::AgcSnapshot;
use crate::audio::AudioSnapshot;
use crate::autopilot::AutopilotSnapshot;
use crate::checklist::ChecklistManagerSnapshot;
use crate::docking::DockingSnapshot;
use crate::entry::EntrySnapshot;
use crate::manual::ManualQueueStats;
use crate::mission_log::MissionLogSnapshot;
use crate::resources::alerts::Alert;
use crate::scheduler::EventCounts;
use crate::scoring::ScoreSummary;

pub use builder::{FrameBuilder, FrameContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFrame {
    pub get_seconds: f64,
    /// `HHH:MM:SS`.
    pub get: String,
    pub tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TigFrame {
    pub get: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PadParametersFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tig: Option<TigFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_v_mps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_interface: Option<TigFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PadFrame {
    pub id: String,
    pub purpose: String,
    pub parameters: PadParametersFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    pub id: String,
    pub phase: String,
    pub status: String,
    pub opens_at_seconds: f64,
    pub opens_at_get: String,
    pub closes_at_seconds: f64,
    pub closes_at_get: String,
    /// `T-HH:MM:SS` until window open (or `T+` past it).
    pub t_minus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad: Option<PadFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<EventFrame>,
    pub upcoming: Vec<EventFrame>,
    pub counts: EventCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerFrame {
    pub margin_pct: Option<f64>,
    pub output_kw: Option<f64>,
    pub load_kw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankFrame {
    pub label: String,
    pub current_kg: Option<f64>,
    pub initial_kg: Option<f64>,
    pub reserve_kg: Option<f64>,
    pub used_kg: Option<f64>,
    pub pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaVStageFrame {
    pub label: String,
    pub margin_mps: Option<f64>,
    pub base_mps: Option<f64>,
    pub adjustment_mps: Option<f64>,
    pub usable_mps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaVFrame {
    pub stages: BTreeMap<String, DeltaVStageFrame>,
    pub total_margin_mps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryoFrame {
    pub boiloff_pct_per_hr: Option<f64>,
    pub o2_tank_pct: Option<f64>,
    pub h2_tank_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermalFrame {
    pub state: String,
    pub ptc_active: bool,
    pub violation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeSupportFrame {
    pub oxygen_kg: Option<f64>,
    pub water_kg: Option<f64>,
    pub lioh_canisters: Option<f64>,
    pub co2_mmhg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPassFrame {
    pub id: String,
    pub station: String,
    pub open_at_seconds: f64,
    pub open_at_get: String,
    pub t_minus: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommsFrame {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_pass_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub signal_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_pass: Option<NextPassFrame>,
    pub passes_completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesFrame {
    pub power: PowerFrame,
    pub propellant: BTreeMap<String, TankFrame>,
    pub delta_v: DeltaVFrame,
    pub cryo: CryoFrame,
    pub thermal: ThermalFrame,
    pub life_support: LifeSupportFrame,
    pub comms: CommsFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AlertsFrame {
    pub warnings: Vec<Alert>,
    pub cautions: Vec<Alert>,
    pub failures: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryFrame {
    pub apoapsis_km: Option<f64>,
    pub periapsis_km: Option<f64>,
    pub velocity_mps: Option<f64>,
    pub altitude_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceFrame {
    pub tick: u64,
    pub ticks_since_last_frame: u64,
    pub frames_emitted: u64,
    pub manual_queue_depth: u32,
    pub log_records_total: u64,
}

/// The immutable HUD snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiFrame {
    pub time: TimeFrame,
    pub events: EventsFrame,
    pub resources: ResourcesFrame,
    pub autopilot: AutopilotSnapshot,
    pub checklists: ChecklistManagerSnapshot,
    pub manual_queue: ManualQueueStats,
    pub alerts: AlertsFrame,
    pub score: ScoreSummary,
    pub trajectory: TrajectoryFrame,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docking: Option<DockingSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntrySnapshot>,
    pub agc: AgcSnapshot,
    pub audio: AudioSnapshot,
    pub performance: PerformanceFrame,
    pub mission_log: MissionLogSnapshot,
}
