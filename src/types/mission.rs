//! Mission data documents
//!
//! The structured input the engine consumes at startup: events, autopilot
//! programs, checklists, PADs, consumables budgets, failure taxonomy,
//! communications schedule, docking gate config, and the entry timeline.
//!
//! Parsing happens exactly once at this boundary (strict types, unknown
//! fields rejected); the engine never re-validates numerics downstream.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::time::GetTime;
use crate::config::ConfigError;

// ============================================================================
// Top-Level Document
// ============================================================================

/// Root mission-data document.
///
/// JSON-encodable; the engine treats it as an abstract read-only value after
/// the context builder has indexed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionData {
    pub mission: MissionInfo,
    pub events: Vec<EventDef>,
    #[serde(default)]
    pub autopilot_programs: Vec<AutopilotProgramDef>,
    #[serde(default)]
    pub checklists: Vec<ChecklistDef>,
    #[serde(default)]
    pub pads: Vec<PadDef>,
    pub consumables: ConsumablesBudget,
    #[serde(default)]
    pub failures: Vec<FailureDef>,
    #[serde(default)]
    pub comms_passes: Vec<CommsPassDef>,
    #[serde(default)]
    pub docking: Option<DockingConfigDef>,
    #[serde(default)]
    pub entry: Option<EntryTimelineDef>,
    /// Orbit summary samples for the pluggable trajectory provider.
    #[serde(default)]
    pub orbit: Vec<OrbitSampleDef>,
}

/// Mission identification block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl MissionData {
    /// Load and parse a mission-data JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_json_str(&contents)
            .map_err(|e| ConfigError::MissionData(format!("{}: {e}", path.display())))
    }

    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn event(&self, id: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn checklist(&self, id: &str) -> Option<&ChecklistDef> {
        self.checklists.iter().find(|c| c.id == id)
    }

    pub fn autopilot_program(&self, id: &str) -> Option<&AutopilotProgramDef> {
        self.autopilot_programs.iter().find(|p| p.id == id)
    }

    pub fn pad(&self, id: &str) -> Option<&PadDef> {
        self.pads.iter().find(|p| p.id == id)
    }

    pub fn failure(&self, id: &str) -> Option<&FailureDef> {
        self.failures.iter().find(|f| f.id == id)
    }

    /// Semantic validation beyond the serde parse: cross-references resolve
    /// and windows are ordered. Collected messages become one config error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        for event in &self.events {
            if event.closes_at.seconds() < event.opens_at.seconds() {
                errors.push(format!(
                    "event {}: closes_at {} precedes opens_at {}",
                    event.id, event.closes_at, event.opens_at
                ));
            }
            if let Some(id) = &event.autopilot_id {
                if self.autopilot_program(id).is_none() {
                    errors.push(format!("event {}: unknown autopilot {id}", event.id));
                }
            }
            if let Some(id) = &event.checklist_id {
                if self.checklist(id).is_none() {
                    errors.push(format!("event {}: unknown checklist {id}", event.id));
                }
            }
            if let Some(id) = &event.pad_id {
                if self.pad(id).is_none() {
                    errors.push(format!("event {}: unknown PAD {id}", event.id));
                }
            }
            if let Some(id) = &event.failure_id {
                if self.failure(id).is_none() {
                    errors.push(format!("event {}: unknown failure {id}", event.id));
                }
            }
        }

        for checklist in &self.checklists {
            let mut last_order = 0u32;
            for step in &checklist.steps {
                if step.order == 0 {
                    errors.push(format!(
                        "checklist {}: step {} has order 0 (orders start at 1)",
                        checklist.id, step.id
                    ));
                }
                if step.order <= last_order {
                    errors.push(format!(
                        "checklist {}: step {} out of order",
                        checklist.id, step.id
                    ));
                }
                last_order = step.order;
            }
        }

        for program in &self.autopilot_programs {
            if !program
                .commands
                .iter()
                .any(|c| matches!(c, AutopilotCommandDef::Complete { .. }))
            {
                errors.push(format!("autopilot {}: missing complete command", program.id));
            }
        }

        if let Some(docking) = &self.docking {
            if self.event(&docking.event_id).is_none() {
                errors.push(format!("docking: unknown event {}", docking.event_id));
            }
            let mut last_activation = -1.0f64;
            for gate in &docking.gates {
                if gate.completion_progress < gate.activation_progress {
                    errors.push(format!(
                        "docking gate {}: completion before activation",
                        gate.id
                    ));
                }
                if gate.activation_progress < last_activation {
                    errors.push(format!("docking gate {}: gates must be ordered", gate.id));
                }
                last_activation = gate.activation_progress;
            }
        }

        for pass in &self.comms_passes {
            if pass.close_at.seconds() <= pass.open_at.seconds() {
                errors.push(format!("comms pass {}: close before open", pass.id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// A scheduled mission event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventDef {
    pub id: String,
    /// Phase tag, e.g. `LAUNCH`, `TLI`, `LOI`, `ENTRY`. Indexes the
    /// fuel-cell load profile and groups events in summaries.
    pub phase: String,
    #[serde(default)]
    pub pad_id: Option<String>,
    pub opens_at: GetTime,
    pub closes_at: GetTime,
    #[serde(default)]
    pub preconditions: Vec<Predicate>,
    #[serde(default)]
    pub expected_duration_seconds: Option<f64>,
    #[serde(default)]
    pub autopilot_id: Option<String>,
    #[serde(default)]
    pub checklist_id: Option<String>,
    /// Failure raised if this event fails (looked up in the taxonomy).
    #[serde(default)]
    pub failure_id: Option<String>,
    /// Mandatory events fail when their window is missed; optional events
    /// complete with a skipped flag.
    #[serde(default = "default_true")]
    pub mandatory: bool,
}

fn default_true() -> bool {
    true
}

/// A precondition predicate evaluated against prior-event status and the
/// resource snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Predicate {
    /// Named event has reached `complete`.
    EventComplete { event_id: String },
    /// Named event has failed.
    EventFailed { event_id: String },
    /// Resource channel reads at or above `value`.
    ResourceAtLeast { channel: String, value: f64 },
    /// Resource channel reads at or below `value`.
    ResourceAtMost { channel: String, value: f64 },
}

// ============================================================================
// Checklists
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistDef {
    pub id: String,
    pub title: String,
    /// Per-checklist auto-advance override; `None` inherits the global policy.
    #[serde(default)]
    pub auto_advance: Option<bool>,
    pub steps: Vec<ChecklistStepDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistStepDef {
    pub id: String,
    /// 1-based position; steps acknowledge strictly in order.
    pub order: u32,
    pub callout: String,
    #[serde(default)]
    pub panel_control: Option<String>,
    #[serde(default)]
    pub dsky_macro: Option<String>,
    /// Manual-only steps never auto-acknowledge.
    #[serde(default)]
    pub manual_only: bool,
    #[serde(default)]
    pub prerequisites: Vec<Predicate>,
    /// Resource deltas applied when the step acknowledges.
    #[serde(default)]
    pub effects: Vec<ResourceDeltaDef>,
    /// Failure id whose ongoing penalty this step clears on acknowledgement.
    #[serde(default)]
    pub clears_failure: Option<String>,
}

/// A discrete resource delta (positive adds, negative draws).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResourceDeltaDef {
    pub channel: String,
    pub amount: f64,
}

// ============================================================================
// Autopilot Programs
// ============================================================================

/// Propulsion stage an autopilot program throttles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PropulsionStage {
    CsmSps,
    CsmRcs,
    LmDescent,
    LmAscent,
    LmRcs,
}

impl PropulsionStage {
    /// Propellant tank key this stage draws from.
    pub fn tank(self) -> &'static str {
        match self {
            PropulsionStage::CsmSps => "csm_sps_kg",
            PropulsionStage::CsmRcs => "csm_rcs_kg",
            PropulsionStage::LmDescent => "lm_descent_kg",
            PropulsionStage::LmAscent => "lm_ascent_kg",
            PropulsionStage::LmRcs => "lm_rcs_kg",
        }
    }

    /// Stage label for HUD display.
    pub fn label(self) -> &'static str {
        match self {
            PropulsionStage::CsmSps => "CSM SPS",
            PropulsionStage::CsmRcs => "CSM RCS",
            PropulsionStage::LmDescent => "LM DPS",
            PropulsionStage::LmAscent => "LM APS",
            PropulsionStage::LmRcs => "LM RCS",
        }
    }
}

impl std::fmt::Display for PropulsionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutopilotProgramDef {
    pub id: String,
    pub title: String,
    pub stage: PropulsionStage,
    /// Commands ordered by `at` seconds from program start.
    pub commands: Vec<AutopilotCommandDef>,
}

impl AutopilotProgramDef {
    /// Program duration: the offset of the `complete` command.
    pub fn duration_seconds(&self) -> f64 {
        self.commands
            .iter()
            .filter_map(|c| match c {
                AutopilotCommandDef::Complete { at } => Some(*at),
                _ => None,
            })
            .fold(0.0, f64::max)
    }
}

/// One timeline entry of an autopilot program. `at` is seconds from program
/// start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case", deny_unknown_fields)]
pub enum AutopilotCommandDef {
    /// RCS ullage settling burn before ignition.
    Ullage { at: f64, duration_seconds: f64 },
    /// Throttle setpoint with a linear ramp.
    Throttle {
        at: f64,
        level: f64,
        #[serde(default)]
        ramp_seconds: f64,
    },
    /// Emit a DSKY macro (verb/noun program) to the AGC.
    DskyMacro { at: f64, macro_id: String },
    /// Attitude-control pulse train on one RCS quad.
    RcsPulse {
        at: f64,
        quad_id: String,
        duration_seconds: f64,
        pulses: u32,
    },
    /// End of program; tail-off begins at the preceding throttle-zero.
    Complete { at: f64 },
}

impl AutopilotCommandDef {
    pub fn at(&self) -> f64 {
        match self {
            AutopilotCommandDef::Ullage { at, .. }
            | AutopilotCommandDef::Throttle { at, .. }
            | AutopilotCommandDef::DskyMacro { at, .. }
            | AutopilotCommandDef::RcsPulse { at, .. }
            | AutopilotCommandDef::Complete { at } => *at,
        }
    }
}

// ============================================================================
// PADs
// ============================================================================

/// Preliminary Advisory Data attached to an event: precomputed burn or entry
/// parameters read up to the crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PadDef {
    pub id: String,
    pub purpose: String,
    #[serde(default)]
    pub parameters: PadParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PadParameters {
    /// Time of ignition.
    #[serde(default)]
    pub tig: Option<GetTime>,
    #[serde(default)]
    pub delta_v_mps: Option<f64>,
    #[serde(default)]
    pub burn_duration_seconds: Option<f64>,
    /// Entry interface GET (entry PADs).
    #[serde(default)]
    pub entry_interface: Option<GetTime>,
    /// Target entry velocity (entry PADs), m/s.
    #[serde(default)]
    pub entry_velocity_mps: Option<f64>,
    /// Target entry altitude (entry PADs), km.
    #[serde(default)]
    pub entry_altitude_km: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Consumables
// ============================================================================

/// Initial and reserve budgets for every consumable the engine integrates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumablesBudget {
    /// Propellant tanks keyed by tank channel (`csm_sps_kg`, ...).
    pub tanks: BTreeMap<String, TankBudget>,
    pub power: PowerBudget,
    #[serde(default)]
    pub cryo: CryoBudget,
    #[serde(default)]
    pub life_support: LifeSupportBudget,
    /// Delta-v budgets keyed by stage label (`csm_sps`, `lm_descent`, ...).
    #[serde(default)]
    pub delta_v: BTreeMap<String, DeltaVBudget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TankBudget {
    pub initial_kg: f64,
    #[serde(default)]
    pub reserve_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerBudget {
    /// Combined fuel-cell output (kW).
    pub fuel_cell_output_kw: f64,
    /// Baseline bus load (kW) when no phase profile entry matches.
    pub base_load_kw: f64,
    /// Per-phase load profile keyed by event phase tag (kW).
    #[serde(default)]
    pub phase_loads_kw: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CryoBudget {
    /// Oxygen tank quantity at launch (%).
    pub o2_tank_pct: f64,
    /// Hydrogen tank quantity at launch (%).
    pub h2_tank_pct: f64,
    /// Nominal boil-off rate (% per hour).
    pub boiloff_pct_per_hr: f64,
}

impl Default for CryoBudget {
    fn default() -> Self {
        Self {
            o2_tank_pct: 100.0,
            h2_tank_pct: 100.0,
            boiloff_pct_per_hr: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifeSupportBudget {
    pub oxygen_kg: f64,
    pub water_kg: f64,
    pub lioh_canisters: u32,
    /// Cabin CO2 partial pressure at start (mmHg).
    #[serde(default)]
    pub co2_mmhg: f64,
}

impl Default for LifeSupportBudget {
    fn default() -> Self {
        Self {
            oxygen_kg: 280.0,
            water_kg: 160.0,
            lioh_canisters: 16,
            co2_mmhg: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeltaVBudget {
    pub base_mps: f64,
    #[serde(default)]
    pub adjustment_mps: f64,
    pub usable_mps: f64,
}

// ============================================================================
// Failure Taxonomy
// ============================================================================

/// Failure classification: recoverable failures keep the run nominal for
/// scoring after recovery; hard failures are fatal for the affected system
/// and weigh heavier in the commander score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    #[default]
    Recoverable,
    Hard,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Recoverable => write!(f, "Recoverable"),
            FailureClass::Hard => write!(f, "Hard"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureDef {
    pub id: String,
    pub summary: String,
    #[serde(default)]
    pub classification: FailureClass,
    /// Resource deltas applied exactly once when the failure raises.
    #[serde(default)]
    pub immediate_effects: Vec<ResourceDeltaDef>,
    /// Per-second drains applied every tick until a recovery action clears
    /// the failure.
    #[serde(default)]
    pub ongoing_penalties: Vec<OngoingPenaltyDef>,
    /// Recovery action id; a manual action or checklist step carrying a
    /// matching `clears_failure` tag ends the penalty.
    #[serde(default)]
    pub recovery_action: Option<String>,
    /// Resource-threshold trigger that raises this failure from the
    /// resource system (debounced with hysteresis).
    #[serde(default)]
    pub trigger: Option<FailureTriggerDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OngoingPenaltyDef {
    pub channel: String,
    pub amount_per_second: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FailureTriggerDef {
    pub channel: String,
    #[serde(default)]
    pub below: Option<f64>,
    #[serde(default)]
    pub above: Option<f64>,
    /// Per-failure hysteresis override; fraction of the threshold the
    /// channel must recover past before the trigger re-arms.
    #[serde(default)]
    pub rearm_band_fraction: Option<f64>,
}

// ============================================================================
// Communications Schedule
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommsPassDef {
    pub id: String,
    /// Ground station callsign (HSK, GDS, MAD, ...).
    pub station: String,
    pub open_at: GetTime,
    pub close_at: GetTime,
    /// Signal ramp duration at each end of the pass; `None` inherits the
    /// engine default.
    #[serde(default)]
    pub handover_minutes: Option<f64>,
    #[serde(default)]
    pub cue_on_acquire: Option<String>,
    #[serde(default)]
    pub cue_on_loss: Option<String>,
}

// ============================================================================
// Docking Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockingConfigDef {
    /// Event whose activity drives docking progress.
    pub event_id: String,
    /// Range at progress 0 (meters).
    pub start_range_m: f64,
    /// Range at progress 1 (meters).
    #[serde(default)]
    pub end_range_m: f64,
    /// RCS duty-cycle decay window (seconds).
    #[serde(default = "default_duty_window")]
    pub duty_cycle_window_seconds: f64,
    /// RCS quads tracked for duty cycle.
    #[serde(default)]
    pub quads: Vec<String>,
    /// Gates ordered by activation progress.
    pub gates: Vec<DockingGateDef>,
}

fn default_duty_window() -> f64 {
    60.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockingGateDef {
    pub id: String,
    pub range_m: f64,
    /// Target closing rate magnitude (m/s); rendered negative (closing).
    pub target_closing_rate_mps: f64,
    #[serde(default)]
    pub tolerance_mps: f64,
    pub activation_progress: f64,
    pub completion_progress: f64,
    #[serde(default)]
    pub checklist_id: Option<String>,
}

// ============================================================================
// Entry Timeline
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryTimelineDef {
    /// Event whose status keys the corridor offset selection.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Nominal corridor flight-path angle (degrees, negative = below horizon).
    pub corridor_target_deg: f64,
    /// Corridor half-width (degrees).
    pub corridor_tolerance_deg: f64,
    /// Offset applied while the keyed event is active (degrees).
    #[serde(default)]
    pub corridor_active_offset_deg: f64,
    pub blackout_start: GetTime,
    pub blackout_end: GetTime,
    /// Peak deceleration while the keyed event is active (g).
    #[serde(default = "default_active_g")]
    pub active_g_load: f64,
    /// PAD consulted when the orbit provider has no entry solution.
    #[serde(default)]
    pub ems_pad_id: Option<String>,
    #[serde(default)]
    pub recovery_steps: Vec<RecoveryStepDef>,
}

fn default_active_g() -> f64 {
    6.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoveryStepDef {
    pub id: String,
    pub label: String,
    /// Companion event that drives this step's status; `None` falls back to
    /// the GET offset.
    #[serde(default)]
    pub companion_event: Option<String>,
    /// Offset from blackout end at which the step acknowledges, then
    /// completes one interval later.
    #[serde(default)]
    pub offset_seconds: f64,
}

// ============================================================================
// Orbit Samples
// ============================================================================

/// One orbit-summary sample for the piecewise trajectory provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrbitSampleDef {
    pub at: GetTime,
    pub apoapsis_km: f64,
    pub periapsis_km: f64,
    pub velocity_mps: f64,
    pub altitude_km: f64,
}
