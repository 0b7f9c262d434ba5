//! System-wide default constants.
//!
//! Centralises the engine's magic numbers. Every value here is a default for
//! a `SimConfig` field; nothing reads these directly at runtime.

// ============================================================================
// Clock
// ============================================================================

/// Tick rate (Hz). 20 Hz gives the fixed 50 ms step.
pub const TICK_RATE_HZ: u32 = 20;

/// HUD frame interval (seconds of GET).
pub const HUD_INTERVAL_SECONDS: f64 = 600.0;

/// Periodic mission-log status record interval (seconds of GET).
pub const LOG_INTERVAL_SECONDS: f64 = 3_600.0;

// ============================================================================
// Checklists
// ============================================================================

/// Auto-advance step duration (seconds).
pub const CHECKLIST_STEP_SECONDS: f64 = 15.0;

// ============================================================================
// Manual Queue
// ============================================================================

/// Retry budget for an action rejected by its target subsystem.
pub const MANUAL_MAX_RETRIES: u32 = 3;

/// Delay between retries (seconds of GET).
pub const MANUAL_RETRY_INTERVAL_SECONDS: f64 = 2.0;

// ============================================================================
// Alert Thresholds
// ============================================================================

pub const POWER_MARGIN_CAUTION_PCT: f64 = 35.0;
pub const POWER_MARGIN_WARNING_PCT: f64 = 20.0;
pub const PROPELLANT_CAUTION_PCT: f64 = 35.0;
pub const PROPELLANT_WARNING_PCT: f64 = 15.0;
pub const CRYO_BOILOFF_CAUTION_PCT_HR: f64 = 1.5;
pub const CRYO_BOILOFF_WARNING_PCT_HR: f64 = 2.5;
pub const PERIAPSIS_CAUTION_KM: f64 = 100.0;
pub const PERIAPSIS_WARNING_KM: f64 = 60.0;
pub const CO2_CAUTION_MMHG: f64 = 7.6;
pub const CO2_WARNING_MMHG: f64 = 15.0;

// ============================================================================
// Failure Hysteresis
// ============================================================================

/// Fraction of a trip threshold the channel must recover past before the
/// trigger re-arms.
pub const REARM_BAND_FRACTION: f64 = 0.05;

// ============================================================================
// Scoring
// ============================================================================

pub const WEIGHT_EVENTS: f64 = 0.4;
pub const WEIGHT_RESOURCES: f64 = 0.3;
pub const WEIGHT_FAULTS: f64 = 0.2;
pub const WEIGHT_MANUAL: f64 = 0.1;

/// Commander-score bonus per unit of manual fraction.
pub const MANUAL_BONUS_WEIGHT: f64 = 5.0;

pub const GRADE_A_FLOOR: f64 = 92.0;
pub const GRADE_B_FLOOR: f64 = 82.0;
pub const GRADE_C_FLOOR: f64 = 70.0;
pub const GRADE_D_FLOOR: f64 = 55.0;

/// Score history snapshot interval (seconds of GET).
pub const SCORE_HISTORY_INTERVAL_SECONDS: f64 = 3_600.0;

// ============================================================================
// Resource History
// ============================================================================

pub const HISTORY_SAMPLE_INTERVAL_SECONDS: f64 = 60.0;
pub const HISTORY_MAX_SAMPLES: usize = 512;

// ============================================================================
// Communications
// ============================================================================

/// Signal ramp duration at each end of a pass (minutes).
pub const COMMS_HANDOVER_MINUTES: f64 = 2.0;

// ============================================================================
// Thermal
// ============================================================================

/// PTC-off dwell before the thermal state degrades to an excursion (seconds).
pub const THERMAL_EXCURSION_AFTER_SECONDS: f64 = 1_800.0;

/// Recovery speed multiplier once PTC is re-established.
pub const THERMAL_RECOVERY_RATE: f64 = 2.0;

// ============================================================================
// Life Support Consumption
// ============================================================================

/// Crew metabolic oxygen draw (kg/hr, three crew).
pub const O2_KG_PER_HOUR: f64 = 0.27;

/// Potable + cooling water draw (kg/hr).
pub const WATER_KG_PER_HOUR: f64 = 0.9;

/// Cabin CO2 rise with no scrubbing (mmHg/hr).
pub const CO2_RISE_MMHG_PER_HOUR: f64 = 1.3;

/// LiOH scrubbing pulldown (mmHg/hr) while a canister has capacity.
pub const CO2_SCRUB_MMHG_PER_HOUR: f64 = 2.0;

/// Useful life of one LiOH canister (hours).
pub const LIOH_CANISTER_HOURS: f64 = 12.0;

// ============================================================================
// Propulsion Mass Flow (kg/s at full throttle)
// ============================================================================

pub const MASS_FLOW_CSM_SPS: f64 = 29.0;
pub const MASS_FLOW_CSM_RCS: f64 = 0.36;
pub const MASS_FLOW_LM_DESCENT: f64 = 14.1;
pub const MASS_FLOW_LM_ASCENT: f64 = 5.1;
pub const MASS_FLOW_LM_RCS: f64 = 0.36;

/// Slack allowed on the per-tick propellant draw invariant.
pub const PROPELLANT_DRAW_EPSILON_KG: f64 = 1e-6;

// ============================================================================
// Audio Binder
// ============================================================================

/// Minimum spacing between cues of the same category (seconds of GET).
pub const AUDIO_CATEGORY_COOLDOWN_SECONDS: f64 = 10.0;

/// Minimum spacing between firings of the same cue id (seconds of GET).
pub const AUDIO_CUE_COOLDOWN_SECONDS: f64 = 30.0;

// ============================================================================
// HUD
// ============================================================================

/// Rounding digits for frame numerics.
pub const HUD_ROUND_DIGITS: i32 = 2;

/// Upcoming events surfaced per frame.
pub const HUD_UPCOMING_LIMIT: usize = 5;

/// Mission-log entries surfaced per frame.
pub const HUD_LOG_ENTRIES: usize = 20;

// ============================================================================
// Mission Log
// ============================================================================

/// Ring-buffer capacity of the mission-log aggregator.
pub const MISSION_LOG_MAX_ENTRIES: usize = 2_048;
