//! Engine Configuration
//!
//! Every tunable the engine consults is a field in [`SimConfig`], one struct
//! per subsystem section. Each field carries a default matching
//! [`defaults`]; unknown keys in a config file are a hard error, not a
//! silent ignore.
//!
//! ## Loading
//!
//! ```ignore
//! let config = SimConfig::load_from_file(Path::new("mocr.toml"))?;  // or
//! let config = SimConfig::default();
//! ```

pub mod defaults;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PropulsionStage;
use self::defaults as d;

// ============================================================================
// Errors
// ============================================================================

/// Fatal configuration error, surfaced before tick 0.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({0}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("mission data error: {0}")]
    MissionData(String),
    #[error("config validation failed:{}", .0.iter().map(|e| format!("\n  - {e}")).collect::<String>())]
    Validation(Vec<String>),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub clock: ClockConfig,
    pub checklists: ChecklistConfig,
    pub manual: ManualConfig,
    pub alerts: AlertThresholds,
    pub failure_hysteresis: FailureHysteresisConfig,
    pub scoring: ScoringConfig,
    pub history: HistoryConfig,
    pub comms: CommsConfig,
    pub thermal: ThermalConfig,
    pub life_support: LifeSupportRates,
    pub propulsion: PropulsionConfig,
    pub audio: AudioConfig,
    pub hud: HudConfig,
    pub mission_log: MissionLogConfig,
}

impl SimConfig {
    /// Load from a TOML file, validating before returning.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field consistency. Warnings escalate before cautions,
    /// weights sum to one, intervals are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.clock.tick_rate_hz == 0 {
            errors.push("clock.tick_rate_hz must be > 0".into());
        }
        if self.clock.hud_interval_seconds <= 0.0 {
            errors.push("clock.hud_interval_seconds must be > 0".into());
        }
        if self.checklists.step_duration_seconds <= 0.0 {
            errors.push("checklists.step_duration_seconds must be > 0".into());
        }

        Self::check_escalation(
            self.alerts.power_margin_warning_pct,
            self.alerts.power_margin_caution_pct,
            "alerts.power_margin",
            &mut errors,
        );
        Self::check_escalation(
            self.alerts.propellant_warning_pct,
            self.alerts.propellant_caution_pct,
            "alerts.propellant",
            &mut errors,
        );
        Self::check_escalation(
            self.alerts.cryo_boiloff_caution_pct_hr,
            self.alerts.cryo_boiloff_warning_pct_hr,
            "alerts.cryo_boiloff",
            &mut errors,
        );
        Self::check_escalation(
            self.alerts.periapsis_warning_km,
            self.alerts.periapsis_caution_km,
            "alerts.periapsis",
            &mut errors,
        );

        let weight_sum = self.scoring.weight_events
            + self.scoring.weight_resources
            + self.scoring.weight_faults
            + self.scoring.weight_manual;
        if (weight_sum - 1.0).abs() > 1e-6 {
            errors.push(format!(
                "scoring weights must sum to 1.0 (got {weight_sum:.4})"
            ));
        }

        let g = &self.scoring;
        if !(g.grade_d_floor < g.grade_c_floor
            && g.grade_c_floor < g.grade_b_floor
            && g.grade_b_floor < g.grade_a_floor)
        {
            errors.push("scoring grade floors must be strictly increasing D < C < B < A".into());
        }

        if self.history.sample_interval_seconds <= 0.0 {
            errors.push("history.sample_interval_seconds must be > 0".into());
        }
        if self.history.max_samples == 0 {
            errors.push("history.max_samples must be > 0".into());
        }
        if !(0.0..1.0).contains(&self.failure_hysteresis.rearm_band_fraction) {
            errors.push("failure_hysteresis.rearm_band_fraction must be in [0, 1)".into());
        }
        for bus in &self.audio.buses {
            if bus.concurrency == 0 {
                errors.push(format!("audio bus {}: concurrency must be > 0", bus.id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// `escalated` must trip at least as hard as `first` (escalated is the
    /// more severe threshold and must not be the looser one).
    fn check_escalation(escalated: f64, first: f64, name: &str, errors: &mut Vec<String>) {
        if escalated > first {
            errors.push(format!(
                "{name}: warning threshold {escalated} must not exceed caution threshold {first}"
            ));
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Fixed tick rate (Hz); dt = 1 / tick_rate_hz.
    pub tick_rate_hz: u32,
    /// GET seconds between HUD frames.
    pub hud_interval_seconds: f64,
    /// Disable frame emission entirely (`--no-hud`).
    pub hud_enabled: bool,
    /// GET seconds between periodic status records in the mission log.
    pub log_interval_seconds: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: d::TICK_RATE_HZ,
            hud_interval_seconds: d::HUD_INTERVAL_SECONDS,
            hud_enabled: true,
            log_interval_seconds: d::LOG_INTERVAL_SECONDS,
        }
    }
}

impl ClockConfig {
    pub fn dt_seconds(&self) -> f64 {
        1.0 / f64::from(self.tick_rate_hz.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecklistConfig {
    /// Global auto-advance policy (`--manual-checklists` turns this off).
    pub auto_advance: bool,
    /// Auto-acknowledge delay once a step's prerequisites clear (seconds).
    pub step_duration_seconds: f64,
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            auto_advance: true,
            step_duration_seconds: d::CHECKLIST_STEP_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManualConfig {
    pub max_retries: u32,
    pub retry_interval_seconds: f64,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            max_retries: d::MANUAL_MAX_RETRIES,
            retry_interval_seconds: d::MANUAL_RETRY_INTERVAL_SECONDS,
        }
    }
}

/// Alert thresholds. Derived read-only from resource state each tick;
/// alerts are never stored as first-class state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertThresholds {
    pub power_margin_caution_pct: f64,
    pub power_margin_warning_pct: f64,
    pub propellant_caution_pct: f64,
    pub propellant_warning_pct: f64,
    pub cryo_boiloff_caution_pct_hr: f64,
    pub cryo_boiloff_warning_pct_hr: f64,
    pub periapsis_caution_km: f64,
    pub periapsis_warning_km: f64,
    pub co2_caution_mmhg: f64,
    pub co2_warning_mmhg: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            power_margin_caution_pct: d::POWER_MARGIN_CAUTION_PCT,
            power_margin_warning_pct: d::POWER_MARGIN_WARNING_PCT,
            propellant_caution_pct: d::PROPELLANT_CAUTION_PCT,
            propellant_warning_pct: d::PROPELLANT_WARNING_PCT,
            cryo_boiloff_caution_pct_hr: d::CRYO_BOILOFF_CAUTION_PCT_HR,
            cryo_boiloff_warning_pct_hr: d::CRYO_BOILOFF_WARNING_PCT_HR,
            periapsis_caution_km: d::PERIAPSIS_CAUTION_KM,
            periapsis_warning_km: d::PERIAPSIS_WARNING_KM,
            co2_caution_mmhg: d::CO2_CAUTION_MMHG,
            co2_warning_mmhg: d::CO2_WARNING_MMHG,
        }
    }
}

/// Named hysteresis block for resource failure triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FailureHysteresisConfig {
    /// A tripped trigger re-arms only after the channel recovers past
    /// `threshold * (1 ± band)` on the safe side.
    pub rearm_band_fraction: f64,
}

impl Default for FailureHysteresisConfig {
    fn default() -> Self {
        Self {
            rearm_band_fraction: d::REARM_BAND_FRACTION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub weight_events: f64,
    pub weight_resources: f64,
    pub weight_faults: f64,
    pub weight_manual: f64,
    /// Commander-score bonus per unit of manual fraction.
    pub manual_bonus_weight: f64,
    pub grade_a_floor: f64,
    pub grade_b_floor: f64,
    pub grade_c_floor: f64,
    pub grade_d_floor: f64,
    pub history_interval_seconds: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_events: d::WEIGHT_EVENTS,
            weight_resources: d::WEIGHT_RESOURCES,
            weight_faults: d::WEIGHT_FAULTS,
            weight_manual: d::WEIGHT_MANUAL,
            manual_bonus_weight: d::MANUAL_BONUS_WEIGHT,
            grade_a_floor: d::GRADE_A_FLOOR,
            grade_b_floor: d::GRADE_B_FLOOR,
            grade_c_floor: d::GRADE_C_FLOOR,
            grade_d_floor: d::GRADE_D_FLOOR,
            history_interval_seconds: d::SCORE_HISTORY_INTERVAL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub sample_interval_seconds: f64,
    pub max_samples: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_seconds: d::HISTORY_SAMPLE_INTERVAL_SECONDS,
            max_samples: d::HISTORY_MAX_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommsConfig {
    /// Default signal ramp duration when a pass does not override it.
    pub handover_minutes: f64,
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self {
            handover_minutes: d::COMMS_HANDOVER_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermalConfig {
    /// PTC-off dwell before the thermal tag degrades (seconds).
    pub excursion_after_seconds: f64,
    /// Dwell recovery speed multiplier while PTC is active.
    pub recovery_rate: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            excursion_after_seconds: d::THERMAL_EXCURSION_AFTER_SECONDS,
            recovery_rate: d::THERMAL_RECOVERY_RATE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifeSupportRates {
    pub o2_kg_per_hour: f64,
    pub water_kg_per_hour: f64,
    pub co2_rise_mmhg_per_hour: f64,
    pub co2_scrub_mmhg_per_hour: f64,
    pub lioh_canister_hours: f64,
}

impl Default for LifeSupportRates {
    fn default() -> Self {
        Self {
            o2_kg_per_hour: d::O2_KG_PER_HOUR,
            water_kg_per_hour: d::WATER_KG_PER_HOUR,
            co2_rise_mmhg_per_hour: d::CO2_RISE_MMHG_PER_HOUR,
            co2_scrub_mmhg_per_hour: d::CO2_SCRUB_MMHG_PER_HOUR,
            lioh_canister_hours: d::LIOH_CANISTER_HOURS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropulsionConfig {
    pub mass_flow_csm_sps_kg_s: f64,
    pub mass_flow_csm_rcs_kg_s: f64,
    pub mass_flow_lm_descent_kg_s: f64,
    pub mass_flow_lm_ascent_kg_s: f64,
    pub mass_flow_lm_rcs_kg_s: f64,
    /// Slack on the per-tick draw invariant.
    pub draw_epsilon_kg: f64,
}

impl Default for PropulsionConfig {
    fn default() -> Self {
        Self {
            mass_flow_csm_sps_kg_s: d::MASS_FLOW_CSM_SPS,
            mass_flow_csm_rcs_kg_s: d::MASS_FLOW_CSM_RCS,
            mass_flow_lm_descent_kg_s: d::MASS_FLOW_LM_DESCENT,
            mass_flow_lm_ascent_kg_s: d::MASS_FLOW_LM_ASCENT,
            mass_flow_lm_rcs_kg_s: d::MASS_FLOW_LM_RCS,
            draw_epsilon_kg: d::PROPELLANT_DRAW_EPSILON_KG,
        }
    }
}

impl PropulsionConfig {
    /// Full-throttle mass flow for a stage (kg/s).
    pub fn mass_flow(&self, stage: PropulsionStage) -> f64 {
        match stage {
            PropulsionStage::CsmSps => self.mass_flow_csm_sps_kg_s,
            PropulsionStage::CsmRcs => self.mass_flow_csm_rcs_kg_s,
            PropulsionStage::LmDescent => self.mass_flow_lm_descent_kg_s,
            PropulsionStage::LmAscent => self.mass_flow_lm_ascent_kg_s,
            PropulsionStage::LmRcs => self.mass_flow_lm_rcs_kg_s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    pub category_cooldown_seconds: f64,
    pub cue_cooldown_seconds: f64,
    pub buses: Vec<AudioBusConfig>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            category_cooldown_seconds: d::AUDIO_CATEGORY_COOLDOWN_SECONDS,
            cue_cooldown_seconds: d::AUDIO_CUE_COOLDOWN_SECONDS,
            buses: vec![
                AudioBusConfig {
                    id: "alerts".into(),
                    concurrency: 1,
                },
                AudioBusConfig {
                    id: "callouts".into(),
                    concurrency: 1,
                },
                AudioBusConfig {
                    id: "ambient".into(),
                    concurrency: 2,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioBusConfig {
    pub id: String,
    pub concurrency: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HudConfig {
    /// Rounding digits applied to every frame numeric.
    pub round_digits: i32,
    pub upcoming_limit: usize,
    pub log_entries: usize,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            round_digits: d::HUD_ROUND_DIGITS,
            upcoming_limit: d::HUD_UPCOMING_LIMIT,
            log_entries: d::HUD_LOG_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionLogConfig {
    pub max_entries: usize,
}

impl Default for MissionLogConfig {
    fn default() -> Self {
        Self {
            max_entries: d::MISSION_LOG_MAX_ENTRIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn bad_weight_sum_rejected() {
        let mut config = SimConfig::default();
        config.scoring.weight_events = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn unknown_key_is_parse_error() {
        let toml_str = "[clock]\nbogus = 1\n";
        let parsed: Result<SimConfig, _> = toml::from_str(toml_str);
        assert!(parsed.is_err());
    }

    #[test]
    fn warning_cannot_exceed_caution() {
        let mut config = SimConfig::default();
        config.alerts.power_margin_warning_pct = 50.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_inherits_defaults() {
        let config: SimConfig = toml::from_str("[checklists]\nauto_advance = false\n").unwrap();
        assert!(!config.checklists.auto_advance);
        assert_eq!(config.clock.tick_rate_hz, defaults::TICK_RATE_HZ);
    }
}
