//! Resource System
//!
//! Owns every consumable scalar in the simulation: propellant tanks, delta-v
//! margins, fuel-cell power, cryogenics, thermal state, life support, and
//! the communications pass machine.
//!
//! ## Integration order (per tick)
//!
//! 1. Continuous consumers (fuel-cell load, cryo boil-off, crew metabolics,
//!    thermal dwell) and ongoing failure penalties.
//! 2. Commit of the staged discrete deltas accumulated since the last tick.
//! 3. Margin re-derivation (`power_margin_pct`, delta-v usable).
//! 4. Communications pass advancement.
//! 5. Failure-threshold scan (debounced with hysteresis).
//! 6. History sampling.
//!
//! All cross-subsystem mutation funnels through [`ResourceSystem::apply_delta`];
//! deltas stage in a buffer and commit once per tick. This discipline is what
//! replaces locking in the single-threaded core.

pub mod alerts;
pub mod comms;
pub mod history;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::SimConfig;
use crate::mission_log::{LogCategory, LogSeverity, MissionLog};
use crate::types::{ConsumablesBudget, FailureClass, FailureDef, FailureTriggerDef};

use comms::{CommsController, CommsCue, CommsSnapshot};
use history::{HistorySnapshot, ResourceHistory};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error("unknown resource channel {0:?}")]
    UnknownChannel(String),
    #[error("propellant shortage in {tank}: requested {requested_kg:.3} kg, available {available_kg:.3} kg")]
    Shortage {
        tank: String,
        requested_kg: f64,
        available_kg: f64,
    },
}

// ============================================================================
// Snapshot Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankState {
    pub current_kg: f64,
    pub initial_kg: f64,
    pub reserve_kg: f64,
    pub used_kg: f64,
}

impl TankState {
    pub fn pct(&self) -> f64 {
        if self.initial_kg > 0.0 {
            (self.current_kg / self.initial_kg * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaVState {
    pub base_mps: f64,
    pub adjustment_mps: f64,
    pub usable_mps: f64,
}

impl DeltaVState {
    /// Invariant: margin = base + adjustment.
    pub fn margin_mps(&self) -> f64 {
        self.base_mps + self.adjustment_mps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    pub output_kw: f64,
    pub load_kw: f64,
    /// May go negative — that is the failure signal, not a clamp bug.
    pub margin_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CryoState {
    pub o2_tank_pct: f64,
    pub h2_tank_pct: f64,
    pub boiloff_pct_per_hr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThermalTag {
    #[default]
    Nominal,
    Drifting,
    Excursion,
}

impl ThermalTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ThermalTag::Nominal => "nominal",
            ThermalTag::Drifting => "drifting",
            ThermalTag::Excursion => "excursion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalState {
    pub tag: ThermalTag,
    pub ptc_active: bool,
    /// Accumulated PTC-off dwell (seconds), decays under PTC.
    pub off_dwell_seconds: f64,
    pub violation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifeSupportState {
    pub oxygen_kg: f64,
    pub water_kg: f64,
    pub lioh_canisters: f64,
    pub co2_mmhg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveFailureInfo {
    pub id: String,
    pub classification: FailureClass,
    pub summary: String,
}

/// Owned, read-only view of the whole resource state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub get_seconds: f64,
    pub tanks: BTreeMap<String, TankState>,
    pub delta_v: BTreeMap<String, DeltaVState>,
    pub delta_v_total_margin_mps: f64,
    pub power: PowerState,
    pub cryo: CryoState,
    pub thermal: ThermalState,
    pub life_support: LifeSupportState,
    pub comms: CommsSnapshot,
    pub active_failures: Vec<ActiveFailureInfo>,
}

// ============================================================================
// Deltas and Failures
// ============================================================================

/// Origin of a staged delta, kept for the mission log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaSource {
    Event(String),
    Autopilot(String),
    Checklist(String),
    Manual,
    Failure(String),
}

impl std::fmt::Display for DeltaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaSource::Event(id) => write!(f, "event:{id}"),
            DeltaSource::Autopilot(id) => write!(f, "autopilot:{id}"),
            DeltaSource::Checklist(id) => write!(f, "checklist:{id}"),
            DeltaSource::Manual => write!(f, "manual"),
            DeltaSource::Failure(id) => write!(f, "failure:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
struct StagedDelta {
    channel: String,
    amount: f64,
    source: DeltaSource,
}

/// A failure the resource system has just raised, handed to the tick loop
/// for scoring and audio.
#[derive(Debug, Clone, PartialEq)]
pub struct RaisedFailure {
    pub id: String,
    pub classification: FailureClass,
    pub summary: String,
    pub source: String,
    pub at_seconds: f64,
}

#[derive(Debug, Clone)]
struct ActiveFailure {
    def: FailureDef,
    raised_at_seconds: f64,
}

#[derive(Debug, Clone)]
struct TriggerRuntime {
    failure_id: String,
    def: FailureTriggerDef,
    armed: bool,
}

#[derive(Debug, Clone)]
struct DeltaVRuntime {
    base_mps: f64,
    adjustment_mps: f64,
    usable_base_mps: f64,
    usable_mps: f64,
    /// Tank whose fill fraction scales the usable figure.
    tank: Option<String>,
}

/// Per-tick output handed back to the tick loop.
#[derive(Debug, Default)]
pub struct ResourceTickOutput {
    pub cues: Vec<CommsCue>,
    pub raised: Vec<RaisedFailure>,
}

// ============================================================================
// Resource System
// ============================================================================

pub struct ResourceSystem {
    get_seconds: f64,
    tanks: BTreeMap<String, TankState>,
    delta_v: BTreeMap<String, DeltaVRuntime>,
    power_output_base_kw: f64,
    power_base_load_kw: f64,
    phase_loads_kw: BTreeMap<String, f64>,
    power_load_offset_kw: f64,
    power_output_offset_kw: f64,
    power: PowerState,
    cryo: CryoState,
    cryo_boiloff_base: f64,
    cryo_boiloff_offset: f64,
    thermal: ThermalState,
    life_support: LifeSupportState,
    comms: CommsController,
    history: ResourceHistory,
    pending: Vec<StagedDelta>,
    /// Draws already reserved this tick, per tank — keeps a second program
    /// from double-booking propellant before commit.
    reserved_kg: BTreeMap<String, f64>,
    taxonomy: BTreeMap<String, FailureDef>,
    triggers: Vec<TriggerRuntime>,
    active_failures: BTreeMap<String, ActiveFailure>,
    config: SimConfig,
}

impl ResourceSystem {
    pub fn new(
        budget: &ConsumablesBudget,
        failures: &[FailureDef],
        comms_passes: &[crate::types::CommsPassDef],
        config: &SimConfig,
    ) -> Self {
        let tanks: BTreeMap<String, TankState> = budget
            .tanks
            .iter()
            .map(|(key, tank)| {
                (
                    key.clone(),
                    TankState {
                        current_kg: tank.initial_kg,
                        initial_kg: tank.initial_kg,
                        reserve_kg: tank.reserve_kg,
                        used_kg: 0.0,
                    },
                )
            })
            .collect();

        let delta_v: BTreeMap<String, DeltaVRuntime> = budget
            .delta_v
            .iter()
            .map(|(stage, dv)| {
                let tank_key = format!("{stage}_kg");
                (
                    stage.clone(),
                    DeltaVRuntime {
                        base_mps: dv.base_mps,
                        adjustment_mps: dv.adjustment_mps,
                        usable_base_mps: dv.usable_mps,
                        usable_mps: dv.usable_mps,
                        tank: tanks.contains_key(&tank_key).then_some(tank_key),
                    },
                )
            })
            .collect();

        let taxonomy: BTreeMap<String, FailureDef> = failures
            .iter()
            .map(|f| (f.id.clone(), f.clone()))
            .collect();
        let triggers = failures
            .iter()
            .filter_map(|f| {
                f.trigger.as_ref().map(|t| TriggerRuntime {
                    failure_id: f.id.clone(),
                    def: t.clone(),
                    armed: true,
                })
            })
            .collect();

        let power = PowerState {
            output_kw: budget.power.fuel_cell_output_kw,
            load_kw: budget.power.base_load_kw,
            margin_pct: if budget.power.fuel_cell_output_kw > 0.0 {
                (budget.power.fuel_cell_output_kw - budget.power.base_load_kw)
                    / budget.power.fuel_cell_output_kw
                    * 100.0
            } else {
                -100.0
            },
        };

        Self {
            get_seconds: 0.0,
            tanks,
            delta_v,
            power_output_base_kw: budget.power.fuel_cell_output_kw,
            power_base_load_kw: budget.power.base_load_kw,
            phase_loads_kw: budget.power.phase_loads_kw.clone(),
            power_load_offset_kw: 0.0,
            power_output_offset_kw: 0.0,
            power,
            cryo: CryoState {
                o2_tank_pct: budget.cryo.o2_tank_pct,
                h2_tank_pct: budget.cryo.h2_tank_pct,
                boiloff_pct_per_hr: budget.cryo.boiloff_pct_per_hr,
            },
            cryo_boiloff_base: budget.cryo.boiloff_pct_per_hr,
            cryo_boiloff_offset: 0.0,
            thermal: ThermalState {
                tag: ThermalTag::Nominal,
                ptc_active: true,
                off_dwell_seconds: 0.0,
                violation: false,
            },
            life_support: LifeSupportState {
                oxygen_kg: budget.life_support.oxygen_kg,
                water_kg: budget.life_support.water_kg,
                lioh_canisters: f64::from(budget.life_support.lioh_canisters),
                co2_mmhg: budget.life_support.co2_mmhg,
            },
            comms: CommsController::new(comms_passes, config.comms.handover_minutes),
            history: ResourceHistory::new(config.history.clone()),
            pending: Vec::new(),
            reserved_kg: BTreeMap::new(),
            taxonomy,
            triggers,
            active_failures: BTreeMap::new(),
            config: config.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Delta surface
    // ------------------------------------------------------------------

    /// Stage a discrete delta for commit at the next integration step.
    pub fn apply_delta(
        &mut self,
        channel: &str,
        amount: f64,
        source: DeltaSource,
    ) -> Result<(), ResourceError> {
        if !self.channel_is_known(channel) {
            return Err(ResourceError::UnknownChannel(channel.to_string()));
        }
        self.pending.push(StagedDelta {
            channel: channel.to_string(),
            amount,
            source,
        });
        Ok(())
    }

    /// Reserve a propellant draw for this tick. Rejection (empty tank) is the
    /// autopilot's abort signal.
    pub fn request_propellant(
        &mut self,
        tank: &str,
        kg: f64,
        source: DeltaSource,
    ) -> Result<(), ResourceError> {
        let Some(state) = self.tanks.get(tank) else {
            return Err(ResourceError::UnknownChannel(tank.to_string()));
        };
        let reserved = self.reserved_kg.get(tank).copied().unwrap_or(0.0);
        let available = state.current_kg - reserved;
        if kg > available + self.config.propulsion.draw_epsilon_kg {
            return Err(ResourceError::Shortage {
                tank: tank.to_string(),
                requested_kg: kg,
                available_kg: available.max(0.0),
            });
        }
        *self.reserved_kg.entry(tank.to_string()).or_insert(0.0) += kg;
        self.pending.push(StagedDelta {
            channel: tank.to_string(),
            amount: -kg,
            source,
        });
        Ok(())
    }

    /// Toggle passive thermal control.
    pub fn set_ptc(&mut self, active: bool) {
        self.thermal.ptc_active = active;
    }

    // ------------------------------------------------------------------
    // Failures
    // ------------------------------------------------------------------

    /// Raise a failure from the taxonomy (event failure bindings and the
    /// threshold scan both land here). A failure already active is not
    /// raised again.
    pub fn register_failure(
        &mut self,
        id: &str,
        source: &str,
        now: f64,
        log: &mut MissionLog,
    ) -> Option<RaisedFailure> {
        if self.active_failures.contains_key(id) {
            return None;
        }
        let def = self.taxonomy.get(id)?.clone();
        for effect in &def.immediate_effects {
            self.apply_channel_mut(&effect.channel, effect.amount);
        }
        log.record_with_context(
            now,
            LogCategory::Resources,
            id,
            LogSeverity::Failure,
            def.summary.clone(),
            serde_json::json!({
                "classification": def.classification.to_string(),
                "source": source,
            }),
        );
        let raised = RaisedFailure {
            id: id.to_string(),
            classification: def.classification,
            summary: def.summary.clone(),
            source: source.to_string(),
            at_seconds: now,
        };
        self.active_failures.insert(
            id.to_string(),
            ActiveFailure {
                def,
                raised_at_seconds: now,
            },
        );
        Some(raised)
    }

    /// Clear every active failure whose declared recovery action matches.
    /// Returns the cleared ids.
    pub fn clear_failures_by_action(&mut self, action_id: &str, now: f64, log: &mut MissionLog) -> Vec<String> {
        let cleared: Vec<String> = self
            .active_failures
            .iter()
            .filter(|(_, f)| f.def.recovery_action.as_deref() == Some(action_id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &cleared {
            if let Some(failure) = self.active_failures.remove(id) {
                log.record_with_context(
                    now,
                    LogCategory::Resources,
                    id,
                    LogSeverity::Info,
                    format!("failure {id} cleared by {action_id}"),
                    serde_json::json!({
                        "active_for_seconds": now - failure.raised_at_seconds,
                    }),
                );
            }
        }
        cleared
    }

    pub fn has_active_failure(&self, id: &str) -> bool {
        self.active_failures.contains_key(id)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    pub fn tick(
        &mut self,
        now: f64,
        dt: f64,
        phase: &str,
        log: &mut MissionLog,
    ) -> ResourceTickOutput {
        self.get_seconds = now;
        let hours = dt / 3_600.0;

        // (i) continuous consumers
        self.integrate_power(phase);
        self.integrate_cryo(hours);
        self.integrate_life_support(hours);
        self.integrate_thermal(dt);

        // ongoing failure penalties accrue as plain per-second drains
        let penalties: Vec<(String, f64)> = self
            .active_failures
            .values()
            .flat_map(|f| {
                f.def
                    .ongoing_penalties
                    .iter()
                    .map(|p| (p.channel.clone(), p.amount_per_second * dt))
            })
            .collect();
        for (channel, amount) in penalties {
            self.apply_channel_mut(&channel, amount);
        }

        // (ii) commit staged deltas
        let staged: Vec<StagedDelta> = self.pending.drain(..).collect();
        for delta in staged {
            self.apply_channel_mut(&delta.channel, delta.amount);
            debug!(channel = %delta.channel, amount = delta.amount, source = %delta.source, "delta committed");
        }
        self.reserved_kg.clear();

        // (iii) re-derive margins
        self.derive_margins();

        // (iv) comms machine
        let cues = self.comms.tick(now);
        for cue in &cues {
            log.record(
                now,
                LogCategory::Comms,
                &cue.pass_id,
                LogSeverity::Info,
                match cue.kind {
                    comms::CommsCueKind::Acquire => format!("{} AOS", cue.station),
                    comms::CommsCueKind::Loss => format!("{} LOS imminent", cue.station),
                },
            );
        }

        // (v) failure-threshold scan with hysteresis re-arm
        let raised = self.scan_triggers(now, log);

        // (vi) history
        let values = self.history_values();
        self.history.observe(now, &values);

        ResourceTickOutput { cues, raised }
    }

    fn integrate_power(&mut self, phase: &str) {
        let phase_load = self
            .phase_loads_kw
            .get(phase)
            .copied()
            .unwrap_or(self.power_base_load_kw);
        self.power.load_kw = phase_load + self.power_load_offset_kw;
        self.power.output_kw = self.power_output_base_kw + self.power_output_offset_kw;
    }

    fn integrate_cryo(&mut self, hours: f64) {
        self.cryo.boiloff_pct_per_hr = (self.cryo_boiloff_base + self.cryo_boiloff_offset).max(0.0);
        let loss = self.cryo.boiloff_pct_per_hr * hours;
        self.cryo.o2_tank_pct = (self.cryo.o2_tank_pct - loss).clamp(0.0, 100.0);
        self.cryo.h2_tank_pct = (self.cryo.h2_tank_pct - loss).clamp(0.0, 100.0);
    }

    fn integrate_life_support(&mut self, hours: f64) {
        let rates = &self.config.life_support;
        self.life_support.oxygen_kg =
            (self.life_support.oxygen_kg - rates.o2_kg_per_hour * hours).max(0.0);
        self.life_support.water_kg =
            (self.life_support.water_kg - rates.water_kg_per_hour * hours).max(0.0);

        let scrubbing = self.life_support.lioh_canisters > 0.0;
        if scrubbing {
            self.life_support.lioh_canisters =
                (self.life_support.lioh_canisters - hours / rates.lioh_canister_hours).max(0.0);
            let net = rates.co2_rise_mmhg_per_hour - rates.co2_scrub_mmhg_per_hour;
            self.life_support.co2_mmhg = (self.life_support.co2_mmhg + net * hours).max(0.0);
        } else {
            self.life_support.co2_mmhg += rates.co2_rise_mmhg_per_hour * hours;
        }
    }

    fn integrate_thermal(&mut self, dt: f64) {
        let cfg = &self.config.thermal;
        if self.thermal.ptc_active {
            self.thermal.off_dwell_seconds =
                (self.thermal.off_dwell_seconds - cfg.recovery_rate * dt).max(0.0);
        } else {
            self.thermal.off_dwell_seconds += dt;
        }
        self.thermal.tag = if self.thermal.off_dwell_seconds >= cfg.excursion_after_seconds {
            ThermalTag::Excursion
        } else if self.thermal.off_dwell_seconds >= cfg.excursion_after_seconds * 0.25 {
            ThermalTag::Drifting
        } else {
            ThermalTag::Nominal
        };
        self.thermal.violation = self.thermal.tag == ThermalTag::Excursion;
    }

    fn derive_margins(&mut self) {
        self.power.margin_pct = if self.power.output_kw > 0.0 {
            (self.power.output_kw - self.power.load_kw) / self.power.output_kw * 100.0
        } else {
            -100.0
        };
        for dv in self.delta_v.values_mut() {
            let fraction = dv
                .tank
                .as_ref()
                .and_then(|t| self.tanks.get(t))
                .map_or(1.0, |t| {
                    if t.initial_kg > 0.0 {
                        (t.current_kg / t.initial_kg).clamp(0.0, 1.0)
                    } else {
                        0.0
                    }
                });
            dv.usable_mps = dv.usable_base_mps * fraction;
        }
    }

    fn scan_triggers(&mut self, now: f64, log: &mut MissionLog) -> Vec<RaisedFailure> {
        let band = self.config.failure_hysteresis.rearm_band_fraction;
        let mut raised = Vec::new();
        let mut to_raise: Vec<(String, String)> = Vec::new();

        for trigger in &mut self.triggers {
            let Some(value) = Self::channel_value_of(
                &self.tanks,
                &self.delta_v,
                &self.power,
                &self.cryo,
                &self.life_support,
                &trigger.def.channel,
            ) else {
                continue;
            };
            let tripped = trigger.def.below.is_some_and(|limit| value <= limit)
                || trigger.def.above.is_some_and(|limit| value >= limit);
            if trigger.armed && tripped {
                trigger.armed = false;
                to_raise.push((
                    trigger.failure_id.clone(),
                    format!("trigger:{}", trigger.def.channel),
                ));
            } else if !trigger.armed && !tripped {
                // Re-arm only once the channel has recovered past the
                // hysteresis band on the safe side.
                let rearm_band = trigger.def.rearm_band_fraction.unwrap_or(band);
                let rearmed = match (trigger.def.below, trigger.def.above) {
                    (Some(limit), _) => value > limit + limit.abs() * rearm_band,
                    (_, Some(limit)) => value < limit - limit.abs() * rearm_band,
                    _ => true,
                };
                if rearmed {
                    trigger.armed = true;
                }
            }
        }

        for (id, source) in to_raise {
            if let Some(failure) = self.register_failure(&id, &source, now, log) {
                raised.push(failure);
            }
        }
        raised
    }

    // ------------------------------------------------------------------
    // Channel plumbing
    // ------------------------------------------------------------------

    fn channel_is_known(&self, channel: &str) -> bool {
        if self.tanks.contains_key(channel) {
            return true;
        }
        if let Some(stage) = channel
            .strip_prefix("delta_v.")
            .and_then(|rest| rest.strip_suffix(".adjustment"))
        {
            return self.delta_v.contains_key(stage);
        }
        matches!(
            channel,
            "power_load_kw"
                | "power_output_kw"
                | "cryo_boiloff_pct_per_hr"
                | "cryo_o2_pct"
                | "cryo_h2_pct"
                | "o2_kg"
                | "water_kg"
                | "lioh_canisters"
                | "co2_mmhg"
                | "ptc_active"
        )
    }

    fn apply_channel_mut(&mut self, channel: &str, amount: f64) {
        if let Some(tank) = self.tanks.get_mut(channel) {
            if amount < 0.0 {
                tank.used_kg += -amount;
            }
            tank.current_kg = (tank.current_kg + amount).clamp(0.0, tank.initial_kg);
            return;
        }
        if let Some(stage) = channel
            .strip_prefix("delta_v.")
            .and_then(|rest| rest.strip_suffix(".adjustment"))
        {
            if let Some(dv) = self.delta_v.get_mut(stage) {
                dv.adjustment_mps += amount;
            }
            return;
        }
        match channel {
            "power_load_kw" => self.power_load_offset_kw += amount,
            "power_output_kw" => self.power_output_offset_kw += amount,
            "cryo_boiloff_pct_per_hr" => self.cryo_boiloff_offset += amount,
            "cryo_o2_pct" => {
                self.cryo.o2_tank_pct = (self.cryo.o2_tank_pct + amount).clamp(0.0, 100.0);
            }
            "cryo_h2_pct" => {
                self.cryo.h2_tank_pct = (self.cryo.h2_tank_pct + amount).clamp(0.0, 100.0);
            }
            "o2_kg" => self.life_support.oxygen_kg = (self.life_support.oxygen_kg + amount).max(0.0),
            "water_kg" => {
                self.life_support.water_kg = (self.life_support.water_kg + amount).max(0.0);
            }
            "lioh_canisters" => {
                self.life_support.lioh_canisters =
                    (self.life_support.lioh_canisters + amount).max(0.0);
            }
            "co2_mmhg" => {
                self.life_support.co2_mmhg = (self.life_support.co2_mmhg + amount).max(0.0);
            }
            "ptc_active" => self.thermal.ptc_active = amount > 0.5,
            _ => {}
        }
    }

    /// Read a channel for predicates and the trigger scan.
    pub fn channel_value(&self, channel: &str) -> Option<f64> {
        Self::channel_value_of(
            &self.tanks,
            &self.delta_v,
            &self.power,
            &self.cryo,
            &self.life_support,
            channel,
        )
    }

    fn channel_value_of(
        tanks: &BTreeMap<String, TankState>,
        delta_v: &BTreeMap<String, DeltaVRuntime>,
        power: &PowerState,
        cryo: &CryoState,
        life_support: &LifeSupportState,
        channel: &str,
    ) -> Option<f64> {
        if let Some(tank) = tanks.get(channel) {
            return Some(tank.current_kg);
        }
        if let Some(rest) = channel.strip_prefix("delta_v.") {
            if let Some(stage) = rest.strip_suffix(".margin") {
                return delta_v.get(stage).map(|dv| dv.base_mps + dv.adjustment_mps);
            }
            if let Some(stage) = rest.strip_suffix(".usable") {
                return delta_v.get(stage).map(|dv| dv.usable_mps);
            }
        }
        match channel {
            "power_margin_pct" => Some(power.margin_pct),
            "power_load_kw" => Some(power.load_kw),
            "power_output_kw" => Some(power.output_kw),
            "cryo_boiloff_pct_per_hr" => Some(cryo.boiloff_pct_per_hr),
            "cryo_o2_pct" => Some(cryo.o2_tank_pct),
            "cryo_h2_pct" => Some(cryo.h2_tank_pct),
            "o2_kg" => Some(life_support.oxygen_kg),
            "water_kg" => Some(life_support.water_kg),
            "lioh_canisters" => Some(life_support.lioh_canisters),
            "co2_mmhg" => Some(life_support.co2_mmhg),
            "delta_v_total_mps" => {
                Some(delta_v.values().map(|dv| dv.base_mps + dv.adjustment_mps).sum())
            }
            _ => None,
        }
    }

    fn history_values(&self) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        values.insert("power_margin_pct".to_string(), self.power.margin_pct);
        values.insert(
            "cryo_boiloff_pct_per_hr".to_string(),
            self.cryo.boiloff_pct_per_hr,
        );
        values.insert("co2_mmhg".to_string(), self.life_support.co2_mmhg);
        values.insert(
            "delta_v_total_mps".to_string(),
            self.delta_v
                .values()
                .map(|dv| dv.base_mps + dv.adjustment_mps)
                .sum(),
        );
        for (key, tank) in &self.tanks {
            values.insert(key.clone(), tank.current_kg);
        }
        values
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            get_seconds: self.get_seconds,
            tanks: self.tanks.clone(),
            delta_v: self
                .delta_v
                .iter()
                .map(|(stage, dv)| {
                    (
                        stage.clone(),
                        DeltaVState {
                            base_mps: dv.base_mps,
                            adjustment_mps: dv.adjustment_mps,
                            usable_mps: dv.usable_mps,
                        },
                    )
                })
                .collect(),
            delta_v_total_margin_mps: self
                .delta_v
                .values()
                .map(|dv| dv.base_mps + dv.adjustment_mps)
                .sum(),
            power: self.power,
            cryo: self.cryo,
            thermal: self.thermal,
            life_support: self.life_support,
            comms: self.comms.snapshot(self.get_seconds),
            active_failures: self
                .active_failures
                .values()
                .map(|f| ActiveFailureInfo {
                    id: f.def.id.clone(),
                    classification: f.def.classification,
                    summary: f.def.summary.clone(),
                })
                .collect(),
        }
    }

    pub fn history_snapshot(&self) -> HistorySnapshot {
        self.history.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureTriggerDef, OngoingPenaltyDef, PowerBudget, TankBudget};

    fn make_budget() -> ConsumablesBudget {
        let mut tanks = BTreeMap::new();
        tanks.insert(
            "csm_sps_kg".to_string(),
            TankBudget {
                initial_kg: 1_000.0,
                reserve_kg: 100.0,
            },
        );
        let mut delta_v = BTreeMap::new();
        delta_v.insert(
            "csm_sps".to_string(),
            crate::types::DeltaVBudget {
                base_mps: 2_800.0,
                adjustment_mps: 0.0,
                usable_mps: 2_700.0,
            },
        );
        ConsumablesBudget {
            tanks,
            power: PowerBudget {
                fuel_cell_output_kw: 4.0,
                base_load_kw: 2.0,
                phase_loads_kw: BTreeMap::new(),
            },
            cryo: Default::default(),
            life_support: Default::default(),
            delta_v,
        }
    }

    fn make_system(failures: Vec<FailureDef>) -> (ResourceSystem, MissionLog) {
        let config = SimConfig::default();
        (
            ResourceSystem::new(&make_budget(), &failures, &[], &config),
            MissionLog::new(64),
        )
    }

    fn low_power_failure() -> FailureDef {
        FailureDef {
            id: "power_margin_low".to_string(),
            summary: "fuel cell margin collapsed".to_string(),
            classification: FailureClass::Recoverable,
            immediate_effects: vec![],
            ongoing_penalties: vec![OngoingPenaltyDef {
                channel: "water_kg".to_string(),
                amount_per_second: -0.01,
            }],
            recovery_action: Some("powerdown".to_string()),
            trigger: Some(FailureTriggerDef {
                channel: "power_margin_pct".to_string(),
                below: Some(10.0),
                above: None,
                rearm_band_fraction: None,
            }),
        }
    }

    #[test]
    fn power_margin_formula_holds() {
        let (mut system, mut log) = make_system(vec![]);
        system.tick(1.0, 0.05, "CRUISE", &mut log);
        let snap = system.snapshot();
        let expected = (snap.power.output_kw - snap.power.load_kw) / snap.power.output_kw * 100.0;
        assert!((snap.power.margin_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn staged_deltas_commit_on_tick() {
        let (mut system, mut log) = make_system(vec![]);
        system
            .apply_delta("csm_sps_kg", -100.0, DeltaSource::Manual)
            .unwrap();
        // Not yet committed
        assert_eq!(system.snapshot().tanks["csm_sps_kg"].current_kg, 1_000.0);
        system.tick(1.0, 0.05, "CRUISE", &mut log);
        let tank = system.snapshot().tanks["csm_sps_kg"];
        assert_eq!(tank.current_kg, 900.0);
        assert_eq!(tank.used_kg, 100.0);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let (mut system, _) = make_system(vec![]);
        let err = system
            .apply_delta("no_such_channel", 1.0, DeltaSource::Manual)
            .unwrap_err();
        assert!(matches!(err, ResourceError::UnknownChannel(_)));
    }

    #[test]
    fn propellant_reservation_rejects_overdraw() {
        let (mut system, mut log) = make_system(vec![]);
        system
            .request_propellant("csm_sps_kg", 900.0, DeltaSource::Autopilot("P40".into()))
            .unwrap();
        let err = system
            .request_propellant("csm_sps_kg", 200.0, DeltaSource::Autopilot("P40".into()))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Shortage { .. }));
        system.tick(1.0, 0.05, "CRUISE", &mut log);
        assert_eq!(system.snapshot().tanks["csm_sps_kg"].current_kg, 100.0);
    }

    #[test]
    fn tank_never_leaves_bounds() {
        let (mut system, mut log) = make_system(vec![]);
        system
            .apply_delta("csm_sps_kg", -5_000.0, DeltaSource::Manual)
            .unwrap();
        system.tick(1.0, 0.05, "CRUISE", &mut log);
        assert_eq!(system.snapshot().tanks["csm_sps_kg"].current_kg, 0.0);
        system
            .apply_delta("csm_sps_kg", 5_000.0, DeltaSource::Manual)
            .unwrap();
        system.tick(2.0, 0.05, "CRUISE", &mut log);
        assert_eq!(system.snapshot().tanks["csm_sps_kg"].current_kg, 1_000.0);
    }

    #[test]
    fn trigger_raises_once_until_rearmed() {
        let (mut system, mut log) = make_system(vec![low_power_failure()]);
        // Collapse margin below 10%
        system
            .apply_delta("power_load_kw", 1.8, DeltaSource::Manual)
            .unwrap();
        let out = system.tick(1.0, 0.05, "CRUISE", &mut log);
        assert_eq!(out.raised.len(), 1);
        assert_eq!(out.raised[0].id, "power_margin_low");
        // Still tripped next tick: no re-raise
        let out = system.tick(2.0, 0.05, "CRUISE", &mut log);
        assert!(out.raised.is_empty());
        // Clear the failure, recover load past the hysteresis band, re-trip
        system.clear_failures_by_action("powerdown", 3.0, &mut log);
        system
            .apply_delta("power_load_kw", -1.8, DeltaSource::Manual)
            .unwrap();
        let out = system.tick(4.0, 0.05, "CRUISE", &mut log);
        assert!(out.raised.is_empty());
        system
            .apply_delta("power_load_kw", 1.8, DeltaSource::Manual)
            .unwrap();
        let out = system.tick(5.0, 0.05, "CRUISE", &mut log);
        assert_eq!(out.raised.len(), 1);
    }

    #[test]
    fn ongoing_penalty_drains_until_cleared() {
        let (mut system, mut log) = make_system(vec![low_power_failure()]);
        system.register_failure("power_margin_low", "test", 0.0, &mut log);
        let before = system.snapshot().life_support.water_kg;
        for i in 0..20 {
            system.tick(i as f64 * 0.05, 0.05, "CRUISE", &mut log);
        }
        let after = system.snapshot().life_support.water_kg;
        // -0.01 kg/s for 1 s of GET, plus crew draw
        assert!(before - after > 0.009);
        system.clear_failures_by_action("powerdown", 1.0, &mut log);
        assert!(!system.has_active_failure("power_margin_low"));
    }

    #[test]
    fn delta_v_margin_tracks_adjustment() {
        let (mut system, mut log) = make_system(vec![]);
        system
            .apply_delta("delta_v.csm_sps.adjustment", -50.0, DeltaSource::Manual)
            .unwrap();
        system.tick(1.0, 0.05, "CRUISE", &mut log);
        let dv = system.snapshot().delta_v["csm_sps"];
        assert_eq!(dv.margin_mps(), 2_750.0);
    }

    #[test]
    fn usable_delta_v_scales_with_tank_fraction() {
        let (mut system, mut log) = make_system(vec![]);
        system
            .apply_delta("csm_sps_kg", -500.0, DeltaSource::Manual)
            .unwrap();
        system.tick(1.0, 0.05, "CRUISE", &mut log);
        let dv = system.snapshot().delta_v["csm_sps"];
        assert!((dv.usable_mps - 1_350.0).abs() < 1e-6);
    }

    #[test]
    fn thermal_dwell_degrades_without_ptc() {
        let (mut system, mut log) = make_system(vec![]);
        system.set_ptc(false);
        let mut now = 0.0;
        while now < 2_000.0 {
            system.tick(now, 1.0, "CRUISE", &mut log);
            now += 1.0;
        }
        let thermal = system.snapshot().thermal;
        assert_eq!(thermal.tag, ThermalTag::Excursion);
        assert!(thermal.violation);
        system.set_ptc(true);
        while now < 4_000.0 {
            system.tick(now, 1.0, "CRUISE", &mut log);
            now += 1.0;
        }
        assert_eq!(system.snapshot().thermal.tag, ThermalTag::Nominal);
    }
}
