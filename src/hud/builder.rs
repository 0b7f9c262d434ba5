//! UI frame builder
//!
//! A pure synthesis pass: consumes owned snapshots from every subsystem and
//! produces one [`UiFrame`]. All number rounding, label derivation, T-minus
//! formatting, and alert aggregation happens here, nowhere else.

use std::collections::BTreeMap;

use crate::agc::AgcSnapshot;
use crate::audio::AudioSnapshot;
use crate::autopilot::AutopilotSnapshot;
use crate::checklist::ChecklistManagerSnapshot;
use crate::config::{AlertThresholds, HudConfig};
use crate::docking::DockingSnapshot;
use crate::entry::EntrySnapshot;
use crate::manual::ManualQueueStats;
use crate::mission_log::MissionLogSnapshot;
use crate::orbit::OrbitSummary;
use crate::resources::alerts::{self, Alert, AlertSeverity};
use crate::resources::ResourceSnapshot;
use crate::scheduler::event::EventRuntime;
use crate::scheduler::EventScheduler;
use crate::scoring::ScoreSummary;
use crate::types::{GetTime, MissionData, PadDef};

use super::{
    AlertsFrame, CommsFrame, CryoFrame, DeltaVFrame, DeltaVStageFrame, EventFrame, EventsFrame,
    LifeSupportFrame, NextPassFrame, PadFrame, PadParametersFrame, PerformanceFrame, PowerFrame,
    ResourcesFrame, ThermalFrame, TigFrame, TimeFrame, TrajectoryFrame, UiFrame,
};

/// Everything one frame is synthesized from. Snapshots are owned values
/// captured at the tick boundary.
pub struct FrameContext<'a> {
    pub tick: u64,
    pub ticks_since_last_frame: u64,
    pub scheduler: &'a EventScheduler,
    pub mission: &'a MissionData,
    pub resources: ResourceSnapshot,
    pub autopilot: AutopilotSnapshot,
    pub checklists: ChecklistManagerSnapshot,
    pub manual: ManualQueueStats,
    pub score: ScoreSummary,
    pub orbit: OrbitSummary,
    pub docking: Option<DockingSnapshot>,
    pub entry: Option<EntrySnapshot>,
    pub agc: AgcSnapshot,
    pub audio: AudioSnapshot,
    pub log: MissionLogSnapshot,
}

pub struct FrameBuilder {
    hud: HudConfig,
    thresholds: AlertThresholds,
    frames_built: u64,
    last_frame: Option<UiFrame>,
}

impl FrameBuilder {
    pub fn new(hud: HudConfig, thresholds: AlertThresholds) -> Self {
        Self {
            hud,
            thresholds,
            frames_built: 0,
            last_frame: None,
        }
    }

    pub fn frames_built(&self) -> u64 {
        self.frames_built
    }

    pub fn last_frame(&self) -> Option<&UiFrame> {
        self.last_frame.as_ref()
    }

    pub fn build(&mut self, now: GetTime, ctx: FrameContext<'_>) -> UiFrame {
        self.frames_built += 1;

        let mut merged = alerts::derive_resource_alerts(&ctx.resources, &self.thresholds);
        merged.extend(alerts::derive_trajectory_alerts(&ctx.orbit, &self.thresholds));
        let alerts = bucket_alerts(merge_alerts(merged));

        let upcoming: Vec<EventFrame> = ctx
            .scheduler
            .upcoming(self.hud.upcoming_limit)
            .into_iter()
            .map(|event| self.event_frame(now, event, ctx.mission))
            .collect();

        let frame = UiFrame {
            time: TimeFrame {
                get_seconds: now.seconds(),
                get: now.format(),
                tick: ctx.tick,
            },
            events: EventsFrame {
                next: upcoming.first().cloned(),
                upcoming,
                counts: ctx.scheduler.stats(),
            },
            resources: self.resources_frame(now, &ctx.resources),
            autopilot: round_autopilot(ctx.autopilot, self.hud.round_digits),
            checklists: ctx.checklists,
            manual_queue: ctx.manual,
            alerts,
            score: round_score(ctx.score, self.hud.round_digits),
            trajectory: TrajectoryFrame {
                apoapsis_km: self.num(ctx.orbit.apoapsis_km),
                periapsis_km: self.num(ctx.orbit.periapsis_km),
                velocity_mps: self.num(ctx.orbit.velocity_mps),
                altitude_km: self.num(ctx.orbit.altitude_km),
            },
            docking: ctx.docking,
            entry: ctx.entry,
            agc: ctx.agc,
            audio: ctx.audio,
            performance: PerformanceFrame {
                tick: ctx.tick,
                ticks_since_last_frame: ctx.ticks_since_last_frame,
                frames_emitted: self.frames_built,
                manual_queue_depth: ctx.manual.pending,
                log_records_total: ctx.log.total_recorded,
            },
            mission_log: ctx.log,
        };
        self.last_frame = Some(frame.clone());
        frame
    }

    fn event_frame(&self, now: GetTime, event: &EventRuntime, mission: &MissionData) -> EventFrame {
        let opens = GetTime::from_seconds(event.def.opens_at.seconds());
        let closes = GetTime::from_seconds(event.def.closes_at.seconds());
        EventFrame {
            id: event.def.id.clone(),
            phase: event.def.phase.clone(),
            status: event.status.as_str().to_string(),
            opens_at_seconds: opens.seconds(),
            opens_at_get: opens.format(),
            closes_at_seconds: closes.seconds(),
            closes_at_get: closes.format(),
            t_minus: now.t_minus(opens),
            pad: event
                .def
                .pad_id
                .as_deref()
                .and_then(|id| mission.pad(id))
                .map(|pad| self.pad_frame(pad)),
        }
    }

    fn pad_frame(&self, pad: &PadDef) -> PadFrame {
        let p = &pad.parameters;
        PadFrame {
            id: pad.id.clone(),
            purpose: pad.purpose.clone(),
            parameters: PadParametersFrame {
                tig: p.tig.map(tig_frame),
                delta_v_mps: p.delta_v_mps.and_then(|v| self.num(v)),
                burn_duration_seconds: p.burn_duration_seconds.and_then(|v| self.num(v)),
                entry_interface: p.entry_interface.map(tig_frame),
                notes: p.notes.clone(),
            },
        }
    }

    fn resources_frame(&self, now: GetTime, resources: &ResourceSnapshot) -> ResourcesFrame {
        ResourcesFrame {
            power: PowerFrame {
                margin_pct: self.num(resources.power.margin_pct),
                output_kw: self.num(resources.power.output_kw),
                load_kw: self.num(resources.power.load_kw),
            },
            propellant: resources
                .tanks
                .iter()
                .map(|(key, tank)| {
                    (
                        key.clone(),
                        super::TankFrame {
                            label: channel_label(key),
                            current_kg: self.num(tank.current_kg),
                            initial_kg: self.num(tank.initial_kg),
                            reserve_kg: self.num(tank.reserve_kg),
                            used_kg: self.num(tank.used_kg),
                            pct: self.num(tank.pct()),
                        },
                    )
                })
                .collect(),
            delta_v: DeltaVFrame {
                stages: resources
                    .delta_v
                    .iter()
                    .map(|(stage, dv)| {
                        (
                            stage.clone(),
                            DeltaVStageFrame {
                                label: channel_label(stage),
                                margin_mps: self.num(dv.margin_mps()),
                                base_mps: self.num(dv.base_mps),
                                adjustment_mps: self.num(dv.adjustment_mps),
                                usable_mps: self.num(dv.usable_mps),
                            },
                        )
                    })
                    .collect(),
                total_margin_mps: self.num(resources.delta_v_total_margin_mps),
            },
            cryo: CryoFrame {
                boiloff_pct_per_hr: self.num(resources.cryo.boiloff_pct_per_hr),
                o2_tank_pct: self.num(resources.cryo.o2_tank_pct),
                h2_tank_pct: self.num(resources.cryo.h2_tank_pct),
            },
            thermal: ThermalFrame {
                state: resources.thermal.tag.as_str().to_string(),
                ptc_active: resources.thermal.ptc_active,
                violation: resources.thermal.violation,
            },
            life_support: LifeSupportFrame {
                oxygen_kg: self.num(resources.life_support.oxygen_kg),
                water_kg: self.num(resources.life_support.water_kg),
                lioh_canisters: self.num(resources.life_support.lioh_canisters),
                co2_mmhg: self.num(resources.life_support.co2_mmhg),
            },
            comms: CommsFrame {
                state: resources.comms.state.as_str().to_string(),
                current_pass_id: resources.comms.current_pass_id.clone(),
                station: resources.comms.station.clone(),
                signal_strength: self.num(resources.comms.signal_strength),
                next_pass: resources.comms.next_pass.as_ref().map(|next| {
                    let open = GetTime::from_seconds(next.open_at_seconds);
                    NextPassFrame {
                        id: next.id.clone(),
                        station: next.station.clone(),
                        open_at_seconds: next.open_at_seconds,
                        open_at_get: open.format(),
                        t_minus: now.t_minus(open),
                    }
                }),
                passes_completed: resources.comms.passes_completed,
            },
        }
    }

    /// Finite-or-null with configured rounding.
    fn num(&self, value: f64) -> Option<f64> {
        round_digits(value, self.hud.round_digits)
    }
}

fn tig_frame(get: GetTime) -> TigFrame {
    TigFrame {
        get: get.format(),
        seconds: get.seconds(),
    }
}

fn round_digits(value: f64, digits: i32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let factor = 10f64.powi(digits);
    Some((value * factor).round() / factor)
}

/// `csm_sps_kg` -> `CSM SPS`, `lm_descent` -> `LM DESCENT`.
fn channel_label(key: &str) -> String {
    key.strip_suffix("_kg")
        .unwrap_or(key)
        .split('_')
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// De-duplicate alerts by id, keeping the highest severity. Idempotent:
/// merging a merged set with itself returns the same set.
pub fn merge_alerts(alerts: Vec<Alert>) -> Vec<Alert> {
    let mut by_id: BTreeMap<String, Alert> = BTreeMap::new();
    for alert in alerts {
        match by_id.get(&alert.id) {
            Some(existing) if existing.severity >= alert.severity => {}
            _ => {
                by_id.insert(alert.id.clone(), alert);
            }
        }
    }
    by_id.into_values().collect()
}

fn bucket_alerts(merged: Vec<Alert>) -> AlertsFrame {
    let mut frame = AlertsFrame::default();
    for alert in merged {
        match alert.severity {
            AlertSeverity::Caution => frame.cautions.push(alert),
            AlertSeverity::Warning => frame.warnings.push(alert),
            AlertSeverity::Failure => frame.failures.push(alert),
        }
    }
    frame
}

fn round_autopilot(mut snapshot: AutopilotSnapshot, digits: i32) -> AutopilotSnapshot {
    if let Some(primary) = snapshot.primary.as_mut() {
        primary.throttle_pct = round_digits(primary.throttle_pct, digits).unwrap_or(0.0);
        primary.elapsed_seconds = round_digits(primary.elapsed_seconds, digits).unwrap_or(0.0);
        primary.remaining_seconds = round_digits(primary.remaining_seconds, digits).unwrap_or(0.0);
        primary.propellant_used_kg =
            round_digits(primary.propellant_used_kg, digits).unwrap_or(0.0);
        primary.rcs_impulse_ns = round_digits(primary.rcs_impulse_ns, digits).unwrap_or(0.0);
    }
    snapshot
}

fn round_score(mut score: ScoreSummary, digits: i32) -> ScoreSummary {
    score.commander_score = round_digits(score.commander_score, digits).unwrap_or(0.0);
    score
}
