//! Autopilot Runner
//!
//! Executes bound autopilot programs against the resource system: ullage
//! settling, throttle ramps, DSKY macro emission, and RCS pulse trains.
//! A rejected propellant draw aborts the program; the tick loop propagates
//! the abort to the bound event.

pub mod program;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PropulsionConfig;
use crate::mission_log::{LogCategory, LogSeverity, MissionLog};
use crate::resources::{DeltaSource, ResourceSystem};
use crate::types::{AutopilotCommandDef, AutopilotProgramDef, PropulsionStage};

use program::{ActiveProgram, ProgramPhase, ThrottleRamp, RCS_JET_THRUST_N};

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AutopilotOutcome {
    Completed { event_id: String, program_id: String },
    Aborted {
        event_id: String,
        program_id: String,
        reason: String,
    },
}

/// DSKY macro emitted this tick, routed to the AGC panel by the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DskyMacroEvent {
    pub event_id: String,
    pub macro_id: String,
}

/// RCS activity this tick, routed to the docking context duty tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct RcsUsage {
    pub quad_id: String,
    pub pulses: u32,
    pub duration_seconds: f64,
}

#[derive(Debug, Default)]
pub struct AutopilotTickOutput {
    pub outcomes: Vec<AutopilotOutcome>,
    pub dsky: Vec<DskyMacroEvent>,
    pub rcs_usage: Vec<RcsUsage>,
}

// ============================================================================
// Snapshots / Stats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutopilotStats {
    pub started: u32,
    pub completed: u32,
    pub aborted: u32,
    pub dsky_macros_emitted: u32,
    pub rcs_pulses_total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramView {
    pub event_id: String,
    pub program_id: String,
    pub stage_label: String,
    pub phase: String,
    pub throttle_pct: f64,
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
    pub propellant_used_kg: f64,
    pub rcs_impulse_ns: f64,
    pub rcs_pulse_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotSnapshot {
    /// The primary program: smallest remaining time wins, ties break on
    /// event id.
    pub primary: Option<ProgramView>,
    pub active_count: usize,
}

// ============================================================================
// Runner
// ============================================================================

pub struct AutopilotRunner {
    programs: BTreeMap<String, ActiveProgram>,
    propulsion: PropulsionConfig,
    stats: AutopilotStats,
}

impl AutopilotRunner {
    pub fn new(propulsion: PropulsionConfig) -> Self {
        Self {
            programs: BTreeMap::new(),
            propulsion,
            stats: AutopilotStats::default(),
        }
    }

    /// Bind and start a program for an activating event.
    pub fn start(&mut self, event_id: &str, def: &AutopilotProgramDef, now: f64, log: &mut MissionLog) {
        if self.programs.contains_key(event_id) {
            warn!(event_id, program = %def.id, "autopilot already bound for event, ignoring restart");
            return;
        }
        self.stats.started += 1;
        log.record(
            now,
            LogCategory::Autopilot,
            &def.id,
            LogSeverity::Info,
            format!("{} armed for {event_id} ({})", def.id, def.title),
        );
        self.programs
            .insert(event_id.to_string(), ActiveProgram::new(event_id, def));
    }

    /// Abort a bound program (manual abort or external command).
    pub fn abort(&mut self, event_id: &str, reason: &str, now: f64, log: &mut MissionLog) -> bool {
        let Some(program) = self.programs.get_mut(event_id) else {
            return false;
        };
        if program.phase.is_terminal() {
            return false;
        }
        program.phase = ProgramPhase::Aborted;
        program.abort_reason = Some(reason.to_string());
        program.throttle = 0.0;
        program.ramp = None;
        self.stats.aborted += 1;
        log.record(
            now,
            LogCategory::Autopilot,
            &program.program_id,
            LogSeverity::Error,
            format!("{} aborted: {reason}", program.program_id),
        );
        true
    }

    /// True when the event either has no bound program or its program
    /// finished nominally. Scheduler exit criterion (a).
    pub fn is_complete(&self, event_id: &str) -> bool {
        self.programs
            .get(event_id)
            .map_or(true, |p| p.phase == ProgramPhase::Complete)
    }

    pub fn phase_of(&self, event_id: &str) -> Option<ProgramPhase> {
        self.programs.get(event_id).map(|p| p.phase)
    }

    pub fn stats(&self) -> AutopilotStats {
        self.stats
    }

    /// Advance every live program by one tick.
    pub fn tick(
        &mut self,
        now: f64,
        dt: f64,
        resources: &mut ResourceSystem,
        log: &mut MissionLog,
    ) -> AutopilotTickOutput {
        let mut output = AutopilotTickOutput::default();

        for program in self.programs.values_mut() {
            if program.phase.is_terminal() {
                continue;
            }
            program.elapsed_seconds += dt;

            for command in program.due_commands() {
                match command {
                    AutopilotCommandDef::Ullage { at, duration_seconds } => {
                        program.phase = ProgramPhase::Ullage;
                        program.ullage_until = Some(at + duration_seconds);
                    }
                    AutopilotCommandDef::Throttle { at, level, ramp_seconds } => {
                        program.ramp = Some(ThrottleRamp {
                            from: program.throttle,
                            to: level,
                            start_elapsed: at,
                            duration: ramp_seconds,
                        });
                        program.phase = if level > 0.0 {
                            ProgramPhase::Burn
                        } else {
                            ProgramPhase::TailOff
                        };
                    }
                    AutopilotCommandDef::DskyMacro { macro_id, .. } => {
                        self.stats.dsky_macros_emitted += 1;
                        output.dsky.push(DskyMacroEvent {
                            event_id: program.event_id.clone(),
                            macro_id,
                        });
                    }
                    AutopilotCommandDef::RcsPulse {
                        quad_id,
                        duration_seconds,
                        pulses,
                        ..
                    } => {
                        let draw = self.propulsion.mass_flow(rcs_stage_for(program.stage))
                            * duration_seconds
                            * f64::from(pulses);
                        match resources.request_propellant(
                            program.ullage_tank(),
                            draw,
                            DeltaSource::Autopilot(program.program_id.clone()),
                        ) {
                            Ok(()) => {
                                program.propellant_used_kg += draw;
                                program.rcs_pulse_count += pulses;
                                program.rcs_impulse_ns +=
                                    RCS_JET_THRUST_N * duration_seconds * f64::from(pulses);
                                self.stats.rcs_pulses_total += pulses;
                                output.rcs_usage.push(RcsUsage {
                                    quad_id,
                                    pulses,
                                    duration_seconds,
                                });
                            }
                            Err(e) => {
                                abort_program(program, &e.to_string(), now, &mut self.stats, log);
                                output.outcomes.push(AutopilotOutcome::Aborted {
                                    event_id: program.event_id.clone(),
                                    program_id: program.program_id.clone(),
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                    AutopilotCommandDef::Complete { .. } => {
                        program.phase = ProgramPhase::Complete;
                        program.throttle = 0.0;
                        program.ramp = None;
                        self.stats.completed += 1;
                        log.record(
                            now,
                            LogCategory::Autopilot,
                            &program.program_id,
                            LogSeverity::Info,
                            format!(
                                "{} complete ({:.1} kg used, {} RCS pulses)",
                                program.program_id,
                                program.propellant_used_kg,
                                program.rcs_pulse_count
                            ),
                        );
                        output.outcomes.push(AutopilotOutcome::Completed {
                            event_id: program.event_id.clone(),
                            program_id: program.program_id.clone(),
                        });
                    }
                }
                if program.phase.is_terminal() {
                    break;
                }
            }
            if program.phase.is_terminal() {
                continue;
            }

            // Throttle follows the active ramp.
            if let Some(ramp) = program.ramp {
                program.throttle = ramp.level_at(program.elapsed_seconds);
                if ramp.finished(program.elapsed_seconds) {
                    program.ramp = None;
                    if program.throttle <= 0.0 && program.phase == ProgramPhase::Burn {
                        program.phase = ProgramPhase::TailOff;
                    }
                }
            }

            // Ullage settles on RCS propellant until its window closes.
            if let Some(until) = program.ullage_until {
                if program.elapsed_seconds < until {
                    let draw = self.propulsion.mass_flow(rcs_stage_for(program.stage)) * dt;
                    match resources.request_propellant(
                        program.ullage_tank(),
                        draw,
                        DeltaSource::Autopilot(program.program_id.clone()),
                    ) {
                        Ok(()) => {
                            program.propellant_used_kg += draw;
                            program.rcs_impulse_ns += RCS_JET_THRUST_N * dt;
                        }
                        Err(e) => {
                            abort_program(program, &e.to_string(), now, &mut self.stats, log);
                            output.outcomes.push(AutopilotOutcome::Aborted {
                                event_id: program.event_id.clone(),
                                program_id: program.program_id.clone(),
                                reason: e.to_string(),
                            });
                            continue;
                        }
                    }
                } else {
                    program.ullage_until = None;
                    if program.phase == ProgramPhase::Ullage {
                        program.phase = ProgramPhase::Burn;
                    }
                }
            }

            // Main engine draw: mass_flow x throttle x dt.
            if program.throttle > 0.0 {
                let draw = self.propulsion.mass_flow(program.stage) * program.throttle * dt;
                match resources.request_propellant(
                    program.stage.tank(),
                    draw,
                    DeltaSource::Autopilot(program.program_id.clone()),
                ) {
                    Ok(()) => program.propellant_used_kg += draw,
                    Err(e) => {
                        abort_program(program, &e.to_string(), now, &mut self.stats, log);
                        output.outcomes.push(AutopilotOutcome::Aborted {
                            event_id: program.event_id.clone(),
                            program_id: program.program_id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        output
    }

    pub fn snapshot(&self) -> AutopilotSnapshot {
        let mut live: Vec<&ActiveProgram> = self
            .programs
            .values()
            .filter(|p| !p.phase.is_terminal())
            .collect();
        live.sort_by(|a, b| {
            a.remaining_seconds()
                .partial_cmp(&b.remaining_seconds())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        AutopilotSnapshot {
            active_count: live.len(),
            primary: live.first().map(|p| ProgramView {
                event_id: p.event_id.clone(),
                program_id: p.program_id.clone(),
                stage_label: p.stage.label().to_string(),
                phase: p.phase.to_string(),
                throttle_pct: (p.throttle * 100.0).clamp(0.0, 100.0),
                elapsed_seconds: p.elapsed_seconds,
                remaining_seconds: p.remaining_seconds(),
                propellant_used_kg: p.propellant_used_kg,
                rcs_impulse_ns: p.rcs_impulse_ns,
                rcs_pulse_count: p.rcs_pulse_count,
            }),
        }
    }
}

fn abort_program(
    program: &mut ActiveProgram,
    reason: &str,
    now: f64,
    stats: &mut AutopilotStats,
    log: &mut MissionLog,
) {
    program.phase = ProgramPhase::Aborted;
    program.abort_reason = Some(reason.to_string());
    program.throttle = 0.0;
    program.ramp = None;
    stats.aborted += 1;
    log.record(
        now,
        LogCategory::Autopilot,
        &program.program_id,
        LogSeverity::Failure,
        format!("{} aborted: {reason}", program.program_id),
    );
}

/// RCS stage whose mass flow applies to a program's attitude pulses.
fn rcs_stage_for(stage: PropulsionStage) -> PropulsionStage {
    match stage {
        PropulsionStage::CsmSps | PropulsionStage::CsmRcs => PropulsionStage::CsmRcs,
        PropulsionStage::LmDescent | PropulsionStage::LmAscent | PropulsionStage::LmRcs => {
            PropulsionStage::LmRcs
        }
    }
}
