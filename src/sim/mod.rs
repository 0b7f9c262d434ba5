//! Simulation orchestration
//!
//! Owns every subsystem and drives them in dependency order once per fixed
//! tick. The loop is single-threaded and cooperative: a tick runs to
//! completion, cross-subsystem reads go through snapshots captured at the
//! tick boundary, and the only cross-subsystem mutation path is the
//! resource system's staged-delta surface.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::agc::AgcState;
use crate::audio::{AudioBinder, CueRequest, CueSeverity};
use crate::autopilot::{AutopilotOutcome, AutopilotRunner};
use crate::checklist::{apply_step_effect, ChecklistManager};
use crate::config::{ConfigError, SimConfig};
use crate::docking::DockingContext;
use crate::entry::EntryMonitor;
use crate::hud::{FrameBuilder, FrameContext, UiFrame};
use crate::manual::script::{ManualScript, ScriptError, ScriptRecorder};
use crate::manual::{Dispatch, ManualActionQueue, ManualQueueStats};
use crate::mission_log::{LogCategory, LogSeverity, MissionLog};
use crate::orbit::{OrbitProvider, PiecewiseOrbitProvider};
use crate::resources::alerts::{self, AlertSeverity};
use crate::resources::comms::CommsCueKind;
use crate::resources::ResourceSystem;
use crate::scheduler::{
    EventCounts, EventScheduler, EventTransition, SchedulerTickOutput, TransitionKind,
};
use crate::scoring::{ScoreAggregator, ScoreSummary};
use crate::types::{FailureClass, GetTime, MissionData};

// ============================================================================
// Errors and Summary
// ============================================================================

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("run window is empty: until {until} <= start {start}")]
    EmptyWindow { start: String, until: String },
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub mission_id: String,
    pub start_get: String,
    pub final_get: String,
    pub final_get_seconds: f64,
    pub ticks: u64,
    pub frames_emitted: u64,
    pub events: EventCounts,
    pub recoverable_faults: u32,
    pub fatal_faults: u32,
    pub score: ScoreSummary,
    pub log_records: u64,
    pub manual_queue: ManualQueueStats,
    /// Set when an invariant violation stopped the run early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

// ============================================================================
// Simulation
// ============================================================================

pub struct Simulation {
    config: SimConfig,
    mission: MissionData,

    // Mission clock: GET derives from the tick index, never accumulates.
    start_seconds: f64,
    tick_index: u64,

    scheduler: EventScheduler,
    resources: ResourceSystem,
    checklist: ChecklistManager,
    autopilot: AutopilotRunner,
    manual_queue: ManualActionQueue,
    agc: AgcState,
    docking: Option<DockingContext>,
    entry: Option<EntryMonitor>,
    scoring: ScoreAggregator,
    audio: AudioBinder,
    log: MissionLog,
    frame_builder: FrameBuilder,
    orbit: Box<dyn OrbitProvider>,

    frames: Vec<UiFrame>,
    frames_emitted: u64,
    last_frame_tick: u64,
    next_status_log_at: f64,
    last_alert_ids: BTreeSet<String>,
    cancel: Arc<AtomicBool>,
    fatal_error: Option<String>,
}

impl Simulation {
    /// Build a simulation context. Validates the config and mission data;
    /// both must be sound before tick 0.
    pub fn new(mission: MissionData, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        mission.validate()?;

        let scheduler = EventScheduler::new(&mission);
        let resources = ResourceSystem::new(
            &mission.consumables,
            &mission.failures,
            &mission.comms_passes,
            &config,
        );
        let docking = mission.docking.as_ref().map(DockingContext::new);
        let entry = mission.entry.as_ref().map(|def| {
            let pad = def.ems_pad_id.as_deref().and_then(|id| mission.pad(id));
            EntryMonitor::new(def, pad)
        });
        let orbit: Box<dyn OrbitProvider> =
            Box::new(PiecewiseOrbitProvider::new(mission.orbit.clone()));

        Ok(Self {
            scheduler,
            resources,
            checklist: ChecklistManager::new(config.checklists.clone()),
            autopilot: AutopilotRunner::new(config.propulsion.clone()),
            manual_queue: ManualActionQueue::new(config.manual.clone()),
            agc: AgcState::new(),
            docking,
            entry,
            scoring: ScoreAggregator::new(config.scoring.clone()),
            audio: AudioBinder::new(&config.audio),
            log: MissionLog::new(config.mission_log.max_entries),
            frame_builder: FrameBuilder::new(config.hud.clone(), config.alerts.clone()),
            orbit,
            start_seconds: 0.0,
            tick_index: 0,
            frames: Vec::new(),
            frames_emitted: 0,
            last_frame_tick: 0,
            next_status_log_at: config.clock.log_interval_seconds,
            last_alert_ids: BTreeSet::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            fatal_error: None,
            config,
            mission,
        })
    }

    /// Begin the run at a GET other than zero (mission slices).
    pub fn with_start(mut self, start: GetTime) -> Self {
        self.start_seconds = start.seconds();
        self.next_status_log_at = start.seconds() + self.config.clock.log_interval_seconds;
        self
    }

    pub fn with_orbit_provider(mut self, orbit: Box<dyn OrbitProvider>) -> Self {
        self.orbit = orbit;
        self
    }

    pub fn with_manual_script(mut self, script: ManualScript) -> Self {
        self.manual_queue.enqueue_script(script);
        self
    }

    pub fn with_recording(mut self) -> Self {
        self.manual_queue.enable_recording();
        self
    }

    pub fn get(&self) -> GetTime {
        GetTime::from_seconds(
            self.start_seconds + self.tick_index as f64 * self.config.clock.dt_seconds(),
        )
    }

    pub fn frames(&self) -> &[UiFrame] {
        &self.frames
    }

    pub fn take_frames(&mut self) -> Vec<UiFrame> {
        std::mem::take(&mut self.frames)
    }

    pub fn mission_log(&self) -> &MissionLog {
        &self.log
    }

    pub fn history_snapshot(&self) -> crate::resources::history::HistorySnapshot {
        self.resources.history_snapshot()
    }

    pub fn audio_ledger(&self) -> &[crate::audio::AudioTrigger] {
        self.audio.ledger()
    }

    pub fn recorder(&self) -> Option<&ScriptRecorder> {
        self.manual_queue.recorder()
    }

    /// Cooperative cancellation: the loop finishes the current tick, emits
    /// a final frame, and returns.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Drive the loop until GET reaches `until` or a fatal error lands.
    pub fn run(&mut self, until: GetTime) -> Result<RunSummary, SimError> {
        if until.seconds() <= self.start_seconds {
            return Err(SimError::EmptyWindow {
                start: GetTime::from_seconds(self.start_seconds).format(),
                until: until.format(),
            });
        }

        let dt = self.config.clock.dt_seconds();
        self.log.record(
            self.start_seconds,
            LogCategory::Clock,
            "run",
            LogSeverity::Info,
            format!(
                "{} run started at {}",
                self.mission.mission.name,
                GetTime::from_seconds(self.start_seconds).format()
            ),
        );
        info!(
            mission = %self.mission.mission.id,
            start = %GetTime::from_seconds(self.start_seconds),
            until = %until,
            tick_rate = self.config.clock.tick_rate_hz,
            "run started"
        );

        while self.get().seconds() < until.seconds() {
            if self.fatal_error.is_some() || self.cancel.load(Ordering::Relaxed) {
                break;
            }
            self.tick_index += 1;
            let now = self.get().seconds();
            self.step(now, dt);
        }

        // Final frame marks the run end regardless of interval phase.
        if self.config.clock.hud_enabled {
            self.emit_frame();
        }

        let summary = self.summary(until);
        info!(
            score = summary.score.commander_score,
            grade = %summary.score.grade,
            frames = summary.frames_emitted,
            "run complete"
        );
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // One tick, in dependency order
    // ------------------------------------------------------------------

    fn step(&mut self, now: f64, dt: f64) {
        // 2. Manual actions whose trigger GET has passed.
        {
            let mut dispatch = Dispatch {
                checklist: &mut self.checklist,
                resources: &mut self.resources,
                agc: &mut self.agc,
                statuses: self.scheduler.statuses(),
            };
            self.manual_queue.tick(now, &mut dispatch, &mut self.log);
        }

        // 3. Scheduler: arm, activate, complete, fail.
        let SchedulerTickOutput {
            transitions,
            faults: event_faults,
        } = self.scheduler.tick(
            now,
            &mut self.checklist,
            &mut self.autopilot,
            &mut self.resources,
            &self.mission,
            &mut self.log,
        );

        // 3b. Checklist auto-advance against the fresh status map.
        let step_effects = {
            let ctx = crate::scheduler::precondition::PredicateContext {
                statuses: self.scheduler.statuses(),
                resources: &self.resources,
            };
            self.checklist.tick(now, &ctx, &mut self.log)
        };
        for effect in &step_effects {
            apply_step_effect(effect, &mut self.resources, &mut self.agc, now, &mut self.log);
        }

        // 4. Autopilot programs.
        let autopilot_output = self
            .autopilot
            .tick(now, dt, &mut self.resources, &mut self.log);
        for dsky in &autopilot_output.dsky {
            self.agc.record_macro(
                now,
                &dsky.macro_id,
                &format!("autopilot:{}", dsky.event_id),
                None,
                None,
            );
        }
        if let Some(docking) = self.docking.as_mut() {
            for usage in &autopilot_output.rcs_usage {
                docking.record_rcs_usage(&usage.quad_id, usage.pulses, usage.duration_seconds);
            }
        }
        let mut abort_transitions: Vec<EventTransition> = Vec::new();
        let mut abort_faults = Vec::new();
        for outcome in &autopilot_output.outcomes {
            if let AutopilotOutcome::Aborted {
                event_id,
                program_id,
                reason,
            } = outcome
            {
                self.scoring
                    .record_fault(program_id, FailureClass::Hard, false);
                if let Some((transition, fault)) = self.scheduler.fail_event(
                    event_id,
                    &format!("autopilot abort: {reason}"),
                    now,
                    &mut self.resources,
                    &mut self.log,
                ) {
                    abort_transitions.push(transition);
                    abort_faults.extend(fault);
                }
            }
        }

        // 5. Resource integration, comms, failure triggers.
        let phase = self.scheduler.current_phase().to_string();
        let resource_output = self.resources.tick(now, dt, &phase, &mut self.log);
        for raised in &resource_output.raised {
            self.scoring
                .record_fault(&raised.id, raised.classification, true);
        }

        // 6. Derived monitors.
        let orbit = self.orbit.summary(now);
        let mut gates_completed = Vec::new();
        if let Some(docking) = self.docking.as_mut() {
            gates_completed = docking.tick(now, dt, &self.scheduler);
        }
        if let Some(entry) = self.entry.as_mut() {
            entry.tick(now, self.scheduler.statuses(), &orbit);
        }

        // 7. Scoring. Event-bound taxonomy failures land here classified;
        // threshold raises arrive separately on the resource path below.
        for transition in transitions.iter().chain(&abort_transitions) {
            self.scoring.record_transition(transition);
        }
        for fault in event_faults.iter().chain(&abort_faults) {
            self.scoring
                .record_fault(&fault.id, fault.classification, false);
        }
        let checklist_stats = self.checklist.stats();
        self.scoring
            .sync_acks(checklist_stats.manual_acks, checklist_stats.auto_acks);
        let resource_snapshot = self.resources.snapshot();
        self.scoring.tick(now, dt, &resource_snapshot);

        // 8. Invariant sweep; a violation is fatal but finishes the tick.
        if let Some(detail) = self.check_invariants() {
            error!(%detail, "invariant violation");
            self.log.record(
                now,
                LogCategory::Internal,
                "invariants",
                LogSeverity::Failure,
                detail.clone(),
            );
            self.fatal_error = Some(detail);
        }

        // 9. Audio cues from this tick's transitions, then the HUD frame.
        self.audio.tick(now);
        for transition in transitions.iter().chain(&abort_transitions) {
            match &transition.kind {
                TransitionKind::Completed { .. } => {
                    self.ingest_cue(now, "event_complete", CueSeverity::Info, "event", &transition.event_id, "callouts");
                }
                TransitionKind::Failed { .. } => {
                    self.ingest_cue(now, "master_alarm", CueSeverity::Failure, "alert", &transition.event_id, "alerts");
                }
                _ => {}
            }
        }
        for cue in &resource_output.cues {
            let severity = match cue.kind {
                CommsCueKind::Acquire => CueSeverity::Info,
                CommsCueKind::Loss => CueSeverity::Caution,
            };
            let cue_id = cue.cue_id.clone();
            self.ingest_cue(now, &cue_id, severity, "comms", &cue.pass_id, "callouts");
        }
        for raised in &resource_output.raised {
            let id = raised.id.clone();
            self.ingest_cue(now, "master_alarm", CueSeverity::Failure, "alert", &id, "alerts");
        }
        for gate_id in &gates_completed {
            let id = gate_id.clone();
            self.ingest_cue(now, "gate_complete", CueSeverity::Info, "docking", &id, "callouts");
        }
        self.emit_alert_onset_cues(now, &resource_snapshot, &orbit);

        if self.config.clock.hud_enabled {
            let interval = self.config.clock.hud_interval_seconds;
            let boundary = self.start_seconds + (self.frames_emitted + 1) as f64 * interval;
            if now >= boundary - 1e-9 {
                self.emit_frame();
            }
        }

        // Periodic status record for the mission log.
        if now >= self.next_status_log_at {
            self.next_status_log_at += self.config.clock.log_interval_seconds;
            let counts = self.scheduler.stats();
            self.log.record_with_context(
                now,
                LogCategory::Clock,
                "status",
                LogSeverity::Info,
                format!(
                    "GET {} | active {} complete {} | power margin {:.1}%",
                    GetTime::from_seconds(now).format(),
                    counts.active,
                    counts.complete,
                    resource_snapshot.power.margin_pct
                ),
                serde_json::json!({
                    "score": self.scoring.summary().commander_score,
                }),
            );
        }
    }

    fn ingest_cue(
        &mut self,
        now: f64,
        cue_id: &str,
        severity: CueSeverity,
        category: &str,
        source_id: &str,
        bus: &str,
    ) {
        self.audio.ingest(
            now,
            CueRequest {
                cue_id: cue_id.to_string(),
                severity,
                category: category.to_string(),
                bus_id: bus.to_string(),
                source_type: category.to_string(),
                source_id: source_id.to_string(),
                metadata: serde_json::Value::Null,
            },
        );
    }

    /// Fire an alert cue when an alert id first appears.
    fn emit_alert_onset_cues(
        &mut self,
        now: f64,
        resources: &crate::resources::ResourceSnapshot,
        orbit: &crate::orbit::OrbitSummary,
    ) {
        let mut current: Vec<alerts::Alert> =
            alerts::derive_resource_alerts(resources, &self.config.alerts);
        current.extend(alerts::derive_trajectory_alerts(orbit, &self.config.alerts));

        let current_ids: BTreeSet<String> = current.iter().map(|a| a.id.clone()).collect();
        for alert in &current {
            if !self.last_alert_ids.contains(&alert.id) {
                let severity = match alert.severity {
                    AlertSeverity::Caution => CueSeverity::Caution,
                    AlertSeverity::Warning => CueSeverity::Warning,
                    AlertSeverity::Failure => CueSeverity::Failure,
                };
                let id = alert.id.clone();
                let source = alert.source.clone();
                self.ingest_cue(now, &id, severity, "alert", &source, "alerts");
            }
        }
        self.last_alert_ids = current_ids;
    }

    fn emit_frame(&mut self) {
        let now = self.get();
        let ctx = FrameContext {
            tick: self.tick_index,
            ticks_since_last_frame: self.tick_index - self.last_frame_tick,
            scheduler: &self.scheduler,
            mission: &self.mission,
            resources: self.resources.snapshot(),
            autopilot: self.autopilot.snapshot(),
            checklists: self.checklist.snapshot(),
            manual: self.manual_queue.stats(),
            score: self.scoring.summary(),
            orbit: self.orbit.summary(now.seconds()),
            docking: self.docking.as_ref().map(DockingContext::snapshot),
            entry: self.entry.as_ref().map(EntryMonitor::snapshot),
            agc: self.agc.snapshot(),
            audio: self.audio.snapshot(),
            log: self.log.snapshot(self.config.hud.log_entries),
        };
        let frame = self.frame_builder.build(now, ctx);
        self.frames_emitted += 1;
        self.last_frame_tick = self.tick_index;
        self.frames.push(frame);
    }

    /// Tank bounds and event-time monotonicity; anything broken here means
    /// engine state is corrupt, not mission trouble.
    fn check_invariants(&self) -> Option<String> {
        let snapshot = self.resources.snapshot();
        for (tank, state) in &snapshot.tanks {
            if !(0.0..=state.initial_kg + 1e-9).contains(&state.current_kg) {
                return Some(format!(
                    "tank {tank} out of bounds: {} kg of {} kg",
                    state.current_kg, state.initial_kg
                ));
            }
        }
        for event in self.scheduler.events() {
            if let (Some(activated), Some(completed)) =
                (event.activation_time_seconds, event.completion_time_seconds)
            {
                if completed < activated {
                    return Some(format!(
                        "event {} completion precedes activation",
                        event.def.id
                    ));
                }
            }
        }
        None
    }

    fn summary(&self, until: GetTime) -> RunSummary {
        let score = self.scoring.summary();
        let end = if self.fatal_error.is_some() {
            self.get()
        } else {
            until
        };
        RunSummary {
            mission_id: self.mission.mission.id.clone(),
            start_get: GetTime::from_seconds(self.start_seconds).format(),
            final_get: end.format(),
            final_get_seconds: end.seconds(),
            ticks: self.tick_index,
            frames_emitted: self.frames_emitted,
            events: self.scheduler.stats(),
            recoverable_faults: score.faults.recoverable,
            fatal_faults: score.faults.hard,
            score,
            log_records: self.log.total_recorded(),
            manual_queue: self.manual_queue.stats(),
            fatal_error: self.fatal_error.clone(),
        }
    }
}
