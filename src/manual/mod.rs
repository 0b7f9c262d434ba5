//! Manual Action Queue
//!
//! Replays recorded crew inputs deterministically. Actions drain in
//! non-decreasing trigger-GET order; an action its target subsystem rejects
//! retries on an interval up to a bounded attempt count, then lands in the
//! failed list with a reason. Successful actions never re-execute.

pub mod script;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agc::AgcState;
use crate::checklist::{apply_step_effect, AckError, ChecklistManager};
use crate::config::ManualConfig;
use crate::mission_log::{LogCategory, LogSeverity, MissionLog};
use crate::resources::{DeltaSource, ResourceSystem};
use crate::scheduler::event::EventStatus;
use crate::scheduler::precondition::PredicateContext;
use crate::types::{ActionPayload, ActionResolution, ManualActionDef};

use script::ScriptRecorder;

// ============================================================================
// Dispatch Surface
// ============================================================================

/// Mutable views of every subsystem an action may target, assembled by the
/// tick loop for the drain.
pub struct Dispatch<'a> {
    pub checklist: &'a mut ChecklistManager,
    pub resources: &'a mut ResourceSystem,
    pub agc: &'a mut AgcState,
    pub statuses: &'a BTreeMap<String, EventStatus>,
}

// ============================================================================
// Queue State
// ============================================================================

#[derive(Debug, Clone)]
struct QueuedAction {
    def: ManualActionDef,
    attempts: u32,
    /// Earliest GET of the next attempt; starts at the trigger GET.
    next_attempt_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAction {
    pub def: ManualActionDef,
    pub resolution: ActionResolution,
    pub resolved_at_seconds: f64,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualQueueStats {
    pub enqueued: u32,
    pub executed: u32,
    pub failed: u32,
    pub retries: u32,
    pub pending: u32,
    pub next_trigger_seconds: Option<f64>,
}

enum Attempt {
    Done,
    Retry(String),
    Fail(String),
}

pub struct ManualActionQueue {
    queue: Vec<QueuedAction>,
    resolved: Vec<ResolvedAction>,
    recorder: Option<ScriptRecorder>,
    config: ManualConfig,
    stats: ManualQueueStats,
}

impl ManualActionQueue {
    pub fn new(config: ManualConfig) -> Self {
        Self {
            queue: Vec::new(),
            resolved: Vec::new(),
            recorder: None,
            config,
            stats: ManualQueueStats::default(),
        }
    }

    /// Start capturing executed actions for `--record-manual-script`.
    pub fn enable_recording(&mut self) {
        self.recorder = Some(ScriptRecorder::new());
    }

    pub fn recorder(&self) -> Option<&ScriptRecorder> {
        self.recorder.as_ref()
    }

    pub fn enqueue(&mut self, action: ManualActionDef) {
        self.stats.enqueued += 1;
        let trigger = action.get.seconds();
        self.queue.push(QueuedAction {
            def: action,
            attempts: 0,
            next_attempt_at: trigger,
        });
        // Non-decreasing trigger order; stable for identical triggers.
        self.queue.sort_by(|a, b| {
            a.def
                .get
                .seconds()
                .partial_cmp(&b.def.get.seconds())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn enqueue_script(&mut self, script: script::ManualScript) {
        for action in script.actions {
            self.enqueue(action);
        }
    }

    pub fn stats(&self) -> ManualQueueStats {
        let mut stats = self.stats;
        stats.pending = self.queue.len() as u32;
        stats.next_trigger_seconds = self.queue.first().map(|q| q.def.get.seconds());
        stats
    }

    pub fn resolved(&self) -> &[ResolvedAction] {
        &self.resolved
    }

    /// Drain every action whose trigger has passed and whose retry timer is
    /// due.
    pub fn tick(&mut self, now: f64, dispatch: &mut Dispatch<'_>, log: &mut MissionLog) {
        let mut index = 0;
        while index < self.queue.len() {
            let trigger = self.queue[index].def.get.seconds();
            if trigger > now {
                break; // sorted: nothing later is due either
            }
            if self.queue[index].next_attempt_at > now {
                index += 1; // waiting out a retry interval
                continue;
            }

            let mut queued = self.queue.remove(index);
            queued.attempts += 1;
            let outcome = execute(&queued.def, now, dispatch, log);
            match outcome {
                Attempt::Done => {
                    self.stats.executed += 1;
                    if let Some(recorder) = self.recorder.as_mut() {
                        recorder.record(&queued.def);
                    }
                    self.resolved.push(ResolvedAction {
                        def: queued.def,
                        resolution: ActionResolution::Executed,
                        resolved_at_seconds: now,
                        attempts: queued.attempts,
                    });
                }
                Attempt::Retry(reason) if queued.attempts <= self.config.max_retries => {
                    self.stats.retries += 1;
                    debug!(kind = queued.def.payload.kind(), attempts = queued.attempts, %reason, "action deferred");
                    queued.next_attempt_at = now + self.config.retry_interval_seconds;
                    self.queue.insert(index, queued);
                    index += 1;
                }
                Attempt::Retry(reason) | Attempt::Fail(reason) => {
                    self.stats.failed += 1;
                    log.record(
                        now,
                        LogCategory::Manual,
                        queued.def.payload.kind(),
                        LogSeverity::Error,
                        format!("action failed after {} attempts: {reason}", queued.attempts),
                    );
                    self.resolved.push(ResolvedAction {
                        def: queued.def,
                        resolution: ActionResolution::Failed { reason },
                        resolved_at_seconds: now,
                        attempts: queued.attempts,
                    });
                }
            }
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

fn execute(
    action: &ManualActionDef,
    now: f64,
    dispatch: &mut Dispatch<'_>,
    log: &mut MissionLog,
) -> Attempt {
    match &action.payload {
        ActionPayload::ChecklistAck {
            event_id,
            step_number,
        } => {
            let ctx = PredicateContext {
                statuses: dispatch.statuses,
                resources: dispatch.resources,
            };
            match dispatch
                .checklist
                .acknowledge(event_id, *step_number, action.actor, &ctx, now, log)
            {
                Ok(effect) => {
                    apply_step_effect(&effect, dispatch.resources, dispatch.agc, now, log);
                    Attempt::Done
                }
                Err(e @ (AckError::NotActive(_)
                | AckError::OutOfOrder { .. }
                | AckError::PrerequisiteUnmet { .. })) => Attempt::Retry(e.to_string()),
                Err(e) => Attempt::Fail(e.to_string()),
            }
        }
        ActionPayload::DskyEntry {
            macro_id,
            verb,
            noun,
        } => {
            dispatch.agc.record_macro(now, macro_id, "manual", *verb, *noun);
            log.record(
                now,
                LogCategory::Manual,
                "dsky",
                LogSeverity::Info,
                format!("DSKY {macro_id} keyed"),
            );
            Attempt::Done
        }
        ActionPayload::PanelControl {
            panel_id,
            control_id,
            state,
        } => {
            if control_id == "PTC" {
                dispatch
                    .resources
                    .set_ptc(state.eq_ignore_ascii_case("ON"));
            }
            log.record(
                now,
                LogCategory::Manual,
                panel_id,
                LogSeverity::Info,
                format!("{panel_id}/{control_id} -> {state}"),
            );
            Attempt::Done
        }
        ActionPayload::ResourceDelta {
            channel,
            amount,
            note,
        } => match dispatch
            .resources
            .apply_delta(channel, *amount, DeltaSource::Manual)
        {
            Ok(()) => {
                if let Some(note) = note {
                    log.record(now, LogCategory::Manual, channel, LogSeverity::Info, note.clone());
                }
                Attempt::Done
            }
            Err(e) => Attempt::Fail(e.to_string()),
        },
        ActionPayload::PropellantBurn { tank, kg } => match dispatch
            .resources
            .request_propellant(tank, *kg, DeltaSource::Manual)
        {
            Ok(()) => Attempt::Done,
            Err(e) => Attempt::Fail(e.to_string()),
        },
        ActionPayload::WorkspaceEvent { workspace_id, note } => {
            log.record(
                now,
                LogCategory::Manual,
                workspace_id,
                LogSeverity::Info,
                note.clone().unwrap_or_else(|| "workspace event".to_string()),
            );
            Attempt::Done
        }
    }
}
