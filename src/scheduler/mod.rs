//! Event Scheduler
//!
//! Walks every mission event through `pending → armed → active →
//! {complete, failed}`. Arming happens when the open window arrives and the
//! preconditions hold against the start-of-tick snapshot; armed events
//! activate the same tick and bind their autopilot program and checklist.
//! Exit criteria are evaluated in a fixed order, with simultaneous
//! completions resolved lexicographically by event id.

pub mod event;
pub mod failure;
pub mod precondition;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::autopilot::AutopilotRunner;
use crate::checklist::ChecklistManager;
use crate::mission_log::{LogCategory, LogSeverity, MissionLog};
use crate::resources::ResourceSystem;
use crate::types::MissionData;

use event::{EventRuntime, EventStatus};
use failure::FaultRecord;
use precondition::PredicateContext;

// ============================================================================
// Transitions and Counts
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionKind {
    Armed,
    Activated,
    Completed { missed: bool },
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventTransition {
    pub event_id: String,
    pub phase: String,
    pub kind: TransitionKind,
    pub at_seconds: f64,
}

/// One scheduler pass: the transitions taken plus any taxonomy failures
/// their event failures raised (classified for scoring).
#[derive(Debug, Default)]
pub struct SchedulerTickOutput {
    pub transitions: Vec<EventTransition>,
    pub faults: Vec<FaultRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounts {
    pub pending: u32,
    pub armed: u32,
    pub active: u32,
    pub complete: u32,
    pub failed: u32,
    pub skipped: u32,
    pub missed: u32,
    pub total: u32,
}

// ============================================================================
// Scheduler
// ============================================================================

pub struct EventScheduler {
    events: Vec<EventRuntime>,
    /// Indices into `events`, sorted by `opens_at` then id.
    open_order: Vec<usize>,
    by_id: BTreeMap<String, usize>,
    statuses: BTreeMap<String, EventStatus>,
    current_phase: String,
}

impl EventScheduler {
    pub fn new(mission: &MissionData) -> Self {
        let events: Vec<EventRuntime> = mission
            .events
            .iter()
            .map(|def| EventRuntime::new(def.clone()))
            .collect();
        let mut open_order: Vec<usize> = (0..events.len()).collect();
        open_order.sort_by(|&a, &b| {
            events[a]
                .def
                .opens_at
                .seconds()
                .partial_cmp(&events[b].def.opens_at.seconds())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| events[a].def.id.cmp(&events[b].def.id))
        });
        let by_id = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.def.id.clone(), i))
            .collect();
        let statuses = events
            .iter()
            .map(|e| (e.def.id.clone(), EventStatus::Pending))
            .collect();
        Self {
            events,
            open_order,
            by_id,
            statuses,
            current_phase: "PRELAUNCH".to_string(),
        }
    }

    pub fn get_event_by_id(&self, id: &str) -> Option<&EventRuntime> {
        self.by_id.get(id).map(|&i| &self.events[i])
    }

    /// Status map shared with predicate contexts.
    pub fn statuses(&self) -> &BTreeMap<String, EventStatus> {
        &self.statuses
    }

    /// Phase tag of the most recently activated event.
    pub fn current_phase(&self) -> &str {
        &self.current_phase
    }

    pub fn stats(&self) -> EventCounts {
        let mut counts = EventCounts {
            total: self.events.len() as u32,
            ..EventCounts::default()
        };
        for event in &self.events {
            match event.status {
                EventStatus::Pending => counts.pending += 1,
                EventStatus::Armed => counts.armed += 1,
                EventStatus::Active => counts.active += 1,
                EventStatus::Complete => counts.complete += 1,
                EventStatus::Failed => counts.failed += 1,
            }
            if event.skipped {
                counts.skipped += 1;
            }
            if event.missed {
                counts.missed += 1;
            }
        }
        counts
    }

    /// Every event, in open order.
    pub fn events(&self) -> impl Iterator<Item = &EventRuntime> {
        self.open_order.iter().map(|&i| &self.events[i])
    }

    /// Non-terminal events in open order, for the HUD.
    pub fn upcoming(&self, limit: usize) -> Vec<&EventRuntime> {
        self.open_order
            .iter()
            .map(|&i| &self.events[i])
            .filter(|e| !e.status.is_terminal())
            .take(limit)
            .collect()
    }

    /// Fail an event from outside the scheduler (autopilot abort path).
    /// Returns the transition plus the bound taxonomy fault, if this
    /// failure raised one.
    pub fn fail_event(
        &mut self,
        event_id: &str,
        reason: &str,
        now: f64,
        resources: &mut ResourceSystem,
        log: &mut MissionLog,
    ) -> Option<(EventTransition, Option<FaultRecord>)> {
        let &index = self.by_id.get(event_id)?;
        if self.events[index].status.is_terminal() {
            return None;
        }
        Some(self.apply_failure(index, reason.to_string(), now, resources, log))
    }

    /// One scheduler pass. Returns every transition taken this tick and
    /// the taxonomy faults those failures raised.
    pub fn tick(
        &mut self,
        now: f64,
        checklist: &mut ChecklistManager,
        autopilot: &mut AutopilotRunner,
        resources: &mut ResourceSystem,
        mission: &MissionData,
        log: &mut MissionLog,
    ) -> SchedulerTickOutput {
        let mut transitions = Vec::new();
        let mut faults = Vec::new();

        // --- Pending events: arm, or retire a missed window -------------
        let mut to_arm: Vec<usize> = Vec::new();
        let mut to_miss: Vec<usize> = Vec::new();
        {
            let ctx = PredicateContext {
                statuses: &self.statuses,
                resources,
            };
            for &index in &self.open_order {
                let event = &self.events[index];
                if event.status != EventStatus::Pending {
                    continue;
                }
                if now > event.def.closes_at.seconds() {
                    to_miss.push(index);
                    continue;
                }
                if event.def.opens_at.seconds() <= now && ctx.all_hold(&event.def.preconditions) {
                    to_arm.push(index);
                }
            }
        }

        for index in to_miss {
            let mandatory = self.events[index].def.mandatory;
            if mandatory {
                let (transition, fault) = self.apply_failure(
                    index,
                    "window expired before activation".to_string(),
                    now,
                    resources,
                    log,
                );
                transitions.push(transition);
                faults.extend(fault);
            } else {
                let event = &mut self.events[index];
                event.status = EventStatus::Complete;
                event.skipped = true;
                event.completion_time_seconds = Some(now);
                self.statuses.insert(event.def.id.clone(), EventStatus::Complete);
                log.record(
                    now,
                    LogCategory::Scheduler,
                    &event.def.id,
                    LogSeverity::Warning,
                    format!("{} window passed, optional event skipped", event.def.id),
                );
                transitions.push(EventTransition {
                    event_id: event.def.id.clone(),
                    phase: event.def.phase.clone(),
                    kind: TransitionKind::Skipped,
                    at_seconds: now,
                });
            }
        }

        // --- Armed events activate the same tick -------------------------
        for index in to_arm {
            {
                let event = &mut self.events[index];
                event.status = EventStatus::Armed;
                self.statuses.insert(event.def.id.clone(), EventStatus::Armed);
            }
            transitions.push(EventTransition {
                event_id: self.events[index].def.id.clone(),
                phase: self.events[index].def.phase.clone(),
                kind: TransitionKind::Armed,
                at_seconds: now,
            });

            let event = &mut self.events[index];
            event.status = EventStatus::Active;
            event.activation_time_seconds = Some(now);
            self.statuses.insert(event.def.id.clone(), EventStatus::Active);
            self.current_phase = event.def.phase.clone();

            info!(event = %event.def.id, phase = %event.def.phase, get = now, "event active");
            log.record(
                now,
                LogCategory::Scheduler,
                &event.def.id,
                LogSeverity::Info,
                format!("{} active", event.def.id),
            );

            if let Some(checklist_id) = self.events[index].def.checklist_id.clone() {
                if let Some(def) = mission.checklist(&checklist_id) {
                    checklist.activate(&self.events[index].def.id, def, now, log);
                }
            }
            if let Some(autopilot_id) = self.events[index].def.autopilot_id.clone() {
                if let Some(def) = mission.autopilot_program(&autopilot_id) {
                    autopilot.start(&self.events[index].def.id, def, now, log);
                }
            }

            transitions.push(EventTransition {
                event_id: self.events[index].def.id.clone(),
                phase: self.events[index].def.phase.clone(),
                kind: TransitionKind::Activated,
                at_seconds: now,
            });
        }

        // --- Active events: exit criteria, lexicographic order -----------
        let mut active_indices: Vec<usize> = (0..self.events.len())
            .filter(|&i| self.events[i].status == EventStatus::Active)
            .collect();
        active_indices.sort_by(|&a, &b| self.events[a].def.id.cmp(&self.events[b].def.id));

        for index in active_indices {
            let event_id = self.events[index].def.id.clone();
            let closes_at = self.events[index].def.closes_at.seconds();

            // (a) bound checklist fully acknowledged AND autopilot complete
            if checklist.is_complete(&event_id) && autopilot.is_complete(&event_id) {
                let missed = now > closes_at;
                let event = &mut self.events[index];
                event.status = EventStatus::Complete;
                event.missed = missed;
                event.completion_time_seconds = Some(now);
                self.statuses.insert(event_id.clone(), EventStatus::Complete);
                log.record(
                    now,
                    LogCategory::Scheduler,
                    &event_id,
                    LogSeverity::Info,
                    if missed {
                        format!("{event_id} complete (after window close)")
                    } else {
                        format!("{event_id} complete")
                    },
                );
                transitions.push(EventTransition {
                    event_id,
                    phase: self.events[index].def.phase.clone(),
                    kind: TransitionKind::Completed { missed },
                    at_seconds: now,
                });
                continue;
            }

            // (b) window expired without completion
            if now > closes_at {
                if self.events[index].def.mandatory {
                    let (transition, fault) =
                        self.apply_failure(index, "window expired".to_string(), now, resources, log);
                    transitions.push(transition);
                    faults.extend(fault);
                } else {
                    let event = &mut self.events[index];
                    event.status = EventStatus::Complete;
                    event.missed = true;
                    event.completion_time_seconds = Some(now);
                    self.statuses.insert(event_id.clone(), EventStatus::Complete);
                    transitions.push(EventTransition {
                        event_id,
                        phase: self.events[index].def.phase.clone(),
                        kind: TransitionKind::Completed { missed: true },
                        at_seconds: now,
                    });
                }
                continue;
            }

            // (c) explicit failure trigger from the resource system. The
            // failure is already active, so apply_failure raises nothing
            // new and the fault stays counted on the resource path.
            if let Some(failure_id) = self.events[index].def.failure_id.clone() {
                if resources.has_active_failure(&failure_id) {
                    let (transition, fault) = self.apply_failure(
                        index,
                        format!("failure:{failure_id}"),
                        now,
                        resources,
                        log,
                    );
                    transitions.push(transition);
                    faults.extend(fault);
                }
            }
        }

        SchedulerTickOutput { transitions, faults }
    }

    fn apply_failure(
        &mut self,
        index: usize,
        reason: String,
        now: f64,
        resources: &mut ResourceSystem,
        log: &mut MissionLog,
    ) -> (EventTransition, Option<FaultRecord>) {
        let event = &mut self.events[index];
        event.status = EventStatus::Failed;
        event.completion_time_seconds = Some(now);
        event.failure_reason = Some(reason.clone());
        self.statuses.insert(event.def.id.clone(), EventStatus::Failed);

        log.record(
            now,
            LogCategory::Scheduler,
            &event.def.id,
            LogSeverity::Failure,
            format!("{} failed: {reason}", event.def.id),
        );

        // A failing event raises its bound taxonomy failure (no-op when the
        // failure itself caused the event to fail — already active). The
        // raise comes back as a classified fault for the scoring path.
        let def = self.events[index].def.clone();
        let fault = failure::register_event_failure(&def, resources, now, log)
            .as_ref()
            .map(FaultRecord::from);

        (
            EventTransition {
                event_id: def.id,
                phase: def.phase,
                kind: TransitionKind::Failed { reason },
                at_seconds: now,
            },
            fault,
        )
    }
}
