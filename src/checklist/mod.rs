//! Checklist Manager
//!
//! Ordered step acknowledgement for every checklist bound to an active
//! event. Steps acknowledge strictly in order; prerequisites defer an ack
//! rather than failing it. Auto-advance schedules a synthetic crew ack a
//! fixed delay after a step's prerequisites clear; a manual ack consumed the
//! same tick preempts the pending auto ack.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ChecklistConfig;
use crate::mission_log::{LogCategory, LogSeverity, MissionLog};
use crate::scheduler::precondition::PredicateContext;
use crate::types::{Actor, ChecklistDef, ChecklistStepDef, ResourceDeltaDef};

// ============================================================================
// Errors and Effects
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AckError {
    #[error("no active checklist for event {0}")]
    NotActive(String),
    #[error("checklist for {event_id} has no step {step_number}")]
    NoSuchStep { event_id: String, step_number: u32 },
    #[error("step {step_number} out of order (next is {expected})")]
    OutOfOrder { step_number: u32, expected: u32 },
    #[error("step {step_number} already acknowledged")]
    AlreadyAcknowledged { step_number: u32 },
    #[error("prerequisite unmet for step {step_number}: {detail}")]
    PrerequisiteUnmet { step_number: u32, detail: String },
}

/// Side effects of an acknowledged step, routed by the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEffect {
    pub event_id: String,
    pub checklist_id: String,
    pub step_id: String,
    pub step_number: u32,
    pub callout: String,
    pub actor: Actor,
    pub deltas: Vec<ResourceDeltaDef>,
    pub dsky_macro: Option<String>,
    pub panel_control: Option<String>,
    pub clears_failure: Option<String>,
    /// Whole checklist finished with this ack.
    pub checklist_complete: bool,
}

// ============================================================================
// Runtime State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum StepState {
    #[default]
    Pending,
    Acknowledged,
}

#[derive(Debug, Clone)]
struct StepRuntime {
    def: ChecklistStepDef,
    state: StepState,
    acked_at_seconds: Option<f64>,
    acked_by: Option<Actor>,
}

#[derive(Debug, Clone)]
struct ActiveChecklist {
    event_id: String,
    def: ChecklistDef,
    auto_advance: bool,
    steps: Vec<StepRuntime>,
    /// GET at which the next pending step auto-acknowledges; `None` while
    /// its prerequisites are unmet or auto-advance is off.
    next_auto_ack_at: Option<f64>,
}

impl ActiveChecklist {
    fn next_pending_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.state == StepState::Pending)
    }

    fn acknowledged_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.state == StepState::Acknowledged)
            .count()
    }

    fn is_complete(&self) -> bool {
        self.next_pending_index().is_none()
    }
}

// ============================================================================
// Snapshots / Stats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistStats {
    pub activated: u32,
    pub completed: u32,
    pub acknowledged_steps: u32,
    pub manual_acks: u32,
    pub auto_acks: u32,
    pub deferred_acks: u32,
}

/// The single "next attention" checklist highlighted in the HUD summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistChip {
    pub event_id: String,
    pub checklist_id: String,
    pub title: String,
    pub next_step_number: u32,
    pub next_callout: String,
    pub remaining_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistView {
    pub event_id: String,
    pub checklist_id: String,
    pub title: String,
    pub total_steps: usize,
    pub acknowledged_steps: usize,
    pub next_step_number: Option<u32>,
    pub next_callout: Option<String>,
    pub auto_advance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistManagerSnapshot {
    pub chip: Option<ChecklistChip>,
    pub active: Vec<ChecklistView>,
    pub stats: ChecklistStats,
}

// ============================================================================
// Manager
// ============================================================================

pub struct ChecklistManager {
    config: ChecklistConfig,
    active: BTreeMap<String, ActiveChecklist>,
    stats: ChecklistStats,
}

impl ChecklistManager {
    pub fn new(config: ChecklistConfig) -> Self {
        Self {
            config,
            active: BTreeMap::new(),
            stats: ChecklistStats::default(),
        }
    }

    /// Bind a checklist to an activating event.
    pub fn activate(&mut self, event_id: &str, def: &ChecklistDef, now: f64, log: &mut MissionLog) {
        if self.active.contains_key(event_id) {
            debug!(event_id, checklist = %def.id, "checklist already active for event");
            return;
        }
        let auto_advance = def.auto_advance.unwrap_or(self.config.auto_advance);
        self.stats.activated += 1;
        log.record(
            now,
            LogCategory::Checklist,
            &def.id,
            LogSeverity::Info,
            format!("{} active for {event_id} ({} steps)", def.title, def.steps.len()),
        );
        self.active.insert(
            event_id.to_string(),
            ActiveChecklist {
                event_id: event_id.to_string(),
                def: def.clone(),
                auto_advance,
                steps: def
                    .steps
                    .iter()
                    .map(|s| StepRuntime {
                        def: s.clone(),
                        state: StepState::Pending,
                        acked_at_seconds: None,
                        acked_by: None,
                    })
                    .collect(),
                next_auto_ack_at: None,
            },
        );
    }

    /// Acknowledge a step. Out-of-order and prerequisite violations defer
    /// (the manual queue retries); the ack itself never skips ahead.
    pub fn acknowledge(
        &mut self,
        event_id: &str,
        step_number: u32,
        actor: Actor,
        ctx: &PredicateContext<'_>,
        now: f64,
        log: &mut MissionLog,
    ) -> Result<StepEffect, AckError> {
        let Some(checklist) = self.active.get_mut(event_id) else {
            return Err(AckError::NotActive(event_id.to_string()));
        };
        let Some(index) = checklist.steps.iter().position(|s| s.def.order == step_number) else {
            return Err(AckError::NoSuchStep {
                event_id: event_id.to_string(),
                step_number,
            });
        };
        if checklist.steps[index].state == StepState::Acknowledged {
            return Err(AckError::AlreadyAcknowledged { step_number });
        }
        let next_pending = checklist
            .next_pending_index()
            .map(|i| checklist.steps[i].def.order)
            .unwrap_or(step_number);
        if step_number != next_pending {
            self.stats.deferred_acks += 1;
            return Err(AckError::OutOfOrder {
                step_number,
                expected: next_pending,
            });
        }
        if let Some(unmet) = ctx.first_unmet(&checklist.steps[index].def.prerequisites) {
            let detail = PredicateContext::describe(unmet);
            self.stats.deferred_acks += 1;
            log.record(
                now,
                LogCategory::Checklist,
                &checklist.def.id,
                LogSeverity::Warning,
                format!("step {step_number} deferred: {detail}"),
            );
            return Err(AckError::PrerequisiteUnmet {
                step_number,
                detail,
            });
        }

        let step = &mut checklist.steps[index];
        step.state = StepState::Acknowledged;
        step.acked_at_seconds = Some(now);
        step.acked_by = Some(actor);
        // A consumed ack preempts any scheduled auto ack.
        checklist.next_auto_ack_at = None;

        self.stats.acknowledged_steps += 1;
        match actor {
            Actor::ManualCrew => self.stats.manual_acks += 1,
            Actor::AutoCrew => self.stats.auto_acks += 1,
        }

        let complete = checklist.is_complete();
        if complete {
            self.stats.completed += 1;
        }
        let effect = StepEffect {
            event_id: event_id.to_string(),
            checklist_id: checklist.def.id.clone(),
            step_id: checklist.steps[index].def.id.clone(),
            step_number,
            callout: checklist.steps[index].def.callout.clone(),
            actor,
            deltas: checklist.steps[index].def.effects.clone(),
            dsky_macro: checklist.steps[index].def.dsky_macro.clone(),
            panel_control: checklist.steps[index].def.panel_control.clone(),
            clears_failure: checklist.steps[index].def.clears_failure.clone(),
            checklist_complete: complete,
        };
        log.record(
            now,
            LogCategory::Checklist,
            &checklist.def.id,
            LogSeverity::Info,
            format!("step {step_number} {} ({actor})", effect.callout),
        );
        Ok(effect)
    }

    /// Drive auto-advance: schedule and fire synthetic crew acks.
    pub fn tick(
        &mut self,
        now: f64,
        ctx: &PredicateContext<'_>,
        log: &mut MissionLog,
    ) -> Vec<StepEffect> {
        let mut due: Vec<(String, u32)> = Vec::new();

        for checklist in self.active.values_mut() {
            if !checklist.auto_advance || checklist.is_complete() {
                continue;
            }
            let Some(index) = checklist.next_pending_index() else {
                continue;
            };
            let step = &checklist.steps[index];
            if step.def.manual_only {
                checklist.next_auto_ack_at = None;
                continue;
            }
            if !ctx.all_hold(&step.def.prerequisites) {
                // Timer re-arms from scratch once prerequisites clear.
                checklist.next_auto_ack_at = None;
                continue;
            }
            match checklist.next_auto_ack_at {
                None => {
                    checklist.next_auto_ack_at = Some(now + self.config.step_duration_seconds);
                }
                Some(at) if now >= at => {
                    due.push((checklist.event_id.clone(), step.def.order));
                }
                Some(_) => {}
            }
        }

        let mut effects = Vec::new();
        for (event_id, step_number) in due {
            match self.acknowledge(&event_id, step_number, Actor::AutoCrew, ctx, now, log) {
                Ok(effect) => effects.push(effect),
                Err(e) => debug!(event_id, step_number, error = %e, "auto ack deferred"),
            }
        }
        effects
    }

    /// True when the event either has no bound checklist or every step is
    /// acknowledged. Scheduler exit criterion (a).
    pub fn is_complete(&self, event_id: &str) -> bool {
        self.active.get(event_id).map_or(true, ActiveChecklist::is_complete)
    }

    pub fn stats(&self) -> ChecklistStats {
        self.stats
    }

    /// Chip selection: fewest remaining steps, then smaller next-step
    /// number, then lexicographic event id.
    fn chip(&self) -> Option<ChecklistChip> {
        self.active
            .values()
            .filter(|c| !c.is_complete())
            .min_by(|a, b| {
                let a_remaining = a.steps.len() - a.acknowledged_count();
                let b_remaining = b.steps.len() - b.acknowledged_count();
                let a_next = a.next_pending_index().map(|i| a.steps[i].def.order).unwrap_or(u32::MAX);
                let b_next = b.next_pending_index().map(|i| b.steps[i].def.order).unwrap_or(u32::MAX);
                a_remaining
                    .cmp(&b_remaining)
                    .then(a_next.cmp(&b_next))
                    .then_with(|| a.event_id.cmp(&b.event_id))
            })
            .and_then(|c| {
                let index = c.next_pending_index()?;
                Some(ChecklistChip {
                    event_id: c.event_id.clone(),
                    checklist_id: c.def.id.clone(),
                    title: c.def.title.clone(),
                    next_step_number: c.steps[index].def.order,
                    next_callout: c.steps[index].def.callout.clone(),
                    remaining_steps: c.steps.len() - c.acknowledged_count(),
                })
            })
    }

    pub fn snapshot(&self) -> ChecklistManagerSnapshot {
        ChecklistManagerSnapshot {
            chip: self.chip(),
            active: self
                .active
                .values()
                .map(|c| {
                    let next = c.next_pending_index();
                    ChecklistView {
                        event_id: c.event_id.clone(),
                        checklist_id: c.def.id.clone(),
                        title: c.def.title.clone(),
                        total_steps: c.steps.len(),
                        acknowledged_steps: c.acknowledged_count(),
                        next_step_number: next.map(|i| c.steps[i].def.order),
                        next_callout: next.map(|i| c.steps[i].def.callout.clone()),
                        auto_advance: c.auto_advance,
                    }
                })
                .collect(),
            stats: self.stats,
        }
    }
}

/// Route an acknowledged step's side effects: resource deltas, DSKY macro,
/// PTC panel throws, and failure recovery. Shared by the auto-advance path
/// and the manual queue.
pub fn apply_step_effect(
    effect: &StepEffect,
    resources: &mut crate::resources::ResourceSystem,
    agc: &mut crate::agc::AgcState,
    now: f64,
    log: &mut MissionLog,
) {
    for delta in &effect.deltas {
        if let Err(e) = resources.apply_delta(
            &delta.channel,
            delta.amount,
            crate::resources::DeltaSource::Checklist(effect.checklist_id.clone()),
        ) {
            log.record(
                now,
                LogCategory::Checklist,
                &effect.checklist_id,
                LogSeverity::Error,
                format!("step {} effect rejected: {e}", effect.step_number),
            );
        }
    }
    if let Some(macro_id) = &effect.dsky_macro {
        agc.record_macro(
            now,
            macro_id,
            &format!("checklist:{}", effect.checklist_id),
            None,
            None,
        );
    }
    if let Some(panel_control) = &effect.panel_control {
        // The one panel binding the engine interprets; everything else is
        // narrative for the HUD.
        match panel_control.as_str() {
            "PTC_ENABLE" => resources.set_ptc(true),
            "PTC_DISABLE" => resources.set_ptc(false),
            _ => {}
        }
    }
    if let Some(action_id) = &effect.clears_failure {
        resources.clear_failures_by_action(action_id, now, log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::scheduler::event::EventStatus;
    use crate::types::{ConsumablesBudget, PowerBudget, Predicate, TankBudget};

    fn make_resources() -> crate::resources::ResourceSystem {
        let mut tanks = BTreeMap::new();
        tanks.insert(
            "csm_rcs_kg".to_string(),
            TankBudget {
                initial_kg: 100.0,
                reserve_kg: 0.0,
            },
        );
        let budget = ConsumablesBudget {
            tanks,
            power: PowerBudget {
                fuel_cell_output_kw: 4.0,
                base_load_kw: 2.0,
                phase_loads_kw: BTreeMap::new(),
            },
            cryo: Default::default(),
            life_support: Default::default(),
            delta_v: BTreeMap::new(),
        };
        crate::resources::ResourceSystem::new(&budget, &[], &[], &SimConfig::default())
    }

    fn make_checklist(id: &str, step_count: u32) -> ChecklistDef {
        ChecklistDef {
            id: id.to_string(),
            title: format!("{id} checklist"),
            auto_advance: None,
            steps: (1..=step_count)
                .map(|order| crate::types::ChecklistStepDef {
                    id: format!("{id}_S{order}"),
                    order,
                    callout: format!("step {order}"),
                    panel_control: None,
                    dsky_macro: None,
                    manual_only: false,
                    prerequisites: vec![],
                    effects: vec![],
                    clears_failure: None,
                })
                .collect(),
        }
    }

    fn manager() -> (ChecklistManager, MissionLog) {
        (
            ChecklistManager::new(ChecklistConfig {
                auto_advance: true,
                step_duration_seconds: 15.0,
            }),
            MissionLog::new(64),
        )
    }

    #[test]
    fn acks_enforce_order() {
        let (mut mgr, mut log) = manager();
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        mgr.activate("EV1", &make_checklist("CL1", 3), 0.0, &mut log);

        let err = mgr
            .acknowledge("EV1", 2, Actor::ManualCrew, &ctx, 1.0, &mut log)
            .unwrap_err();
        assert_eq!(
            err,
            AckError::OutOfOrder {
                step_number: 2,
                expected: 1
            }
        );
        mgr.acknowledge("EV1", 1, Actor::ManualCrew, &ctx, 1.0, &mut log)
            .unwrap();
        let effect = mgr
            .acknowledge("EV1", 2, Actor::ManualCrew, &ctx, 2.0, &mut log)
            .unwrap();
        assert!(!effect.checklist_complete);
        let effect = mgr
            .acknowledge("EV1", 3, Actor::ManualCrew, &ctx, 3.0, &mut log)
            .unwrap();
        assert!(effect.checklist_complete);
        assert!(mgr.is_complete("EV1"));
    }

    #[test]
    fn auto_advance_fires_after_step_duration() {
        let (mut mgr, mut log) = manager();
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        mgr.activate("EV1", &make_checklist("CL1", 1), 0.0, &mut log);

        // First tick schedules, nothing fires
        assert!(mgr.tick(0.0, &ctx, &mut log).is_empty());
        assert!(mgr.tick(10.0, &ctx, &mut log).is_empty());
        let effects = mgr.tick(15.0, &ctx, &mut log);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].actor, Actor::AutoCrew);
        assert!(mgr.is_complete("EV1"));
        assert_eq!(mgr.stats().auto_acks, 1);
    }

    #[test]
    fn manual_ack_preempts_scheduled_auto_ack() {
        let (mut mgr, mut log) = manager();
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        mgr.activate("EV1", &make_checklist("CL1", 2), 0.0, &mut log);
        mgr.tick(0.0, &ctx, &mut log); // schedules step 1 for t=15

        mgr.acknowledge("EV1", 1, Actor::ManualCrew, &ctx, 14.0, &mut log)
            .unwrap();
        // Timer was reset; step 2 schedules fresh at t=14 tick
        let effects = mgr.tick(15.0, &ctx, &mut log);
        assert!(effects.is_empty(), "auto ack should be rescheduled, not fired");
        let effects = mgr.tick(30.0, &ctx, &mut log);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].step_number, 2);
    }

    #[test]
    fn prerequisites_defer_acks() {
        let (mut mgr, mut log) = manager();
        let resources = make_resources();
        let mut checklist = make_checklist("CL1", 1);
        checklist.steps[0].prerequisites = vec![Predicate::EventComplete {
            event_id: "PRIOR".into(),
        }];
        mgr.activate("EV1", &checklist, 0.0, &mut log);

        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        let err = mgr
            .acknowledge("EV1", 1, Actor::ManualCrew, &ctx, 1.0, &mut log)
            .unwrap_err();
        assert!(matches!(err, AckError::PrerequisiteUnmet { .. }));

        let mut statuses = BTreeMap::new();
        statuses.insert("PRIOR".to_string(), EventStatus::Complete);
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        mgr.acknowledge("EV1", 1, Actor::ManualCrew, &ctx, 2.0, &mut log)
            .unwrap();
    }

    #[test]
    fn manual_only_steps_never_auto_ack() {
        let (mut mgr, mut log) = manager();
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        let mut checklist = make_checklist("CL1", 1);
        checklist.steps[0].manual_only = true;
        mgr.activate("EV1", &checklist, 0.0, &mut log);

        for t in 0..10 {
            assert!(mgr.tick(t as f64 * 15.0, &ctx, &mut log).is_empty());
        }
        assert!(!mgr.is_complete("EV1"));
    }

    #[test]
    fn chip_prefers_fewest_remaining_steps() {
        let (mut mgr, mut log) = manager();
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        mgr.activate("EV_A", &make_checklist("CL_A", 5), 0.0, &mut log);
        mgr.activate("EV_B", &make_checklist("CL_B", 2), 0.0, &mut log);
        let chip = mgr.snapshot().chip.unwrap();
        assert_eq!(chip.event_id, "EV_B");

        // Acknowledge B down to parity, tie breaks on event id
        mgr.acknowledge("EV_B", 1, Actor::ManualCrew, &ctx, 1.0, &mut log)
            .unwrap();
        let chip = mgr.snapshot().chip.unwrap();
        assert_eq!(chip.event_id, "EV_B");
        assert_eq!(chip.remaining_steps, 1);
    }
}
