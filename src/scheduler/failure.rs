//! Event-failure bridging
//!
//! Connects event outcomes to the mission failure taxonomy: a failing event
//! registers its bound failure with the resource system (immediate effects
//! plus ongoing penalty), and a taxonomy failure raised by the resource
//! system fails its bound event. Scheduler-side raises surface to the tick
//! loop as [`FaultRecord`]s so the scoring aggregator classifies them; the
//! resource system's own threshold raises reach scoring directly.

use serde::{Deserialize, Serialize};

use crate::mission_log::MissionLog;
use crate::resources::{RaisedFailure, ResourceSystem};
use crate::types::{EventDef, FailureClass};

/// One fault as the scoring aggregator counts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub id: String,
    pub source: String,
    pub classification: FailureClass,
    pub at_seconds: f64,
}

impl From<&RaisedFailure> for FaultRecord {
    fn from(raised: &RaisedFailure) -> Self {
        Self {
            id: raised.id.clone(),
            source: raised.source.clone(),
            classification: raised.classification,
            at_seconds: raised.at_seconds,
        }
    }
}

/// Register the failure bound to a failing event, if any. Returns the
/// raised failure when this is its first occurrence.
pub fn register_event_failure(
    event: &EventDef,
    resources: &mut ResourceSystem,
    now: f64,
    log: &mut MissionLog,
) -> Option<RaisedFailure> {
    let failure_id = event.failure_id.as_deref()?;
    resources.register_failure(failure_id, &format!("event:{}", event.id), now, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::types::{
        ConsumablesBudget, FailureDef, GetTime, PowerBudget, ResourceDeltaDef, TankBudget,
    };
    use std::collections::BTreeMap;

    fn make_event(failure_id: Option<&str>) -> EventDef {
        EventDef {
            id: "MCC_004".into(),
            phase: "CRUISE".into(),
            pad_id: None,
            opens_at: GetTime::from_seconds(0.0),
            closes_at: GetTime::from_seconds(100.0),
            preconditions: vec![],
            expected_duration_seconds: None,
            autopilot_id: None,
            checklist_id: None,
            failure_id: failure_id.map(String::from),
            mandatory: true,
        }
    }

    fn make_resources(failures: Vec<FailureDef>) -> ResourceSystem {
        let mut tanks = BTreeMap::new();
        tanks.insert(
            "csm_rcs_kg".to_string(),
            TankBudget {
                initial_kg: 100.0,
                reserve_kg: 0.0,
            },
        );
        ResourceSystem::new(
            &ConsumablesBudget {
                tanks,
                power: PowerBudget {
                    fuel_cell_output_kw: 4.0,
                    base_load_kw: 2.0,
                    phase_loads_kw: BTreeMap::new(),
                },
                cryo: Default::default(),
                life_support: Default::default(),
                delta_v: BTreeMap::new(),
            },
            &failures,
            &[],
            &SimConfig::default(),
        )
    }

    #[test]
    fn bound_failure_registers_with_immediate_effect() {
        let failure = FailureDef {
            id: "mcc_abort".into(),
            summary: "midcourse correction lost".into(),
            classification: FailureClass::Hard,
            immediate_effects: vec![ResourceDeltaDef {
                channel: "csm_rcs_kg".into(),
                amount: -10.0,
            }],
            ongoing_penalties: vec![],
            recovery_action: None,
            trigger: None,
        };
        let mut resources = make_resources(vec![failure]);
        let mut log = MissionLog::new(16);
        let event = make_event(Some("mcc_abort"));

        let raised = register_event_failure(&event, &mut resources, 5.0, &mut log).unwrap();
        assert_eq!(raised.classification, FailureClass::Hard);
        assert_eq!(raised.source, "event:MCC_004");
        assert_eq!(resources.snapshot().tanks["csm_rcs_kg"].current_kg, 90.0);

        let fault = FaultRecord::from(&raised);
        assert_eq!(fault.at_seconds, 5.0);
        assert_eq!(fault.classification, FailureClass::Hard);

        // Second failure of the same kind does not double-apply
        assert!(register_event_failure(&event, &mut resources, 6.0, &mut log).is_none());
    }

    #[test]
    fn unbound_event_registers_nothing() {
        let mut resources = make_resources(vec![]);
        let mut log = MissionLog::new(16);
        assert!(register_event_failure(&make_event(None), &mut resources, 5.0, &mut log).is_none());
    }
}
