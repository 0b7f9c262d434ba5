//! Predicate evaluation
//!
//! Preconditions and checklist prerequisites are sets of predicates over
//! prior-event status and resource channels, evaluated against a context
//! captured at the tick boundary.

use std::collections::BTreeMap;

use crate::resources::ResourceSystem;
use crate::types::Predicate;

use super::event::EventStatus;

/// Read-only evaluation context. An unknown event id or channel evaluates
/// false — an unarmable predicate must hold an event back, not wave it on.
pub struct PredicateContext<'a> {
    pub statuses: &'a BTreeMap<String, EventStatus>,
    pub resources: &'a ResourceSystem,
}

impl PredicateContext<'_> {
    pub fn evaluate(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::EventComplete { event_id } => {
                self.statuses.get(event_id) == Some(&EventStatus::Complete)
            }
            Predicate::EventFailed { event_id } => {
                self.statuses.get(event_id) == Some(&EventStatus::Failed)
            }
            Predicate::ResourceAtLeast { channel, value } => self
                .resources
                .channel_value(channel)
                .is_some_and(|v| v >= *value),
            Predicate::ResourceAtMost { channel, value } => self
                .resources
                .channel_value(channel)
                .is_some_and(|v| v <= *value),
        }
    }

    pub fn all_hold(&self, predicates: &[Predicate]) -> bool {
        predicates.iter().all(|p| self.evaluate(p))
    }

    /// First predicate that does not hold, for deferral logging.
    pub fn first_unmet<'p>(&self, predicates: &'p [Predicate]) -> Option<&'p Predicate> {
        predicates.iter().find(|p| !self.evaluate(p))
    }

    pub fn describe(predicate: &Predicate) -> String {
        match predicate {
            Predicate::EventComplete { event_id } => format!("{event_id} complete"),
            Predicate::EventFailed { event_id } => format!("{event_id} failed"),
            Predicate::ResourceAtLeast { channel, value } => format!("{channel} >= {value}"),
            Predicate::ResourceAtMost { channel, value } => format!("{channel} <= {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::types::{ConsumablesBudget, PowerBudget, TankBudget};

    fn make_resources() -> ResourceSystem {
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
        ResourceSystem::new(&budget, &[], &[], &SimConfig::default())
    }

    #[test]
    fn event_predicates_check_status_map() {
        let resources = make_resources();
        let mut statuses = BTreeMap::new();
        statuses.insert("TLI_001".to_string(), EventStatus::Complete);
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        assert!(ctx.evaluate(&Predicate::EventComplete {
            event_id: "TLI_001".into()
        }));
        assert!(!ctx.evaluate(&Predicate::EventComplete {
            event_id: "MCC_002".into()
        }));
    }

    #[test]
    fn resource_predicates_compare_channel_values() {
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        assert!(ctx.evaluate(&Predicate::ResourceAtLeast {
            channel: "csm_rcs_kg".into(),
            value: 50.0
        }));
        assert!(!ctx.evaluate(&Predicate::ResourceAtMost {
            channel: "csm_rcs_kg".into(),
            value: 50.0
        }));
        // Unknown channel never satisfies
        assert!(!ctx.evaluate(&Predicate::ResourceAtLeast {
            channel: "nope".into(),
            value: 0.0
        }));
    }

    #[test]
    fn first_unmet_reports_in_order() {
        let resources = make_resources();
        let statuses = BTreeMap::new();
        let ctx = PredicateContext {
            statuses: &statuses,
            resources: &resources,
        };
        let predicates = vec![
            Predicate::ResourceAtLeast {
                channel: "csm_rcs_kg".into(),
                value: 10.0,
            },
            Predicate::EventComplete {
                event_id: "X".into(),
            },
        ];
        let unmet = ctx.first_unmet(&predicates).unwrap();
        assert_eq!(
            PredicateContext::describe(unmet),
            "X complete".to_string()
        );
    }
}
