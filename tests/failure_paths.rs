//! Failure-path integration
//!
//! Propellant-exhaustion aborts, periapsis alert grading, and recoverable
//! failure clearing, all driven end to end through the engine.

mod common;

use common::{default_config, event, get, mission_shell};
use mocr::orbit::{ConstantOrbitProvider, OrbitSummary};
use mocr::types::{
    ActionPayload, Actor, AutopilotCommandDef, AutopilotProgramDef, FailureClass, FailureDef,
    FailureTriggerDef, GetTime, ManualActionDef, OngoingPenaltyDef, PropulsionStage,
};
use mocr::manual::script::ManualScript;
use mocr::Simulation;

/// S4: a burn that needs more propellant than the tank holds aborts
/// mid-burn, fails the bound event, and lands hard faults in the score —
/// the abort itself plus the event's bound taxonomy failure.
#[test]
fn propellant_exhaustion_aborts_burn_and_fails_event() {
    let mut mission = mission_shell(
        "AP_ABORT",
        vec![event("LOI_BURN_040", "LOI", "000:01:00", "000:20:00")],
    );
    // Long full-throttle SPS burn: 29 kg/s against an 18 413 kg tank needs
    // ~635 s; command 900 s of burn.
    mission.autopilot_programs = vec![AutopilotProgramDef {
        id: "P40_LOI".to_string(),
        title: "LOI burn".to_string(),
        stage: PropulsionStage::CsmSps,
        commands: vec![
            AutopilotCommandDef::Ullage { at: 0.0, duration_seconds: 4.0 },
            AutopilotCommandDef::Throttle { at: 4.0, level: 1.0, ramp_seconds: 2.0 },
            AutopilotCommandDef::Throttle { at: 904.0, level: 0.0, ramp_seconds: 1.0 },
            AutopilotCommandDef::Complete { at: 910.0 },
        ],
    }];
    mission.events[0].autopilot_id = Some("P40_LOI".to_string());
    mission.events[0].failure_id = Some("loi_burn_lost".to_string());
    mission.failures = vec![FailureDef {
        id: "loi_burn_lost".to_string(),
        summary: "LOI burn lost, lunar orbit not achieved".to_string(),
        classification: FailureClass::Hard,
        immediate_effects: vec![],
        ongoing_penalties: vec![],
        recovery_action: None,
        trigger: None,
    }];

    let mut simulation = Simulation::new(mission, default_config(20, 600.0)).unwrap();
    let summary = simulation.run(get("000:20:00")).unwrap();

    assert_eq!(summary.events.failed, 1);
    assert!(summary.score.faults.event_failures >= 1);
    // Two hard faults: the autopilot abort and the bound taxonomy failure
    assert_eq!(summary.score.faults.hard, 2);
    assert_eq!(summary.fatal_faults, 2);
    assert!(summary.score.faults.by_id.contains_key("P40_LOI"));
    assert!(summary.score.faults.by_id.contains_key("loi_burn_lost"));
    // A mission failure is not an engine failure: the run finished.
    assert!(summary.fatal_error.is_none());
    assert_eq!(summary.final_get, "000:20:00");

    // The tank drained to its floor, never below.
    let frame = simulation.frames().last().unwrap().clone();
    let sps = &frame.resources.propellant["csm_sps_kg"];
    assert!(sps.current_kg.unwrap() >= 0.0);
    assert!(sps.current_kg.unwrap() < 20.0);
}

/// S5: periapsis altitude grades into exactly one alert bucket.
fn alert_buckets_for_periapsis(periapsis_km: f64) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mission = mission_shell(
        "AP_ORBIT",
        vec![event("COAST_001", "CRUISE", "000:00:30", "000:10:00")],
    );
    let mut simulation = Simulation::new(mission, default_config(20, 60.0))
        .unwrap()
        .with_orbit_provider(Box::new(ConstantOrbitProvider(OrbitSummary {
            apoapsis_km: 300.0,
            periapsis_km,
            velocity_mps: 7_800.0,
            altitude_km: 200.0,
        })));
    simulation.run(get("000:02:00")).unwrap();
    let frame = simulation.frames().last().unwrap().clone();
    let ids = |alerts: &[mocr::resources::alerts::Alert]| {
        alerts.iter().map(|a| a.id.clone()).collect::<Vec<_>>()
    };
    (
        ids(&frame.alerts.cautions),
        ids(&frame.alerts.warnings),
        ids(&frame.alerts.failures),
    )
}

#[test]
fn periapsis_alert_grading_is_exclusive() {
    let low = "orbit_periapsis_low".to_string();
    let below = "orbit_periapsis_below_surface".to_string();

    let (cautions, warnings, failures) = alert_buckets_for_periapsis(40.0);
    assert_eq!(warnings.iter().filter(|id| **id == low).count(), 1);
    assert!(!cautions.contains(&low));
    assert!(!failures.contains(&low));

    let (cautions, warnings, failures) = alert_buckets_for_periapsis(100.0);
    assert_eq!(cautions.iter().filter(|id| **id == low).count(), 1);
    assert!(!warnings.contains(&low));
    assert!(!failures.contains(&low));

    let (cautions, warnings, failures) = alert_buckets_for_periapsis(-1.0);
    assert_eq!(failures.iter().filter(|id| **id == below).count(), 1);
    assert!(!cautions.contains(&below));
    assert!(!warnings.contains(&below));
    assert!(!cautions.contains(&low) && !warnings.contains(&low));
}

/// A threshold-raised recoverable failure drains until the declared
/// recovery action clears it.
#[test]
fn recoverable_failure_clears_via_recovery_action() {
    let mut mission = mission_shell(
        "AP_RECOVER",
        vec![event("CRUISE_010", "CRUISE", "000:00:10", "001:00:00")],
    );
    mission.failures = vec![FailureDef {
        id: "o2_flow_restriction".to_string(),
        summary: "O2 flow restriction in fuel cell 2".to_string(),
        classification: FailureClass::Recoverable,
        immediate_effects: vec![],
        ongoing_penalties: vec![OngoingPenaltyDef {
            channel: "cryo_o2_pct".to_string(),
            amount_per_second: -0.002,
        }],
        recovery_action: Some("fuel_cell_purge".to_string()),
        trigger: Some(FailureTriggerDef {
            channel: "co2_mmhg".to_string(),
            above: Some(3.0),
            below: None,
            rearm_band_fraction: None,
        }),
    }];
    // Keep the cruise event active so the run has work in flight.
    let mut cruise_checklist = common::checklist("CL_CRUISE", "Cruise", 1);
    cruise_checklist.steps[0].manual_only = true;
    cruise_checklist.steps[0].clears_failure = Some("fuel_cell_purge".to_string());
    mission.events[0].checklist_id = Some("CL_CRUISE".to_string());
    mission.checklists = vec![cruise_checklist];

    // Trip the trigger at 30 s, purge at 120 s.
    let script = ManualScript {
        actions: vec![
            ManualActionDef {
                get: GetTime::from_seconds(30.0),
                actor: Actor::ManualCrew,
                payload: ActionPayload::ResourceDelta {
                    channel: "co2_mmhg".to_string(),
                    amount: 4.0,
                    note: Some("scrubber saturation injected".to_string()),
                },
            },
            ManualActionDef {
                get: GetTime::from_seconds(120.0),
                actor: Actor::ManualCrew,
                payload: ActionPayload::ChecklistAck {
                    event_id: "CRUISE_010".to_string(),
                    step_number: 1,
                },
            },
        ],
    };

    let mut simulation = Simulation::new(mission, default_config(20, 60.0))
        .unwrap()
        .with_manual_script(script);
    let summary = simulation.run(get("000:10:00")).unwrap();

    assert_eq!(summary.recoverable_faults, 1);
    assert_eq!(summary.fatal_faults, 0);
    assert!(summary.score.faults.by_id.contains_key("o2_flow_restriction"));
    assert!(summary.fatal_error.is_none());

    // After the purge the failure is gone from the alert set.
    let last = simulation.frames().last().unwrap();
    assert!(last
        .alerts
        .failures
        .iter()
        .all(|a| a.id != "o2_flow_restriction"));
    // And the manual ack counted toward the manual fraction.
    assert!(summary.score.manual_fraction > 0.0);
}
