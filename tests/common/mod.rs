//! Shared mission fixtures for the integration suites.
//!
//! Built as structs rather than JSON so refactors of the mission schema
//! surface here at compile time.

#![allow(dead_code)]

use std::collections::BTreeMap;

use mocr::types::{
    AutopilotCommandDef, AutopilotProgramDef, ChecklistDef, ChecklistStepDef, CommsPassDef,
    ConsumablesBudget, CryoBudget, DeltaVBudget, DockingConfigDef, DockingGateDef, EventDef,
    GetTime, LifeSupportBudget, MissionData, MissionInfo, OrbitSampleDef, PadDef, PadParameters,
    PowerBudget, PropulsionStage, TankBudget,
};
use mocr::SimConfig;

pub fn get(s: &str) -> GetTime {
    GetTime::parse(s).unwrap()
}

pub fn consumables() -> ConsumablesBudget {
    let mut tanks = BTreeMap::new();
    tanks.insert(
        "csm_sps_kg".to_string(),
        TankBudget {
            initial_kg: 18_413.0,
            reserve_kg: 400.0,
        },
    );
    tanks.insert(
        "csm_rcs_kg".to_string(),
        TankBudget {
            initial_kg: 556.0,
            reserve_kg: 50.0,
        },
    );
    tanks.insert(
        "lm_rcs_kg".to_string(),
        TankBudget {
            initial_kg: 287.0,
            reserve_kg: 30.0,
        },
    );
    let mut delta_v = BTreeMap::new();
    delta_v.insert(
        "csm_sps".to_string(),
        DeltaVBudget {
            base_mps: 2_804.0,
            adjustment_mps: 0.0,
            usable_mps: 2_700.0,
        },
    );
    ConsumablesBudget {
        tanks,
        power: PowerBudget {
            fuel_cell_output_kw: 4.2,
            base_load_kw: 1.9,
            phase_loads_kw: BTreeMap::new(),
        },
        cryo: CryoBudget {
            o2_tank_pct: 100.0,
            h2_tank_pct: 100.0,
            boiloff_pct_per_hr: 0.6,
        },
        life_support: LifeSupportBudget {
            oxygen_kg: 280.0,
            water_kg: 160.0,
            lioh_canisters: 16,
            co2_mmhg: 1.0,
        },
        delta_v,
    }
}

pub fn mission_shell(id: &str, events: Vec<EventDef>) -> MissionData {
    MissionData {
        mission: MissionInfo {
            id: id.to_string(),
            name: format!("{id} integration fixture"),
            description: String::new(),
        },
        events,
        autopilot_programs: vec![],
        checklists: vec![],
        pads: vec![],
        consumables: consumables(),
        failures: vec![],
        comms_passes: vec![],
        docking: None,
        entry: None,
        orbit: vec![],
    }
}

pub fn event(id: &str, phase: &str, opens: &str, closes: &str) -> EventDef {
    EventDef {
        id: id.to_string(),
        phase: phase.to_string(),
        pad_id: None,
        opens_at: get(opens),
        closes_at: get(closes),
        preconditions: vec![],
        expected_duration_seconds: None,
        autopilot_id: None,
        checklist_id: None,
        failure_id: None,
        mandatory: true,
    }
}

pub fn checklist(id: &str, title: &str, steps: u32) -> ChecklistDef {
    ChecklistDef {
        id: id.to_string(),
        title: title.to_string(),
        auto_advance: None,
        steps: (1..=steps)
            .map(|order| ChecklistStepDef {
                id: format!("{id}_S{order:02}"),
                order,
                callout: format!("{title} step {order}"),
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

/// The nominal translunar-coast slice: one checklist event in window, one
/// PAD-carrying burn event upcoming, a ground-station pass mid-slice.
pub fn cruise_slice_mission() -> MissionData {
    let mut mission = mission_shell("AP11_SLICE", vec![]);

    let mut prep = event("TLI_PREP_010", "TLI", "002:41:00", "002:45:00");
    prep.checklist_id = Some("CL_TLI_PREP".to_string());
    prep.expected_duration_seconds = Some(180.0);

    let mut burn = event("TLI_BURN_020", "TLI", "002:50:00", "002:56:00");
    burn.pad_id = Some("PAD_TLI".to_string());

    mission.events = vec![prep, burn];
    mission.checklists = vec![checklist("CL_TLI_PREP", "TLI preparation", 3)];
    mission.pads = vec![PadDef {
        id: "PAD_TLI".to_string(),
        purpose: "Translunar injection".to_string(),
        parameters: PadParameters {
            tig: Some(get("002:50:20")),
            delta_v_mps: Some(3_048.0),
            burn_duration_seconds: Some(347.0),
            entry_interface: None,
            entry_velocity_mps: None,
            entry_altitude_km: None,
            notes: None,
        },
    }];
    mission.comms_passes = vec![CommsPassDef {
        id: "HSK_012".to_string(),
        station: "HSK".to_string(),
        open_at: get("002:42:00"),
        close_at: get("002:45:00"),
        handover_minutes: Some(0.5),
        cue_on_acquire: Some("comm_acquire".to_string()),
        cue_on_loss: Some("comm_loss".to_string()),
    }];
    mission.orbit = vec![
        OrbitSampleDef {
            at: get("002:40:00"),
            apoapsis_km: 186.0,
            periapsis_km: 183.0,
            velocity_mps: 7_793.0,
            altitude_km: 185.0,
        },
        OrbitSampleDef {
            at: get("003:00:00"),
            apoapsis_km: 355_000.0,
            periapsis_km: 183.0,
            velocity_mps: 10_800.0,
            altitude_km: 700.0,
        },
    ];
    mission
}

/// Docking traversal fixture: the ascent rendezvous event with three gates
/// and a never-completing checklist so the event stays active.
pub fn docking_mission() -> MissionData {
    let mut mission = mission_shell("AP11_DOCK", vec![]);

    let mut rendezvous = event("LM_ASCENT_030", "RENDEZVOUS", "125:40:00", "128:30:00");
    rendezvous.expected_duration_seconds = Some(7_200.0);
    rendezvous.checklist_id = Some("CL_DOCK".to_string());

    let mut dock_checklist = checklist("CL_DOCK", "Docking", 2);
    for step in &mut dock_checklist.steps {
        step.manual_only = true;
    }

    mission.events = vec![rendezvous];
    mission.checklists = vec![dock_checklist];
    mission.autopilot_programs = vec![AutopilotProgramDef {
        id: "P20_STATIONKEEP".to_string(),
        title: "Rendezvous stationkeeping".to_string(),
        stage: PropulsionStage::LmRcs,
        commands: vec![
            AutopilotCommandDef::RcsPulse {
                at: 3_240.0,
                quad_id: "LM_RCS_QUAD_A".to_string(),
                duration_seconds: 0.4,
                pulses: 4,
            },
            AutopilotCommandDef::Complete { at: 7_200.0 },
        ],
    }];
    mission.events[0].autopilot_id = Some("P20_STATIONKEEP".to_string());
    mission.docking = Some(DockingConfigDef {
        event_id: "LM_ASCENT_030".to_string(),
        start_range_m: 1_000.0,
        end_range_m: 0.0,
        duty_cycle_window_seconds: 60.0,
        quads: vec!["LM_RCS_QUAD_A".to_string(), "LM_RCS_QUAD_B".to_string()],
        gates: vec![
            DockingGateDef {
                id: "GATE_500M".to_string(),
                range_m: 500.0,
                target_closing_rate_mps: 2.0,
                tolerance_mps: 0.3,
                activation_progress: 0.0,
                completion_progress: 0.3,
                checklist_id: None,
            },
            DockingGateDef {
                id: "GATE_150M".to_string(),
                range_m: 150.0,
                target_closing_rate_mps: 0.9,
                tolerance_mps: 0.2,
                activation_progress: 0.3,
                completion_progress: 0.7,
                checklist_id: None,
            },
            DockingGateDef {
                id: "GATE_DOCK".to_string(),
                range_m: 10.0,
                target_closing_rate_mps: 0.3,
                tolerance_mps: 0.1,
                activation_progress: 0.9,
                completion_progress: 1.0,
                checklist_id: None,
            },
        ],
    });
    mission
}

pub fn default_config(tick_rate: u32, hud_interval: f64) -> SimConfig {
    let mut config = SimConfig::default();
    config.clock.tick_rate_hz = tick_rate;
    config.clock.hud_interval_seconds = hud_interval;
    config
}
