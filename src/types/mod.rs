//! Core mission types: GET time base, mission-data documents, manual actions

pub mod action;
pub mod mission;
pub mod time;

pub use action::{ActionPayload, ActionResolution, Actor, ManualActionDef};
pub use mission::{
    AutopilotCommandDef, AutopilotProgramDef, ChecklistDef, ChecklistStepDef, CommsPassDef,
    ConsumablesBudget, CryoBudget, DeltaVBudget, DockingConfigDef, DockingGateDef, EntryTimelineDef,
    EventDef, FailureClass, FailureDef, FailureTriggerDef, LifeSupportBudget, MissionData,
    MissionInfo, OngoingPenaltyDef, OrbitSampleDef, PadDef, PadParameters, PowerBudget, Predicate,
    PropulsionStage, RecoveryStepDef, ResourceDeltaDef, TankBudget,
};
pub use time::{GetParseError, GetTime};
