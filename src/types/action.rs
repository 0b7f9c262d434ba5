//! Manual crew actions
//!
//! A recorded or scripted crew input with a trigger GET, an actor, and a
//! typed payload. The manual action queue consumes these in non-decreasing
//! trigger order and dispatches them to the owning subsystem.

use serde::{Deserialize, Serialize};

use super::time::GetTime;

/// Who performed the action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    /// Synthetic crew driven by the auto-advance machinery.
    #[default]
    AutoCrew,
    /// A real recorded crew input.
    ManualCrew,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::AutoCrew => write!(f, "AUTO_CREW"),
            Actor::ManualCrew => write!(f, "MANUAL_CREW"),
        }
    }
}

/// Payload of a manual action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Acknowledge a checklist step on an active event.
    ChecklistAck { event_id: String, step_number: u32 },
    /// Key a DSKY verb/noun macro into the AGC.
    DskyEntry {
        macro_id: String,
        #[serde(default)]
        verb: Option<u8>,
        #[serde(default)]
        noun: Option<u8>,
    },
    /// Throw a panel control (switch, circuit breaker, rotary).
    PanelControl {
        panel_id: String,
        control_id: String,
        state: String,
    },
    /// Apply a discrete resource delta.
    ResourceDelta {
        channel: String,
        amount: f64,
        #[serde(default)]
        note: Option<String>,
    },
    /// Manually commanded propellant burn (tank draw in kg).
    PropellantBurn { tank: String, kg: f64 },
    /// Free-form workspace event (HUD layout change, annotation).
    WorkspaceEvent {
        workspace_id: String,
        #[serde(default)]
        note: Option<String>,
    },
}

impl ActionPayload {
    /// Short kind tag for logs and the recorder.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionPayload::ChecklistAck { .. } => "checklist_ack",
            ActionPayload::DskyEntry { .. } => "dsky_entry",
            ActionPayload::PanelControl { .. } => "panel_control",
            ActionPayload::ResourceDelta { .. } => "resource_delta",
            ActionPayload::PropellantBurn { .. } => "propellant_burn",
            ActionPayload::WorkspaceEvent { .. } => "workspace_event",
        }
    }
}

/// One scripted manual action.
///
/// The payload flattens into the action object, so `deny_unknown_fields`
/// cannot apply here; trigger and actor are still strictly typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualActionDef {
    /// Trigger GET; the queue drains actions whose trigger has passed.
    pub get: GetTime,
    #[serde(default)]
    pub actor: Actor,
    #[serde(flatten)]
    pub payload: ActionPayload,
}

/// Terminal disposition of a queued action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActionResolution {
    Executed,
    Failed { reason: String },
}

impl ActionResolution {
    pub fn is_executed(&self) -> bool {
        matches!(self, ActionResolution::Executed)
    }
}
