//! Manual action scripts
//!
//! A recorded crew-action script is an ordered list of manual actions with
//! trigger GETs. Loading parses and sorts once; recording captures every
//! successfully executed action so a run can be replayed exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ManualActionDef;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script I/O error ({0}): {1}")]
    Io(std::path::PathBuf, #[source] std::io::Error),
    #[error("script parse error ({0}): {1}")]
    Parse(std::path::PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ManualScript {
    pub actions: Vec<ManualActionDef>,
}

impl ManualScript {
    pub fn load_from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScriptError::Io(path.to_path_buf(), e))?;
        let mut script: Self = serde_json::from_str(&contents)
            .map_err(|e| ScriptError::Parse(path.to_path_buf(), e))?;
        script.sort();
        Ok(script)
    }

    /// Stable sort by trigger GET; equal triggers keep file order.
    pub fn sort(&mut self) {
        self.actions.sort_by(|a, b| {
            a.get
                .seconds()
                .partial_cmp(&b.get.seconds())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Captures executed actions for `--record-manual-script`.
#[derive(Debug, Default)]
pub struct ScriptRecorder {
    actions: Vec<ManualActionDef>,
}

impl ScriptRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: &ManualActionDef) {
        self.actions.push(action.clone());
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn to_script(&self) -> ManualScript {
        let mut script = ManualScript {
            actions: self.actions.clone(),
        };
        script.sort();
        script
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ScriptError> {
        let contents = serde_json::to_string_pretty(&self.to_script())
            .map_err(|e| ScriptError::Parse(path.to_path_buf(), e))?;
        std::fs::write(path, contents).map_err(|e| ScriptError::Io(path.to_path_buf(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionPayload, Actor, GetTime};

    fn make_action(get: f64) -> ManualActionDef {
        ManualActionDef {
            get: GetTime::from_seconds(get),
            actor: Actor::ManualCrew,
            payload: ActionPayload::WorkspaceEvent {
                workspace_id: "W1".into(),
                note: None,
            },
        }
    }

    #[test]
    fn load_sorts_by_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        let script = ManualScript {
            actions: vec![make_action(50.0), make_action(10.0), make_action(30.0)],
        };
        std::fs::write(&path, serde_json::to_string(&script).unwrap()).unwrap();

        let loaded = ManualScript::load_from_file(&path).unwrap();
        let triggers: Vec<f64> = loaded.actions.iter().map(|a| a.get.seconds()).collect();
        assert_eq!(triggers, vec![10.0, 30.0, 50.0]);
    }

    #[test]
    fn record_write_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorded.json");
        let mut recorder = ScriptRecorder::new();
        recorder.record(&make_action(10.0));
        recorder.record(&make_action(20.0));
        recorder.write_to_file(&path).unwrap();

        let loaded = ManualScript::load_from_file(&path).unwrap();
        assert_eq!(loaded, recorder.to_script());
    }
}
