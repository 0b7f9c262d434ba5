//! AGC / DSKY panel state
//!
//! Tracks the guidance computer surface the HUD renders: current program,
//! verb/noun pair, and a short history of macro emissions from both the
//! autopilot and manual DSKY entries.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

const MACRO_HISTORY_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DskyMacroRecord {
    pub get_seconds: f64,
    pub macro_id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgcSnapshot {
    pub program: Option<String>,
    pub verb: Option<u8>,
    pub noun: Option<u8>,
    pub last_macro_id: Option<String>,
    pub macro_history: Vec<DskyMacroRecord>,
    pub entries: u64,
}

#[derive(Debug, Default)]
pub struct AgcState {
    program: Option<String>,
    verb: Option<u8>,
    noun: Option<u8>,
    last_macro_id: Option<String>,
    history: VecDeque<DskyMacroRecord>,
    entries: u64,
}

impl AgcState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a macro keyed into the DSKY. Macro ids like `P63` select a
    /// program; `V37N00`-style ids update the verb/noun pair when given.
    pub fn record_macro(
        &mut self,
        get_seconds: f64,
        macro_id: &str,
        source: &str,
        verb: Option<u8>,
        noun: Option<u8>,
    ) {
        if macro_id.len() >= 2
            && macro_id.starts_with('P')
            && macro_id[1..].chars().all(|c| c.is_ascii_digit())
        {
            self.program = Some(macro_id.to_string());
        }
        if verb.is_some() {
            self.verb = verb;
        }
        if noun.is_some() {
            self.noun = noun;
        }
        self.last_macro_id = Some(macro_id.to_string());
        self.entries += 1;
        if self.history.len() >= MACRO_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(DskyMacroRecord {
            get_seconds,
            macro_id: macro_id.to_string(),
            source: source.to_string(),
        });
    }

    pub fn snapshot(&self) -> AgcSnapshot {
        AgcSnapshot {
            program: self.program.clone(),
            verb: self.verb,
            noun: self.noun,
            last_macro_id: self.last_macro_id.clone(),
            macro_history: self.history.iter().cloned().collect(),
            entries: self.entries,
        }
    }
}
