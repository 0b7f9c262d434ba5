//! Progression Service
//!
//! Persists a small cross-run profile: per-mission completion counts and
//! bests, unlocks, and achievements. Updated only after a run completes;
//! nothing inside the tick loop touches it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::scoring::ScoreSummary;

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("profile I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("profile parse error ({0}): {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MissionRecord {
    pub completions: u32,
    pub best_grade: String,
    pub best_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub missions: BTreeMap<String, MissionRecord>,
    pub unlocks: Vec<String>,
    pub achievements: Vec<String>,
    pub updated_at: Option<String>,
}

pub struct ProgressionService {
    path: PathBuf,
    profile: Profile,
}

impl ProgressionService {
    /// Load the profile at `path`, falling back to an empty profile when
    /// the file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self, ProgressionError> {
        let profile = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ProgressionError::Io(path.to_path_buf(), e))?;
            serde_json::from_str(&contents)
                .map_err(|e| ProgressionError::Parse(path.to_path_buf(), e))?
        } else {
            Profile::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            profile,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Fold a completed run into the profile. Returns true when the run set
    /// a new best score for the mission.
    pub fn record_run(&mut self, mission_id: &str, score: &ScoreSummary) -> bool {
        let record = self
            .profile
            .missions
            .entry(mission_id.to_string())
            .or_default();
        record.completions += 1;
        let improved = score.commander_score > record.best_score || record.completions == 1;
        if improved {
            record.best_score = score.commander_score;
            record.best_grade = score.grade.clone();
        }

        if record.completions == 1 {
            self.push_unique_unlock(format!("mission:{mission_id}:flown"));
        }
        if score.grade == "A" {
            self.push_unique_achievement("commander_grade_a".to_string());
        }
        if score.manual_fraction >= 0.9 {
            self.push_unique_achievement("hands_on_stick".to_string());
        }
        self.profile.updated_at = Some(chrono::Utc::now().to_rfc3339());
        improved
    }

    fn push_unique_unlock(&mut self, unlock: String) {
        if !self.profile.unlocks.contains(&unlock) {
            info!(%unlock, "progression unlock");
            self.profile.unlocks.push(unlock);
        }
    }

    fn push_unique_achievement(&mut self, achievement: String) {
        if !self.profile.achievements.contains(&achievement) {
            self.profile.achievements.push(achievement);
        }
    }

    /// Write the profile via a temp file and rename, so a crash mid-write
    /// cannot corrupt an existing profile.
    pub fn save(&self) -> Result<(), ProgressionError> {
        let contents = serde_json::to_string_pretty(&self.profile)
            .map_err(|e| ProgressionError::Parse(self.path.clone(), e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| ProgressionError::Io(tmp.clone(), e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ProgressionError::Io(self.path.clone(), e))?;
        Ok(())
    }

    /// Best-effort save used on shutdown paths.
    pub fn save_or_warn(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist progression profile");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{EventScoreCounts, FaultCounts, ScoreBreakdown};

    fn summary(score: f64, grade: &str, manual_fraction: f64) -> ScoreSummary {
        ScoreSummary {
            commander_score: score,
            grade: grade.to_string(),
            breakdown: ScoreBreakdown::default(),
            manual_fraction,
            manual_bonus: 0.0,
            events: EventScoreCounts::default(),
            faults: FaultCounts::default(),
            min_power_margin_pct: 50.0,
            max_power_margin_pct: 50.0,
            min_delta_v_margin_mps: 0.0,
            thermal_violation_seconds: 0.0,
            propellant_used_kg: BTreeMap::new(),
        }
    }

    #[test]
    fn record_run_tracks_bests_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        let mut service = ProgressionService::load_or_default(&path).unwrap();
        assert!(service.record_run("AP11", &summary(78.0, "C", 0.2)));
        assert!(!service.record_run("AP11", &summary(70.0, "C", 0.2)));
        assert!(service.record_run("AP11", &summary(93.0, "A", 0.95)));
        service.save().unwrap();

        let reloaded = ProgressionService::load_or_default(&path).unwrap();
        let record = &reloaded.profile().missions["AP11"];
        assert_eq!(record.completions, 3);
        assert_eq!(record.best_grade, "A");
        assert!((record.best_score - 93.0).abs() < 1e-9);
        assert!(reloaded
            .profile()
            .unlocks
            .contains(&"mission:AP11:flown".to_string()));
        assert!(reloaded
            .profile()
            .achievements
            .contains(&"commander_grade_a".to_string()));
        assert!(reloaded
            .profile()
            .achievements
            .contains(&"hands_on_stick".to_string()));
    }
}
