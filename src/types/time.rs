//! Ground Elapsed Time (GET)
//!
//! All times inside the engine are GET seconds since mission start. Wall
//! clock is never consulted in the core. Serialized form is `HHH:MM:SS`
//! with zero-padded three-digit hours.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A GET timestamp in seconds since mission start.
///
/// Stored as `f64` seconds; the tick loop derives it from an integer tick
/// index so repeated runs produce bit-identical values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GetTime(f64);

/// Error parsing a `HHH:MM:SS` GET string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GetParseError {
    #[error("GET must be HHH:MM:SS, got {0:?}")]
    Format(String),
    #[error("GET field out of range in {0:?} (minutes and seconds must be < 60)")]
    FieldRange(String),
}

impl GetTime {
    pub const ZERO: GetTime = GetTime(0.0);

    /// Build from raw seconds. Negative inputs clamp to zero — GET starts
    /// at liftoff and the engine never runs pre-launch.
    pub fn from_seconds(seconds: f64) -> Self {
        GetTime(seconds.max(0.0))
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Parse `HHH:MM:SS` (hours unbounded, minutes/seconds 0-59).
    pub fn parse(s: &str) -> Result<Self, GetParseError> {
        let mut parts = s.split(':');
        let (h, m, sec) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(m), Some(s), None) => (h, m, s),
            _ => return Err(GetParseError::Format(s.to_string())),
        };
        let hours: u64 = h.parse().map_err(|_| GetParseError::Format(s.to_string()))?;
        let minutes: u64 = m.parse().map_err(|_| GetParseError::Format(s.to_string()))?;
        let seconds: u64 = sec.parse().map_err(|_| GetParseError::Format(s.to_string()))?;
        if minutes >= 60 || seconds >= 60 {
            return Err(GetParseError::FieldRange(s.to_string()));
        }
        Ok(GetTime((hours * 3600 + minutes * 60 + seconds) as f64))
    }

    /// Format as `HHH:MM:SS`. Sub-second fractions truncate.
    pub fn format(self) -> String {
        let total = self.0.max(0.0) as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        format!("{hours:03}:{minutes:02}:{seconds:02}")
    }

    /// Format the span until `target` as a T-minus / T-plus string
    /// (`T-00:05:30` before, `T+00:01:10` after).
    pub fn t_minus(self, target: GetTime) -> String {
        let delta = target.0 - self.0;
        let sign = if delta >= 0.0 { '-' } else { '+' };
        let total = delta.abs() as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        format!("T{sign}{hours:02}:{minutes:02}:{seconds:02}")
    }

    pub fn offset(self, seconds: f64) -> Self {
        GetTime::from_seconds(self.0 + seconds)
    }
}

impl std::fmt::Display for GetTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl From<f64> for GetTime {
    fn from(seconds: f64) -> Self {
        GetTime::from_seconds(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let t = GetTime::parse("125:40:00").unwrap();
        assert_eq!(t.seconds(), 452_400.0);
        assert_eq!(t.format(), "125:40:00");
    }

    #[test]
    fn parse_rejects_bad_fields() {
        assert!(GetTime::parse("1:61:00").is_err());
        assert!(GetTime::parse("abc").is_err());
        assert!(GetTime::parse("1:2:3:4").is_err());
    }

    #[test]
    fn format_pads_three_digit_hours() {
        assert_eq!(GetTime::from_seconds(3661.0).format(), "001:01:01");
        assert_eq!(GetTime::ZERO.format(), "000:00:00");
    }

    #[test]
    fn t_minus_flips_sign_after_target() {
        let now = GetTime::from_seconds(100.0);
        let target = GetTime::from_seconds(400.0);
        assert_eq!(now.t_minus(target), "T-00:05:00");
        assert_eq!(target.t_minus(now), "T+00:05:00");
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        assert_eq!(GetTime::from_seconds(-5.0).seconds(), 0.0);
    }
}
