//! Alert derivation
//!
//! Alerts are derived read-only from resource and trajectory state each
//! tick; nothing stores them. Severity escalates caution → warning →
//! failure, and a given alert id appears in exactly one severity bucket.

use serde::{Deserialize, Serialize};

use crate::config::AlertThresholds;
use crate::orbit::OrbitSummary;

use super::{ResourceSnapshot, ThermalTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Caution,
    Warning,
    Failure,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Caution => "caution",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub source: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl Alert {
    fn new(
        id: &str,
        severity: AlertSeverity,
        message: String,
        source: &str,
        value: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            severity,
            message,
            source: source.to_string(),
            value: Some(value),
        }
    }
}

/// Derive the resource alert set for one snapshot.
pub fn derive_resource_alerts(
    snapshot: &ResourceSnapshot,
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let margin = snapshot.power.margin_pct;
    if margin <= thresholds.power_margin_warning_pct {
        alerts.push(Alert::new(
            "power_margin_low",
            AlertSeverity::Warning,
            format!("power margin {margin:.1}%"),
            "resources",
            margin,
        ));
    } else if margin <= thresholds.power_margin_caution_pct {
        alerts.push(Alert::new(
            "power_margin_low",
            AlertSeverity::Caution,
            format!("power margin {margin:.1}%"),
            "resources",
            margin,
        ));
    }

    for (key, tank) in &snapshot.tanks {
        let pct = tank.pct();
        let id = format!("propellant_low_{key}");
        if pct <= thresholds.propellant_warning_pct {
            alerts.push(Alert::new(
                &id,
                AlertSeverity::Warning,
                format!("{key} at {pct:.1}%"),
                "resources",
                pct,
            ));
        } else if pct <= thresholds.propellant_caution_pct {
            alerts.push(Alert::new(
                &id,
                AlertSeverity::Caution,
                format!("{key} at {pct:.1}%"),
                "resources",
                pct,
            ));
        }
    }

    let boiloff = snapshot.cryo.boiloff_pct_per_hr;
    if boiloff >= thresholds.cryo_boiloff_warning_pct_hr {
        alerts.push(Alert::new(
            "cryo_boiloff_high",
            AlertSeverity::Warning,
            format!("cryo boil-off {boiloff:.2}%/hr"),
            "resources",
            boiloff,
        ));
    } else if boiloff >= thresholds.cryo_boiloff_caution_pct_hr {
        alerts.push(Alert::new(
            "cryo_boiloff_high",
            AlertSeverity::Caution,
            format!("cryo boil-off {boiloff:.2}%/hr"),
            "resources",
            boiloff,
        ));
    }

    let co2 = snapshot.life_support.co2_mmhg;
    if co2 >= thresholds.co2_warning_mmhg {
        alerts.push(Alert::new(
            "co2_partial_pressure_high",
            AlertSeverity::Warning,
            format!("cabin CO2 {co2:.1} mmHg"),
            "resources",
            co2,
        ));
    } else if co2 >= thresholds.co2_caution_mmhg {
        alerts.push(Alert::new(
            "co2_partial_pressure_high",
            AlertSeverity::Caution,
            format!("cabin CO2 {co2:.1} mmHg"),
            "resources",
            co2,
        ));
    }

    if snapshot.thermal.tag == ThermalTag::Excursion {
        alerts.push(Alert::new(
            "thermal_excursion",
            AlertSeverity::Warning,
            "PTC off too long, thermal excursion".to_string(),
            "resources",
            snapshot.thermal.off_dwell_seconds,
        ));
    }

    for failure in &snapshot.active_failures {
        alerts.push(Alert {
            id: failure.id.clone(),
            severity: AlertSeverity::Failure,
            message: failure.summary.clone(),
            source: "failures".to_string(),
            value: None,
        });
    }

    alerts
}

/// Derive the trajectory alert set from an orbit summary.
pub fn derive_trajectory_alerts(orbit: &OrbitSummary, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let periapsis = orbit.periapsis_km;

    if periapsis < 0.0 {
        alerts.push(Alert::new(
            "orbit_periapsis_below_surface",
            AlertSeverity::Failure,
            format!("periapsis {periapsis:.1} km is below the surface"),
            "trajectory",
            periapsis,
        ));
    } else if periapsis <= thresholds.periapsis_warning_km {
        alerts.push(Alert::new(
            "orbit_periapsis_low",
            AlertSeverity::Warning,
            format!("periapsis {periapsis:.1} km"),
            "trajectory",
            periapsis,
        ));
    } else if periapsis <= thresholds.periapsis_caution_km {
        alerts.push(Alert::new(
            "orbit_periapsis_low",
            AlertSeverity::Caution,
            format!("periapsis {periapsis:.1} km"),
            "trajectory",
            periapsis,
        ));
    }

    alerts
}
