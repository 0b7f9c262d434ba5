//! Orbit summary provider
//!
//! The engine does no orbital propagation; trajectory numbers come from a
//! pluggable provider. Mission data may carry precomputed samples which the
//! piecewise provider interpolates linearly; tests use the constant provider.

use serde::{Deserialize, Serialize};

use crate::types::OrbitSampleDef;

/// Point-in-time trajectory summary consumed by the HUD and entry monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSummary {
    pub apoapsis_km: f64,
    pub periapsis_km: f64,
    pub velocity_mps: f64,
    pub altitude_km: f64,
}

impl Default for OrbitSummary {
    fn default() -> Self {
        // 60 nmi circular lunar parking orbit, the usual fallback.
        Self {
            apoapsis_km: 111.0,
            periapsis_km: 111.0,
            velocity_mps: 1_630.0,
            altitude_km: 111.0,
        }
    }
}

pub trait OrbitProvider {
    fn summary(&self, get_seconds: f64) -> OrbitSummary;
}

/// Fixed summary regardless of GET.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantOrbitProvider(pub OrbitSummary);

impl OrbitProvider for ConstantOrbitProvider {
    fn summary(&self, _get_seconds: f64) -> OrbitSummary {
        self.0
    }
}

/// Linear interpolation over mission-data samples sorted by GET.
///
/// Before the first sample the first value holds; after the last sample the
/// last value holds.
#[derive(Debug, Clone)]
pub struct PiecewiseOrbitProvider {
    samples: Vec<OrbitSampleDef>,
}

impl PiecewiseOrbitProvider {
    pub fn new(mut samples: Vec<OrbitSampleDef>) -> Self {
        samples.sort_by(|a, b| {
            a.at
                .seconds()
                .partial_cmp(&b.at.seconds())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn to_summary(sample: &OrbitSampleDef) -> OrbitSummary {
        OrbitSummary {
            apoapsis_km: sample.apoapsis_km,
            periapsis_km: sample.periapsis_km,
            velocity_mps: sample.velocity_mps,
            altitude_km: sample.altitude_km,
        }
    }
}

impl OrbitProvider for PiecewiseOrbitProvider {
    fn summary(&self, get_seconds: f64) -> OrbitSummary {
        let Some(first) = self.samples.first() else {
            return OrbitSummary::default();
        };
        if get_seconds <= first.at.seconds() {
            return Self::to_summary(first);
        }
        for pair in self.samples.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if get_seconds <= b.at.seconds() {
                let span = b.at.seconds() - a.at.seconds();
                let t = if span > 0.0 {
                    (get_seconds - a.at.seconds()) / span
                } else {
                    1.0
                };
                return OrbitSummary {
                    apoapsis_km: a.apoapsis_km + (b.apoapsis_km - a.apoapsis_km) * t,
                    periapsis_km: a.periapsis_km + (b.periapsis_km - a.periapsis_km) * t,
                    velocity_mps: a.velocity_mps + (b.velocity_mps - a.velocity_mps) * t,
                    altitude_km: a.altitude_km + (b.altitude_km - a.altitude_km) * t,
                };
            }
        }
        // Past the last sample.
        self.samples
            .last()
            .map(Self::to_summary)
            .unwrap_or_default()
    }
}
