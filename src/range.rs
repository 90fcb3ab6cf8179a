//! Signal-based range estimator for bearingless Mode-S targets, with online calibration
//! (component E.3, §4.E.3).

use std::sync::Mutex;

const INITIAL_FACTORS: [f64; 3] = [2500.0, 2800.0, 3000.0];
const LEARNING_RATE: f64 = 0.05;
const MIN_TRUE_RANGE_M: f64 = 1500.0;
const MAX_TRUE_RANGE_M: f64 = 50_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeClass {
    Low,
    Mid,
    High,
}

pub fn classify_altitude(alt_ft: i32) -> AltitudeClass {
    if alt_ft < 5000 {
        AltitudeClass::Low
    } else if alt_ft < 10_000 {
        AltitudeClass::Mid
    } else {
        AltitudeClass::High
    }
}

/// Three persistent calibration factors `F[0..2]`, one per altitude class, mutated under the
/// traffic-store lock in production (the caller holds that lock already).
pub struct RangeEstimator {
    factors: Mutex<[f64; 3]>,
}

impl RangeEstimator {
    pub fn new() -> Self {
        Self {
            factors: Mutex::new(INITIAL_FACTORS),
        }
    }

    fn class_index(class: AltitudeClass) -> usize {
        match class {
            AltitudeClass::Low => 0,
            AltitudeClass::Mid => 1,
            AltitudeClass::High => 2,
        }
    }

    /// Estimate range in meters from signal level (dB, negative) and altitude class.
    ///
    /// The factor model here is intentionally simple: range grows as the calibration factor
    /// scaled by how far below 0 dBFS the signal sits, which is the same shape the factors'
    /// initial values (2500/2800/3000 m) were chosen to anchor.
    pub fn estimate(&self, signal_level: f32, alt_ft: i32) -> f64 {
        let class = classify_altitude(alt_ft);
        let factor = self.factors.lock().expect("range factors poisoned")[Self::class_index(class)];
        let attenuation = (-signal_level as f64).max(1.0);
        factor * (attenuation / 20.0).max(0.1)
    }

    /// Update the calibration factor for `class` given a true distance observed alongside an
    /// estimated one (§4.E.3). No-ops outside the valid true-range window or on a negative
    /// time delta (the caller is responsible for excluding extrapolated co-reports).
    pub fn calibrate(&self, class: AltitudeClass, true_dist_m: f64, estimated_dist_m: f64) {
        if !(MIN_TRUE_RANGE_M..=MAX_TRUE_RANGE_M).contains(&true_dist_m) || estimated_dist_m <= 0.0 {
            return;
        }
        let error_factor = (true_dist_m - estimated_dist_m) / estimated_dist_m;
        let mut factors = self.factors.lock().expect("range factors poisoned");
        let idx = Self::class_index(class);
        factors[idx] = (factors[idx] * (1.0 + error_factor * LEARNING_RATE)).max(1.0);
    }
}

impl Default for RangeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn altitude_class_boundaries() {
        assert_eq!(classify_altitude(4999), AltitudeClass::Low);
        assert_eq!(classify_altitude(5000), AltitudeClass::Mid);
        assert_eq!(classify_altitude(9999), AltitudeClass::Mid);
        assert_eq!(classify_altitude(10_000), AltitudeClass::High);
    }

    #[test]
    fn calibration_clamps_at_one() {
        let est = RangeEstimator::new();
        for _ in 0..1000 {
            est.calibrate(AltitudeClass::Low, 1500.0, 1_000_000.0);
        }
        let factors = est.factors.lock().unwrap();
        assert!(factors[0] >= 1.0);
    }

    #[test]
    fn calibration_ignores_out_of_range_true_distance() {
        let est = RangeEstimator::new();
        let before = est.factors.lock().unwrap()[0];
        est.calibrate(AltitudeClass::Low, 100.0, 2500.0);
        let after = est.factors.lock().unwrap()[0];
        assert_eq!(before, after);
    }

    #[test]
    fn non_es_sources_get_no_estimate() {
        // UAT/OGN/FLARM/AIS targets never receive a signal-based estimate; this is enforced by
        // the post-processor (which only calls estimate() for Es1090 sources), not by this type.
        let est = RangeEstimator::new();
        assert!(est.estimate(-30.0, 5000.0 as i32) > 0.0);
    }
}
