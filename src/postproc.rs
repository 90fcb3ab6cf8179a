//! Post-processor (component D, §4.D): runs synchronously after every successful store
//! mutation, inside the traffic-store critical section.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::geo::haversine_m;
use crate::model::{Source, Target};
use crate::ownship::{self, OwnshipConfig};
use crate::range::{classify_altitude, RangeEstimator};
use crate::situation::{OwnSituation, OwnshipSingleton};

/// Notification published after each post-processed update. Out-of-scope subscribers (the web
/// surface) would consume this; tests subscribe to it directly to assert on side effects.
#[derive(Debug, Clone)]
pub struct TargetUpdated {
    pub key: u32,
    pub addr: u32,
}

pub struct PostProcessor {
    situation: Arc<OwnSituation>,
    ownship_state: Arc<OwnshipSingleton>,
    ownship_cfg: Arc<std::sync::RwLock<OwnshipConfig>>,
    range: RangeEstimator,
    updates_tx: broadcast::Sender<TargetUpdated>,
}

impl PostProcessor {
    pub fn new(situation: Arc<OwnSituation>) -> Self {
        Self::with_ownship(situation, Arc::new(OwnshipSingleton::default()), Arc::new(std::sync::RwLock::new(OwnshipConfig::default())))
    }

    pub fn with_ownship(situation: Arc<OwnSituation>, ownship_state: Arc<OwnshipSingleton>, ownship_cfg: Arc<std::sync::RwLock<OwnshipConfig>>) -> Self {
        let (updates_tx, _rx) = broadcast::channel(256);
        Self {
            situation,
            ownship_state,
            ownship_cfg,
            range: RangeEstimator::new(),
            updates_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TargetUpdated> {
        self.updates_tx.subscribe()
    }

    /// Run the post-processing steps of §4.D against `target`, which has already been mutated
    /// by the store's merge logic and is still held under the store lock.
    pub fn run(&self, target: &mut Target, now: Instant) {
        // Step 1 (increment received_msgs) already happened in store::apply.

        // Step 2: signal-based range estimate, 1090ES only.
        let is_es1090 = matches!(target.provenance.last_source, Source::Es1090);
        if is_es1090 {
            target.derived.distance_est_m = self.range.estimate(target.signal.signal_level, target.alt);
        } else {
            target.derived.distance_est_m = 0.0;
        }

        // Step 3: true distance via Haversine, if both positions are known.
        if let Some(gps) = self.situation.gps(now) {
            if target.position.valid {
                target.derived.distance_m = haversine_m(gps.lat, gps.lng, target.position.lat, target.position.lng);
                target.derived.bearing_dist_valid = true;

                // Step 3b: a fresh, non-extrapolated ADS-B report gives us both a true distance
                // (from its reported position) and a signal-based estimate, so feed this co-report
                // back into the calibration factors for its altitude class.
                if is_es1090 && !target.position.extrapolated {
                    self.range.calibrate(classify_altitude(target.alt), target.derived.distance_m, target.derived.distance_est_m);
                }
            } else {
                target.derived.bearing_dist_valid = false;
            }
        } else {
            target.derived.bearing_dist_valid = false;
        }

        // Step 4: ownship test.
        let cfg = self.ownship_cfg.read().expect("ownship config lock poisoned");
        let verdict = ownship::detect(target, &cfg, &self.situation, now);
        target.should_ignore = verdict.should_ignore;
        if verdict.is_ownship {
            self.ownship_state.mark_detected(target.addr, now);
        }

        // Step 5: notify subscribers. A broadcast send failing (no receivers) is not an error.
        let _ = self.updates_tx.send(TargetUpdated {
            key: target.key(),
            addr: target.addr,
        });
        debug!(addr = target.addr, distance_m = target.derived.distance_m, "post-processed update");
    }
}

/// Whether a target is alertable for GDL90 purposes (§4.G): no valid bearing/distance, or
/// closer than 2 nm (3704 m).
pub fn is_traffic_alertable(target: &Target) -> bool {
    !target.derived.bearing_dist_valid || target.derived.distance_m < 3704.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_target;

    #[test]
    fn alertable_without_bearing_distance() {
        let mut t = sample_target();
        t.derived.bearing_dist_valid = false;
        assert!(is_traffic_alertable(&t));
    }

    #[test]
    fn alertable_boundary_at_3704_m() {
        let mut t = sample_target();
        t.derived.bearing_dist_valid = true;
        t.derived.distance_m = 3700.0;
        assert!(is_traffic_alertable(&t));
        t.derived.distance_m = 5000.0;
        assert!(!is_traffic_alertable(&t));
    }
}
