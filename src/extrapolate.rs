//! Extrapolator and reaper (components E.1, E.2, §4.E.1, §4.E.2): a periodic tick that advances
//! tracked positions by dead reckoning and sweeps targets past their source's retention window.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::geo::flat_earth_advance;
use crate::model::Target;
use crate::store::TrafficStore;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Advance `target`'s position by dead reckoning per §4.E.1. No-op for targets that have never
/// had a position fix.
pub fn extrapolate_one(target: &mut Target, now: Instant) {
    if !target.position_fix.valid {
        return;
    }

    let base = if target.position.extrapolated {
        target.last_extrapolation
    } else {
        target.position_fix = target.position;
        target.last_seen
    };

    let dt = now.saturating_duration_since(base).as_secs_f64();
    if dt <= 0.0 {
        return;
    }

    let dturn = target.velocity.turn_rate_dps as f64 * dt;
    let new_track = (target.velocity.track as f64 + dturn).rem_euclid(360.0);

    let dist_nm = target.velocity.speed_kt as f64 * (dt / 3600.0);
    let (lat, lng) = flat_earth_advance(target.position.lat, target.position.lng, dist_nm, new_track);

    target.position.lat = lat;
    target.position.lng = lng;
    target.position.extrapolated = true;
    target.velocity.track = new_track as f32;
    target.alt += (target.velocity.vvel_fpm as f64 * dt / 60.0) as i32;
    target.last_extrapolation = now;
}

/// Run the extrapolator/reaper tick loop until `shutdown` is triggered. Grounded on the
/// teacher's `tokio::spawn` + `tokio::select!` periodic-task idiom (`commands/run/mod.rs`).
pub async fn run(store: Arc<TrafficStore>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(TICK_PERIOD);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("extrapolator shutting down");
                return;
            }
            _ = interval.tick() => {
                let now = Instant::now();
                store.for_each_mut(|t| extrapolate_one(t, now));
                store.reap(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_target;

    #[test]
    fn extrapolation_advances_east_for_eastbound_track() {
        let mut t = sample_target();
        t.position_fix = t.position;
        let base_lng = t.position.lng;
        let later = t.last_seen + Duration::from_secs(10);
        extrapolate_one(&mut t, later);
        assert!(t.position.extrapolated);
        assert!(t.position.lng > base_lng, "track 90 should move east");
    }

    #[test]
    fn extrapolation_is_noop_without_a_position_fix() {
        let mut t = sample_target();
        t.position_fix.valid = false;
        let before = t.position;
        extrapolate_one(&mut t, t.last_seen + Duration::from_secs(5));
        assert_eq!(t.position.lat, before.lat);
        assert_eq!(t.position.lng, before.lng);
    }

    #[test]
    fn altitude_climbs_with_positive_vertical_speed() {
        let mut t = sample_target();
        t.position_fix = t.position;
        t.velocity.vvel_fpm = 600;
        let before_alt = t.alt;
        extrapolate_one(&mut t, t.last_seen + Duration::from_secs(60));
        assert_eq!(t.alt, before_alt + 600);
    }
}
