//! Ownship detector (component F, §4.F): suppresses the aircraft's own echo across protocols.

use crate::geo::haversine_m;
use crate::model::Target;
use crate::situation::{GpsFix, OwnSituation};
use tokio::time::Instant;

/// Configured ownship addresses: `OwnshipModeS` (ICAO hex) plus an optional OGN-tracker
/// self-address, as held in `TrafficConfig` (§6).
#[derive(Debug, Clone, Default)]
pub struct OwnshipConfig {
    pub mode_s_addrs: Vec<u32>,
    pub ogn_addr: Option<u32>,
}

impl OwnshipConfig {
    fn matches(&self, addr: u32) -> bool {
        self.mode_s_addrs.contains(&addr) || self.ogn_addr == Some(addr)
    }
}

pub struct OwnshipVerdict {
    pub is_ownship: bool,
    pub should_ignore: bool,
}

const HORIZONTAL_TOLERANCE_M: f64 = 2000.0;
const ALTITUDE_TOLERANCE_FT: i32 = 500;

/// Decide whether `target` is, or should be suppressed as, the ownship (§4.F).
pub fn detect(target: &Target, cfg: &OwnshipConfig, situation: &OwnSituation, now: Instant) -> OwnshipVerdict {
    let addr_matches = cfg.matches(target.addr);

    if !addr_matches {
        return OwnshipVerdict {
            is_ownship: false,
            should_ignore: false,
        };
    }

    match situation.gps(now) {
        Some(gps) => {
            if !target.position.valid {
                return OwnshipVerdict {
                    is_ownship: false,
                    should_ignore: true,
                };
            }
            let horizontal_ok = haversine_m(target.position.lat, target.position.lng, gps.lat, gps.lng) <= HORIZONTAL_TOLERANCE_M;
            let altitude_ok = verify_altitude(target, &gps, situation);
            OwnshipVerdict {
                is_ownship: horizontal_ok && altitude_ok,
                should_ignore: true,
            }
        }
        None => {
            // No GPS fix: fall back to OGN-tracker self-address recognition.
            let is_ogn_tracker_self = cfg.ogn_addr == Some(target.addr);
            OwnshipVerdict {
                is_ownship: is_ogn_tracker_self,
                should_ignore: true,
            }
        }
    }
}

/// Verify altitude using baro when valid and the target isn't GNSS-altitude, else HAE, else
/// GPS MSL, within ±500 ft. Returns `false` if no verification source is available.
fn verify_altitude(target: &Target, gps: &GpsFix, situation: &OwnSituation) -> bool {
    let baro_ft = situation.ahrs().baro_alt_ft;

    let reference_ft = if !target.alt_is_gnss && baro_ft.is_some() {
        baro_ft
    } else if target.alt_is_gnss && gps.alt_hae_m != 0.0 {
        Some((gps.alt_hae_m * 3.28084) as i32)
    } else {
        Some((gps.alt_msl_m * 3.28084) as i32)
    };

    match reference_ft {
        Some(reference) => (target.alt - reference).abs() <= ALTITUDE_TOLERANCE_FT,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddrType, Derived, Identity, Integrity, Position, Provenance, Signal, Source, TargetType, Velocity};

    fn target(addr: u32, lat: f64, lng: f64, alt: i32) -> Target {
        let now = Instant::now();
        Target {
            addr,
            addr_type: AddrType::Icao,
            position: Position {
                lat,
                lng,
                valid: true,
                extrapolated: false,
            },
            position_fix: Position::default(),
            position_fix_alt: 0,
            alt,
            alt_is_gnss: false,
            velocity: Velocity::default(),
            integrity: Integrity::default(),
            identity: Identity::default(),
            provenance: Provenance {
                last_source: Source::Es1090,
                target_type: TargetType::AdsB,
            },
            signal: Signal::default(),
            derived: Derived::default(),
            first_seen: now,
            last_seen: now,
            last_alt: now,
            last_speed: now,
            last_extrapolation: now,
            distance_est_last_ts: now,
            should_ignore: false,
        }
    }

    #[test]
    fn unmatched_address_is_never_ownship() {
        let cfg = OwnshipConfig {
            mode_s_addrs: vec![0xA12345],
            ogn_addr: None,
        };
        let situation = OwnSituation::default();
        let t = target(0xFFFFFF, 43.99, -88.56, 5000);
        let verdict = detect(&t, &cfg, &situation, Instant::now());
        assert!(!verdict.is_ownship);
        assert!(!verdict.should_ignore);
    }

    #[test]
    fn matched_address_without_gps_and_without_ogn_is_ignored_but_not_ownship() {
        let cfg = OwnshipConfig {
            mode_s_addrs: vec![0xA12345],
            ogn_addr: None,
        };
        let situation = OwnSituation::default();
        let t = target(0xA12345, 43.99, -88.56, 5000);
        let verdict = detect(&t, &cfg, &situation, Instant::now());
        assert!(!verdict.is_ownship);
        assert!(verdict.should_ignore);
    }
}
