//! Output builder (§4.J, §4.K): the periodic task that walks the traffic store, renders GDL90 and
//! FLARM-NMEA frames, and enqueues them onto each configured sink's priority queue.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::NetworkOutput;
use crate::gdl90;
use crate::model::{AddrType, Derived, Identity, Integrity, Position, Provenance, Signal, Source, Target, TargetType, Velocity};
use crate::nmea_out;
use crate::postproc::is_traffic_alertable;
use crate::queue::PriorityQueue;
use crate::situation::{OwnSituation, OwnshipSingleton};
use crate::store::TrafficStore;

const TICK_PERIOD: StdDuration = StdDuration::from_secs(1);
const OUTPUT_TTL: StdDuration = StdDuration::from_secs(2);
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const PRIORITY_HEARTBEAT: i32 = 0;
const PRIORITY_OWNSHIP: i32 = 1;
const PRIORITY_STATUS: i32 = 2;
const PRIORITY_TRAFFIC_ALERTABLE: i32 = 3;
const PRIORITY_TRAFFIC: i32 = 4;

/// One configured network destination: a frame queue plus which wire formats it wants.
pub struct Sink {
    pub name: String,
    pub queue: Arc<PriorityQueue>,
    pub gdl90: bool,
    pub flarm: bool,
}

pub fn build_sinks(outputs: &[NetworkOutput]) -> Vec<Sink> {
    outputs
        .iter()
        .map(|o| Sink {
            name: format!("{}:{}", o.host, o.port),
            queue: Arc::new(PriorityQueue::new(o.queue_size)),
            gdl90: o.gdl90,
            flarm: o.flarm,
        })
        .collect()
}

/// Relative north/east meters from `(own_lat, own_lng)` to `(lat, lng)`, the inverse of the
/// flat-Earth offset the FLARM-NMEA input adapter applies.
fn relative_offset_m(own_lat: f64, own_lng: f64, lat: f64, lng: f64) -> (f64, f64) {
    let north = (lat - own_lat).to_radians() * EARTH_RADIUS_M;
    let east = (lng - own_lng).to_radians() * EARTH_RADIUS_M * own_lat.to_radians().cos();
    (north, east)
}

/// Synthesize a `Target`-shaped value for own-ship state, for the 0x0A/0x0B GDL90 builders which
/// share the traffic report's field layout.
fn ownship_target(situation: &OwnSituation, addr: u32, now: Instant) -> Option<Target> {
    let gps = situation.gps(now)?;
    let ahrs = situation.ahrs();
    Some(Target {
        addr,
        addr_type: AddrType::Icao,
        position: Position { lat: gps.lat, lng: gps.lng, valid: true, extrapolated: false },
        position_fix: Position { lat: gps.lat, lng: gps.lng, valid: true, extrapolated: false },
        position_fix_alt: (gps.alt_msl_m * 3.28084) as i32,
        alt: ahrs.baro_alt_ft.unwrap_or((gps.alt_msl_m * 3.28084) as i32),
        alt_is_gnss: ahrs.baro_alt_ft.is_none(),
        velocity: Velocity {
            track: gps.true_course,
            speed_kt: gps.ground_speed_kt,
            speed_valid: true,
            vvel_fpm: 0,
            turn_rate_dps: 0.0,
        },
        integrity: Integrity { nic: 11, nacp: 11, sil: 3 },
        identity: Identity::default(),
        provenance: Provenance { last_source: Source::Es1090, target_type: TargetType::AdsB },
        signal: Signal::default(),
        derived: Derived::default(),
        first_seen: now,
        last_seen: now,
        last_alt: now,
        last_speed: now,
        last_extrapolation: now,
        distance_est_last_ts: now,
        should_ignore: false,
    })
}

/// Periodic task (§4.K): runs until `shutdown` fires, rendering and enqueueing output frames at
/// roughly 1 Hz.
pub async fn run(store: Arc<TrafficStore>, situation: Arc<OwnSituation>, ownship: Arc<OwnshipSingleton>, sinks: Arc<Vec<Sink>>, shutdown: CancellationToken) {
    let mut ticker = interval(TICK_PERIOD);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                tick(&store, &situation, &ownship, &sinks, now);
            }
        }
    }
}

fn tick(store: &TrafficStore, situation: &OwnSituation, ownship: &OwnshipSingleton, sinks: &[Sink], now: Instant) {
    let gps = situation.gps(now);
    let gps_valid = gps.is_some();

    let tod = seconds_since_midnight_utc(now);
    // This core never decodes UAT uplinks itself, so the message counts stay at zero.
    let heartbeat_frame = gdl90::frame(&gdl90::heartbeat(gps_valid, true, tod, 0, 0));
    let stratux_heartbeat_frame = gdl90::frame(&gdl90::stratux_heartbeat(gps_valid, situation.ahrs().baro_alt_ft.is_some()));

    let targets = store.snapshot();
    let visible: Vec<&Target> = targets.iter().filter(|t| !t.should_ignore).collect();
    metrics::gauge!("store.targets").set(visible.len() as f64);

    let ownship_addr = ownship.addr(now);
    let ownship_synth = ownship_addr.and_then(|addr| ownship_target(situation, addr, now));

    let ownship_report_frame = ownship_synth.as_ref().map(|t| gdl90::frame(&gdl90::ownship_report(t)));
    let ownship_geo_alt_frame = gps.map(|g| gdl90::frame(&gdl90::ownship_geometric_altitude((g.alt_hae_m * 3.28084) as i32, false, 50)));

    let status_frame = gdl90::frame(&gdl90::stratux_status(
        env!("CARGO_PKG_VERSION"),
        true,
        true,
        gps_valid,
        false,
        false,
        0,
        0,
        visible.len() as u16,
        0,
        0,
        0.0,
        &[],
    ));

    let mut worst_alarm: Option<(u8, i32, u8, i32, i32, u32)> = None;

    for sink in sinks {
        if sink.gdl90 {
            sink.queue.put(PRIORITY_HEARTBEAT, OUTPUT_TTL, heartbeat_frame.clone(), now);
            sink.queue.put(PRIORITY_HEARTBEAT, OUTPUT_TTL, stratux_heartbeat_frame.clone(), now);
            sink.queue.put(PRIORITY_STATUS, OUTPUT_TTL, status_frame.clone(), now);
            if let Some(ref frame) = ownship_report_frame {
                sink.queue.put(PRIORITY_OWNSHIP, OUTPUT_TTL, frame.clone(), now);
            }
            if let Some(ref frame) = ownship_geo_alt_frame {
                sink.queue.put(PRIORITY_OWNSHIP, OUTPUT_TTL, frame.clone(), now);
            }
        }
    }

    for target in &visible {
        let alertable = is_traffic_alertable(target);
        let priority = if alertable { PRIORITY_TRAFFIC_ALERTABLE } else { PRIORITY_TRAFFIC };

        let gdl90_frames: Vec<Vec<u8>> = if target.position.valid {
            vec![gdl90::frame(&gdl90::traffic_report(target))]
        } else if target.derived.distance_est_m > 0.0 {
            // Bearingless Mode-S contact: no position fix to report, but a signal-based range
            // estimate exists. Synthesize the compass-rose fake targets so the EFB still shows
            // something rather than dropping the contact entirely.
            match gps {
                Some(g) => gdl90::mode_s_fake_targets(g.lat, g.lng, target.derived.distance_est_m, target.alt)
                    .iter()
                    .map(|fake| gdl90::frame(&gdl90::traffic_report(fake)))
                    .collect(),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let flarm_sentence = gps.and_then(|g| {
            if !target.position.valid {
                return None;
            }
            let (north_m, east_m) = relative_offset_m(g.lat, g.lng, target.position.lat, target.position.lng);
            let rel_vertical_m = (target.alt - (g.alt_msl_m * 3.28084) as i32) as f64 / 3.28084;
            let dist_m = (north_m * north_m + east_m * east_m).sqrt();
            let level = nmea_out::compute_alarm_level(dist_m, rel_vertical_m);
            if level > 0 {
                let bearing = (east_m.atan2(north_m).to_degrees() + 360.0) % 360.0;
                let better = worst_alarm.map(|(l, ..)| level > l).unwrap_or(true);
                if better {
                    worst_alarm = Some((level, bearing as i32, 0, rel_vertical_m as i32, dist_m as i32, target.addr));
                }
            }
            Some(nmea_out::pflaa_from_target(target, Some(north_m), Some(east_m), rel_vertical_m))
        });

        for sink in sinks {
            if sink.gdl90 {
                for frame in &gdl90_frames {
                    sink.queue.put(priority, OUTPUT_TTL, frame.clone(), now);
                }
            }
            if sink.flarm {
                if let Some(ref sentence) = flarm_sentence {
                    sink.queue.put(priority, OUTPUT_TTL, sentence.clone().into_bytes(), now);
                }
            }
        }
    }

    let pflau_sentence = nmea_out::pflau(1, true, if gps_valid { 2 } else { 0 }, 1, worst_alarm);
    let gps_sentences = gps.map(|g| {
        let wall_now = Clock::new().wall_time(now);
        (
            nmea_out::gprmc(wall_now, true, g.lat, g.lng, g.ground_speed_kt, g.true_course),
            nmea_out::gpgga(wall_now, g.lat, g.lng, g.fix_quality, 0, 0.0, g.alt_msl_m, g.alt_hae_m - g.alt_msl_m),
            nmea_out::pgrmz((g.alt_msl_m * 3.28084) as i32),
        )
    });

    for sink in sinks {
        if sink.flarm {
            sink.queue.put(PRIORITY_STATUS, OUTPUT_TTL, pflau_sentence.clone().into_bytes(), now);
            if let Some((ref gprmc, ref gpgga, ref pgrmz)) = gps_sentences {
                sink.queue.put(PRIORITY_STATUS, OUTPUT_TTL, gprmc.clone().into_bytes(), now);
                sink.queue.put(PRIORITY_STATUS, OUTPUT_TTL, gpgga.clone().into_bytes(), now);
                sink.queue.put(PRIORITY_STATUS, OUTPUT_TTL, pgrmz.clone().into_bytes(), now);
            }
        }
    }
}

/// Wall-clock seconds since UTC midnight, for the GDL90 heartbeat time-of-day field.
fn seconds_since_midnight_utc(now: Instant) -> u32 {
    use chrono::Timelike;
    Clock::new().wall_time(now).num_seconds_from_midnight()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkOutput;

    #[test]
    fn build_sinks_preserves_configured_flags() {
        let outputs = vec![NetworkOutput {
            host: "127.0.0.1".to_string(),
            port: 4000,
            gdl90: true,
            flarm: false,
            queue_size: 50,
        }];
        let sinks = build_sinks(&outputs);
        assert_eq!(sinks.len(), 1);
        assert!(sinks[0].gdl90);
        assert!(!sinks[0].flarm);
    }

    #[test]
    fn relative_offset_is_zero_at_same_point() {
        let (n, e) = relative_offset_m(43.99, -88.56, 43.99, -88.56);
        assert!(n.abs() < 1e-6);
        assert!(e.abs() < 1e-6);
    }
}
