//! GDL90 message builders (§4.G): heartbeat, ownship report/geometric altitude, traffic report,
//! and the Stratux-specific 0xCC family. Each returns the unframed message body; callers pass the
//! result through `frame::frame` before sending.

use crate::model::{AddrType, Target};
use crate::postproc::is_traffic_alertable;

use super::types::{encode_altitude, encode_callsign, encode_horizontal_velocity, encode_lat_lng, encode_vertical_velocity, ReportFields};

const MSG_HEARTBEAT: u8 = 0x00;
const MSG_OWNSHIP_REPORT: u8 = 0x0A;
const MSG_OWNSHIP_GEO_ALTITUDE: u8 = 0x0B;
const MSG_TRAFFIC_REPORT: u8 = 0x14;
const MSG_STRATUX: u8 = 0xCC;

/// Build the 0x00 heartbeat message (7-byte payload).
///
/// `seconds_since_midnight_utc` is a 17-bit count per the GDL90 message-0 layout; its high bit
/// rides in status byte 2's MSB.
pub fn heartbeat(gps_valid: bool, uat_initialized: bool, seconds_since_midnight_utc: u32, uplink_count: u16, basic_long_count: u16) -> Vec<u8> {
    let mut status1 = 0u8;
    if gps_valid {
        status1 |= 0x80;
    }
    if uat_initialized {
        status1 |= 0x01;
    }

    let tod = seconds_since_midnight_utc & 0x1_FFFF;
    let mut status2 = 0x01u8; // utc_ok
    if tod & 0x1_0000 != 0 {
        status2 |= 0x80;
    }

    let tod_low = (tod & 0xFFFF) as u16;
    let counts_hi = ((uplink_count & 0x1F) << 3) | ((basic_long_count >> 8) & 0x07);
    let counts_lo = (basic_long_count & 0xFF) as u8;

    vec![
        MSG_HEARTBEAT,
        status1,
        status2,
        (tod_low & 0xFF) as u8,
        (tod_low >> 8) as u8,
        counts_hi as u8,
        counts_lo,
    ]
}

/// Build a 27-byte ownship/traffic report body (without the leading message-id byte) shared by
/// 0x0A (ownship), 0x14 (traffic), and, with a flattened altitude substitution, 0x0B.
fn report_body(target: &Target, alert: bool) -> Vec<u8> {
    let fields = ReportFields::new()
        .with_alert_status(if alert { 1 } else { 0 })
        .with_address_type(target.addr_type.gdl90_code() as u8)
        .with_participant_address(target.addr)
        .with_latitude(encode_lat_lng(target.position.lat))
        .with_longitude(encode_lat_lng(target.position.lng))
        .with_altitude(encode_altitude(target.alt))
        .with_misc(misc_nibble(target))
        .with_nic(target.integrity.nic)
        .with_nacp(target.integrity.nacp)
        .with_horizontal_velocity(encode_horizontal_velocity(target.velocity.speed_valid.then_some(target.velocity.speed_kt)))
        .with_vertical_velocity(encode_vertical_velocity(Some(target.velocity.vvel_fpm)))
        .with_track((target.velocity.track / 360.0 * 256.0) as u8)
        .with_emitter_category(target.identity.emitter_category);

    let mut body = fields.into_bytes().to_vec();
    body.extend_from_slice(&encode_callsign(target.identity.tail.as_deref()));
    // emergency/priority code (high nibble) + spare (low nibble); no emergency modeling in scope.
    body.push(0x00);
    body
}

/// `misc` nibble: bit0 on-ground, bit1 extrapolated (others reserved, per the reference crate's
/// decode-side `Altitude`/`Report` bit layout).
fn misc_nibble(target: &Target) -> u8 {
    let mut misc = 0u8;
    if target.derived.on_ground {
        misc |= 0b0001;
    }
    if target.position.extrapolated {
        misc |= 0b0010;
    }
    misc
}

/// Build the 0x14 traffic report for `target`.
pub fn traffic_report(target: &Target) -> Vec<u8> {
    let mut body = vec![MSG_TRAFFIC_REPORT];
    body.extend(report_body(target, is_traffic_alertable(target)));
    body
}

/// Build the 0x0A ownship report from own-state packed as a `Target`-shaped value.
pub fn ownship_report(ownship: &Target) -> Vec<u8> {
    let mut body = vec![MSG_OWNSHIP_REPORT];
    body.extend(report_body(ownship, false));
    body
}

const GEO_ALTITUDE_FACTOR: i32 = 5;

/// Build the 0x0B ownship geometric altitude message (4-byte payload): HAE altitude in 5-ft
/// units, plus a vertical-warning/figure-of-merit byte.
pub fn ownship_geometric_altitude(hae_ft: i32, vertical_warning: bool, figure_of_merit: u16) -> Vec<u8> {
    let units = (hae_ft / GEO_ALTITUDE_FACTOR).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    let mut vfom = figure_of_merit.min(0x7FFF);
    if vertical_warning {
        vfom |= 0x8000;
    }
    vec![
        MSG_OWNSHIP_GEO_ALTITUDE,
        (units >> 8) as u8,
        (units & 0xFF) as u8,
        (vfom >> 8) as u8,
        (vfom & 0xFF) as u8,
    ]
}

/// Build the Stratux-specific 0xCC heartbeat sub-message: GPS-valid and AHRS-valid bits.
pub fn stratux_heartbeat(gps_valid: bool, ahrs_valid: bool) -> Vec<u8> {
    let mut flags = 0u8;
    if gps_valid {
        flags |= 0x02;
    }
    if ahrs_valid {
        flags |= 0x01;
    }
    vec![MSG_STRATUX, 0x00, flags]
}

const FOREFLIGHT_ID_LEN: usize = 39;

/// Build the ForeFlight identification 0xCC sub-message (fixed 39-byte payload): device name and
/// long name, truncated/padded to their fixed widths, plus capability bits.
pub fn foreflight_id(device_serial: u64, device_name: &str, long_name: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(FOREFLIGHT_ID_LEN);
    body.push(MSG_STRATUX);
    body.push(0x00); // sub-message id: identification
    body.push(0x01); // version
    body.extend_from_slice(&device_serial.to_be_bytes());
    push_fixed_ascii(&mut body, device_name, 8);
    push_fixed_ascii(&mut body, long_name, 16);
    body.push(0x01); // capabilities: supports GDL90 WGS-84 geometric altitude
    while body.len() < FOREFLIGHT_ID_LEN {
        body.push(0x00);
    }
    body.truncate(FOREFLIGHT_ID_LEN);
    body
}

fn push_fixed_ascii(body: &mut Vec<u8>, text: &str, width: usize) {
    let bytes = text.as_bytes();
    for i in 0..width {
        body.push(*bytes.get(i).unwrap_or(&b' '));
    }
}

/// Tower position for the trailing UAT ground-station list in the Stratux status message.
pub struct Tower {
    pub lat: f64,
    pub lng: f64,
}

/// Build the Stratux status 0xCC sub-message: feature bits, satellite/target counts, per-minute
/// rates, CPU temperature, and a trailing list of tracked UAT ground-station towers.
#[allow(clippy::too_many_arguments)]
pub fn stratux_status(
    version: &str,
    uat_enabled: bool,
    es_enabled: bool,
    gps_enabled: bool,
    imu_enabled: bool,
    cpu_temp_valid: bool,
    satellites_in_view: u16,
    satellites_locked: u16,
    traffic_target_count: u16,
    uat_messages_per_min: u16,
    es_messages_per_min: u16,
    cpu_temp_c: f32,
    towers: &[Tower],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(MSG_STRATUX);
    body.push(0x01); // sub-message id: status

    push_fixed_ascii(&mut body, version, 8);

    let mut feature_bits = 0u8;
    if uat_enabled {
        feature_bits |= 0x01;
    }
    if es_enabled {
        feature_bits |= 0x02;
    }
    if gps_enabled {
        feature_bits |= 0x04;
    }
    if imu_enabled {
        feature_bits |= 0x08;
    }
    if cpu_temp_valid {
        feature_bits |= 0x10;
    }
    body.push(feature_bits);

    body.extend_from_slice(&satellites_in_view.to_be_bytes());
    body.extend_from_slice(&satellites_locked.to_be_bytes());
    body.extend_from_slice(&traffic_target_count.to_be_bytes());
    body.extend_from_slice(&uat_messages_per_min.to_be_bytes());
    body.extend_from_slice(&es_messages_per_min.to_be_bytes());
    body.extend_from_slice(&((cpu_temp_c * 10.0) as i16).to_be_bytes());

    body.push((towers.len() as u16 >> 8) as u8);
    body.push((towers.len() as u16 & 0xFF) as u8);
    for tower in towers {
        body.extend_from_slice(&(encode_lat_lng(tower.lat) & 0x00FF_FFFF).to_be_bytes()[1..]);
        body.extend_from_slice(&(encode_lat_lng(tower.lng) & 0x00FF_FFFF).to_be_bytes()[1..]);
    }
    body
}

/// Eight synthetic Mode-S "fake targets" on a compass rose around ownship, used only as an EFB
/// viewing affordance for bearingless Mode-S contacts (§4.E.3).
pub fn mode_s_fake_targets(own_lat: f64, own_lng: f64, distance_est_m: f64, alt_ft: i32) -> [Target; 8] {
    use crate::geo::flat_earth_advance;
    use crate::model::{Derived, Identity, Integrity, Position, Provenance, Signal, Source, TargetType, Velocity};
    use tokio::time::Instant;

    std::array::from_fn(|i| {
        let bearing = (i as f64) * 45.0;
        let dist_nm = distance_est_m / 1852.0;
        let (lat, lng) = flat_earth_advance(own_lat, own_lng, dist_nm, bearing);
        let now = Instant::now();
        Target {
            addr: i as u32,
            addr_type: AddrType::Icao,
            position: Position {
                lat,
                lng,
                valid: true,
                extrapolated: false,
            },
            position_fix: Position::default(),
            position_fix_alt: alt_ft,
            alt: alt_ft,
            alt_is_gnss: false,
            velocity: Velocity::default(),
            integrity: Integrity::default(),
            identity: Identity {
                tail: Some("MODE S".to_string()),
                emitter_category: 0,
                squawk: None,
            },
            provenance: Provenance {
                last_source: Source::Es1090,
                target_type: TargetType::ModeS,
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
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_target;

    #[test]
    fn heartbeat_is_seven_bytes() {
        let hb = heartbeat(true, true, 3600, 0, 0);
        assert_eq!(hb.len(), 7);
        assert_eq!(hb[0], MSG_HEARTBEAT);
        assert_eq!(hb[1] & 0x80, 0x80);
    }

    #[test]
    fn traffic_report_is_twenty_eight_bytes() {
        let t = sample_target();
        let body = traffic_report(&t);
        assert_eq!(body.len(), 28);
        assert_eq!(body[0], MSG_TRAFFIC_REPORT);
    }

    #[test]
    fn alert_bit_set_when_close_and_bearing_valid() {
        let mut t = sample_target();
        t.derived.bearing_dist_valid = true;
        t.derived.distance_m = 1000.0;
        let body = traffic_report(&t);
        assert_eq!(body[1] >> 4, 1);
    }

    #[test]
    fn mode_s_fake_targets_spread_around_compass_rose() {
        let targets = mode_s_fake_targets(43.99, -88.56, 5000.0, 5000);
        assert_eq!(targets.len(), 8);
        assert_eq!(targets[0].identity.tail.as_deref(), Some("MODE S"));
        assert_ne!(targets[0].position.lat, targets[2].position.lat);
    }

    #[test]
    fn foreflight_id_has_fixed_width() {
        let body = foreflight_id(1, "stratux", "Self-hosted fusion core");
        assert_eq!(body.len(), FOREFLIGHT_ID_LEN);
    }
}
