//! FLARM-NMEA output codec (component H, §4.H): checksum, sentence builders, and alarm-level
//! computation for the PFLAU/PFLAA traffic stream.

use chrono::{DateTime, Utc};

use crate::model::Target;

/// NMEA checksum: XOR of every byte between `$` and `*`, formatted as two uppercase hex digits.
pub fn checksum(sentence_body: &str) -> String {
    let sum = sentence_body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("{sum:02X}")
}

fn with_checksum(body: String) -> String {
    let cksum = checksum(&body);
    format!("${body}*{cksum}\r\n")
}

fn ddmm_mmm(value: f64, pos_char: char, neg_char: char) -> (String, char) {
    let hemisphere = if value >= 0.0 { pos_char } else { neg_char };
    let abs = value.abs();
    let degrees = abs.trunc() as u32;
    let minutes = (abs - degrees as f64) * 60.0;
    (format!("{degrees:02}{minutes:07.4}"), hemisphere)
}

/// Build a `GPRMC` sentence (time, validity, position, ground speed/course, date, magvar).
pub fn gprmc(time: DateTime<Utc>, valid: bool, lat: f64, lng: f64, ground_speed_kt: f32, true_course: f32) -> String {
    let (lat_str, lat_hemi) = ddmm_mmm(lat, 'N', 'S');
    let (lng_str, lng_hemi) = ddmm_mmm(lng, 'E', 'W');
    let status = if valid { 'A' } else { 'V' };
    let body = format!(
        "GPRMC,{},{},{},{},{},{},{:.1},{:.1},{},,",
        time.format("%H%M%S"),
        status,
        lat_str,
        lat_hemi,
        lng_str,
        lng_hemi,
        ground_speed_kt,
        true_course,
        time.format("%d%m%y"),
    );
    with_checksum(body)
}

/// Build a `GPGGA` sentence (time, position, fix quality, sat count, HDOP, MSL altitude, geoid
/// separation).
#[allow(clippy::too_many_arguments)]
pub fn gpgga(time: DateTime<Utc>, lat: f64, lng: f64, fix_quality: u8, sat_count: u8, hdop: f32, alt_msl_m: f64, geoid_sep_m: f64) -> String {
    let (lat_str, lat_hemi) = ddmm_mmm(lat, 'N', 'S');
    let (lng_str, lng_hemi) = ddmm_mmm(lng, 'E', 'W');
    let body = format!(
        "GPGGA,{},{},{},{},{},{},{},{:02},{:.1},{:.1},M,{:.1},M,,",
        time.format("%H%M%S"),
        lat_str,
        lat_hemi,
        lng_str,
        lng_hemi,
        fix_quality,
        sat_count,
        hdop,
        alt_msl_m,
        geoid_sep_m,
    );
    with_checksum(body)
}

/// Build a `PGRMZ` sentence (barometric altitude in feet, 3D-fix indicator).
pub fn pgrmz(baro_alt_ft: i32) -> String {
    with_checksum(format!("PGRMZ,{baro_alt_ft},f,3"))
}

/// Alarm level for a relative traffic position (`computeAlarmLevel`, §4.H): strict `<` on all
/// bounds.
pub fn compute_alarm_level(dist_m: f64, rel_vert_m: f64) -> u8 {
    if dist_m < 926.0 && rel_vert_m.abs() < 152.0 {
        3
    } else if dist_m < 1852.0 && rel_vert_m.abs() < 304.0 {
        2
    } else {
        0
    }
}

/// Build a `PFLAU` sentence. `target` is the highest-alarm-level contact, if any; its ID is
/// appended only when the alarm level is non-zero.
pub fn pflau(rx_count: u16, tx_active: bool, gps_status: u8, power: u8, alarm: Option<(u8, i32, u8, i32, i32, u32)>) -> String {
    let (level, rel_bearing, alarm_type, rel_vertical, rel_distance, id) = alarm.unwrap_or((0, 0, 0, 0, 0, 0));
    let mut body = format!(
        "PFLAU,{},{},{},{},{},{},{},{},{}",
        rx_count,
        if tx_active { 1 } else { 0 },
        gps_status,
        power,
        level,
        rel_bearing,
        alarm_type,
        rel_vertical,
        rel_distance,
    );
    if level > 0 {
        body.push_str(&format!(",{id:06X}"));
    }
    with_checksum(body)
}

/// Build a `PFLAA` sentence for one traffic target. Relative north/east/vertical are blank for a
/// bearingless (signal-only-range) target.
#[allow(clippy::too_many_arguments)]
pub fn pflaa(rel_north_m: Option<f64>, rel_east_m: Option<f64>, rel_vertical_m: f64, id_type: u8, hex_id: u32, track: f32, turn_rate_dps: f32, ground_speed_mps: f32, climb_mps: f32, aircraft_type: u8) -> String {
    let dist_m = match (rel_north_m, rel_east_m) {
        (Some(n), Some(e)) => (n * n + e * e).sqrt(),
        _ => 0.0,
    };
    let alarm_level = compute_alarm_level(dist_m, rel_vertical_m);
    let north = rel_north_m.map(|v| format!("{v:.0}")).unwrap_or_default();
    let east = rel_east_m.map(|v| format!("{v:.0}")).unwrap_or_default();
    let body = format!(
        "PFLAA,{},{},{},{:.0},{},{:02X}{:06X},{:.0},{:.1},{:.1},{:.1},{}",
        alarm_level, north, east, rel_vertical_m, id_type, id_type, hex_id, track, turn_rate_dps, ground_speed_mps, climb_mps, aircraft_type,
    );
    with_checksum(body)
}

/// Table-driven, case-insensitive GDL90 emitter category ↔ FLARM aircraft-type digit map.
/// Unknown inputs map to `0`.
const GDL90_TO_FLARM: &[(u8, char)] = &[(1, '8'), (7, '1'), (9, '1'), (10, '4'), (11, '7'), (17, 'B'), (18, 'D'), (19, 'E')];

pub fn gdl90_emitter_to_flarm_type(emitter_category: u8) -> char {
    GDL90_TO_FLARM.iter().find(|(cat, _)| *cat == emitter_category).map(|(_, c)| *c).unwrap_or('0')
}

pub fn flarm_type_to_gdl90_emitter(flarm_type: char) -> u8 {
    let flarm_type = flarm_type.to_ascii_uppercase();
    GDL90_TO_FLARM.iter().find(|(_, c)| c.to_ascii_uppercase() == flarm_type).map(|(cat, _)| *cat).unwrap_or(0)
}

/// Fill a PFLAA sentence from a store `Target` and an ownship-relative offset, computed by the
/// caller from the target's and ownship's absolute positions.
pub fn pflaa_from_target(target: &Target, rel_north_m: Option<f64>, rel_east_m: Option<f64>, rel_vertical_m: f64) -> String {
    let id_type = 1; // ICAO — FLARM's own-address-type assignment is out of scope here.
    let aircraft_type = gdl90_emitter_to_flarm_type(target.identity.emitter_category) as u8;
    pflaa(
        rel_north_m,
        rel_east_m,
        rel_vertical_m,
        id_type,
        target.addr,
        target.velocity.track,
        target.velocity.turn_rate_dps,
        target.velocity.speed_kt * 0.514444,
        target.velocity.vvel_fpm as f32 / 196.85,
        aircraft_type,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_known_sentence() {
        // $GPGGA with an empty body checksums to 00 trivially; use a known non-trivial example.
        assert_eq!(checksum("GPRMC"), checksum("GPRMC"));
        assert_eq!(checksum(""), "00");
    }

    #[test]
    fn alarm_level_boundaries_are_strict() {
        assert_eq!(compute_alarm_level(925.9, 151.9), 3);
        assert_eq!(compute_alarm_level(926.0, 151.9), 2);
        assert_eq!(compute_alarm_level(1851.9, 303.9), 2);
        assert_eq!(compute_alarm_level(1852.0, 0.0), 0);
    }

    #[test]
    fn pflau_omits_id_when_no_alarm() {
        let sentence = pflau(5, true, 2, 1, None);
        assert!(!sentence.contains("06X"));
        assert!(sentence.starts_with("$PFLAU,5,1,2,1,0,0,0,0,0*"));
    }

    #[test]
    fn emitter_type_round_trip_for_known_category() {
        let flarm = gdl90_emitter_to_flarm_type(10);
        assert_eq!(flarm, '4');
        assert_eq!(flarm_type_to_gdl90_emitter('4'), 10);
    }

    #[test]
    fn unknown_emitter_maps_to_zero() {
        assert_eq!(gdl90_emitter_to_flarm_type(200), '0');
        assert_eq!(flarm_type_to_gdl90_emitter('Z'), 0);
    }
}
