//! FLARM-NMEA input adapter (§4.C): PFLAA relative-traffic sentences from an external FLARM
//! tracker, converted to absolute position via the current own GPS fix.

use tokio::time::Instant;

use crate::model::{AddrType, PartialTarget, Source, TargetType};
use crate::situation::OwnSituation;

const SOURCE_LABEL: &str = "flarm_nmea";
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Validate an NMEA checksum: `*XX` at the end, XOR of bytes between `$` and `*`.
fn checksum_valid(sentence: &str) -> bool {
    let sentence = sentence.trim();
    if !sentence.starts_with('$') {
        return false;
    }
    let Some(star) = sentence.rfind('*') else { return false };
    if star == 0 {
        return false;
    }
    let body = &sentence[1..star];
    let expected = &sentence[star + 1..];
    let computed = body.bytes().fold(0u8, |acc, b| acc ^ b);
    expected.trim().eq_ignore_ascii_case(&format!("{computed:02X}"))
}

/// Convert relative north/east meters into an absolute lat/lng via a local flat-Earth offset.
fn offset_position(own_lat: f64, own_lng: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
    let dlng = (east_m / (EARTH_RADIUS_M * own_lat.to_radians().cos())).to_degrees();
    (own_lat + dlat, own_lng + dlng)
}

/// Parse a `$PFLAA,...*XX` sentence into a `PartialTarget`, given the current situation for the
/// relative-to-absolute position conversion. Returns `None` (and drops silently) for anything
/// else, a bad checksum, or when no recent GPS fix exists to anchor a relative report.
pub fn parse_pflaa(sentence: &str, situation: &OwnSituation, now: Instant) -> Option<PartialTarget> {
    if !checksum_valid(sentence) {
        super::count_dropped(SOURCE_LABEL, "malformed");
        return None;
    }
    let body = sentence.trim_start_matches('$').split('*').next()?;
    let fields: Vec<&str> = body.split(',').collect();
    if fields.first() != Some(&"PFLAA") || fields.len() < 11 {
        return None;
    }

    let north_m: f64 = fields[2].parse().ok()?;
    let east_m: f64 = fields[3].parse().ok()?;
    let vertical_m: f64 = fields[4].parse().ok()?;
    // ID field is `<id_type><address>` hex digits; the address occupies the low 6 hex digits.
    let hex_id = fields[6];
    let addr_digits = if hex_id.len() > 6 { &hex_id[hex_id.len() - 6..] } else { hex_id };
    let addr = u32::from_str_radix(addr_digits, 16).ok().filter(|a| *a != 0)?;
    let track: f32 = fields[7].parse().unwrap_or(0.0);
    let turn_rate_dps: f32 = fields[8].parse().unwrap_or(0.0);
    let speed_mps: f32 = fields[9].parse().unwrap_or(0.0);
    let climb_mps: f32 = fields[10].parse().unwrap_or(0.0);

    let gps = match situation.gps(now) {
        Some(gps) => gps,
        None => {
            super::count_dropped(SOURCE_LABEL, "invalid");
            return None;
        }
    };

    let (lat, lng) = offset_position(gps.lat, gps.lng, north_m, east_m);

    Some(PartialTarget {
        addr,
        addr_type: AddrType::NonIcao,
        lat: Some(lat),
        lng: Some(lng),
        alt_feet: Some((gps.alt_msl_m * 3.28084 + vertical_m * 3.28084) as i32),
        alt_is_gnss: Some(false),
        track: Some(track),
        speed_kt: Some(speed_mps * 1.943_84),
        vvel_fpm: Some((climb_mps * 196.85) as i32),
        turn_rate_dps: Some(turn_rate_dps),
        tail: None,
        emitter_category: None,
        squawk: None,
        nic: None,
        nacp: None,
        sil: None,
        signal_level: None,
        on_ground: None,
        target_type: Some(TargetType::Other),
        source: Source::Ogn,
    })
}

/// Parse a `$PFLAU,...*XX` sentence into a `PartialTarget`. The ID field (present only when the
/// alarm level is non-zero) carries `<hex addr>!<tail>`; relative bearing/distance/vertical are
/// converted to an absolute position the same way `parse_pflaa` does, anchored on the current own
/// GPS fix.
pub fn parse_pflau(sentence: &str, situation: &OwnSituation, now: Instant) -> Option<PartialTarget> {
    if !checksum_valid(sentence) {
        super::count_dropped(SOURCE_LABEL, "malformed");
        return None;
    }
    let body = sentence.trim_start_matches('$').split('*').next()?;
    let fields: Vec<&str> = body.split(',').collect();
    if fields.first() != Some(&"PFLAU") || fields.len() < 11 {
        return None;
    }

    let rel_bearing_deg: f64 = fields[6].parse().ok()?;
    let rel_vertical_m: f64 = fields[8].parse().ok()?;
    let rel_distance_m: f64 = fields[9].parse().ok()?;

    let (id_hex, tail) = match fields[10].split_once('!') {
        Some((id, tail)) => (id, Some(tail.to_string())),
        None => (fields[10], None),
    };
    let addr_digits = if id_hex.len() > 6 { &id_hex[id_hex.len() - 6..] } else { id_hex };
    let addr = u32::from_str_radix(addr_digits, 16).ok().filter(|a| *a != 0)?;

    let gps = match situation.gps(now) {
        Some(gps) => gps,
        None => {
            super::count_dropped(SOURCE_LABEL, "invalid");
            return None;
        }
    };

    let bearing_rad = rel_bearing_deg.to_radians();
    let north_m = rel_distance_m * bearing_rad.cos();
    let east_m = rel_distance_m * bearing_rad.sin();
    let (lat, lng) = offset_position(gps.lat, gps.lng, north_m, east_m);

    Some(PartialTarget {
        addr,
        addr_type: AddrType::NonIcao,
        lat: Some(lat),
        lng: Some(lng),
        alt_feet: Some((gps.alt_msl_m * 3.28084 + rel_vertical_m * 3.28084) as i32),
        alt_is_gnss: Some(false),
        tail,
        target_type: Some(TargetType::Other),
        source: Source::Ogn,
        ..Default::default()
    })
}
