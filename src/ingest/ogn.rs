//! OGN/FLARM-JSON adapter (§4.C): ground-station status records are consumed for receiver stats
//! and discarded; traffic records are normalized into `PartialTarget`.

use serde::Deserialize;

use crate::model::{AddrType, PartialTarget, Source, TargetType};

const SOURCE_LABEL: &str = "ogn";

#[derive(Debug, Deserialize)]
struct RawRecord {
    sys: Option<String>,
    addr: Option<String>,
    addr_type: Option<u8>,
    #[allow(dead_code)]
    acft_type: Option<String>,
    acft_cat: Option<String>,
    lat_deg: Option<f64>,
    lon_deg: Option<f64>,
    alt_msl_m: Option<f64>,
    #[allow(dead_code)]
    alt_std_m: Option<f64>,
    track_deg: Option<f32>,
    speed_mps: Option<f32>,
    climb_mps: Option<f32>,
    turn_dps: Option<f32>,
    snr_db: Option<f32>,
    reg: Option<String>,
}

const MPS_TO_KNOTS: f32 = 1.943_84;
const MPS_TO_FPM: f32 = 196.85;

/// Parse one OGN receiver JSON line. Status records (`sys=="status"`) and position-less
/// registration-only updates are normalized but never create a fresh target with no position.
pub fn parse_line(line: &str) -> Option<PartialTarget> {
    let raw: RawRecord = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(_) => {
            super::count_dropped(SOURCE_LABEL, "malformed");
            return None;
        }
    };

    if raw.sys.as_deref() == Some("status") {
        return None;
    }

    let addr_hex = match raw.addr {
        Some(ref a) => a,
        None => {
            super::count_dropped(SOURCE_LABEL, "malformed");
            return None;
        }
    };
    let addr = match u32::from_str_radix(addr_hex.trim(), 16) {
        Ok(a) if a != 0 => a,
        _ => {
            super::count_dropped(SOURCE_LABEL, "invalid");
            return None;
        }
    };

    let addr_type = match raw.addr_type {
        Some(1) => AddrType::Icao,
        _ => AddrType::NonIcao,
    };

    if raw.lat_deg.is_none() || raw.lon_deg.is_none() {
        if raw.reg.is_some() {
            // Registration-only update: caller merges a PartialTarget with no position fields.
            return Some(PartialTarget {
                addr,
                addr_type,
                tail: raw.reg,
                source: Source::Ogn,
                target_type: Some(TargetType::Other),
                ..Default::default()
            });
        }
        super::count_dropped(SOURCE_LABEL, "invalid");
        return None;
    }

    let (lat, lng) = (raw.lat_deg.unwrap(), raw.lon_deg.unwrap());
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        super::count_dropped(SOURCE_LABEL, "invalid");
        return None;
    }

    let emitter_category = raw.acft_cat.as_deref().and_then(|s| u8::from_str_radix(s.trim(), 16).ok());

    Some(PartialTarget {
        addr,
        addr_type,
        lat: Some(lat),
        lng: Some(lng),
        alt_feet: raw.alt_msl_m.map(|m| (m * 3.28084) as i32),
        alt_is_gnss: Some(false),
        track: raw.track_deg,
        speed_kt: raw.speed_mps.map(|s| s * MPS_TO_KNOTS),
        vvel_fpm: raw.climb_mps.map(|c| (c * MPS_TO_FPM) as i32),
        turn_rate_dps: raw.turn_dps,
        tail: raw.reg,
        emitter_category,
        squawk: None,
        nic: None,
        nacp: None,
        sil: None,
        signal_level: raw.snr_db,
        on_ground: None,
        target_type: Some(TargetType::Other),
        source: Source::Ogn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_records_are_ignored() {
        let line = r#"{"sys":"status","noise":-10.0}"#;
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn parses_a_position_record() {
        let line = r#"{"sys":"OGN","addr":"ABC123","addr_type":2,"acft_type":"D","lat_deg":43.99,"lon_deg":-88.56,"alt_msl_m":1500.0,"track_deg":90.0,"speed_mps":30.0,"climb_mps":1.0,"turn_dps":0.0,"snr_db":12.0,"reg":"N12345"}"#;
        let update = parse_line(line).unwrap();
        assert_eq!(update.addr, 0xABC123);
        assert_eq!(update.addr_type, AddrType::NonIcao);
        assert!((update.speed_kt.unwrap() - 58.3).abs() < 1.0);
    }

    #[test]
    fn rejects_missing_position_without_registration() {
        let line = r#"{"sys":"OGN","addr":"ABC123","addr_type":2}"#;
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn registration_only_update_carries_no_position() {
        let line = r#"{"sys":"OGN","addr":"ABC123","addr_type":2,"reg":"N12345"}"#;
        let update = parse_line(line).unwrap();
        assert!(update.lat.is_none());
        assert_eq!(update.tail.as_deref(), Some("N12345"));
    }
}
