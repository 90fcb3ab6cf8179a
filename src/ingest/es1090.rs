//! 1090ES adapter (§4.C): JSON records from the upstream Mode S/ADS-B demodulator.

use serde::Deserialize;

use crate::model::{AddrType, PartialTarget, Source, TargetType};

const SOURCE_LABEL: &str = "es1090";

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "Icao_addr")]
    icao_addr: u32,
    #[serde(rename = "DF")]
    df: i32,
    #[serde(rename = "TypeCode")]
    type_code: i32,
    #[serde(rename = "SignalLevel")]
    signal_level: Option<f32>,
    #[serde(rename = "Tail")]
    tail: Option<String>,
    #[serde(rename = "Alt")]
    alt: Option<i32>,
    #[serde(rename = "AltIsGNSS")]
    alt_is_gnss: Option<bool>,
    #[serde(rename = "Speed_valid")]
    speed_valid: Option<bool>,
    #[serde(rename = "Speed")]
    speed: Option<f32>,
    #[serde(rename = "Track")]
    track: Option<f32>,
    #[serde(rename = "Lat")]
    lat: Option<f64>,
    #[serde(rename = "Lng")]
    lng: Option<f64>,
    #[serde(rename = "Position_valid")]
    position_valid: Option<bool>,
    #[serde(rename = "Vvel")]
    vvel: Option<i32>,
    #[serde(rename = "OnGround")]
    on_ground: Option<bool>,
    #[serde(rename = "NACp")]
    nacp: Option<u8>,
}

/// Parse a single 1090ES demodulator JSON line into a `PartialTarget`, or `None` for a malformed
/// or semantically-invalid record.
pub fn parse_line(line: &str) -> Option<PartialTarget> {
    let raw: RawMessage = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(_) => {
            super::count_dropped(SOURCE_LABEL, "malformed");
            return None;
        }
    };

    if raw.icao_addr == 0 {
        super::count_dropped(SOURCE_LABEL, "invalid");
        return None;
    }

    let has_position = raw.position_valid.unwrap_or(false) && raw.lat.is_some() && raw.lng.is_some();
    if let (Some(lat), Some(lng)) = (raw.lat, raw.lng) {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            super::count_dropped(SOURCE_LABEL, "invalid");
            return None;
        }
    }

    let target_type = classify_target_type(raw.df, raw.type_code);

    Some(PartialTarget {
        addr: raw.icao_addr,
        addr_type: AddrType::Icao,
        lat: has_position.then_some(raw.lat).flatten(),
        lng: has_position.then_some(raw.lng).flatten(),
        alt_feet: raw.alt,
        alt_is_gnss: raw.alt_is_gnss,
        track: raw.track,
        speed_kt: if raw.speed_valid == Some(false) { None } else { raw.speed },
        vvel_fpm: raw.vvel,
        turn_rate_dps: None,
        tail: raw.tail,
        emitter_category: None,
        squawk: None,
        nic: None,
        nacp: raw.nacp,
        sil: None,
        signal_level: raw.signal_level,
        on_ground: raw.on_ground,
        target_type: Some(target_type),
        source: Source::Es1090,
    })
}

/// Classify target type from downlink format / type code (§4.C): DF 18 is TIS-B/ADS-R, type
/// codes 1-4 are identification (no position), others treated as ADS-B.
fn classify_target_type(df: i32, type_code: i32) -> TargetType {
    match df {
        18 => TargetType::TisB,
        17 => TargetType::AdsB,
        _ if (1..=4).contains(&type_code) => TargetType::AdsB,
        _ => TargetType::ModeS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_adsb_record() {
        let line = r#"{"Icao_addr":11259375,"DF":17,"CA":5,"TypeCode":11,"SignalLevel":-20.0,"Tail":"N12345","Alt":5000,"AltIsGNSS":false,"Speed_valid":true,"Speed":120.0,"Track":90.0,"Lat":43.99,"Lng":-88.56,"Position_valid":true,"Vvel":0,"OnGround":false,"NACp":8,"Timestamp":0}"#;
        let update = parse_line(line).unwrap();
        assert_eq!(update.addr, 11259375);
        assert_eq!(update.lat, Some(43.99));
        assert_eq!(update.source, Source::Es1090);
    }

    #[test]
    fn speed_survives_when_speed_valid_is_absent() {
        let line = r#"{"Icao_addr":10560325,"DF":17,"TypeCode":11,"Tail":"UAL123","Alt":35000,"Speed":450,"Track":270,"Lat":47.4502,"Lng":-122.3088,"Position_valid":true,"NACp":10}"#;
        let update = parse_line(line).unwrap();
        assert_eq!(update.addr, 10560325);
        assert_eq!(update.tail.as_deref(), Some("UAL123"));
        assert_eq!(update.speed_kt, Some(450.0));
    }

    #[test]
    fn speed_dropped_when_speed_valid_is_explicitly_false() {
        let line = r#"{"Icao_addr":123,"DF":17,"TypeCode":11,"Speed_valid":false,"Speed":450}"#;
        let update = parse_line(line).unwrap();
        assert_eq!(update.speed_kt, None);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_line("not json").is_none());
    }

    #[test]
    fn rejects_zero_address() {
        let line = r#"{"Icao_addr":0,"DF":17,"TypeCode":11}"#;
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn rejects_out_of_range_position() {
        let line = r#"{"Icao_addr":123,"DF":17,"TypeCode":11,"Lat":200.0,"Lng":-88.56,"Position_valid":true}"#;
        assert!(parse_line(line).is_none());
    }
}
