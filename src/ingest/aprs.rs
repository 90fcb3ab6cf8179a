//! APRS adapter (§4.C): textual OGN/FLARM position packets, parsed with the `ogn_parser` crate
//! and converted into the same `PartialTarget` shape as the OGN-JSON adapter.

use num_traits::AsPrimitive;

use crate::model::{AddrType, PartialTarget, Source, TargetType};

const SOURCE_LABEL: &str = "aprs";

const MPS_TO_FPM: f32 = 196.85;

/// Parse a single APRS text line into a `PartialTarget`. Status packets and non-position
/// packets carry no traffic and are dropped.
pub fn parse_line(line: &str) -> Option<PartialTarget> {
    let packet = match ogn_parser::parse(line) {
        Ok(p) => p,
        Err(_) => {
            super::count_dropped(SOURCE_LABEL, "malformed");
            return None;
        }
    };

    let pos_packet = match packet.data {
        ogn_parser::AprsData::Position(ref pos_packet) => pos_packet,
        _ => return None,
    };

    let lat: f64 = pos_packet.latitude.as_();
    let lng: f64 = pos_packet.longitude.as_();
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        super::count_dropped(SOURCE_LABEL, "invalid");
        return None;
    }

    let (addr, addr_type) = match pos_packet.comment.id {
        Some(ref id) => {
            let addr: u32 = id.address.as_();
            let addr_type = match id.address_type {
                1 => AddrType::Icao,
                _ => AddrType::NonIcao,
            };
            (addr, addr_type)
        }
        None => {
            super::count_dropped(SOURCE_LABEL, "invalid");
            return None;
        }
    };
    if addr == 0 {
        super::count_dropped(SOURCE_LABEL, "invalid");
        return None;
    }

    let track = pos_packet.comment.course.filter(|&c| c < 360).map(|c| c as f32);
    let speed_kt = pos_packet.comment.speed.map(|s| s as f32);
    let alt_feet = pos_packet.comment.altitude.map(|a| a as i32);
    let vvel_fpm = pos_packet.comment.climb_rate.map(|c| (c as f32 * MPS_TO_FPM) as i32);
    let turn_rate_dps = pos_packet.comment.turn_rate.and_then(|t| t.to_string().parse::<f32>().ok());
    let signal_level = pos_packet.comment.signal_quality.and_then(|s| s.to_string().parse::<f32>().ok());
    let squawk = pos_packet.comment.squawk.as_ref().and_then(|s| s.to_string().parse::<u16>().ok());
    let tail = pos_packet.comment.flight_number.clone();

    Some(PartialTarget {
        addr,
        addr_type,
        lat: Some(lat),
        lng: Some(lng),
        alt_feet,
        alt_is_gnss: Some(false),
        track,
        speed_kt,
        vvel_fpm,
        turn_rate_dps,
        tail,
        emitter_category: None,
        squawk,
        nic: None,
        nacp: None,
        sil: None,
        signal_level,
        on_ground: None,
        target_type: Some(TargetType::Other),
        source: Source::Aprs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_input() {
        assert!(parse_line("this is not an aprs packet at all").is_none());
    }
}
