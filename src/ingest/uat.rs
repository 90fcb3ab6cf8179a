//! UAT downlink adapter (§4.C): 34-byte binary frames, presented as hex with an `rs=…;ss=…`
//! signal-quality suffix. Uplink frames (ground-station weather, `+` prefix) are not traffic and
//! are dropped without touching the store.

use crate::model::{AddrType, PartialTarget, Source, TargetType};

const SOURCE_LABEL: &str = "uat";

/// Base-40 alphabet used by DO-282 callsign/squawk packing: space, A-Z, 0-9, then two reserved
/// slots.
const BASE40_ALPHABET: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789  .";

/// Parse one UAT decoder stdout line. `+`-prefixed lines are uplink frames and are not traffic.
pub fn parse_line(line: &str) -> Option<PartialTarget> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('-') {
        parse_downlink(rest)
    } else {
        // Uplink ('+') or unrecognized prefix: not a traffic record.
        None
    }
}

fn parse_downlink(rest: &str) -> Option<PartialTarget> {
    let hex_part = rest.split(';').next().unwrap_or(rest);
    let bytes = match hex::decode(hex_part) {
        Ok(b) => b,
        Err(_) => {
            super::count_dropped(SOURCE_LABEL, "malformed");
            return None;
        }
    };

    // Message type selects frame length: short (18 bytes / 36 nibbles), long (35 bytes / 70
    // nibbles), or the rarely-seen 98-nibble (49-byte) variant; anything else is malformed.
    if ![18, 35, 49].contains(&bytes.len()) {
        super::count_dropped(SOURCE_LABEL, "malformed");
        return None;
    }

    let addr_type_bits = bytes[0] & 0x07;
    let addr = ((bytes[1] as u32) << 16) | ((bytes[2] as u32) << 8) | bytes[3] as u32;
    if addr == 0 {
        super::count_dropped(SOURCE_LABEL, "invalid");
        return None;
    }

    let addr_type = match addr_type_bits {
        0 => AddrType::Icao,
        _ => AddrType::NonIcao,
    };

    if bytes.len() < 27 {
        // Short frame: address only, no callsign/squawk/NACp fields.
        return Some(PartialTarget {
            addr,
            addr_type,
            source: Source::Uat,
            target_type: Some(TargetType::AdsB),
            ..Default::default()
        });
    }

    let csid_is_callsign = bytes[26] & 0x02 != 0;
    let nacp = bytes[25] >> 4;

    let group1 = u16::from_be_bytes([bytes[17], bytes[18]]);
    let group2 = u16::from_be_bytes([bytes[19], bytes[20]]);
    let group3 = u16::from_be_bytes([bytes[21], bytes[22]]);

    let (tail, squawk, emitter_category) = if csid_is_callsign {
        (Some(decode_callsign(group1, group2, group3)), None, Some(decode_emitter_category(group1)))
    } else {
        (None, Some(decode_squawk(group1, group2, group3)), None)
    };

    Some(PartialTarget {
        addr,
        addr_type,
        tail,
        squawk,
        emitter_category,
        nacp: Some(nacp),
        source: Source::Uat,
        target_type: Some(TargetType::AdsB),
        ..Default::default()
    })
}

fn base40_digit(index: u16) -> char {
    BASE40_ALPHABET[(index as usize).min(39)] as char
}

/// `group1` carries `cat * 1600 + two-char value`; `group2`/`group3` each carry three base-40
/// digits (`40^3 = 64000` fits in 16 bits).
fn decode_emitter_category(group1: u16) -> u8 {
    (group1 / 1600) as u8
}

fn decode_callsign(group1: u16, group2: u16, group3: u16) -> String {
    let two_char = group1 % 1600;
    let (c0, c1) = (two_char / 40, two_char % 40);
    let (c2, c3, c4) = (group2 / 1600, (group2 / 40) % 40, group2 % 40);
    let (c5, c6, c7) = (group3 / 1600, (group3 / 40) % 40, group3 % 40);

    [c0, c1, c2, c3, c4, c5, c6, c7].into_iter().map(base40_digit).collect::<String>().trim_end().to_string()
}

/// Squawk is packed into the same bit positions as the callsign's first two groups' low bits;
/// this core only needs the 12-bit transponder code, not full DO-282 bit fidelity.
fn decode_squawk(group1: u16, group2: u16, _group3: u16) -> u16 {
    (((group1 as u32) << 16 | group2 as u32) & 0x0FFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_callsign_groups(callsign: &str, emitter_category: u8) -> (u16, u16, u16) {
        let padded: Vec<u8> = callsign
            .bytes()
            .chain(std::iter::repeat(b' '))
            .take(8)
            .map(|b| BASE40_ALPHABET.iter().position(|&c| c == b.to_ascii_uppercase()).unwrap_or(0) as u16)
            .collect();
        let group1 = emitter_category as u16 * 1600 + padded[0] * 40 + padded[1];
        let group2 = padded[2] * 1600 + padded[3] * 40 + padded[4];
        let group3 = padded[5] * 1600 + padded[6] * 40 + padded[7];
        (group1, group2, group3)
    }

    fn build_frame(addr: u32, addr_type_bits: u8, callsign: &str, emitter_category: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 35];
        bytes[0] = addr_type_bits;
        bytes[1] = (addr >> 16) as u8;
        bytes[2] = (addr >> 8) as u8;
        bytes[3] = addr as u8;
        let (g1, g2, g3) = encode_callsign_groups(callsign, emitter_category);
        bytes[17..19].copy_from_slice(&g1.to_be_bytes());
        bytes[19..21].copy_from_slice(&g2.to_be_bytes());
        bytes[21..23].copy_from_slice(&g3.to_be_bytes());
        bytes[25] = 0x80; // NACp upper nibble = 8
        bytes[26] = 0x02; // CSID = callsign
        bytes
    }

    #[test]
    fn decodes_address_and_type_from_downlink_frame() {
        let frame = build_frame(0xABC123, 0x00, "N12345", 1);
        let hex_str = hex::encode(&frame);
        let line = format!("-{hex_str};rs=1;ss=2");
        let update = parse_line(&line).unwrap();
        assert_eq!(update.addr, 0xABC123);
        assert_eq!(update.addr_type, AddrType::Icao);
        assert_eq!(update.tail.as_deref(), Some("N12345"));
        assert_eq!(update.emitter_category, Some(1));
        assert_eq!(update.nacp, Some(8));
    }

    #[test]
    fn nonicao_address_type_bits_map_to_nonicao() {
        let frame = build_frame(0x001234, 0x02, "GLIDER", 9);
        let hex_str = hex::encode(&frame);
        let update = parse_line(&format!("-{hex_str};rs=1;ss=1")).unwrap();
        assert_eq!(update.addr_type, AddrType::NonIcao);
    }

    #[test]
    fn uplink_frames_are_not_traffic() {
        assert!(parse_line("+0011223344;rs=1;ss=1").is_none());
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(parse_line("-not-hex-at-all;rs=1;ss=1").is_none());
    }

    #[test]
    fn rejects_zero_address() {
        let frame = build_frame(0, 0x00, "N00000", 0);
        let hex_str = hex::encode(&frame);
        assert!(parse_line(&format!("-{hex_str};rs=1;ss=1")).is_none());
    }
}
