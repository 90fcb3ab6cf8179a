//! Bit-packed report layout and scalar encoders shared by the ownship/traffic report builders
//! (§4.G). Field widths and ordering are grounded on a third-party GDL90 codec crate's
//! `Report`/`Altitude`/`Cord`/`Velocity` bit layout (decode direction), inverted here to encode.

use modular_bitfield::prelude::*;

/// The 18-byte numeric core of a traffic/ownship report: everything up to emitter category.
/// Callsign and the trailing emergency/spare nibble are appended separately by the caller since
/// they aren't naturally bitfield-shaped.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct ReportFields {
    pub alert_status: B4,
    pub address_type: B4,
    pub participant_address: B24,
    pub latitude: B24,
    pub longitude: B24,
    pub altitude: B12,
    pub misc: B4,
    pub nic: B4,
    pub nacp: B4,
    pub horizontal_velocity: B12,
    pub vertical_velocity: B12,
    pub track: B8,
    pub emitter_category: B8,
}

const LAT_LNG_RESOLUTION: f64 = 180.0 / 8_388_608.0; // 180 / 2^23

/// Encode a WGS-84 degree value into GDL90's 24-bit signed semicircle representation.
pub fn encode_lat_lng(degrees: f64) -> u32 {
    let raw = (degrees / LAT_LNG_RESOLUTION) as i32;
    (raw as u32) & 0x00FF_FFFF
}

pub const ALTITUDE_UNKNOWN: u16 = 0xFFF;
const ALTITUDE_MIN_FT: i32 = -1000;
const ALTITUDE_MAX_FT: i32 = 101_350;

/// Encode baro-corrected altitude in feet into GDL90's 12-bit, 25-ft-resolution, -1000-ft-biased
/// field, or the `0xFFF` unknown sentinel outside the representable range.
pub fn encode_altitude(alt_ft: i32) -> u16 {
    if alt_ft < ALTITUDE_MIN_FT || alt_ft > ALTITUDE_MAX_FT {
        return ALTITUDE_UNKNOWN;
    }
    (((alt_ft - ALTITUDE_MIN_FT) / 25) as u16) & 0x0FFF
}

pub const VELOCITY_UNAVAILABLE_12BIT: u16 = 0xFFF;
pub const VERTICAL_VELOCITY_UNAVAILABLE: u16 = 0x800;

/// Encode horizontal speed in knots into GDL90's 12-bit field (1 kt resolution), clamped to the
/// representable range; `None` encodes the "no data" sentinel.
pub fn encode_horizontal_velocity(speed_kt: Option<f32>) -> u16 {
    match speed_kt {
        Some(kt) if kt.is_finite() && kt >= 0.0 => (kt.round() as u16).min(0xFFE),
        _ => VELOCITY_UNAVAILABLE_12BIT,
    }
}

/// Encode vertical speed in ft/min into GDL90's 12-bit two's-complement field (64 ft/min
/// resolution); `None` encodes the "no data" sentinel.
pub fn encode_vertical_velocity(vvel_fpm: Option<i32>) -> u16 {
    match vvel_fpm {
        Some(fpm) => {
            let units = (fpm / 64).clamp(-511, 511);
            (units as i16 as u16) & 0x0FFF
        }
        None => VERTICAL_VELOCITY_UNAVAILABLE,
    }
}

/// Encode an 8-character callsign/tail, space-padded or truncated, as ASCII bytes.
pub fn encode_callsign(tail: Option<&str>) -> [u8; 8] {
    let mut out = [b' '; 8];
    if let Some(tail) = tail {
        for (slot, byte) in out.iter_mut().zip(tail.bytes()) {
            *slot = byte;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_fields_pack_to_eighteen_bytes() {
        let fields = ReportFields::new();
        assert_eq!(fields.into_bytes().len(), 18);
    }

    #[test]
    fn lat_lng_round_trip_is_close() {
        let encoded = encode_lat_lng(43.99);
        let decoded = (encoded as i32) as f64 * LAT_LNG_RESOLUTION;
        assert!((decoded - 43.99).abs() < 0.0001);
    }

    #[test]
    fn negative_longitude_encodes_as_twos_complement() {
        let encoded = encode_lat_lng(-88.56);
        assert_ne!(encoded & 0x0080_0000, 0, "sign bit should be set for negative longitude");
    }

    #[test]
    fn altitude_outside_range_is_unknown_sentinel() {
        assert_eq!(encode_altitude(-2000), ALTITUDE_UNKNOWN);
        assert_eq!(encode_altitude(200_000), ALTITUDE_UNKNOWN);
    }

    #[test]
    fn altitude_zero_feet_encodes_with_bias() {
        // 0 ft is 1000 ft above the -1000 ft floor, i.e. 40 units of 25 ft.
        assert_eq!(encode_altitude(0), 40);
    }

    #[test]
    fn callsign_is_space_padded() {
        let cs = encode_callsign(Some("N12345"));
        assert_eq!(&cs, b"N12345  ");
    }

    #[test]
    fn missing_vertical_velocity_is_sentinel() {
        assert_eq!(encode_vertical_velocity(None), VERTICAL_VELOCITY_UNAVAILABLE);
    }
}
