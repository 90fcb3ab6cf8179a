//! Data model shared across the store, ingest adapters, and output codecs (§3).

use tokio::time::Instant;

/// Address type as carried by a target; determines store-key discipline (§3 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrType {
    Icao,
    NonIcao,
    TisB,
    AdsR,
}

impl AddrType {
    pub fn is_icao(self) -> bool {
        matches!(self, AddrType::Icao)
    }

    /// GDL90 address-type nibble (§4.G), used by the traffic/ownship report builders.
    pub fn gdl90_code(self) -> u8 {
        match self {
            AddrType::Icao => 0,
            AddrType::NonIcao => 1,
            AddrType::TisB => 2,
            AddrType::AdsR => 5,
        }
    }
}

/// Compute the store key from an address and its type (§3, §4.B).
///
/// `key = addr` for ICAO addresses; `key = (1<<24) | addr` otherwise. This is the single place
/// the rest of the crate should call — adapters must never roll their own key arithmetic.
pub fn store_key(addr: u32, addr_type: AddrType) -> u32 {
    if addr_type.is_icao() {
        addr & 0x00FF_FFFF
    } else {
        (1 << 24) | (addr & 0x00FF_FFFF)
    }
}

/// Ingest source, used for source-priority arbitration (§3 invariant 5) and retention (§4.E.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Es1090,
    Uat,
    Ogn,
    Flarm,
    Aprs,
    Ais,
}

impl Source {
    /// Lower number = higher priority. 1090ES > UAT > OGN/FLARM > APRS.
    pub fn priority(self) -> u8 {
        match self {
            Source::Es1090 => 0,
            Source::Uat => 1,
            Source::Ogn | Source::Flarm => 2,
            Source::Aprs => 3,
            Source::Ais => 3,
        }
    }

    /// Retention window before the reaper removes a target from this source (§4.E.2).
    pub fn retention(self) -> std::time::Duration {
        match self {
            Source::Ais => std::time::Duration::from_secs(900),
            _ => std::time::Duration::from_secs(60),
        }
    }

    /// Two-letter provenance prefix used when `DisplayTrafficSource` is enabled (§6).
    pub fn display_prefix(self) -> &'static str {
        match self {
            Source::Ogn => "og",
            Source::Flarm => "fl",
            Source::Es1090 | Source::Uat => "ic",
            Source::Aprs => "un",
            Source::Ais => "un",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    AdsB,
    TisB,
    Mlat,
    ModeS,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    pub valid: bool,
    pub extrapolated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub track: f32,
    pub speed_kt: f32,
    pub speed_valid: bool,
    pub vvel_fpm: i32,
    pub turn_rate_dps: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Integrity {
    pub nic: u8,
    pub nacp: u8,
    pub sil: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub tail: Option<String>,
    pub emitter_category: u8,
    pub squawk: Option<u16>,
}

#[derive(Debug, Clone, Copy)]
pub struct Provenance {
    pub last_source: Source,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Signal {
    pub signal_level: f32,
    pub received_msgs: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Derived {
    pub distance_m: f64,
    pub distance_est_m: f64,
    pub bearing_dist_valid: bool,
    pub on_ground: bool,
    pub priority_status: u8,
}

/// A single tracked aircraft (§3).
#[derive(Debug, Clone)]
pub struct Target {
    pub addr: u32,
    pub addr_type: AddrType,
    pub position: Position,
    /// Last *measured* lat/lng/alt; untouched by extrapolation ticks (§3 invariant 2).
    pub position_fix: Position,
    pub position_fix_alt: i32,
    pub alt: i32,
    pub alt_is_gnss: bool,
    pub velocity: Velocity,
    pub integrity: Integrity,
    pub identity: Identity,
    pub provenance: Provenance,
    pub signal: Signal,
    pub derived: Derived,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub last_alt: Instant,
    pub last_speed: Instant,
    pub last_extrapolation: Instant,
    pub distance_est_last_ts: Instant,
    /// Set by the ownship detector (§4.F); suppressed targets are kept for diagnostics.
    pub should_ignore: bool,
}

impl Target {
    pub fn key(&self) -> u32 {
        store_key(self.addr, self.addr_type)
    }
}

/// A sparse update synthesized by an ingest adapter: `Some` fields are known, `None` are left
/// untouched on merge (§4.C).
#[derive(Debug, Clone, Default)]
pub struct PartialTarget {
    pub addr: u32,
    pub addr_type: AddrType,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub alt_feet: Option<i32>,
    pub alt_is_gnss: Option<bool>,
    pub track: Option<f32>,
    pub speed_kt: Option<f32>,
    pub vvel_fpm: Option<i32>,
    pub turn_rate_dps: Option<f32>,
    pub tail: Option<String>,
    pub emitter_category: Option<u8>,
    pub squawk: Option<u16>,
    pub nic: Option<u8>,
    pub nacp: Option<u8>,
    pub sil: Option<u8>,
    pub signal_level: Option<f32>,
    pub on_ground: Option<bool>,
    pub target_type: Option<TargetType>,
    pub source: Source,
}

impl Default for AddrType {
    fn default() -> Self {
        AddrType::Icao
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::Es1090
    }
}

/// Shared test fixtures, used by unit tests across several modules.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use tokio::time::Instant;

    pub fn sample_target() -> Target {
        let now = Instant::now();
        Target {
            addr: 0xABCDEF,
            addr_type: AddrType::Icao,
            position: Position {
                lat: 43.99,
                lng: -88.56,
                valid: true,
                extrapolated: false,
            },
            position_fix: Position {
                lat: 43.99,
                lng: -88.56,
                valid: true,
                extrapolated: false,
            },
            position_fix_alt: 5000,
            alt: 5000,
            alt_is_gnss: false,
            velocity: Velocity {
                track: 90.0,
                speed_kt: 120.0,
                speed_valid: true,
                vvel_fpm: 0,
                turn_rate_dps: 0.0,
            },
            integrity: Integrity { nic: 8, nacp: 8, sil: 2 },
            identity: Identity {
                tail: Some("N12345".to_string()),
                emitter_category: 1,
                squawk: Some(1200),
            },
            provenance: Provenance {
                last_source: Source::Es1090,
                target_type: TargetType::AdsB,
            },
            signal: Signal {
                signal_level: -20.0,
                received_msgs: 1,
            },
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
}
