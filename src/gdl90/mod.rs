//! GDL90 output codec (component G, §4.G): CRC, framing, and message builders.

pub mod crc;
pub mod encode;
pub mod frame;
pub mod types;

pub use encode::{foreflight_id, heartbeat, mode_s_fake_targets, ownship_geometric_altitude, ownship_report, stratux_heartbeat, stratux_status, traffic_report, Tower};
pub use frame::frame;
