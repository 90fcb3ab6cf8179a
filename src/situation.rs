//! Global GPS/baro/AHRS situation and system status singletons (§3, §4.N — ambient).
//!
//! Each is behind its own mutex per §5's lock-ordering rule: situation → traffic store → queue.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct GpsFix {
    pub lat: f64,
    pub lng: f64,
    pub alt_msl_m: f64,
    pub alt_hae_m: f64,
    pub ground_speed_kt: f32,
    pub true_course: f32,
    pub fix_quality: u8,
    pub accuracy_m: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AhrsState {
    pub pitch: f32,
    pub roll: f32,
    pub heading: f32,
    pub baro_alt_ft: Option<i32>,
}

/// Process-wide GPS/baro/AHRS situation (§3 "Shared singletons").
#[derive(Default)]
pub struct OwnSituation {
    inner: Mutex<SituationInner>,
}

#[derive(Default)]
struct SituationInner {
    gps: Option<GpsFix>,
    gps_updated_at: Option<Instant>,
    ahrs: AhrsState,
}

impl OwnSituation {
    pub fn set_gps(&self, fix: GpsFix, now: Instant) {
        let mut inner = self.inner.lock().expect("situation mutex poisoned");
        inner.gps = Some(fix);
        inner.gps_updated_at = Some(now);
    }

    pub fn set_ahrs(&self, ahrs: AhrsState) {
        self.inner.lock().expect("situation mutex poisoned").ahrs = ahrs;
    }

    pub fn ahrs(&self) -> AhrsState {
        self.inner.lock().expect("situation mutex poisoned").ahrs
    }

    /// A GPS fix is valid if present and received within the last 10 s with a non-zero quality.
    pub fn gps(&self, now: Instant) -> Option<GpsFix> {
        let inner = self.inner.lock().expect("situation mutex poisoned");
        match (inner.gps, inner.gps_updated_at) {
            (Some(fix), Some(updated))
                if now.saturating_duration_since(updated) <= std::time::Duration::from_secs(10)
                    && fix.fix_quality >= 1 =>
            {
                Some(fix)
            }
            _ => None,
        }
    }
}

/// `OwnshipTrafficInfo` (§4.F): the most recent target that passed full ownship verification.
#[derive(Default)]
pub struct OwnshipSingleton {
    inner: Mutex<Option<(u32, Instant)>>,
}

impl OwnshipSingleton {
    pub fn mark_detected(&self, addr: u32, now: Instant) {
        *self.inner.lock().expect("ownship singleton mutex poisoned") = Some((addr, now));
    }

    /// `is_detected_ownship_valid()`: the last detection was within 10 s.
    pub fn is_valid(&self, now: Instant) -> bool {
        match *self.inner.lock().expect("ownship singleton mutex poisoned") {
            Some((_, last_seen)) => now.saturating_duration_since(last_seen) <= std::time::Duration::from_secs(10),
            None => false,
        }
    }

    /// The most recently detected ownship address, if the detection is still within its
    /// validity window.
    pub fn addr(&self, now: Instant) -> Option<u32> {
        match *self.inner.lock().expect("ownship singleton mutex poisoned") {
            Some((addr, last_seen)) if now.saturating_duration_since(last_seen) <= std::time::Duration::from_secs(10) => Some(addr),
            _ => None,
        }
    }
}

/// The `globalStatus.Errors` surface (§7): deduplicated-by-id error list plus version/uptime.
#[derive(Default)]
pub struct SystemStatus {
    inner: Mutex<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    errors: BTreeMap<String, String>,
}

impl SystemStatus {
    pub fn add_error(&self, id: impl Into<String>, message: impl Into<String>) {
        let mut inner = self.inner.lock().expect("status mutex poisoned");
        inner.errors.insert(id.into(), message.into());
    }

    pub fn remove_error(&self, id: &str) {
        self.inner.lock().expect("status mutex poisoned").errors.remove(id);
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .expect("status mutex poisoned")
            .errors
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_deduplicated_by_id() {
        let status = SystemStatus::default();
        status.add_error("gps", "no fix");
        status.add_error("gps", "fix lost again");
        assert_eq!(status.errors().len(), 1);
        status.remove_error("gps");
        assert!(status.errors().is_empty());
    }

    #[test]
    fn gps_invalid_without_recent_update() {
        let sit = OwnSituation::default();
        assert!(sit.gps(Instant::now()).is_none());
    }

    #[test]
    fn ownship_detection_expires_after_ten_seconds() {
        let ownship = OwnshipSingleton::default();
        let now = Instant::now();
        ownship.mark_detected(0xA12345, now);
        assert!(ownship.is_valid(now));
        assert!(!ownship.is_valid(now + std::time::Duration::from_secs(11)));
    }
}
