//! Traffic store (component B): a single coarse-locked map, address-keyed, with source-priority
//! merge rules and post-processing run inside the critical section (§4.B, §5).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::model::{store_key, Derived, Identity, Integrity, PartialTarget, Position, Provenance, Signal, Target, Velocity};
use crate::postproc::PostProcessor;

const PRECEDENCE_WINDOW: Duration = Duration::from_secs(5);

/// Concurrent map address→Target protected by one mutex (§4.B, §5: holding-time must be bounded
/// and post-processing happens *inside* the lock so observers never see a torn update).
pub struct TrafficStore {
    inner: Mutex<HashMap<u32, Target>>,
    post: PostProcessor,
}

impl TrafficStore {
    pub fn new(post: PostProcessor) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            post,
        }
    }

    /// Merge a partial update into the store under the source-priority rules of §3 invariant 5,
    /// running the post-processor inside the same critical section.
    pub fn put(&self, update: PartialTarget, now: Instant) {
        let key = store_key(update.addr, update.addr_type);
        let mut map = self.inner.lock().expect("traffic store mutex poisoned");

        let entry = map.entry(key).or_insert_with(|| fresh_target(&update, now));

        if !accept(entry, &update, now) {
            trace!(addr = update.addr, source = ?update.source, "dropped by source-priority rule");
            return;
        }

        apply(entry, &update, now);
        self.post.run(entry, now);
    }

    pub fn remove(&self, key: u32) {
        self.inner.lock().expect("traffic store mutex poisoned").remove(&key);
    }

    /// Defensive copy of every tracked target, for readers that must not hold the store lock.
    pub fn snapshot(&self) -> Vec<Target> {
        self.inner
            .lock()
            .expect("traffic store mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Iterate and mutate every target under the lock. `f` must not suspend on I/O (§5).
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut Target)) {
        let mut map = self.inner.lock().expect("traffic store mutex poisoned");
        for target in map.values_mut() {
            f(target);
        }
    }

    /// Remove every target whose retention window has elapsed (§4.E.2).
    pub fn reap(&self, now: Instant) {
        let mut map = self.inner.lock().expect("traffic store mutex poisoned");
        map.retain(|_, t| now.saturating_duration_since(t.last_seen) <= t.provenance.last_source.retention());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("traffic store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `update` from `update.source` may overwrite `entry` (§3 invariant 5): strictly
/// higher priority, same source, or the incumbent's last message is older than the 5 s
/// precedence window.
fn accept(entry: &Target, update: &PartialTarget, now: Instant) -> bool {
    if entry.signal.received_msgs == 0 {
        return true;
    }
    let incumbent = entry.provenance.last_source;
    if update.source == incumbent {
        return true;
    }
    if update.source.priority() < incumbent.priority() {
        return true;
    }
    now.saturating_duration_since(entry.last_seen) > PRECEDENCE_WINDOW
}

fn fresh_target(update: &PartialTarget, now: Instant) -> Target {
    Target {
        addr: update.addr,
        addr_type: update.addr_type,
        position: Position::default(),
        position_fix: Position::default(),
        position_fix_alt: 0,
        alt: 0,
        alt_is_gnss: false,
        velocity: Velocity::default(),
        integrity: Integrity::default(),
        identity: Identity::default(),
        provenance: Provenance {
            last_source: update.source,
            target_type: update.target_type.unwrap_or(crate::model::TargetType::Other),
        },
        signal: Signal::default(),
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

/// Merge the known fields of `update` into `entry`. Clears the extrapolation flag and rewrites
/// `position_fix` whenever a fresh position measurement arrives (§4.E.1).
fn apply(entry: &mut Target, update: &PartialTarget, now: Instant) {
    entry.provenance.last_source = update.source;
    if let Some(tt) = update.target_type {
        entry.provenance.target_type = tt;
    }

    if let (Some(lat), Some(lng)) = (update.lat, update.lng) {
        entry.position = Position {
            lat,
            lng,
            valid: true,
            extrapolated: false,
        };
        entry.position_fix = entry.position;
    }
    if let Some(alt) = update.alt_feet {
        entry.alt = alt;
        entry.position_fix_alt = alt;
        entry.last_alt = now;
    }
    if let Some(gnss) = update.alt_is_gnss {
        entry.alt_is_gnss = gnss;
    }
    if let Some(track) = update.track {
        entry.velocity.track = track;
    }
    if let Some(speed) = update.speed_kt {
        entry.velocity.speed_kt = speed;
        entry.velocity.speed_valid = true;
        entry.last_speed = now;
    }
    if let Some(vvel) = update.vvel_fpm {
        entry.velocity.vvel_fpm = vvel;
    }
    if let Some(tr) = update.turn_rate_dps {
        entry.velocity.turn_rate_dps = tr;
    }
    if update.tail.is_some() {
        entry.identity.tail = update.tail.clone();
    }
    if let Some(ec) = update.emitter_category {
        entry.identity.emitter_category = ec;
    }
    if update.squawk.is_some() {
        entry.identity.squawk = update.squawk;
    }
    if let Some(nic) = update.nic {
        entry.integrity.nic = nic;
    }
    if let Some(nacp) = update.nacp {
        entry.integrity.nacp = nacp;
    }
    if let Some(sil) = update.sil {
        entry.integrity.sil = sil;
    }
    if let Some(sig) = update.signal_level {
        entry.signal.signal_level = sig;
    }
    if let Some(og) = update.on_ground {
        entry.derived.on_ground = og;
    }

    entry.signal.received_msgs += 1;
    entry.last_seen = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddrType, Source};
    use crate::postproc::PostProcessor;
    use crate::situation::OwnSituation;
    use std::sync::Arc;

    fn store() -> TrafficStore {
        TrafficStore::new(PostProcessor::new(Arc::new(OwnSituation::default())))
    }

    fn update(addr: u32, source: Source) -> PartialTarget {
        PartialTarget {
            addr,
            addr_type: AddrType::Icao,
            lat: Some(43.99),
            lng: Some(-88.56),
            alt_feet: Some(5000),
            source,
            ..Default::default()
        }
    }

    #[test]
    fn basic_put_and_snapshot() {
        let store = store();
        let now = Instant::now();
        store.put(update(0xA12345, Source::Es1090), now);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].addr, 0xA12345);
        assert_eq!(snap[0].key(), 0xA12345);
    }

    #[test]
    fn nonicao_key_has_bit_24_set() {
        let store = store();
        let now = Instant::now();
        let mut u = update(0xABC123, Source::Ogn);
        u.addr_type = AddrType::NonIcao;
        store.put(u, now);
        let snap = store.snapshot();
        assert_eq!(snap[0].key(), (1 << 24) | 0xABC123);
    }

    #[test]
    fn lower_priority_source_cannot_overwrite_within_window() {
        let store = store();
        let now = Instant::now();
        store.put(update(0xABC123, Source::Es1090), now);
        let mut aprs_update = update(0xABC123, Source::Aprs);
        aprs_update.tail = Some("SHOULDNOTSTICK".to_string());
        store.put(aprs_update, now + Duration::from_secs(2));
        let snap = store.snapshot();
        assert_eq!(snap[0].provenance.last_source.priority(), Source::Es1090.priority());
        assert_ne!(snap[0].identity.tail.as_deref(), Some("SHOULDNOTSTICK"));
    }

    #[test]
    fn reap_removes_stale_targets() {
        let store = store();
        let now = Instant::now();
        store.put(update(0xABC123, Source::Es1090), now);
        store.reap(now + Duration::from_secs(61));
        assert!(store.is_empty());
    }
}
