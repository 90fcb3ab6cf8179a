//! Ingest adapters (component C, §4.C): one module per upstream protocol, each normalizing its
//! raw record format into a `PartialTarget` and merging it into the shared traffic store.

pub mod aprs;
pub mod es1090;
pub mod flarm_nmea;
pub mod ogn;
pub mod uat;

use crate::geo::haversine_m;
use crate::model::PartialTarget;
use crate::situation::OwnSituation;
use crate::store::TrafficStore;
use tokio::time::Instant;
use tracing::trace;

const MAX_OWNSHIP_DISTANCE_M: f64 = 50_000.0;

/// Merge a successfully-parsed update into the store, counting it for metrics. Malformed/invalid
/// records never reach this function — adapters drop those before calling in (§7).
///
/// OGN/FLARM records carrying a position more than 50 km from the current own GPS fix are
/// rejected as semantically invalid (§4.C): these sources have no integrity bits protecting
/// against corrupted receiver telemetry the way 1090ES/UAT do.
pub fn merge_and_store(store: &TrafficStore, source_label: &'static str, update: PartialTarget, now: Instant, situation: &OwnSituation) {
    if matches!(source_label, "ogn" | "flarm_nmea") {
        if let (Some(lat), Some(lng), Some(gps)) = (update.lat, update.lng, situation.gps(now)) {
            if haversine_m(gps.lat, gps.lng, lat, lng) > MAX_OWNSHIP_DISTANCE_M {
                count_dropped(source_label, "invalid");
                return;
            }
        }
    }
    metrics::counter!("ingest.messages_total", "source" => source_label).increment(1);
    trace!(source = source_label, addr = update.addr, "merging ingest update");
    store.put(update, now);
}

/// Count a dropped record for metrics/diagnostics without touching the store (§7: malformed and
/// semantically-invalid records are dropped silently at the protocol layer, but never silent to
/// an operator watching metrics/trace logs).
pub fn count_dropped(source_label: &'static str, reason: &'static str) {
    metrics::counter!("ingest.dropped_total", "source" => source_label, "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddrType, Source};
    use crate::postproc::PostProcessor;
    use crate::situation::GpsFix;
    use std::sync::Arc;

    fn store_with_situation() -> (TrafficStore, Arc<OwnSituation>) {
        let situation = Arc::new(OwnSituation::default());
        let store = TrafficStore::new(PostProcessor::new(situation.clone()));
        (store, situation)
    }

    fn far_update(addr: u32) -> PartialTarget {
        PartialTarget {
            addr,
            addr_type: AddrType::NonIcao,
            lat: Some(10.0),
            lng: Some(10.0),
            source: Source::Ogn,
            ..Default::default()
        }
    }

    #[test]
    fn ogn_record_beyond_50km_from_ownship_is_dropped() {
        let (store, situation) = store_with_situation();
        let now = Instant::now();
        situation.set_gps(
            GpsFix {
                lat: 43.99,
                lng: -88.56,
                fix_quality: 1,
                ..Default::default()
            },
            now,
        );
        merge_and_store(&store, "ogn", far_update(0xABC123), now, &situation);
        assert!(store.is_empty());
    }

    #[test]
    fn ogn_record_within_50km_is_kept() {
        let (store, situation) = store_with_situation();
        let now = Instant::now();
        situation.set_gps(
            GpsFix {
                lat: 43.99,
                lng: -88.56,
                fix_quality: 1,
                ..Default::default()
            },
            now,
        );
        let mut u = far_update(0xABC123);
        u.lat = Some(43.99);
        u.lng = Some(-88.56);
        merge_and_store(&store, "ogn", u, now, &situation);
        assert_eq!(store.len(), 1);
    }
}
