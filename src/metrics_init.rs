//! Metrics zero-initialization (component M, §4.M): named counters/gauges are touched once at
//! startup so dashboards never show "no data" before the first real event, matching the
//! reference crate's `metrics::counter!`/`gauge!` call sites.

const SOURCES: &[&str] = &["es1090", "uat", "ogn", "flarm", "aprs", "ais"];
const DROP_REASONS: &[&str] = &["malformed", "invalid", "source_conflict"];

/// Zero-initialize every named counter/gauge this crate emits, per §4.M.
pub fn init(sink_names: &[String]) {
    for source in SOURCES {
        metrics::counter!("ingest.messages_total", "source" => *source).increment(0);
        for reason in DROP_REASONS {
            metrics::counter!("ingest.dropped_total", "source" => *source, "reason" => *reason).increment(0);
        }
    }
    metrics::gauge!("store.targets").set(0.0);
    for sink in sink_names {
        metrics::gauge!("queue.depth", "sink" => sink.clone()).set(0.0);
        metrics::counter!("queue.send_blocked_total", "sink" => sink.clone()).increment(0);
        metrics::counter!("sink.frames_sent_total", "sink" => sink.clone()).increment(0);
    }
}
