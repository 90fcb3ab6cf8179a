//! Sink dispatcher (component J, §4.J): one task per configured network output, draining the
//! shared priority queue and writing UDP datagrams; failures on one sink never block the others.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::queue::PriorityQueue;

const DRAIN_DEADLINE: Duration = Duration::from_millis(500);

/// Run a single sink: bind a UDP socket, pop frames from `queue` and send them to `target`, until
/// `shutdown` fires. Grounded on the reference crate's per-connection task loop
/// (`socket_server.rs`'s `tokio::select!` over queue/shutdown).
pub async fn run_udp_sink(name: String, target: SocketAddr, queue: Arc<PriorityQueue>, shutdown: CancellationToken) {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(err) => {
            warn!(sink = %name, error = %err, "failed to bind sink socket");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(sink = %name, "sink shutting down");
                return;
            }
            _ = queue.data_available() => {}
            _ = tokio::time::sleep(DRAIN_DEADLINE) => {}
        }

        let now = tokio::time::Instant::now();
        while let Some((frame, _priority)) = queue.pop_first(now) {
            match socket.send_to(&frame, target).await {
                Ok(_) => {
                    metrics::counter!("sink.frames_sent_total", "sink" => name.clone()).increment(1);
                }
                Err(err) => {
                    warn!(sink = %name, error = %err, "send failed, isolating sink");
                    metrics::counter!("queue.send_blocked_total", "sink" => name.clone()).increment(1);
                    break;
                }
            }
        }
        metrics::gauge!("queue.depth", "sink" => name.clone()).set(queue.len() as f64);

        if queue.is_closed() {
            debug!(sink = %name, "queue closed, sink exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_deadline_is_sub_second() {
        assert!(DRAIN_DEADLINE < Duration::from_secs(1));
    }
}
