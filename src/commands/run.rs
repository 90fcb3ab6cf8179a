//! `run` subcommand (§4.K): wires config load → tracing init → metrics zero-init → per-protocol
//! ingest tasks → extrapolator/reaper tick task → output-builder tick task → per-sink dispatcher
//! tasks, all coordinated by a `CancellationToken`, then waits for Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{self, TrafficConfig};
use crate::extrapolate;
use crate::ingest;
use crate::intake::LineSocketServer;
use crate::log_format;
use crate::metrics_init;
use crate::model::PartialTarget;
use crate::output;
use crate::ownship::OwnshipConfig;
use crate::postproc::PostProcessor;
use crate::sink;
use crate::situation::{OwnSituation, OwnshipSingleton};
use crate::store::TrafficStore;

const INTAKE_QUEUE_SIZE: usize = 1000;
const SOCKET_DIR: &str = "/run/soar-traffic";

pub async fn handle_run(config_path: Option<PathBuf>) -> Result<()> {
    log_format::init();
    Clock::new().set_real_time_reference(chrono::Utc::now());

    let path = config_path.unwrap_or_else(config::config_path);
    let cfg = match TrafficConfig::load(&path) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = %err, ?path, "failed to load config, falling back to defaults");
            TrafficConfig::default()
        }
    };

    let situation = Arc::new(OwnSituation::default());
    let ownship_state = Arc::new(OwnshipSingleton::default());
    let ownship_cfg = Arc::new(std::sync::RwLock::new(OwnshipConfig {
        mode_s_addrs: cfg.ownship_addrs(),
        ogn_addr: cfg.ogn_addr_parsed(),
    }));

    let post = PostProcessor::with_ownship(situation.clone(), ownship_state.clone(), ownship_cfg.clone());
    let store = Arc::new(TrafficStore::new(post));

    let sinks = Arc::new(output::build_sinks(&cfg.network_outputs));
    let sink_names: Vec<String> = sinks.iter().map(|s| s.name.clone()).collect();
    metrics_init::init(&sink_names);

    let shutdown = CancellationToken::new();

    spawn_intake_tasks(&cfg, store.clone(), situation.clone(), shutdown.clone()).await?;

    tokio::spawn(extrapolate::run(store.clone(), shutdown.clone()));
    tokio::spawn(output::run(store.clone(), situation.clone(), ownship_state.clone(), sinks.clone(), shutdown.clone()));

    for (output_cfg, s) in cfg.network_outputs.iter().zip(sinks.iter()) {
        let target: SocketAddr = format!("{}:{}", output_cfg.host, output_cfg.port).parse()?;
        let name = s.name.clone();
        let queue = s.queue.clone();
        let sink_shutdown = shutdown.clone();
        tokio::spawn(async move {
            sink::run_udp_sink(name, target, queue, sink_shutdown).await;
        });
    }

    info!("soar-traffic running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining");
    shutdown.cancel();
    for s in sinks.iter() {
        s.queue.close();
    }
    Ok(())
}

async fn spawn_intake_tasks(cfg: &TrafficConfig, store: Arc<TrafficStore>, situation: Arc<OwnSituation>, shutdown: CancellationToken) -> Result<()> {
    if cfg.es_enabled {
        spawn_line_protocol(store.clone(), situation.clone(), "es1090", ingest::es1090::parse_line, shutdown.clone()).await?;
    }
    if cfg.uat_enabled {
        spawn_line_protocol(store.clone(), situation.clone(), "uat", ingest::uat::parse_line, shutdown.clone()).await?;
    }
    if cfg.ogn_enabled {
        spawn_line_protocol(store.clone(), situation.clone(), "ogn", ingest::ogn::parse_line, shutdown.clone()).await?;
        // FLARM-NMEA from an external tracker shares the OGN toggle: the config schema (§6) has
        // no separate enable flag for it, and Source::Ogn/Flarm already share a priority class.
        spawn_flarm_nmea(store.clone(), situation.clone(), shutdown.clone()).await?;
    }
    if cfg.aprs_enabled {
        spawn_line_protocol(store.clone(), situation.clone(), "aprs", ingest::aprs::parse_line, shutdown.clone()).await?;
    }
    Ok(())
}

fn socket_path(label: &str) -> PathBuf {
    PathBuf::from(SOCKET_DIR).join(format!("{label}.sock"))
}

/// Bind an intake socket for one protocol, accept connections, and drain parsed lines into the
/// store. Grounded on the reference crate's `socket_server.rs` accept/worker split.
async fn spawn_line_protocol(store: Arc<TrafficStore>, situation: Arc<OwnSituation>, label: &'static str, parse: fn(&str) -> Option<PartialTarget>, shutdown: CancellationToken) -> Result<()> {
    let (tx, rx) = flume::bounded::<String>(INTAKE_QUEUE_SIZE);
    let server = LineSocketServer::start(socket_path(label), label).await?;
    tokio::spawn(server.accept_loop(tx));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                line = rx.recv_async() => {
                    match line {
                        Ok(line) => {
                            if let Some(update) = parse(&line) {
                                ingest::merge_and_store(&store, label, update, Instant::now(), &situation);
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });
    Ok(())
}

async fn spawn_flarm_nmea(store: Arc<TrafficStore>, situation: Arc<OwnSituation>, shutdown: CancellationToken) -> Result<()> {
    let (tx, rx) = flume::bounded::<String>(INTAKE_QUEUE_SIZE);
    let server = LineSocketServer::start(socket_path("flarm_nmea"), "flarm_nmea").await?;
    tokio::spawn(server.accept_loop(tx));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                line = rx.recv_async() => {
                    match line {
                        Ok(line) => {
                            let now = Instant::now();
                            let trimmed = line.trim_start_matches('$');
                            let update = if trimmed.starts_with("PFLAU") {
                                ingest::flarm_nmea::parse_pflau(&line, &situation, now)
                            } else {
                                ingest::flarm_nmea::parse_pflaa(&line, &situation, now)
                            };
                            if let Some(update) = update {
                                ingest::merge_and_store(&store, "flarm_nmea", update, now, &situation);
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });
    Ok(())
}
