//! Line-delimited Unix socket intake (ambient, §6): one socket per enabled protocol, accepting
//! connections from an external decoder process and forwarding each line into a bounded `flume`
//! channel. Grounded on the reference crate's `socket_server.rs` accept-loop idiom, adapted from
//! length-prefixed protobuf framing to newline-delimited text.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info, warn};

pub struct LineSocketServer {
    socket_path: PathBuf,
    listener: UnixListener,
    label: &'static str,
}

impl LineSocketServer {
    /// Bind a Unix socket at `socket_path`, removing any stale socket file first.
    pub async fn start<P: AsRef<Path>>(socket_path: P, label: &'static str) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        if socket_path.exists() {
            std::fs::remove_file(&socket_path).with_context(|| format!("failed to remove stale socket {socket_path:?}"))?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("failed to create socket directory {parent:?}"))?;
        }

        let listener = UnixListener::bind(&socket_path).with_context(|| format!("failed to bind unix socket {socket_path:?}"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o660)).with_context(|| format!("failed to set permissions on {socket_path:?}"))?;
        }

        info!(label, ?socket_path, "intake socket listening");
        Ok(Self { socket_path, listener, label })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections in a loop, spawning one reader task per connection; each line read is
    /// forwarded to `intake_tx`. Runs until the listener itself errors out.
    pub async fn accept_loop(self, intake_tx: flume::Sender<String>) {
        let mut connection_id = 0u64;
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    connection_id += 1;
                    let id = connection_id;
                    let label = self.label;
                    let tx = intake_tx.clone();
                    info!(label, connection_id = id, "intake connection accepted");
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, tx).await {
                            error!(label, connection_id = id, error = %err, "intake connection error");
                        }
                    });
                }
                Err(err) => {
                    error!(label = self.label, error = %err, "intake accept error");
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, intake_tx: flume::Sender<String>) -> Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await.context("failed to read intake line")? {
        if line.is_empty() {
            continue;
        }
        if intake_tx.is_full() {
            metrics::counter!("queue.send_blocked_total", "queue" => "intake").increment(1);
        }
        if intake_tx.send_async(line).await.is_err() {
            warn!("intake worker channel closed, dropping connection");
            return Ok(());
        }
    }
    Ok(())
}
