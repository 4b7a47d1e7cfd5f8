use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::{mpsc, oneshot},
};

use crate::block_list::BlockList;
use crate::daemon::{DaemonEvent, DaemonStatus};

/// Largest request the listener accepts
const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

/// IPC request from CLI to daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum IpcRequest {
    Status,
    Shutdown,
    /// The overlay was dismissed by the user
    Dismiss,
    /// Replace the live block list
    SetBlocked(Vec<String>),
    /// Read the live block list
    ListBlocked,
    SetMonitoring(bool),
}

/// IPC response from daemon to CLI
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum IpcResponse {
    Status(DaemonStatus),
    Shutdown,
    Dismissed,
    BlockedCount(usize),
    Blocked(Vec<String>),
    Monitoring(bool),
    Error(String),
}

#[derive(Debug)]
pub struct IpcClient {
    sock_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(sock_path: &Path) -> Self {
        Self {
            sock_path: sock_path.to_path_buf(),
        }
    }

    /// Send one request and wait for the reply
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unreachable or the reply cannot be decoded
    pub async fn send_command(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.sock_path)
            .await
            .with_context(|| format!("Failed to connect to {}", self.sock_path.display()))?;

        let encoded = bincode::serialize(&request)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        let response: IpcResponse = bincode::deserialize(&buffer)?;

        Ok(response)
    }
}

/// Serves IPC requests by forwarding them into the daemon's event loop
pub struct DaemonIpcHandler {
    events_tx: mpsc::Sender<DaemonEvent>,
    block_list: BlockList,
    monitoring: Arc<AtomicBool>,
    shutdown_signal: Arc<AtomicBool>,
}

impl DaemonIpcHandler {
    pub fn new(
        events_tx: mpsc::Sender<DaemonEvent>,
        block_list: BlockList,
        monitoring: Arc<AtomicBool>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            events_tx,
            block_list,
            monitoring,
            shutdown_signal,
        }
    }

    /// Compute the reply for one request
    pub async fn respond(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Status => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if self.events_tx.send(DaemonEvent::Status(reply_tx)).await.is_err() {
                    return IpcResponse::Error("daemon event loop is not running".to_string());
                }
                match reply_rx.await {
                    Ok(status) => IpcResponse::Status(status),
                    Err(_) => IpcResponse::Error("daemon dropped the status request".to_string()),
                }
            }
            IpcRequest::Shutdown => {
                self.shutdown_signal.store(true, Ordering::SeqCst);
                // Wake the loop; it checks the flag after every event
                if self.events_tx.send(DaemonEvent::Shutdown).await.is_err() {
                    log::warn!("Shutdown requested but the daemon event loop is not running");
                }
                IpcResponse::Shutdown
            }
            IpcRequest::Dismiss => {
                if self
                    .events_tx
                    .send(DaemonEvent::OverlayDismissed)
                    .await
                    .is_err()
                {
                    return IpcResponse::Error("daemon event loop is not running".to_string());
                }
                IpcResponse::Dismissed
            }
            IpcRequest::SetBlocked(packages) => {
                let count = self.block_list.replace(packages);
                log::info!("Block list updated over IPC ({count} packages)");
                IpcResponse::BlockedCount(count)
            }
            IpcRequest::ListBlocked => IpcResponse::Blocked(self.block_list.snapshot()),
            IpcRequest::SetMonitoring(enabled) => {
                self.monitoring.store(enabled, Ordering::SeqCst);
                log::info!("Monitoring {}", if enabled { "enabled" } else { "disabled" });
                IpcResponse::Monitoring(enabled)
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if encoding or writing the response fails
    pub async fn handle(&self, stream: &mut UnixStream, request: IpcRequest) -> Result<()> {
        let response = self.respond(request).await;
        let encoded = bincode::serialize(&response)?;
        stream.write_all(&encoded).await?;
        Ok(())
    }
}

/// Accept IPC connections forever
///
/// # Errors
///
/// Returns an error if the socket cannot be bound
pub async fn listen(handler: Arc<DaemonIpcHandler>, sock_path: &Path) -> io::Result<()> {
    if sock_path.exists() {
        fs::remove_file(sock_path)?;
    }
    let listener = UnixListener::bind(sock_path)?;
    log::info!("IPC listening on {}", sock_path.display());

    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    // Clients shut down their write half after the request
                    let mut buf = Vec::new();
                    match (&mut stream).take(MAX_REQUEST_BYTES).read_to_end(&mut buf).await {
                        Ok(n) if n > 0 => match bincode::deserialize::<IpcRequest>(&buf) {
                            Ok(request) => {
                                if let Err(e) = handler.handle(&mut stream, request).await {
                                    log::error!("IPC handle error: {e}");
                                }
                            }
                            Err(e) => {
                                log::error!("IPC deserialize error: {e}");
                            }
                        },
                        Ok(_) => {} // Connection closed
                        Err(e) => {
                            log::error!("IPC read error: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("IPC accept error: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        handler: DaemonIpcHandler,
        rx: mpsc::Receiver<DaemonEvent>,
        list: BlockList,
        monitoring: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::channel(8);
        let list = BlockList::default();
        let monitoring = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handler = DaemonIpcHandler::new(tx, list.clone(), monitoring.clone(), shutdown.clone());
        Harness {
            handler,
            rx,
            list,
            monitoring,
            shutdown,
        }
    }

    #[tokio::test]
    async fn test_set_blocked_updates_shared_list() {
        let h = harness();
        let response = h
            .handler
            .respond(IpcRequest::SetBlocked(vec!["com.x".to_string(), "com.y".to_string()]))
            .await;

        assert_eq!(response, IpcResponse::BlockedCount(2));
        assert!(h.list.contains("com.y"));
    }

    #[tokio::test]
    async fn test_set_monitoring_flips_flag() {
        let h = harness();
        let response = h.handler.respond(IpcRequest::SetMonitoring(true)).await;

        assert_eq!(response, IpcResponse::Monitoring(true));
        assert!(h.monitoring.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dismiss_and_shutdown_forwarded() {
        let mut h = harness();

        assert_eq!(h.handler.respond(IpcRequest::Dismiss).await, IpcResponse::Dismissed);
        assert!(matches!(h.rx.recv().await, Some(DaemonEvent::OverlayDismissed)));

        assert_eq!(h.handler.respond(IpcRequest::Shutdown).await, IpcResponse::Shutdown);
        assert!(h.shutdown.load(Ordering::SeqCst));
        assert!(matches!(h.rx.recv().await, Some(DaemonEvent::Shutdown)));
    }

    #[tokio::test]
    async fn test_status_without_event_loop_is_error() {
        let Harness { handler, rx, .. } = harness();
        drop(rx);

        let response = handler.respond(IpcRequest::Status).await;
        assert!(matches!(response, IpcResponse::Error(_)));
    }

    #[tokio::test]
    async fn test_client_roundtrip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("warden.sock");
        let Harness {
            handler,
            rx: _rx,
            list,
            ..
        } = harness();
        let handler = Arc::new(handler);

        let listen_path = sock_path.clone();
        let server = tokio::spawn(async move { listen(handler, &listen_path).await });
        for _ in 0..50 {
            if sock_path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let client = IpcClient::new(&sock_path);
        let response = client
            .send_command(IpcRequest::SetBlocked(vec!["com.sock".to_string()]))
            .await
            .unwrap();

        assert_eq!(response, IpcResponse::BlockedCount(1));
        assert!(list.contains("com.sock"));
        server.abort();
    }

    #[tokio::test]
    async fn test_shutdown_without_event_loop_still_sets_flag() {
        let Harness { handler, rx, shutdown, .. } = harness();
        drop(rx);

        assert_eq!(handler.respond(IpcRequest::Shutdown).await, IpcResponse::Shutdown);
        assert!(shutdown.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_large_block_list_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("warden.sock");
        let Harness {
            handler,
            rx: _rx,
            list,
            ..
        } = harness();
        let handler = Arc::new(handler);

        let listen_path = sock_path.clone();
        let server = tokio::spawn(async move { listen(handler, &listen_path).await });
        for _ in 0..50 {
            if sock_path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        // Well past a single 4 KiB read
        let packages: Vec<String> = (0..200)
            .map(|i| format!("com.example.vendor.application.number{i:04}"))
            .collect();
        let client = IpcClient::new(&sock_path);
        let response = client
            .send_command(IpcRequest::SetBlocked(packages.clone()))
            .await
            .unwrap();
        assert_eq!(response, IpcResponse::BlockedCount(200));
        assert_eq!(list.len(), 200);

        let response = client.send_command(IpcRequest::ListBlocked).await.unwrap();
        assert_eq!(response, IpcResponse::Blocked(packages));
        server.abort();
    }
}
