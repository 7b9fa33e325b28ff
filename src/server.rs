//! Local static file server for the page under test.
//!
//! The listener is owned by [`ServerHandle`] and released when the handle is
//! shut down or dropped, so repeated runs in one process can reuse a port.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::error::{HarnessError, Result};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Bound, not yet confirmed to accept connections.
    Starting,
    Ready,
    /// Readiness was never confirmed.
    Failed,
    Stopped,
}

/// A running static file server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    root: PathBuf,
    state: ServerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Bind `host:port` and serve files under `root`. Port 0 picks a free port.
///
/// No per-request logging layer is installed.
pub async fn start(root: impl AsRef<Path>, host: &str, port: u16) -> Result<ServerHandle> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(HarnessError::InvalidRoot {
            path: root.to_path_buf(),
        });
    }
    let root = root
        .canonicalize()
        .map_err(|_| HarnessError::InvalidRoot {
            path: root.to_path_buf(),
        })?;

    let bind_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|source| HarnessError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;
    let addr = listener.local_addr().map_err(|source| HarnessError::Bind {
        addr: bind_addr.clone(),
        source,
    })?;

    let app = Router::new().fallback_service(ServeDir::new(&root));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!("Static server exited with error: {}", e);
        }
    });

    tracing::info!("Serving {} on http://{}", root.display(), addr);

    Ok(ServerHandle {
        addr,
        root,
        state: ServerState::Starting,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

/// Poll a TCP connect against the bound address until it succeeds or
/// `timeout` elapses. A timeout is reported as `false`, never as an error.
pub async fn await_ready(handle: &mut ServerHandle, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if TcpStream::connect(handle.addr).await.is_ok() {
            handle.state = ServerState::Ready;
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("Server at {} not accepting after {:?}", handle.addr, timeout);
            handle.state = ServerState::Failed;
            return false;
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Stop accepting and wait for the listener to be released.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Static server task ended abnormally: {}", e);
            }
        }
        self.state = ServerState::Stopped;
        tracing::debug!("Static server on {} stopped", self.addr);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::assert_err;

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_files_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>served</h1>").unwrap();

        let mut handle = start(dir.path(), "127.0.0.1", 0).await.unwrap();
        assert_eq!(handle.state(), ServerState::Starting);
        assert!(await_ready(&mut handle, Duration::from_secs(5)).await);
        assert_eq!(handle.state(), ServerState::Ready);

        let response = http_get(handle.addr(), "/index.html").await;
        assert!(response.starts_with("HTTP/1.1 200"), "got: {}", response);
        assert!(response.contains("<h1>served</h1>"));

        let missing = http_get(handle.addr(), "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "got: {}", missing);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = assert_err!(start(&missing, "127.0.0.1", 0).await);
        assert!(matches!(err, HarnessError::InvalidRoot { .. }));
    }

    #[tokio::test]
    async fn test_rejects_file_as_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(&file, "x").unwrap();
        let err = assert_err!(start(&file, "127.0.0.1", 0).await);
        assert!(matches!(err, HarnessError::InvalidRoot { .. }));
    }

    #[tokio::test]
    async fn test_port_in_use_is_bind_error() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let err = assert_err!(start(dir.path(), "127.0.0.1", port).await);
        assert!(matches!(err, HarnessError::Bind { .. }), "got: {}", err);
    }

    #[tokio::test]
    async fn test_shutdown_releases_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = start(dir.path(), "127.0.0.1", 0).await.unwrap();
        let port = first.port();
        assert!(await_ready(&mut first, Duration::from_secs(5)).await);
        first.shutdown().await;

        let mut second = start(dir.path(), "127.0.0.1", port).await.unwrap();
        assert!(await_ready(&mut second, Duration::from_secs(5)).await);
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_await_ready_times_out_as_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = start(dir.path(), "127.0.0.1", 0).await.unwrap();
        // Point the readiness check at a port nobody listens on.
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        handle.addr = closed.local_addr().unwrap();
        drop(closed);

        assert!(!await_ready(&mut handle, Duration::from_millis(300)).await);
        assert_eq!(handle.state(), ServerState::Failed);
    }
}
