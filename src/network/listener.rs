use std::net::SocketAddr;

use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{response, NetworkError, NetworkResult};

pub type ConnectionReceiver = mpsc::Receiver<Connection>;

/// An accepted connection, tagged with the listener that accepted it.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    port: u16,
    peer: SocketAddr,
    local: SocketAddr,
}

impl Connection {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Writes the fixed response for this listener's port and closes the
    /// connection. The stream is dropped on both the success and the error
    /// path.
    pub async fn respond(self) -> NetworkResult<()> {
        let Connection {
            mut stream, port, ..
        } = self;
        let bytes = response::http_ok(&response::port_body(port));
        stream
            .write_all(&bytes)
            .await
            .map_err(|source| NetworkError::Write { port, source })?;
        if let Err(e) = stream.shutdown().await {
            debug!(port, error = %e, "Connection shutdown failed");
        }
        Ok(())
    }
}

pub struct Listener {
    inner: TcpListener,
    port: u16,
}

impl Listener {
    /// Binds `host:port`. Port 0 picks an ephemeral port; [`Listener::port`]
    /// reports the one actually bound.
    pub async fn bind(host: &str, port: u16) -> NetworkResult<Self> {
        let inner = TcpListener::bind((host, port))
            .await
            .map_err(|source| NetworkError::Bind {
                host: host.to_string(),
                port,
                source,
            })?;
        let port = inner
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(port);
        info!(host, port, "Listener bound");
        Ok(Self { inner, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Starts the accept loop on its own task. The loop has no stop
    /// condition of its own; it only ends once the receiver is gone.
    pub fn spawn(self, capacity: usize) -> (ConnectionReceiver, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.accept_loop(tx));
        (rx, handle)
    }

    async fn accept_loop(self, tx: mpsc::Sender<Connection>) {
        let port = self.port;
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    let local = stream
                        .local_addr()
                        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
                    debug!(port, peer = %peer, "Connection accepted");
                    let connection = Connection {
                        stream,
                        port,
                        peer,
                        local,
                    };
                    if tx.send(connection).await.is_err() {
                        debug!(port, "Connection channel closed, accept loop ending");
                        return;
                    }
                }
                Err(e) => {
                    warn!(port, error = %e, "Accept failed");
                }
            }
        }
    }
}
