//! # Shutdown signal
//!
//! [`ShutdownSignal`] is a broadcast trigger the event loop subscribes to.
//! The binary forwards OS termination signals into it; tests and embedders
//! call [`ShutdownSignal::trigger`] directly.
//!
//! ## Signals
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`]

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ShutdownSignal {
    tx: broadcast::Sender<()>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Requests shutdown. Returns false if nobody is listening.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Forwards the first OS termination signal into this trigger.
    pub fn spawn_os_listener(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => {
                    info!("Termination signal received");
                    signal.trigger();
                }
                Err(e) => warn!(error = %e, "Failed to register signal handlers"),
            }
        })
    }
}

/// Completes when the process receives a termination signal, or errors if
/// the handlers cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
