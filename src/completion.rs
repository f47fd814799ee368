//! # Completion Tracker
//!
//! Counts the producers (workers, keyboard and file adapters) that still
//! write to the Result Channel. Every producer registers before launch and
//! receives a [`ProducerHandle`]; dropping the handle reports completion, so
//! a producer is released on every exit path, including early returns and
//! panics.
//!
//! The tracker owns the last sender of the Result Channel. Whoever performs
//! the transition of the counter from one to zero drops that sender, which is
//! the only close the channel ever sees. Listeners are not producers and are
//! never registered here.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::ResultEvent;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Result channel already closed, cannot register producer {name}")]
    Closed { name: String },
}

pub type TrackerResult<T> = Result<T, TrackerError>;

pub struct CompletionTracker {
    active: AtomicUsize,
    closed: AtomicBool,
    sender: Mutex<Option<mpsc::Sender<ResultEvent>>>,
}

impl CompletionTracker {
    pub fn new(sender: mpsc::Sender<ResultEvent>) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        })
    }

    /// Registers one producer. All producers must be registered before any of
    /// them is started, otherwise an early finisher could close the channel.
    pub fn register(self: &Arc<Self>, name: impl Into<String>) -> TrackerResult<ProducerHandle> {
        let name = name.into();
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sender = match guard.as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(TrackerError::Closed { name }),
        };
        // incremented under the lock so a concurrent close sees it
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        drop(guard);
        debug!(producer = %name, active, "Producer registered");
        Ok(ProducerHandle {
            name,
            sender: Some(sender),
            tracker: Arc::clone(self),
        })
    }

    /// Number of producers that have not reported completion yet.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the Result Channel if no producer was ever registered, so a
    /// run without producers still reaches completion.
    pub fn close_if_idle(&self) -> bool {
        let mut guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if self.active.load(Ordering::Acquire) != 0 {
            return false;
        }
        match guard.take() {
            Some(sender) => {
                self.closed.store(true, Ordering::Release);
                drop(sender);
                info!("No producers registered, result channel closed");
                true
            }
            None => false,
        }
    }

    /// Decrements the counter, never below zero. Returns true for the single
    /// call that closed the Result Channel.
    fn mark_done(&self, name: &str) -> bool {
        let previous = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                let mut guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
                if self.active.load(Ordering::Acquire) != 0 {
                    // re-registered in between, the new last producer closes
                    return false;
                }
                let Some(sender) = guard.take() else {
                    return false;
                };
                self.closed.store(true, Ordering::Release);
                drop(sender);
                drop(guard);
                info!(producer = %name, "Last producer finished, result channel closed");
                true
            }
            Ok(previous) => {
                debug!(producer = %name, active = previous - 1, "Producer finished");
                false
            }
            Err(_) => {
                warn!(producer = %name, "Completion reported with no active producers");
                false
            }
        }
    }
}

/// Registration token of one producer. Sends into the Result Channel and
/// reports completion exactly once when dropped.
pub struct ProducerHandle {
    name: String,
    sender: Option<mpsc::Sender<ResultEvent>>,
    tracker: Arc<CompletionTracker>,
}

impl ProducerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends an event, waiting while the channel is full. Returns false when
    /// the event loop is gone and the producer should stop.
    pub async fn send(&self, event: ResultEvent) -> bool {
        match &self.sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Reports completion now instead of at scope end.
    pub fn done(self) {}
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        // our sender goes first so the tracker's is the last one alive
        drop(self.sender.take());
        self.tracker.mark_done(&self.name);
    }
}
