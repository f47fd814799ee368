//! # Event Loop
//!
//! The single consumer of every event source:
//!
//! - Result Channel (workers, keyboard, file)
//! - one Connection Channel per listener, merged with [`SelectAll`]
//! - a periodic timer
//! - the shutdown broadcast
//!
//! Each iteration waits for the first ready source and handles exactly one
//! event. `tokio::select!` polls its branches in random order, so no source
//! can starve the others when several are ready at once.
//!
//! ## States
//!
//! ```text
//! Running ──(results closed)──► Draining ──► Terminated   (LoopExit::Completed)
//!    └─────────(shutdown)─────────────────► Terminated    (LoopExit::Shutdown)
//! ```
//!
//! The shutdown path abandons producers that are still running and does
//! not drain buffered results.

use std::time::Duration;

use futures::stream::SelectAll;
use tokio::{
    sync::{broadcast, mpsc},
    time::{Instant, MissedTickBehavior},
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{debug, error, info, trace};

use crate::{
    event::{Origin, ResultEvent},
    network::{Connection, ConnectionReceiver},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LoopState {
    Running,
    Draining,
    Terminated,
}

/// Why the loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LoopExit {
    /// Every tracked producer finished and the Result Channel closed.
    Completed,
    /// A shutdown request arrived first.
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub worker_results: usize,
    pub keyboard_results: usize,
    pub file_results: usize,
    pub connections: usize,
    pub failed_responses: usize,
    pub ticks: usize,
}

impl LoopStats {
    pub fn results(&self) -> usize {
        self.worker_results + self.keyboard_results + self.file_results
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub stats: LoopStats,
}

enum Step {
    Tick,
    Shutdown,
    ShutdownDetached,
    Connection(Connection),
    Result(ResultEvent),
    ResultsClosed,
}

pub struct EventLoop {
    results: mpsc::Receiver<ResultEvent>,
    connections: SelectAll<ReceiverStream<Connection>>,
    shutdown: broadcast::Receiver<()>,
    tick_interval: Duration,
    observer: Option<mpsc::UnboundedSender<ResultEvent>>,
    state: LoopState,
    stats: LoopStats,
}

impl EventLoop {
    pub fn new(
        results: mpsc::Receiver<ResultEvent>,
        shutdown: broadcast::Receiver<()>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            results,
            connections: SelectAll::new(),
            shutdown,
            tick_interval,
            observer: None,
            state: LoopState::Running,
            stats: LoopStats::default(),
        }
    }

    pub fn with_connections(mut self, receivers: Vec<ConnectionReceiver>) -> Self {
        for receiver in receivers {
            self.connections.push(ReceiverStream::new(receiver));
        }
        self
    }

    /// Every handled Result Event is also forwarded to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<ResultEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub async fn run(mut self) -> LoopReport {
        // a zero period would panic in tokio::time::interval
        let period = self.tick_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_live = true;

        info!(listeners = self.connections.len(), "Event loop started");

        loop {
            let step = tokio::select! {
                _ = ticker.tick() => Step::Tick,
                signal = self.shutdown.recv(), if shutdown_live => match signal {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Step::Shutdown,
                    Err(broadcast::error::RecvError::Closed) => Step::ShutdownDetached,
                },
                Some(connection) = self.connections.next(), if !self.connections.is_empty() => {
                    Step::Connection(connection)
                }
                result = self.results.recv() => match result {
                    Some(event) => Step::Result(event),
                    None => Step::ResultsClosed,
                },
            };

            match step {
                Step::Tick => self.handle_tick(),
                Step::Shutdown => {
                    info!("Shutdown requested, exiting without draining");
                    return self.finish(LoopExit::Shutdown);
                }
                Step::ShutdownDetached => {
                    debug!("Shutdown trigger dropped, signal branch disabled");
                    shutdown_live = false;
                }
                Step::Connection(connection) => self.handle_connection(connection).await,
                Step::Result(event) => self.handle_result(event),
                Step::ResultsClosed => {
                    self.transition(LoopState::Draining);
                    info!(results = self.stats.results(), "All sources finished");
                    return self.finish(LoopExit::Completed);
                }
            }
        }
    }

    fn handle_tick(&mut self) {
        self.stats.ticks += 1;
        info!(tick = self.stats.ticks, "Timer tick");
    }

    fn handle_result(&mut self, event: ResultEvent) {
        match event.origin {
            Origin::Worker(_) => self.stats.worker_results += 1,
            Origin::Keyboard => self.stats.keyboard_results += 1,
            Origin::File => self.stats.file_results += 1,
        }
        info!(origin = %event.origin, text = %event.text, "Result received");
        if let Some(observer) = &self.observer {
            if observer.send(event).is_err() {
                trace!("Result observer dropped");
                self.observer = None;
            }
        }
    }

    async fn handle_connection(&mut self, connection: Connection) {
        self.stats.connections += 1;
        info!(
            port = connection.port(),
            peer = %connection.peer_addr(),
            local = %connection.local_addr(),
            "Network connection"
        );
        if let Err(e) = connection.respond().await {
            self.stats.failed_responses += 1;
            error!(error = %e, "Failed to send response");
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = %self.state, to = %next, "Event loop state change");
        self.state = next;
    }

    fn finish(mut self, exit: LoopExit) -> LoopReport {
        self.transition(LoopState::Terminated);
        info!(exit = %exit, stats = ?self.stats, "Event loop terminated");
        LoopReport {
            exit,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{response, Listener};
    use pretty_assertions::assert_eq;
    use tokio::{io::AsyncReadExt, net::TcpStream};

    fn channels() -> (
        mpsc::Sender<ResultEvent>,
        mpsc::Receiver<ResultEvent>,
        broadcast::Sender<()>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, _) = broadcast::channel(1);
        (tx, rx, shutdown_tx)
    }

    #[tokio::test]
    async fn test_completes_when_results_close() {
        let (tx, rx, shutdown_tx) = channels();
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10));
        assert_eq!(event_loop.state(), LoopState::Running);

        tx.send(ResultEvent::worker(1, "a")).await.unwrap();
        tx.send(ResultEvent::keyboard("b")).await.unwrap();
        tx.send(ResultEvent::file("c")).await.unwrap();
        drop(tx);

        let report = event_loop.run().await;
        assert_eq!(report.exit, LoopExit::Completed);
        assert_eq!(
            report.stats,
            LoopStats {
                worker_results: 1,
                keyboard_results: 1,
                file_results: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_while_producers_active() {
        let (tx, rx, shutdown_tx) = channels();
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10));
        let task = tokio::spawn(event_loop.run());

        shutdown_tx.send(()).unwrap();
        let report = task.await.unwrap();
        assert_eq!(report.exit, LoopExit::Shutdown);
        assert_eq!(report.stats.results(), 0);
        // the loop is gone while the producer side never closed
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_wins_over_open_result_channel() {
        let (tx, rx, shutdown_tx) = channels();
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10));
        for i in 0..3 {
            tx.send(ResultEvent::worker(1, i.to_string())).await.unwrap();
        }
        shutdown_tx.send(()).unwrap();

        let report = event_loop.run().await;
        // pending results may or may not be handled first, but the channel
        // never closes so only the shutdown can end the loop
        assert_eq!(report.exit, LoopExit::Shutdown);
        assert!(report.stats.results() <= 3);
        drop(tx);
    }

    #[tokio::test]
    async fn test_dropped_trigger_does_not_end_loop() {
        let (tx, rx, shutdown_tx) = channels();
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10));
        drop(shutdown_tx);
        let task = tokio::spawn(event_loop.run());

        tx.send(ResultEvent::file("still handled")).await.unwrap();
        drop(tx);
        let report = task.await.unwrap();
        assert_eq!(report.exit, LoopExit::Completed);
        assert_eq!(report.stats.file_results, 1);
    }

    #[tokio::test]
    async fn test_timer_ticks_without_state_change() {
        let (tx, rx, shutdown_tx) = channels();
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_millis(10));
        let task = tokio::spawn(event_loop.run());

        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(tx);
        let report = task.await.unwrap();
        assert_eq!(report.exit, LoopExit::Completed);
        assert!(report.stats.ticks >= 2, "ticks: {}", report.stats.ticks);
    }

    #[tokio::test]
    async fn test_observer_sees_every_result() {
        let (tx, rx, shutdown_tx) = channels();
        let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10))
            .with_observer(observer_tx);

        for i in 0..5 {
            tx.send(ResultEvent::worker(1, format!("r{}", i))).await.unwrap();
        }
        drop(tx);
        event_loop.run().await;

        let mut texts = vec![];
        while let Some(event) = observer_rx.recv().await {
            texts.push(event.text);
        }
        assert_eq!(texts, vec!["r0", "r1", "r2", "r3", "r4"]);
    }

    #[tokio::test]
    async fn test_serves_connections_from_every_listener() {
        let (tx, rx, shutdown_tx) = channels();
        let a = Listener::bind("127.0.0.1", 0).await.unwrap();
        let b = Listener::bind("127.0.0.1", 0).await.unwrap();
        let ports = [a.port(), b.port()];
        let (a_rx, _) = a.spawn(1);
        let (b_rx, _) = b.spawn(1);

        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10))
            .with_connections(vec![a_rx, b_rx]);
        let task = tokio::spawn(event_loop.run());

        for port in ports {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            let expected =
                String::from_utf8(response::http_ok(&response::port_body(port))).unwrap();
            assert_eq!(received, expected);
        }

        drop(tx);
        let report = task.await.unwrap();
        assert_eq!(report.exit, LoopExit::Completed);
        assert_eq!(report.stats.connections, 2);
        assert_eq!(report.stats.failed_responses, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_busy_results_do_not_starve_shutdown() {
        let (tx, rx) = mpsc::channel(1024);
        let (shutdown_tx, _) = broadcast::channel(1);
        let event_loop = EventLoop::new(rx, shutdown_tx.subscribe(), Duration::from_secs(10));

        let flood = tokio::spawn(async move {
            let mut i = 0u64;
            while tx.send(ResultEvent::worker(1, i.to_string())).await.is_ok() {
                i += 1;
            }
        });
        let task = tokio::spawn(event_loop.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(()).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("shutdown starved by results")
            .unwrap();
        assert_eq!(report.exit, LoopExit::Shutdown);
        flood.await.unwrap();
    }
}
