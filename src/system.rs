use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    adapter::{self, file::FileAdapter, keyboard::KeyboardAdapter, Producer},
    completion::CompletionTracker,
    config::SystemConfig,
    event::ResultEvent,
    event_loop::{EventLoop, LoopReport},
    network::{ConnectionReceiver, Listener},
    signals::ShutdownSignal,
    task_queue::{Task, TaskQueue},
    worker::{RuntimeInfo, WorkerPool},
    NanoResult,
};

pub struct System {
    config: SystemConfig,
    info: RuntimeInfo,
    shutdown: ShutdownSignal,
    keyboard: Option<Box<dyn Producer>>,
    observer: Option<mpsc::UnboundedSender<ResultEvent>>,
}

impl System {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            info: RuntimeInfo::detect(),
            shutdown: ShutdownSignal::new(),
            keyboard: None,
            observer: None,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Handle for requesting shutdown from outside the event loop.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Replaces stdin as the keyboard source. Ignored when the keyboard is
    /// disabled in the config.
    pub fn with_keyboard(mut self, keyboard: Box<dyn Producer>) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Every Result Event handled by the loop is forwarded to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<ResultEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_runtime_info(mut self, info: RuntimeInfo) -> Self {
        self.info = info;
        self
    }

    /// Binds listeners and launches every producer. Nothing is started when
    /// the config is invalid or any listener fails to bind.
    pub async fn start(self) -> NanoResult<Running> {
        let System {
            config,
            info,
            shutdown,
            keyboard,
            observer,
        } = self;
        config.validate()?;

        let mut listeners = Vec::with_capacity(config.network.ports.len());
        for port in &config.network.ports {
            listeners.push(Listener::bind(&config.network.host, *port).await?);
        }

        info!(
            workers = config.workers,
            tasks = config.task_count,
            cpus = info.cpus,
            producers = config.tracked_producers(),
            "System starting"
        );

        let (result_tx, result_rx) = mpsc::channel(config.result_channel_capacity);
        let tracker = CompletionTracker::new(result_tx);

        let (queue, task_rx) = TaskQueue::new(config.task_queue_capacity)?;
        let pool = WorkerPool::new(config.workers, config.work_delay, info);

        let mut producers = pool.workers(&task_rx);
        drop(task_rx);
        if config.keyboard.enabled {
            producers.push(keyboard.unwrap_or_else(|| Box::new(KeyboardAdapter::stdin())));
        }
        if config.file.enabled {
            producers.push(Box::new(FileAdapter::new(
                config.file.path.clone(),
                config.file.line_delay,
            )));
        }
        adapter::launch(&tracker, producers)?;
        tracker.close_if_idle();

        let tasks = if pool.size() == 0 && config.task_count > 0 {
            warn!(tasks = config.task_count, "No workers configured, tasks skipped");
            vec![]
        } else {
            Task::batch(config.task_count)
        };
        tokio::spawn(async move {
            if let Err(e) = queue.fill(tasks).await {
                error!(error = %e, "Task producer stopped");
            }
        });

        let mut ports = Vec::with_capacity(listeners.len());
        let mut connections: Vec<ConnectionReceiver> = Vec::with_capacity(listeners.len());
        for listener in listeners {
            ports.push(listener.port());
            let (rx, _accept_loop) = listener.spawn(config.connection_channel_capacity);
            connections.push(rx);
        }

        let mut event_loop = EventLoop::new(result_rx, shutdown.subscribe(), config.tick_interval)
            .with_connections(connections);
        if let Some(observer) = observer {
            event_loop = event_loop.with_observer(observer);
        }

        debug!(ports = ?ports, "System started");
        Ok(Running {
            event_loop,
            ports,
            tracker,
            shutdown,
        })
    }

    /// Starts the system and drives the event loop to termination.
    pub async fn run(self) -> NanoResult<LoopReport> {
        Ok(self.start().await?.wait().await)
    }
}

/// A started system whose event loop has not run yet.
pub struct Running {
    event_loop: EventLoop,
    ports: Vec<u16>,
    tracker: Arc<CompletionTracker>,
    shutdown: ShutdownSignal,
}

impl Running {
    /// Ports actually bound, in config order.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn tracker(&self) -> &Arc<CompletionTracker> {
        &self.tracker
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Runs the event loop. Producers and accept loops still running when it
    /// returns are abandoned, the process exit ends them.
    pub async fn wait(self) -> LoopReport {
        self.event_loop.run().await
    }
}
