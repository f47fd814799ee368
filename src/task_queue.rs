//! # Task Queue
//!
//! A bounded buffer of [`Task`]s filled once at startup and closed after the
//! last push. Closing consumes the [`TaskQueue`], so nothing can be pushed
//! afterwards. Workers share a cloneable [`TaskReceiver`] and stop when the
//! queue is closed and drained.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub payload: String,
}

impl Task {
    pub fn new(id: u64, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Builds tasks `1..=count` with payload `payload-<id>`.
    pub fn batch(count: u64) -> Vec<Task> {
        (1..=count)
            .map(|id| Task::new(id, format!("payload-{}", id)))
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Task queue capacity must be greater than 0")]
    ZeroCapacity,
    #[error("Task queue closed, task {task_id} was not accepted")]
    Closed { task_id: u64 },
}

pub type QueueResult<T> = Result<T, QueueError>;

pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> QueueResult<(Self, TaskReceiver)> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let (sender, receiver) = mpsc::channel(capacity);
        Ok((
            Self { sender, capacity },
            TaskReceiver {
                inner: Arc::new(Mutex::new(receiver)),
            },
        ))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes one task, waiting while the buffer is full.
    pub async fn push(&self, task: Task) -> QueueResult<()> {
        let task_id = task.id;
        self.sender
            .send(task)
            .await
            .map_err(|_| QueueError::Closed { task_id })?;
        debug!(task_id, "Task queued");
        Ok(())
    }

    /// Closes the queue. Workers drain what is buffered, then stop.
    pub fn close(self) {
        debug!("Task queue closed");
        drop(self.sender);
    }

    /// Pushes every task in order, then closes the queue.
    pub async fn fill(self, tasks: impl IntoIterator<Item = Task>) -> QueueResult<()> {
        for task in tasks {
            self.push(task).await?;
        }
        self.close();
        Ok(())
    }
}

/// Multi-consumer side of the queue.
#[derive(Clone)]
pub struct TaskReceiver {
    inner: Arc<Mutex<mpsc::Receiver<Task>>>,
}

impl TaskReceiver {
    /// Next task, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Task> {
        self.inner.lock().await.recv().await
    }
}
