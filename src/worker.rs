//! # Worker Pool
//!
//! A fixed number of workers sharing one [`TaskReceiver`]. Each worker takes
//! tasks until the queue is closed and drained, simulates the work with a
//! delay and emits exactly one Result Event per task.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    adapter::{self, Producer},
    completion::{CompletionTracker, ProducerHandle, TrackerResult},
    event::ResultEvent,
    task_queue::TaskReceiver,
};

/// Process facts computed once at startup and handed to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub cpus: usize,
}

impl RuntimeInfo {
    pub fn detect() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { cpus }
    }
}

pub struct Worker {
    id: usize,
    tasks: TaskReceiver,
    work_delay: Duration,
    info: RuntimeInfo,
}

#[async_trait]
impl Producer for Worker {
    fn name(&self) -> String {
        format!("worker-{}", self.id)
    }

    async fn run(self: Box<Self>, handle: ProducerHandle) {
        while let Some(task) = self.tasks.recv().await {
            tokio::time::sleep(self.work_delay).await;
            let text = format!(
                "processed Task {} ({}) on {} cpus",
                task.id, task.payload, self.info.cpus
            );
            if !handle.send(ResultEvent::worker(self.id, text)).await {
                debug!(worker = self.id, "Result channel gone, worker stopping");
                return;
            }
            info!(worker = self.id, task_id = task.id, "Worker finished");
        }
        debug!(worker = self.id, "Task queue drained");
    }
}

pub struct WorkerPool {
    size: usize,
    work_delay: Duration,
    info: RuntimeInfo,
}

impl WorkerPool {
    pub fn new(size: usize, work_delay: Duration, info: RuntimeInfo) -> Self {
        Self {
            size,
            work_delay,
            info,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Worker producers with ids `1..=size`, not yet registered.
    pub fn workers(&self, tasks: &TaskReceiver) -> Vec<Box<dyn Producer>> {
        (1..=self.size)
            .map(|id| {
                Box::new(Worker {
                    id,
                    tasks: tasks.clone(),
                    work_delay: self.work_delay,
                    info: self.info,
                }) as Box<dyn Producer>
            })
            .collect()
    }

    /// Registers and starts every worker.
    pub fn spawn(
        &self,
        tasks: &TaskReceiver,
        tracker: &Arc<CompletionTracker>,
    ) -> TrackerResult<Vec<JoinHandle<()>>> {
        adapter::launch(tracker, self.workers(tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::Origin,
        task_queue::{Task, TaskQueue},
    };
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::mpsc;

    const INFO: RuntimeInfo = RuntimeInfo { cpus: 8 };

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_every_task_processed_once() {
        let (queue, receiver) = TaskQueue::new(16).unwrap();
        queue.fill(Task::batch(10)).await.unwrap();

        let (tx, mut rx) = mpsc::channel(32);
        let tracker = CompletionTracker::new(tx);
        let pool = WorkerPool::new(3, Duration::from_millis(5), INFO);
        let handles = pool.spawn(&receiver, &tracker).unwrap();
        assert_eq!(handles.len(), 3);

        let mut seen = HashSet::new();
        let mut per_worker: HashMap<usize, usize> = HashMap::new();
        while let Some(event) = rx.recv().await {
            let Origin::Worker(id) = event.origin else {
                panic!("unexpected origin {:?}", event.origin);
            };
            assert!((1..=3).contains(&id));
            *per_worker.entry(id).or_default() += 1;
            let task_id: u64 = event
                .text
                .strip_prefix("processed Task ")
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|id| id.parse().ok())
                .unwrap();
            assert!(seen.insert(task_id), "duplicate task {}", task_id);
            assert!(event.text.ends_with("on 8 cpus"));
        }

        assert_eq!(seen, (1..=10).collect::<HashSet<_>>());
        assert_eq!(per_worker.values().sum::<usize>(), 10);
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(tracker.is_closed());
    }

    #[tokio::test]
    async fn test_single_worker_keeps_receive_order() {
        let (queue, receiver) = TaskQueue::new(8).unwrap();
        queue.fill(Task::batch(5)).await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let tracker = CompletionTracker::new(tx);
        WorkerPool::new(1, Duration::ZERO, INFO)
            .spawn(&receiver, &tracker)
            .unwrap();

        let mut texts = vec![];
        while let Some(event) = rx.recv().await {
            texts.push(event.to_string());
        }
        assert_eq!(
            texts,
            (1..=5)
                .map(|i| format!("[Worker 1] processed Task {} (payload-{}) on 8 cpus", i, i))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_empty_queue_finishes_immediately() {
        let (queue, receiver) = TaskQueue::new(1).unwrap();
        queue.close();

        let (tx, mut rx) = mpsc::channel(1);
        let tracker = CompletionTracker::new(tx);
        WorkerPool::new(2, Duration::ZERO, INFO)
            .spawn(&receiver, &tracker)
            .unwrap();

        assert!(rx.recv().await.is_none());
        assert_eq!(tracker.active(), 0);
    }

    #[test]
    fn test_detect_reports_at_least_one_cpu() {
        assert!(RuntimeInfo::detect().cpus >= 1);
    }
}
