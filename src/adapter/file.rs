use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::{debug, error, info};

use crate::{completion::ProducerHandle, event::ResultEvent};

use super::Producer;

/// Replays a text file as a slow feed, one Result Event per line.
pub struct FileAdapter {
    path: PathBuf,
    line_delay: Duration,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>, line_delay: Duration) -> Self {
        Self {
            path: path.into(),
            line_delay,
        }
    }

    /// Reads until end of file. The file is owned by this scope and closed
    /// when it returns, whichever branch returns.
    async fn replay(&self, handle: &ProducerHandle) {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to open file");
                return;
            }
        };

        let mut lines = BufReader::new(file).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !handle.send(ResultEvent::file(line)).await {
                        debug!("Result channel gone, file adapter stopping");
                        return;
                    }
                    tokio::time::sleep(self.line_delay).await;
                }
                Ok(None) => {
                    info!(path = %self.path.display(), "File input finished");
                    return;
                }
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "Failed to read file");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl Producer for FileAdapter {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn run(self: Box<Self>, handle: ProducerHandle) {
        self.replay(&handle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionTracker;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_lines_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "alpha\nbeta\ngamma\n").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let tracker = CompletionTracker::new(tx);
        let handle = tracker.register("file").unwrap();
        Box::new(FileAdapter::new(file.path(), Duration::from_millis(1)))
            .run(handle)
            .await;

        let mut events = vec![];
        while let Some(event) = rx.recv().await {
            events.push(event.to_string());
        }
        assert_eq!(events, vec!["[File] alpha", "[File] beta", "[File] gamma"]);
        assert!(tracker.is_closed());
    }

    #[tokio::test]
    async fn test_missing_file_still_reports_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let tracker = CompletionTracker::new(tx);
        let handle = tracker.register("file").unwrap();

        Box::new(FileAdapter::new(
            dir.path().join("does-not-exist.txt"),
            Duration::ZERO,
        ))
        .run(handle)
        .await;

        assert!(rx.recv().await.is_none());
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn test_delay_between_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "one\ntwo\n").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let tracker = CompletionTracker::new(tx);
        let handle = tracker.register("file").unwrap();
        let adapter = Box::new(FileAdapter::new(file.path(), Duration::from_millis(50)));
        let start = tokio::time::Instant::now();
        let task = tokio::spawn(adapter.run(handle));

        assert_eq!(rx.recv().await.unwrap().text, "one");
        assert_eq!(rx.recv().await.unwrap().text, "two");
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(rx.recv().await.is_none());
        task.await.unwrap();
    }
}
