use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{debug, info, warn};

use crate::{completion::ProducerHandle, event::ResultEvent};

use super::Producer;

/// Line that stops the adapter without producing an event.
pub const SENTINEL: &str = "quit";

/// Turns console lines into Result Events. Generic over the reader so tests
/// can feed it from memory.
pub struct KeyboardAdapter<R> {
    reader: R,
}

impl KeyboardAdapter<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> KeyboardAdapter<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> Producer for KeyboardAdapter<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> String {
        "keyboard".to_string()
    }

    async fn run(self: Box<Self>, handle: ProducerHandle) {
        let mut lines = self.reader.lines();
        info!("Keyboard input ready (type something)");
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line == SENTINEL => {
                    info!("Keyboard input stopped");
                    return;
                }
                Ok(Some(line)) => {
                    if !handle.send(ResultEvent::keyboard(line)).await {
                        debug!("Result channel gone, keyboard adapter stopping");
                        return;
                    }
                }
                Ok(None) => {
                    info!("Keyboard input reached end of input");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Keyboard input failed");
                    return;
                }
            }
        }
    }
}
