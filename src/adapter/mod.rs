//! # Producers
//!
//! Everything that writes into the Result Channel and counts towards
//! completion implements [`Producer`]: the workers of the pool and the
//! external source adapters below.
//!
//! - [`keyboard::KeyboardAdapter`]: line-oriented console input, ends on
//!   `quit` or end of input
//! - [`file::FileAdapter`]: replays a text file line by line with a delay

pub mod file;
pub mod keyboard;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::completion::{CompletionTracker, ProducerHandle, TrackerResult};

#[async_trait]
pub trait Producer: Send {
    fn name(&self) -> String;

    /// Main loop of the producer. The handle is dropped when this returns,
    /// which reports completion to the tracker.
    async fn run(self: Box<Self>, handle: ProducerHandle);
}

/// Registers every producer first, then spawns them. Registering up front
/// keeps a fast producer from closing the Result Channel before the others
/// are counted.
pub fn launch(
    tracker: &std::sync::Arc<CompletionTracker>,
    producers: Vec<Box<dyn Producer>>,
) -> TrackerResult<Vec<JoinHandle<()>>> {
    let registered = producers
        .into_iter()
        .map(|producer| {
            let handle = tracker.register(producer.name())?;
            Ok((producer, handle))
        })
        .collect::<TrackerResult<Vec<_>>>()?;

    Ok(registered
        .into_iter()
        .map(|(producer, handle)| {
            debug!(producer = %handle.name(), "Spawning producer");
            tokio::spawn(producer.run(handle))
        })
        .collect())
}
