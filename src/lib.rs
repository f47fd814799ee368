//! # nanoapp
//!
//! A small concurrent runtime: a fixed worker pool processes a queue of
//! tasks while console input, a replayed file, TCP listeners, a timer and
//! the shutdown signal all feed one event loop.
//!
//! ```text
//!  TaskQueue ──► WorkerPool ─┐
//!  KeyboardAdapter ──────────┼──► Result Channel ──┐
//!  FileAdapter ──────────────┘   (closed by the    │
//!                                 CompletionTracker)├──► EventLoop
//!  Listener(s) ──► Connection Channel(s) ───────────┤
//!  Timer, ShutdownSignal ───────────────────────────┘
//! ```
//!
//! [`system::System`] wires everything together; the `nanoapp` binary adds
//! the CLI and the logging subscriber.

pub mod adapter;
pub mod completion;
pub mod config;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod network;
pub mod signals;
pub mod system;
pub mod task_queue;
pub mod worker;

// Re-exports
pub use error::{Error, NanoResult};
pub use event::{Origin, ResultEvent};
pub use event_loop::{LoopExit, LoopReport, LoopState, LoopStats};
pub use system::System;
