//! # Result Events
//!
//! A [`ResultEvent`] is the single unit flowing through the Result Channel.
//! Workers and the input adapters produce them; the event loop consumes and
//! logs them. The [`Origin`] tag exists for display only, consumers must not
//! branch on it for anything but bookkeeping.

use std::fmt;

use chrono::{DateTime, Utc};

/// Where a [`ResultEvent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Worker(usize),
    Keyboard,
    File,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Worker(id) => write!(f, "Worker {}", id),
            Origin::Keyboard => f.write_str("Keyboard"),
            Origin::File => f.write_str("File"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEvent {
    pub origin: Origin,
    pub text: String,
    pub emitted_at: DateTime<Utc>,
}

impl ResultEvent {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            emitted_at: Utc::now(),
        }
    }

    pub fn worker(worker_id: usize, text: impl Into<String>) -> Self {
        Self::new(Origin::Worker(worker_id), text)
    }

    pub fn keyboard(line: impl Into<String>) -> Self {
        Self::new(Origin::Keyboard, line)
    }

    pub fn file(line: impl Into<String>) -> Self {
        Self::new(Origin::File, line)
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.origin, Origin::Worker(_))
    }
}

impl fmt::Display for ResultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.origin, self.text)
    }
}
