//! # Network listeners
//!
//! One [`listener::Listener`] per configured port. Each runs its own accept
//! loop and publishes accepted connections on its own Connection Channel.
//! Listeners run until the process exits and are not tracked for
//! completion. Every accepted connection gets the same fixed response from
//! [`response`], no request bytes are read.

pub mod listener;
pub mod response;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Failed to bind listener on {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write response on port {port}: {source}")]
    Write {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub type NetworkResult<T> = Result<T, NetworkError>;

pub use listener::{Connection, ConnectionReceiver, Listener};
