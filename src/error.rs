//! Error taxonomy for the guard daemon.
//!
//! None of these are recovered inside the polling loop: every variant that
//! reaches [`crate::controller::Controller::run`] ends the process, and the
//! daemon relies on an external supervisor to restart it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Missing credential or unusable configuration. Raised before polling starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// The disk space probe could not stat the monitored path.
    #[error("failed to determine disk space for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request never completed a round trip to NZBGet.
    #[error("error sending request: {0}")]
    Network(#[from] reqwest::Error),

    /// NZBGet answered, but not with a usable JSON-RPC boolean result.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Dashboard terminal I/O failed.
    #[error("terminal error: {0}")]
    Terminal(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GuardError>;
