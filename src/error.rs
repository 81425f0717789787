//! Errors that abort a run before any probe is issued.
//!
//! Per-probe faults are not errors in this sense: they are captured as
//! [`ProbeOutcome::Error`](crate::outcome::ProbeOutcome::Error) values and only
//! ever surface in aggregate counts.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Bad user input. Fatal, reported immediately, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid port number '{0}'")]
    InvalidPort(String),

    #[error("Port {0} must be between 1 and 65535")]
    PortOutOfRange(u16),

    #[error("Invalid range format '{0}'. Expected 'start-end'. Example: 1-1000.")]
    InvalidRangeFormat(String),

    #[error("Invalid start port '{port}' in range '{range}'")]
    InvalidRangeStart { port: String, range: String },

    #[error("Invalid end port '{port}' in range '{range}'")]
    InvalidRangeEnd { port: String, range: String },

    #[error("Start port {start} is greater than end port {end} in range '{range}'")]
    ReversedRange { start: u16, end: u16, range: String },

    #[error("No valid ports or ranges provided")]
    NoPorts,

    #[error("Invalid host '{0}'. Expected a bare hostname or IP address")]
    InvalidHost(String),

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme '{0}'. Only http and https are probed")]
    UnsupportedScheme(String),

    #[error("Target '{0}' has no base URL, path probing needs scheme and host")]
    NotWebTarget(String),

    #[error("No usable resolver IPs in '{0}'. Expected a comma-separated list or a file of IPs")]
    NoResolvers(String),
}

/// Setup failures that prevent a run from starting.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not read wordlist {path}: {source}")]
    Wordlist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Nothing to probe: the work list is empty")]
    EmptyWorkList,

    #[error("Could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Found {0} in configuration file")]
    Config(#[from] toml::de::Error),
}
