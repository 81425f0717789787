//! Classified results of single probes.
//!
//! A probe ends in exactly one of three states. `Success` is a finding,
//! `Negative` means the thing is definitively not there, `Error` means the
//! probe could not tell. The last two must never be conflated: a closed port
//! and a port that timed out are reported differently.
use std::fmt;
use std::net::IpAddr;

use serde::Serialize;
use thiserror::Error;

/// Result of one probe input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    Success(Payload),
    Negative(NegativeReason),
    Error(ProbeFailure),
}

impl ProbeOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        matches!(self, ProbeOutcome::Negative(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ProbeOutcome::Error(_))
    }
}

/// What a successful probe found, per probe kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Payload {
    /// The port accepted a TCP connection.
    Open { banner: Banner },
    /// First A record in the resolver's answer.
    Resolved(IpAddr),
    /// Final HTTP status after redirects, always in `200..400`.
    Status(u16),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Open { banner } => write!(f, "open ({banner})"),
            Payload::Resolved(ip) => write!(f, "{ip}"),
            Payload::Status(status) => write!(f, "{status}"),
        }
    }
}

/// Service greeting read right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Banner {
    /// Nothing was sent before the read timeout, or only whitespace.
    Absent,
    Text(String),
}

impl Banner {
    /// Greeting text with invalid UTF-8 dropped and whitespace trimmed.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text: String = bytes.utf8_chunks().map(|chunk| chunk.valid()).collect();
        let text = text.trim();
        if text.is_empty() {
            Banner::Absent
        } else {
            Banner::Text(text.to_owned())
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Absent => f.write_str("no banner"),
            Banner::Text(text) => f.write_str(text),
        }
    }
}

/// Why a probe definitively found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NegativeReason {
    /// The host answered the connection attempt with a reset.
    Refused,
    /// The host or network was reported unreachable.
    Unreachable,
    /// The name does not exist.
    NxDomain,
    /// The name exists but has no A record.
    NoAnswer,
    /// No name server produced a usable answer.
    NoNameservers,
    /// The server answered with a status of 400 or above.
    HttpStatus(u16),
}

/// Why a probe could not reach a conclusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Error)]
pub enum ProbeFailure {
    #[error("timed out")]
    Timeout,

    #[error("could not resolve host {0}")]
    Unresolvable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("DNS error: {0}")]
    Dns(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("too many open files")]
    ResourceExhausted,

    #[error("probe cannot handle this input: {0}")]
    InvalidInput(&'static str),
}
