//! Pluggable probes: one classified network operation per input.
//!
//! Every probe kind implements [`Probe`]. The executor only ever talks to the
//! trait, so tests can plug in instrumented or scripted probes.
use std::time::Duration;

use async_trait::async_trait;

use crate::outcome::ProbeOutcome;
use crate::worklist::ProbeInput;

mod banner;
mod dns;
mod http;
mod tcp;

pub use banner::BannerProbe;
pub use dns::{classify_resolve_error, DnsProbe};
pub use http::{HttpStatusProbe, USER_AGENT};
pub use tcp::TcpConnectProbe;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Performs exactly one network operation for `input`.
    ///
    /// Never fails: every fault is folded into the returned outcome.
    async fn execute(&self, input: &ProbeInput, timeout: Duration) -> ProbeOutcome;

    /// Upper bound on how long [`Probe::execute`] may take for a given
    /// per-probe timeout. The executor cuts a probe off once it is spent.
    fn budget(&self, timeout: Duration) -> Duration {
        timeout
    }
}
