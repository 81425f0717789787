use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;

use super::tcp::{connect, hang_up};
use super::Probe;
use crate::outcome::{Banner, Payload, ProbeFailure, ProbeOutcome};
use crate::worklist::ProbeInput;

const BANNER_BYTES: usize = 1024;

/// Connects, then waits briefly for the service to speak first.
///
/// Only the connect can fail the probe. A read that times out, resets or
/// returns nothing still counts as an open port, with [`Banner::Absent`].
#[derive(Debug, Clone, Copy)]
pub struct BannerProbe {
    read_timeout: Duration,
}

impl BannerProbe {
    #[must_use]
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for BannerProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Probe for BannerProbe {
    async fn execute(&self, input: &ProbeInput, timeout: Duration) -> ProbeOutcome {
        let Some(port) = input.port() else {
            return ProbeOutcome::Error(ProbeFailure::InvalidInput("banner probes need a port"));
        };

        let mut stream = match connect(input.target().host_str(), port, timeout).await {
            Ok(stream) => stream,
            Err(outcome) => return outcome,
        };
        let banner = read_banner(&mut stream, self.read_timeout).await;
        hang_up(stream).await;

        ProbeOutcome::Success(Payload::Open { banner })
    }

    fn budget(&self, timeout: Duration) -> Duration {
        timeout + self.read_timeout
    }
}

async fn read_banner(stream: &mut TcpStream, read_timeout: Duration) -> Banner {
    let mut buf = [0u8; BANNER_BYTES];
    match time::timeout(read_timeout, stream.read(&mut buf)).await {
        Ok(Ok(read)) => Banner::from_bytes(&buf[..read]),
        Ok(Err(e)) => {
            debug!("Banner read failed after connect: {e}");
            Banner::Absent
        }
        Err(_) => Banner::Absent,
    }
}
