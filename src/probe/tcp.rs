use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::{self, TcpStream};
use tokio::time;

use super::Probe;
use crate::outcome::{Banner, NegativeReason, Payload, ProbeFailure, ProbeOutcome};
use crate::worklist::ProbeInput;

/// Connects to (host, port) and hangs up. Nothing is sent or read.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProbe;

#[async_trait]
impl Probe for TcpConnectProbe {
    async fn execute(&self, input: &ProbeInput, timeout: Duration) -> ProbeOutcome {
        let Some(port) = input.port() else {
            return ProbeOutcome::Error(ProbeFailure::InvalidInput("TCP probes need a port"));
        };

        match connect(input.target().host_str(), port, timeout).await {
            Ok(stream) => {
                hang_up(stream).await;
                ProbeOutcome::Success(Payload::Open {
                    banner: Banner::Absent,
                })
            }
            Err(outcome) => outcome,
        }
    }
}

/// Resolves and connects within `timeout`. The error side is the final
/// classified outcome for the probe.
pub(super) async fn connect(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, ProbeOutcome> {
    let attempt = async {
        let socket = resolve(host, port).await?;
        TcpStream::connect(socket)
            .await
            .map_err(|e| classify_connect_error(&e))
    };

    match time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(ProbeOutcome::Error(ProbeFailure::Timeout)),
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ProbeOutcome> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let unresolvable = || ProbeOutcome::Error(ProbeFailure::Unresolvable(host.to_owned()));
    net::lookup_host((host, port))
        .await
        .map_err(|_| unresolvable())?
        .next()
        .ok_or_else(unresolvable)
}

pub(super) async fn hang_up(mut stream: TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!("Shutdown stream error {}", &e);
    }
}

/// Refusals and unreachable reports are definitive; everything else is
/// inconclusive.
pub(super) fn classify_connect_error(err: &io::Error) -> ProbeOutcome {
    if err
        .to_string()
        .to_lowercase()
        .contains("too many open files")
    {
        return ProbeOutcome::Error(ProbeFailure::ResourceExhausted);
    }

    match err.kind() {
        io::ErrorKind::ConnectionRefused => ProbeOutcome::Negative(NegativeReason::Refused),
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
            ProbeOutcome::Negative(NegativeReason::Unreachable)
        }
        io::ErrorKind::TimedOut => ProbeOutcome::Error(ProbeFailure::Timeout),
        _ => ProbeOutcome::Error(ProbeFailure::Network(err.to_string())),
    }
}
