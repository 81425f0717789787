use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use log::debug;
use tokio::time;

use super::Probe;
use crate::error::EngineError;
use crate::outcome::{NegativeReason, Payload, ProbeFailure, ProbeOutcome};
use crate::target::build_resolver;
use crate::worklist::ProbeInput;

/// A-record lookup of `prefix.domain`.
///
/// The resolver is shared by every probe in a run. Names are queried fully
/// qualified, so search domains from the system config never apply.
#[derive(Clone)]
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
}

impl DnsProbe {
    #[must_use]
    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }

    /// Builds the resolver from a `--resolver` value, see
    /// [`build_resolver`].
    pub async fn with_resolvers(
        resolvers: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(build_resolver(resolvers, timeout).await?))
    }
}

#[async_trait]
impl Probe for DnsProbe {
    async fn execute(&self, input: &ProbeInput, timeout: Duration) -> ProbeOutcome {
        let Some(name) = input.fqdn() else {
            return ProbeOutcome::Error(ProbeFailure::InvalidInput("DNS probes need a name prefix"));
        };

        let lookup = self.resolver.ipv4_lookup(format!("{name}."));
        match time::timeout(timeout, lookup).await {
            Ok(Ok(answer)) => match answer.iter().next() {
                Some(record) => ProbeOutcome::Success(Payload::Resolved(IpAddr::V4(record.0))),
                None => ProbeOutcome::Negative(NegativeReason::NoAnswer),
            },
            Ok(Err(e)) => {
                debug!("Lookup of {name} failed: {e}");
                classify_resolve_error(&e)
            }
            Err(_) => ProbeOutcome::Error(ProbeFailure::Timeout),
        }
    }
}

/// Maps resolver failures onto outcomes.
///
/// Authoritative "no such name" and "no records" answers are negatives, as
/// are servers that refuse or fail the query. Timeouts and transport faults
/// are errors, and so is having no server to contact at all.
#[must_use]
pub fn classify_resolve_error(err: &ResolveError) -> ProbeOutcome {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => ProbeOutcome::Negative(NegativeReason::NxDomain),
            ResponseCode::ServFail | ResponseCode::Refused => {
                ProbeOutcome::Negative(NegativeReason::NoNameservers)
            }
            _ => ProbeOutcome::Negative(NegativeReason::NoAnswer),
        },
        ResolveErrorKind::NoConnections => {
            ProbeOutcome::Error(ProbeFailure::Dns("no name server could be contacted".to_owned()))
        }
        ResolveErrorKind::Timeout => ProbeOutcome::Error(ProbeFailure::Timeout),
        _ => ProbeOutcome::Error(ProbeFailure::Dns(err.to_string())),
    }
}
