use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};

use super::Probe;
use crate::error::EngineError;
use crate::outcome::{NegativeReason, Payload, ProbeFailure, ProbeOutcome};
use crate::worklist::ProbeInput;

/// Sent with every request. Some servers answer bare clients differently.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

/// `HEAD base/path`, following redirects, judged on the final status.
///
/// Servers that reject `HEAD` with 405 are reported as such; the probe does
/// not retry with `GET`.
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    client: Client,
}

impl HttpStatusProbe {
    /// One client, and one connection pool, for the whole run.
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpStatusProbe {
    async fn execute(&self, input: &ProbeInput, timeout: Duration) -> ProbeOutcome {
        let Some(url) = input.url() else {
            return ProbeOutcome::Error(ProbeFailure::InvalidInput("HTTP probes need a web target"));
        };

        match self.client.head(&url).timeout(timeout).send().await {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(e) if e.is_timeout() => ProbeOutcome::Error(ProbeFailure::Timeout),
            Err(e) => ProbeOutcome::Error(ProbeFailure::Http(e.to_string())),
        }
    }
}

fn classify_status(status: u16) -> ProbeOutcome {
    if (200..400).contains(&status) {
        ProbeOutcome::Success(Payload::Status(status))
    } else {
        ProbeOutcome::Negative(NegativeReason::HttpStatus(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;
    use crate::worklist::Param;
    use std::sync::Arc;

    #[test]
    fn status_boundaries() {
        assert_eq!(classify_status(200), ProbeOutcome::Success(Payload::Status(200)));
        assert_eq!(classify_status(399), ProbeOutcome::Success(Payload::Status(399)));
        assert_eq!(
            classify_status(400),
            ProbeOutcome::Negative(NegativeReason::HttpStatus(400))
        );
        assert_eq!(
            classify_status(503),
            ProbeOutcome::Negative(NegativeReason::HttpStatus(503))
        );
    }

    #[tokio::test]
    async fn host_only_target_is_rejected() {
        let probe = HttpStatusProbe::new(Duration::from_secs(1)).unwrap();
        let input = ProbeInput::new(
            Arc::new(Target::host("example.com").unwrap()),
            Param::Path("admin".to_owned()),
        );

        assert!(matches!(
            probe.execute(&input, Duration::from_secs(1)).await,
            ProbeOutcome::Error(ProbeFailure::InvalidInput(_))
        ));
    }
}
