//! Folding probe outcomes into a deduplicated, deterministically ordered
//! result with summary counters.
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::outcome::{Payload, ProbeFailure, ProbeOutcome};
use crate::scanner::Execution;
use crate::worklist::{ProbeInput, ProbeKey};

/// Distinct error descriptions kept for the debug log.
const ERROR_SAMPLE: usize = 1000;

/// A retained success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub key: ProbeKey,
    pub payload: Payload,
}

impl Finding {
    /// Sort key: paths by status first, everything else by key alone.
    fn rank(&self) -> (u16, &ProbeKey) {
        match (&self.key, &self.payload) {
            (ProbeKey::Url(_), Payload::Status(status)) => (*status, &self.key),
            _ => (0, &self.key),
        }
    }
}

/// Findings, at most one per key, in rendering order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunResult {
    findings: Vec<Finding>,
}

impl RunResult {
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    /// The payload found for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &ProbeKey) -> Option<&Payload> {
        self.findings
            .iter()
            .find(|finding| &finding.key == key)
            .map(|finding| &finding.payload)
    }
}

impl<'a> IntoIterator for &'a RunResult {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Inputs in the work list.
    pub total: usize,
    /// Outcomes received. Below `total` only when cancelled.
    pub completed: usize,
    /// Distinct findings.
    pub findings: usize,
    pub negatives: usize,
    /// Error outcomes, timeouts included.
    pub errors: usize,
    pub timeouts: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} findings, {} errors ({} timeouts), {} negatives, {}/{} probed in {:.2?}",
            self.findings,
            self.errors,
            self.timeouts,
            self.negatives,
            self.completed,
            self.total,
            self.elapsed
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// What a run hands to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub result: RunResult,
    pub summary: Summary,
}

/// Single consumer of the outcome stream.
///
/// Successes are deduplicated on [`ProbeInput::key`]. When a key succeeds
/// more than once the smallest payload wins, so the result does not depend on
/// completion order.
#[derive(Debug, Default)]
pub struct Aggregator {
    findings: HashMap<ProbeKey, Payload>,
    completed: usize,
    negatives: usize,
    errors: usize,
    timeouts: usize,
    error_sample: HashSet<String>,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, input: &ProbeInput, outcome: ProbeOutcome) {
        self.completed += 1;
        match outcome {
            ProbeOutcome::Success(payload) => match self.findings.entry(input.key()) {
                Entry::Occupied(mut seen) => {
                    if payload < *seen.get() {
                        seen.insert(payload);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(payload);
                }
            },
            ProbeOutcome::Negative(_) => self.negatives += 1,
            ProbeOutcome::Error(failure) => {
                self.errors += 1;
                if failure == ProbeFailure::Timeout {
                    self.timeouts += 1;
                }
                if self.error_sample.len() < ERROR_SAMPLE {
                    self.error_sample.insert(failure.to_string());
                }
            }
        }
    }

    /// The findings so far, sorted.
    #[must_use]
    pub fn result(&self) -> RunResult {
        let mut findings: Vec<Finding> = self
            .findings
            .iter()
            .map(|(key, payload)| Finding {
                key: key.clone(),
                payload: payload.clone(),
            })
            .collect();
        findings.sort_by(|a, b| a.rank().cmp(&b.rank()));
        RunResult { findings }
    }

    pub fn finish(self, execution: &Execution, started_at: DateTime<Utc>) -> RunReport {
        debug!("Typical probe errors {:?}", self.error_sample);

        let result = self.result();
        debug!("Findings: {:?}", result.findings);

        let summary = Summary {
            total: execution.total,
            completed: self.completed,
            findings: result.len(),
            negatives: self.negatives,
            errors: self.errors,
            timeouts: self.timeouts,
            cancelled: execution.cancelled,
            elapsed: execution.elapsed,
            started_at,
        };
        RunReport { result, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Banner, NegativeReason};
    use crate::target::Target;
    use crate::worklist::Param;
    use rand::seq::SliceRandom;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    fn port(p: u16) -> ProbeInput {
        ProbeInput::new(Arc::new(Target::host("10.0.0.1").unwrap()), Param::Port(p))
    }

    fn path(p: &str) -> ProbeInput {
        ProbeInput::new(
            Arc::new(Target::web("http://example.com").unwrap()),
            Param::Path(p.to_owned()),
        )
    }

    fn open() -> ProbeOutcome {
        ProbeOutcome::Success(Payload::Open {
            banner: Banner::Absent,
        })
    }

    fn execution(total: usize) -> Execution {
        Execution {
            total,
            completed: total,
            cancelled: false,
            elapsed: Duration::from_millis(5),
        }
    }

    fn ports_of(result: &RunResult) -> Vec<u16> {
        result
            .iter()
            .map(|finding| match finding.key {
                ProbeKey::Socket { port, .. } => port,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn duplicates_collapse() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&port(80), open());
        aggregator.record(&port(80), open());
        aggregator.record(&port(22), open());

        let result = aggregator.result();
        assert_eq!(ports_of(&result), vec![22, 80]);
    }

    #[test]
    fn ports_sort_numerically() {
        let mut aggregator = Aggregator::new();
        for p in [8080, 22, 443, 3306, 80] {
            aggregator.record(&port(p), open());
        }
        assert_eq!(ports_of(&aggregator.result()), vec![22, 80, 443, 3306, 8080]);
    }

    #[test]
    fn ordering_ignores_arrival_order() {
        let mut pairs: Vec<(ProbeInput, ProbeOutcome)> = (1..=200)
            .map(|p| (port(p), open()))
            .chain((1..=50).map(|p| (port(p), open())))
            .collect();

        let mut first = Aggregator::new();
        for (input, outcome) in pairs.clone() {
            first.record(&input, outcome);
        }

        pairs.shuffle(&mut rand::rng());
        let mut second = Aggregator::new();
        for (input, outcome) in pairs {
            second.record(&input, outcome);
        }

        assert_eq!(first.result(), second.result());
        assert_eq!(first.result().len(), 200);
    }

    #[test]
    fn paths_sort_by_status_then_url() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&path("zeta"), ProbeOutcome::Success(Payload::Status(200)));
        aggregator.record(&path("admin"), ProbeOutcome::Success(Payload::Status(301)));
        aggregator.record(&path("alpha"), ProbeOutcome::Success(Payload::Status(200)));

        let urls: Vec<String> = aggregator
            .result()
            .iter()
            .map(|finding| finding.key.to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://example.com/alpha",
                "http://example.com/zeta",
                "http://example.com/admin"
            ]
        );
    }

    #[test]
    fn conflicting_payloads_keep_the_smallest() {
        let name = ProbeInput::new(
            Arc::new(Target::host("example.com").unwrap()),
            Param::Prefix("www".to_owned()),
        );
        let high = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));
        let low = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        let mut aggregator = Aggregator::new();
        aggregator.record(&name, ProbeOutcome::Success(Payload::Resolved(high)));
        aggregator.record(&name, ProbeOutcome::Success(Payload::Resolved(low)));

        let key = ProbeKey::Name("www.example.com".to_owned());
        assert_eq!(aggregator.result().get(&key), Some(&Payload::Resolved(low)));
    }

    #[test]
    fn negatives_and_errors_are_counted_not_kept() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&port(1), open());
        aggregator.record(&port(2), ProbeOutcome::Negative(NegativeReason::Refused));
        aggregator.record(&port(3), ProbeOutcome::Error(ProbeFailure::Timeout));
        aggregator.record(&port(4), ProbeOutcome::Error(ProbeFailure::Network("reset".to_owned())));

        let report = aggregator.finish(&execution(4), Utc::now());
        assert_eq!(report.result.len(), 1);
        assert_eq!(report.summary.completed, 4);
        assert_eq!(report.summary.findings, 1);
        assert_eq!(report.summary.negatives, 1);
        assert_eq!(report.summary.errors, 2);
        assert_eq!(report.summary.timeouts, 1);
    }

    #[test]
    fn all_errors_report() {
        let mut aggregator = Aggregator::new();
        for p in 1..=30 {
            aggregator.record(&port(p), ProbeOutcome::Error(ProbeFailure::Timeout));
        }

        let report = aggregator.finish(&execution(30), Utc::now());
        assert!(report.result.is_empty());
        assert!(report.summary.to_string().starts_with("0 findings, 30 errors"));
    }

    #[test]
    fn report_serializes() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&port(22), open());
        let report = aggregator.finish(&execution(1), Utc::now());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["findings"], 1);
        assert_eq!(json["result"][0]["key"]["Socket"]["port"], 22);
    }
}
