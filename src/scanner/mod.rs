//! Core functionality for actual probing behaviour.
//!
//! [`Scanner`] drives one [`Probe`] over a [`WorkList`] with at most `cap`
//! probes in flight. The list is consumed chunk by chunk, so the number of
//! pending futures is bounded by the chunk size no matter how long the list
//! is. Every input yields exactly one outcome unless the run is cancelled.
use crate::aggregate::{Aggregator, RunReport};
use crate::outcome::{ProbeFailure, ProbeOutcome};
use crate::probe::Probe;
use crate::profile::ConcurrencyProfile;
use crate::worklist::{ProbeInput, WorkList, DEFAULT_CHUNK_SIZE};
use chrono::Utc;
use futures::{stream, StreamExt};
use log::{debug, info, warn};
use std::pin::pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// How many times a probe that ran out of file descriptors is retried.
const EXHAUSTION_RETRIES: u32 = 3;
const EXHAUSTION_BACKOFF: Duration = Duration::from_millis(250);

/// Emitted after every completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Bookkeeping for one finished (or cancelled) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    /// Inputs in the work list.
    pub total: usize,
    /// Outcomes actually produced.
    pub completed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// The executor.
///
/// Progress events go to an unbounded channel so a slow renderer never
/// stalls probing. Cancelling the token stops the run at the next
/// completion; probes still in flight are dropped.
#[derive(Debug)]
pub struct Scanner<P> {
    probe: P,
    profile: ConcurrencyProfile,
    chunk_size: usize,
    progress: Option<UnboundedSender<Progress>>,
    cancel: CancellationToken,
}

impl<P: Probe> Scanner<P> {
    pub fn new(probe: P, profile: ConcurrencyProfile) -> Self {
        Self {
            probe,
            profile,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Inputs materialised at a time. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: UnboundedSender<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this scanner's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn profile(&self) -> ConcurrencyProfile {
        self.profile
    }

    /// Runs every input through the probe and hands each outcome to `sink`
    /// in completion order.
    pub async fn run<F>(&self, work: WorkList, mut sink: F) -> Execution
    where
        F: FnMut(ProbeInput, ProbeOutcome),
    {
        let started = Instant::now();
        let total = work.len();
        let cap = self.profile.cap();
        let mut completed = 0;

        debug!(
            "Start probing. \nCap {}\nTimeout {:?}\nChunk size {}\nInputs {}",
            cap,
            self.profile.timeout(),
            self.chunk_size,
            total
        );

        for chunk in work.chunks(self.chunk_size) {
            if self.cancel.is_cancelled() {
                break;
            }

            let outcomes = stream::iter(chunk)
                .map(|input| self.probe_one(input))
                .buffer_unordered(cap)
                .take_until(self.cancel.cancelled());
            let mut outcomes = pin!(outcomes);

            while let Some((input, outcome)) = outcomes.next().await {
                completed += 1;
                if let Some(progress) = &self.progress {
                    // a dropped receiver only means nobody is watching
                    let _ = progress.send(Progress { completed, total });
                }
                sink(input, outcome);
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!("Run cancelled after {completed} of {total} probes");
        }

        Execution {
            total,
            completed,
            cancelled,
            elapsed: started.elapsed(),
        }
    }

    /// [`Scanner::run`] feeding an [`Aggregator`].
    pub async fn scan(&self, work: WorkList) -> RunReport {
        let started_at = Utc::now();
        let mut aggregator = Aggregator::new();
        let execution = self
            .run(work, |input, outcome| aggregator.record(&input, outcome))
            .await;
        aggregator.finish(&execution, started_at)
    }

    /// One probe under the hard time guard, with backoff when the process is
    /// out of file descriptors.
    async fn probe_one(&self, input: ProbeInput) -> (ProbeInput, ProbeOutcome) {
        let timeout = self.profile.timeout();
        let budget = self.probe.budget(timeout);

        let mut attempt = 0;
        loop {
            let outcome = time::timeout(budget, self.probe.execute(&input, timeout))
                .await
                .unwrap_or(ProbeOutcome::Error(ProbeFailure::Timeout));

            if outcome != ProbeOutcome::Error(ProbeFailure::ResourceExhausted)
                || attempt == EXHAUSTION_RETRIES
            {
                return (input, outcome);
            }

            attempt += 1;
            warn!(
                "Too many open files while probing {}, backing off (attempt {attempt}). Consider lowering the concurrency",
                input.key()
            );
            time::sleep(EXHAUSTION_BACKOFF * attempt).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{NegativeReason, Payload};
    use crate::target::Target;
    use crate::worklist::Param;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn prefixes(n: usize) -> WorkList {
        WorkList::from_params(
            Target::host("example.com").unwrap(),
            (0..n).map(|i| Param::Prefix(format!("p{i}"))),
        )
    }

    /// Resolves immediately: even inputs succeed, odd ones are negative.
    struct Parity;

    #[async_trait]
    impl Probe for Parity {
        async fn execute(&self, input: &ProbeInput, _timeout: Duration) -> ProbeOutcome {
            let Param::Prefix(prefix) = input.param() else {
                unreachable!()
            };
            let n: usize = prefix[1..].parse().unwrap();
            if n % 2 == 0 {
                ProbeOutcome::Success(Payload::Status(200))
            } else {
                ProbeOutcome::Negative(NegativeReason::NxDomain)
            }
        }
    }

    /// Records how many probes overlap.
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Probe for Arc<Gauge> {
        async fn execute(&self, _input: &ProbeInput, _timeout: Duration) -> ProbeOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProbeOutcome::Negative(NegativeReason::Refused)
        }
    }

    struct Hung;

    #[async_trait]
    impl Probe for Hung {
        async fn execute(&self, _input: &ProbeInput, _timeout: Duration) -> ProbeOutcome {
            std::future::pending::<ProbeOutcome>().await
        }
    }

    /// Out of descriptors on the first call for every input.
    #[derive(Default)]
    struct Exhausted {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for Arc<Exhausted> {
        async fn execute(&self, _input: &ProbeInput, _timeout: Duration) -> ProbeOutcome {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ProbeOutcome::Error(ProbeFailure::ResourceExhausted)
            } else {
                ProbeOutcome::Success(Payload::Status(204))
            }
        }
    }

    fn profile(cap: usize) -> ConcurrencyProfile {
        ConcurrencyProfile::new(cap, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn never_exceeds_cap() {
        let gauge = Arc::new(Gauge::default());
        let scanner = Scanner::new(Arc::clone(&gauge), profile(7)).with_chunk_size(64);

        let execution = scanner.run(prefixes(500), |_, _| {}).await;

        assert_eq!(execution.completed, 500);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 7, "peak {peak}");
        assert!(peak > 1, "probes never overlapped");
    }

    #[tokio::test]
    async fn empty_work_list() {
        let scanner = Scanner::new(Parity, profile(10));
        let execution = scanner.run(prefixes(0), |_, _| panic!("no inputs")).await;
        assert_eq!(execution.total, 0);
        assert_eq!(execution.completed, 0);
        assert!(!execution.cancelled);
    }

    #[tokio::test]
    async fn every_input_exactly_once_across_chunks() {
        let scanner = Scanner::new(Parity, profile(1000)).with_chunk_size(50_000);
        let mut seen = HashSet::new();

        let execution = scanner
            .run(prefixes(100_000), |input, _| {
                assert!(seen.insert(input.param().clone()), "duplicate outcome");
            })
            .await;

        assert_eq!(execution.total, 100_000);
        assert_eq!(execution.completed, 100_000);
        assert_eq!(seen.len(), 100_000);
    }

    #[tokio::test]
    async fn progress_counts_up_to_total() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scanner = Scanner::new(Parity, profile(4))
            .with_chunk_size(3)
            .with_progress(tx);

        scanner.run(prefixes(10), |_, _| {}).await;
        drop(scanner);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 10);
        assert_eq!(events.last(), Some(&Progress { completed: 10, total: 10 }));
        assert!(events.windows(2).all(|w| w[0].completed + 1 == w[1].completed));
    }

    #[tokio::test]
    async fn cancellation_returns_completed_outcomes() {
        let scanner = Scanner::new(Parity, profile(20));
        let cancel = scanner.cancellation_token();
        let mut successes = 0;
        let mut delivered = 0;

        let execution = scanner
            .run(prefixes(10_000), |_, outcome| {
                delivered += 1;
                if outcome.is_success() {
                    successes += 1;
                }
                if delivered == 50 {
                    cancel.cancel();
                }
            })
            .await;

        assert!(execution.cancelled);
        assert_eq!(execution.completed, 50);
        assert_eq!(delivered, 50);
        assert!(successes <= 50);
    }

    #[tokio::test]
    async fn scan_report_holds_only_completed_findings() {
        let scanner = Scanner::new(Parity, profile(20));
        let cancel = scanner.cancellation_token();
        cancel.cancel();

        let report = scanner.scan(prefixes(10_000)).await;

        assert!(report.summary.cancelled);
        assert_eq!(report.summary.completed, 0);
        assert!(report.result.is_empty());
    }

    #[tokio::test]
    async fn hung_probe_times_out() {
        let scanner = Scanner::new(Hung, profile(10));
        let started = Instant::now();
        let mut outcomes = Vec::new();

        scanner
            .run(prefixes(3), |_, outcome| outcomes.push(outcome))
            .await;

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(outcomes, vec![ProbeOutcome::Error(ProbeFailure::Timeout); 3]);
    }

    #[tokio::test]
    async fn all_errors_still_complete() {
        let report = Scanner::new(Hung, profile(50)).scan(prefixes(120)).await;

        assert!(report.result.is_empty());
        assert_eq!(report.summary.errors, 120);
        assert!(report.summary.to_string().starts_with("0 findings, 120 errors"));
    }

    #[tokio::test]
    async fn exhaustion_is_retried() {
        let probe = Arc::new(Exhausted::default());
        let scanner = Scanner::new(Arc::clone(&probe), profile(1));
        let mut outcomes = Vec::new();

        scanner
            .run(prefixes(1), |_, outcome| outcomes.push(outcome))
            .await;

        assert_eq!(outcomes, vec![ProbeOutcome::Success(Payload::Status(204))]);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }
}
