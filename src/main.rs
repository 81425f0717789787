#![allow(clippy::doc_markdown)]

use reconprobe::aggregate::{Finding, RunReport};
use reconprobe::input::{Config, Opts};
use reconprobe::limits::{fit_cap_to_limit, raise_fd_limit};
use reconprobe::outcome::Payload;
use reconprobe::port_strategy::PortStrategy;
use reconprobe::probe::{BannerProbe, DnsProbe, HttpStatusProbe, Probe, TcpConnectProbe};
use reconprobe::profile::{ConcurrencyProfile, ScanMode};
use reconprobe::scanner::{Progress, Scanner};
use reconprobe::target::{sanitize_domain, Target};
use reconprobe::tui::print_opening;
use reconprobe::wordlist::{Wordlist, DEFAULT_PATHS, DEFAULT_SUBDOMAINS};
use reconprobe::worklist::{ProbeKey, WorkList};
use reconprobe::{detail, output, warning};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

/// Probes one target according to the options, then prints the report.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone())?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    let quiet = opts.greppable || opts.json;
    if !opts.no_banner {
        print_opening(quiet, opts.accessible);
    }

    let mut profile = opts.profile();
    if opts.mode != ScanMode::Subdomains {
        profile = fit_profile_to_limit(&opts, profile)?;
    }
    detail!(
        format!(
            "Mode {:?}, {} probes in flight, {}ms timeout",
            opts.mode,
            profile.cap(),
            profile.timeout().as_millis()
        ),
        quiet,
        opts.accessible
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let report = match opts.mode {
        ScanMode::Ports | ScanMode::Banners => {
            let target = Target::host(&opts.target)
                .with_context(|| format!("Cannot probe ports on '{}'", opts.target))?;
            let strategy = PortStrategy::pick(Some(opts.port_ranges()), None, opts.scan_order);
            let work = WorkList::ports(target, strategy);

            if opts.mode == ScanMode::Banners {
                let probe = BannerProbe::new(Duration::from_millis(opts.banner_timeout));
                execute(probe, work, profile, &opts, cancel).await
            } else {
                execute(TcpConnectProbe, work, profile, &opts, cancel).await
            }
        }
        ScanMode::Subdomains => {
            let domain = sanitize_domain(&opts.target);
            let target = Target::host(&domain)
                .with_context(|| format!("Cannot enumerate subdomains of '{}'", opts.target))?;
            let wordlist =
                Wordlist::load(opts.wordlist.as_deref(), Some(DEFAULT_SUBDOMAINS)).await?;
            let probe =
                DnsProbe::with_resolvers(opts.resolver.as_deref(), profile.timeout()).await?;
            execute(probe, WorkList::prefixes(target, wordlist), profile, &opts, cancel).await
        }
        ScanMode::Dirs => {
            let target = Target::web(&opts.target)
                .with_context(|| format!("Cannot probe paths on '{}'", opts.target))?;
            let wordlist = Wordlist::load(opts.wordlist.as_deref(), Some(DEFAULT_PATHS)).await?;
            let probe = HttpStatusProbe::new(profile.timeout())?;
            execute(probe, WorkList::paths(target, wordlist)?, profile, &opts, cancel).await
        }
    };

    if opts.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Could not serialise the report")?
        );
        return Ok(());
    }

    if opts.greppable {
        println!(
            "{} -> [{}]",
            opts.target,
            report.result.iter().map(greppable_item).join(",")
        );
        return Ok(());
    }

    print_report(&report, &opts);
    Ok(())
}

/// Raises the descriptor limit if asked and lowers the cap to fit under it.
fn fit_profile_to_limit(opts: &Opts, profile: ConcurrencyProfile) -> Result<ConcurrencyProfile> {
    let quiet = opts.greppable || opts.json;
    let fd_limit = raise_fd_limit(opts.ulimit).context("Could not read the file descriptor limit")?;
    if let Some(ulimit) = opts.ulimit {
        detail!(
            format!("Asked to raise the file descriptor limit to {ulimit}, now {fd_limit}."),
            quiet,
            opts.accessible
        );
    }

    let fitted = fit_cap_to_limit(profile.cap(), fd_limit);
    if fitted < profile.cap() {
        warning!(
            format!(
                "File limit {fd_limit} is lower than the concurrency cap {}. Lowering it to {fitted}, consider upping it with --ulimit.",
                profile.cap()
            ),
            quiet,
            opts.accessible
        );
        return Ok(profile.with_cap(fitted));
    }
    Ok(profile)
}

/// Runs the work list with a live progress bar.
async fn execute<P: Probe>(
    probe: P,
    work: WorkList,
    profile: ConcurrencyProfile,
    opts: &Opts,
    cancel: CancellationToken,
) -> RunReport {
    let hidden = opts.greppable || opts.json || opts.accessible;
    let total = u64::try_from(work.len()).unwrap_or(u64::MAX);
    let (progress, events) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render_progress(progress_bar(total, hidden), events));

    let scanner = Scanner::new(probe, profile)
        .with_chunk_size(opts.chunk_size)
        .with_progress(progress)
        .with_cancellation(cancel);
    let report = scanner.scan(work).await;
    // closes the progress channel
    drop(scanner);

    if let Err(e) = renderer.await {
        debug!("Progress renderer stopped early: {e}");
    }
    report
}

fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("#>-"));
    bar.set_style(style);
    bar
}

async fn render_progress(bar: ProgressBar, mut events: UnboundedReceiver<Progress>) {
    while let Some(event) = events.recv().await {
        bar.set_position(u64::try_from(event.completed).unwrap_or(u64::MAX));
    }
    bar.finish_and_clear();
}

fn greppable_item(finding: &Finding) -> String {
    match (&finding.key, &finding.payload) {
        (ProbeKey::Socket { port, .. }, _) => port.to_string(),
        (key, payload) => format!("{key}={payload}"),
    }
}

fn print_report(report: &RunReport, opts: &Opts) {
    for finding in &report.result {
        let line = match &finding.payload {
            Payload::Open { banner } => format!("Open {:<24} {banner}", finding.key.to_string()),
            Payload::Resolved(ip) => format!("{:<40} {ip}", finding.key.to_string()),
            Payload::Status(status) => format!("[{status}] {}", finding.key),
        };
        output!(line, false, opts.accessible);
    }

    let summary = &report.summary;
    if summary.cancelled {
        warning!(
            "Interrupted, the results below are partial.",
            false,
            opts.accessible
        );
    }
    if summary.findings == 0 && summary.errors > 0 {
        warning!(
            format!(
                "No findings and {} errors ({} timeouts). The network may be filtering traffic.",
                summary.errors, summary.timeouts
            ),
            false,
            opts.accessible
        );
    }
    detail!(summary, false, opts.accessible);
}
