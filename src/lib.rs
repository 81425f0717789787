//! This crate exposes the probing engine behind the `reconprobe` binary.
//!
//! reconprobe answers one kind of question at a time about one target: which
//! ports accept connections (optionally with the service greeting), which
//! subdomains resolve, or which paths exist on a web server. Each question is
//! a large list of small, independent network operations run with a hard cap
//! on how many are in flight.
//!
//! ## Architecture Overview
//!
//! 1. **Input Processing**: targets, port ranges and wordlists are validated
//!    ([`target`], [`input`], [`wordlist`]).
//! 2. **Work List**: the target is expanded against the parameters into a lazy,
//!    chunked [`WorkList`](crate::worklist::WorkList).
//! 3. **Probing**: the [`Scanner`](crate::scanner::Scanner) runs a
//!    [`Probe`](crate::probe::Probe) over the list under a
//!    [`ConcurrencyProfile`](crate::profile::ConcurrencyProfile).
//! 4. **Aggregation**: outcomes are deduplicated and sorted into a
//!    [`RunReport`](crate::aggregate::RunReport).
//!
//! Every probe ends as a success, a negative (definitively absent) or an
//! error (could not tell). Negatives and errors are counted separately so a
//! quiet network can be told apart from a hostile one.
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use reconprobe::input::{parse_port_ranges, ScanOrder};
//! use reconprobe::port_strategy::PortStrategy;
//! use reconprobe::probe::TcpConnectProbe;
//! use reconprobe::profile::ConcurrencyProfile;
//! use reconprobe::scanner::Scanner;
//! use reconprobe::target::Target;
//! use reconprobe::worklist::WorkList;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let target = Target::host("127.0.0.1")?;
//!     let ranges = parse_port_ranges("22,80,8000-8100")?;
//!     let strategy = PortStrategy::pick(Some(ranges), None, ScanOrder::Serial);
//!
//!     let profile = ConcurrencyProfile::new(100, Duration::from_millis(500));
//!     let scanner = Scanner::new(TcpConnectProbe, profile);
//!     let report = scanner.scan(WorkList::ports(target, strategy)).await;
//!
//!     for finding in &report.result {
//!         println!("{} {}", finding.key, finding.payload);
//!     }
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
#![allow(clippy::needless_doctest_main)]

pub mod aggregate;
pub mod error;
pub mod input;
pub mod limits;
pub mod outcome;
pub mod port_strategy;
pub mod probe;
pub mod profile;
pub mod scanner;
pub mod target;
pub mod tui;
pub mod wordlist;
pub mod worklist;
