//! Named concurrency presets: how many probes may be in flight at once and how
//! long each one may take.
use clap::ValueEnum;
use serde::Serialize;
use serde_derive::Deserialize;
use std::num::NonZero;
use std::time::Duration;

/// What a run probes. Each mode pairs a work list shape with a probe kind.
#[derive(Deserialize, Serialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanMode {
    /// TCP connect against host × ports.
    Ports,
    /// TCP connect plus a read of the service greeting.
    Banners,
    /// A-record resolution of prefix.domain for every prefix.
    Subdomains,
    /// HTTP HEAD against base-url/path for every path.
    Dirs,
}

/// Speed level. Higher levels keep more probes in flight.
#[derive(Deserialize, Serialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speed {
    Normal,
    Fast,
    Insane,
}

/// A cap on simultaneous in-flight probes plus a per-probe timeout.
///
/// Selected before a run starts and fixed for its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConcurrencyProfile {
    cap: NonZero<usize>,
    timeout: Duration,
}

impl ConcurrencyProfile {
    /// A cap of zero is corrected to one.
    #[must_use]
    pub fn new(cap: usize, timeout: Duration) -> Self {
        Self {
            cap: NonZero::new(cap).unwrap_or(NonZero::<usize>::MIN),
            timeout,
        }
    }

    /// The preset used by each tool at each speed level.
    #[must_use]
    pub fn preset(mode: ScanMode, speed: Speed) -> Self {
        let (caps, timeout_ms) = match mode {
            ScanMode::Ports => ([100, 500, 2000], 1500),
            ScanMode::Banners => ([50, 200, 500], 1500),
            ScanMode::Subdomains => ([50, 500, 1000], 3000),
            ScanMode::Dirs => ([50, 200, 500], 5000),
        };
        let cap = match speed {
            Speed::Normal => caps[0],
            Speed::Fast => caps[1],
            Speed::Insane => caps[2],
        };
        Self::new(cap, Duration::from_millis(timeout_ms))
    }

    #[must_use]
    pub fn with_cap(self, cap: usize) -> Self {
        Self::new(cap, self.timeout)
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Maximum number of probes in flight at any instant.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap.get()
    }

    /// Timeout handed to every probe.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
