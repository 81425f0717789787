//! File-descriptor limits. Every in-flight TCP or HTTP probe holds a socket,
//! so the concurrency cap has to fit under the soft `NOFILE` limit.
use log::{info, warn};
use std::io;

/// Descriptors left for stdio, the resolver and the runtime.
const RESERVED_DESCRIPTORS: u64 = 100;

/// Raises the soft and hard limit to `limit` when asked, then reports the
/// soft limit in effect.
#[cfg(unix)]
pub fn raise_fd_limit(limit: Option<u64>) -> io::Result<u64> {
    use rlimit::Resource;

    if let Some(limit) = limit {
        match Resource::NOFILE.set(limit, limit) {
            Ok(()) => info!("Raised file descriptor limit to {limit}"),
            Err(e) => warn!("Failed to set file descriptor limit to {limit}: {e}"),
        }
    }

    let (soft, _) = Resource::NOFILE.get()?;
    Ok(soft)
}

#[cfg(not(unix))]
pub fn raise_fd_limit(_limit: Option<u64>) -> io::Result<u64> {
    Ok(u64::MAX)
}

/// Largest cap, no higher than `cap`, that leaves room under `fd_limit`.
///
/// Limits below twice the reserve are halved instead. Never returns zero.
#[must_use]
pub fn fit_cap_to_limit(cap: usize, fd_limit: u64) -> usize {
    let wanted = u64::try_from(cap).unwrap_or(u64::MAX);
    if fd_limit.saturating_sub(RESERVED_DESCRIPTORS) >= wanted {
        return cap;
    }

    let fitted = if fd_limit < 2 * RESERVED_DESCRIPTORS {
        fd_limit / 2
    } else {
        fd_limit - RESERVED_DESCRIPTORS
    };
    warn!("File descriptor limit {fd_limit} is too low for {cap} concurrent probes, using {fitted}");

    usize::try_from(fitted).unwrap_or(cap).clamp(1, cap.max(1))
}
