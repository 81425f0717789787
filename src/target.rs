//! Provides functions to validate targets and build the DNS resolver used for
//! name probing.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use hickory_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{fs, io};
use url::Url;

use crate::error::ValidationError;

static HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*\.?$")
        .expect("hostname pattern is valid")
});

/// An addressable endpoint, immutable once built.
///
/// Host targets carry a bare hostname or IP and are used for port, banner and
/// subdomain work. Web targets also carry a base URL (scheme, host, optional
/// port and path prefix) and are used for path work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    base_url: Option<Url>,
}

impl Target {
    /// A bare hostname or IP address, no scheme, port or path.
    ///
    /// ```rust
    /// # use reconprobe::target::Target;
    /// assert!(Target::host("scanme.nmap.org").is_ok());
    /// assert!(Target::host("10.0.0.1").is_ok());
    /// assert!(Target::host("http://scanme.nmap.org").is_err());
    /// ```
    pub fn host(input: &str) -> Result<Self, ValidationError> {
        let host = input.trim();
        if host.parse::<IpAddr>().is_ok() || is_hostname(host) {
            return Ok(Self {
                host: host.trim_end_matches('.').to_owned(),
                base_url: None,
            });
        }
        Err(ValidationError::InvalidHost(input.to_owned()))
    }

    /// A base URL for path probing. `http://` is assumed when no scheme is
    /// given.
    pub fn web(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("http://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| ValidationError::InvalidUrl(input.to_owned()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let Some(host) = url.host_str() else {
            return Err(ValidationError::InvalidUrl(input.to_owned()));
        };

        Ok(Self {
            host: host.to_owned(),
            base_url: Some(url),
        })
    }

    /// Hostname or IP literal.
    #[must_use]
    pub fn host_str(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base_url {
            Some(url) => write!(f, "{url}"),
            None => f.write_str(&self.host),
        }
    }
}

fn is_hostname(candidate: &str) -> bool {
    if candidate.len() > 253 || !HOSTNAME.is_match(candidate) {
        return false;
    }
    // all-numeric dotted names that failed to parse as IPs, e.g. 300.10.1.1
    let last_label = candidate.trim_end_matches('.').rsplit('.').next().unwrap_or_default();
    !last_label.chars().all(|c| c.is_ascii_digit())
}

/// Reduces user input to a registrable domain for subdomain work.
///
/// `https://www.example.com/login` becomes `example.com`.
#[must_use]
pub fn sanitize_domain(input: &str) -> String {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let domain = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    domain.to_ascii_lowercase()
}

/// Derive a DNS resolver.
///
/// 1. if the `resolver` parameter has been set:
///     1. assume the parameter is a path and attempt to read IPs.
///     2. parse the input as a comma-separated list of IPs.
/// 2. if `resolver` is not set:
///    1. attempt to derive a resolver from the system config. (e.g.
///       `/etc/resolv.conf` on *nix).
///    2. finally, build a CloudFlare-based resolver.
///
/// `timeout` bounds every query the resolver sends. A `resolver` value that
/// yields no IPs is rejected rather than producing a resolver with nobody to
/// ask.
pub async fn build_resolver(
    resolver: Option<&str>,
    timeout: Duration,
) -> Result<TokioAsyncResolver, ValidationError> {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;

    match resolver {
        Some(r) => {
            let resolver_ips = match read_resolver_from_file(r).await {
                Ok(ips) => ips,
                Err(_) => r
                    .split(',')
                    .filter_map(|r| IpAddr::from_str(r.trim()).ok())
                    .collect::<Vec<_>>(),
            };
            if resolver_ips.is_empty() {
                return Err(ValidationError::NoResolvers(r.to_owned()));
            }
            debug!("Using resolvers {resolver_ips:?}");
            let addrs: Vec<SocketAddr> = resolver_ips
                .into_iter()
                .map(|ip| SocketAddr::new(ip, 53))
                .collect();
            Ok(TokioAsyncResolver::tokio(udp_config(&addrs), opts))
        }
        None => match hickory_resolver::system_conf::read_system_conf() {
            Ok((config, _)) => Ok(TokioAsyncResolver::tokio(config, opts)),
            Err(e) => {
                debug!("No usable system resolver config ({e}), falling back to Cloudflare");
                Ok(TokioAsyncResolver::tokio(ResolverConfig::cloudflare_tls(), opts))
            }
        },
    }
}

/// A resolver config that queries exactly the given name servers over UDP,
/// with no search domains.
#[must_use]
pub fn udp_config(name_servers: &[SocketAddr]) -> ResolverConfig {
    let mut config = ResolverConfig::new();
    for &addr in name_servers {
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
    }
    config
}

/// Parses an input file of IPs for use in DNS resolution.
async fn read_resolver_from_file(path: &str) -> io::Result<Vec<IpAddr>> {
    let ips = fs::read_to_string(path)
        .await?
        .lines()
        .filter_map(|line| IpAddr::from_str(line.trim()).ok())
        .collect();

    Ok(ips)
}
