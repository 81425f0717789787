//! Expansion of one target against ports or a wordlist into individual probe
//! inputs.
//!
//! Inputs are produced lazily and handed out in fixed-size chunks, so a
//! 700k-line wordlist never has more than one chunk of [`ProbeInput`]s alive.
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ValidationError;
use crate::port_strategy::PortStrategy;
use crate::target::Target;
use crate::wordlist::Wordlist;

/// Inputs materialised per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// The parameter under test for one input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Param {
    Port(u16),
    /// Subdomain prefix, joined to the target host.
    Prefix(String),
    /// Path, joined to the target's base URL.
    Path(String),
}

/// One unit of work: a shared target plus the parameter under test.
#[derive(Debug, Clone)]
pub struct ProbeInput {
    target: Arc<Target>,
    param: Param,
}

impl ProbeInput {
    #[must_use]
    pub fn new(target: Arc<Target>, param: Param) -> Self {
        Self { target, param }
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn param(&self) -> &Param {
        &self.param
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        match self.param {
            Param::Port(port) => Some(port),
            _ => None,
        }
    }

    /// `prefix.host` for prefix inputs.
    #[must_use]
    pub fn fqdn(&self) -> Option<String> {
        match &self.param {
            Param::Prefix(prefix) => Some(format!("{prefix}.{}", self.target.host_str())),
            _ => None,
        }
    }

    /// `base/path` for path inputs on web targets.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        match &self.param {
            Param::Path(path) => self.target.base_url().map(|base| {
                format!(
                    "{}/{}",
                    base.as_str().trim_end_matches('/'),
                    path.trim_start_matches('/')
                )
            }),
            _ => None,
        }
    }

    /// The natural identity used for deduplication and ordering.
    #[must_use]
    pub fn key(&self) -> ProbeKey {
        match &self.param {
            Param::Port(port) => ProbeKey::Socket {
                host: self.target.host_str().to_owned(),
                port: *port,
            },
            Param::Prefix(_) => ProbeKey::Name(self.fqdn().unwrap_or_default()),
            Param::Path(path) => ProbeKey::Url(self.url().unwrap_or_else(|| {
                format!("http://{}/{}", self.target.host_str(), path.trim_start_matches('/'))
            })),
        }
    }
}

/// Natural identity of a probe input. Ordering is host then port ascending,
/// or plain lexical for names and URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProbeKey {
    Socket { host: String, port: u16 },
    Name(String),
    Url(String),
}

impl fmt::Display for ProbeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKey::Socket { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            ProbeKey::Socket { host, port } => write!(f, "{host}:{port}"),
            ProbeKey::Name(name) => f.write_str(name),
            ProbeKey::Url(url) => f.write_str(url),
        }
    }
}

/// Lazy sequence of probe inputs for one target, in parameter order.
pub struct WorkList {
    target: Arc<Target>,
    params: Box<dyn Iterator<Item = Param> + Send>,
    total: usize,
}

impl WorkList {
    /// Target × ports.
    #[must_use]
    pub fn ports(target: Target, strategy: PortStrategy) -> Self {
        let total = strategy.len();
        Self {
            target: Arc::new(target),
            params: Box::new(strategy.into_ports().map(Param::Port)),
            total,
        }
    }

    /// `prefix.target` for every prefix.
    #[must_use]
    pub fn prefixes(target: Target, wordlist: Wordlist) -> Self {
        let total = wordlist.len();
        Self {
            target: Arc::new(target),
            params: Box::new(wordlist.into_iter().map(Param::Prefix)),
            total,
        }
    }

    /// `base/path` for every path. The target must be a web target.
    pub fn paths(target: Target, wordlist: Wordlist) -> Result<Self, ValidationError> {
        if target.base_url().is_none() {
            return Err(ValidationError::NotWebTarget(target.host_str().to_owned()));
        }
        let total = wordlist.len();
        Ok(Self {
            target: Arc::new(target),
            params: Box::new(wordlist.into_iter().map(Param::Path)),
            total,
        })
    }

    /// Any parameter sequence with a known length.
    pub fn from_params<I>(target: Target, params: I) -> Self
    where
        I: IntoIterator<Item = Param>,
        I::IntoIter: ExactSizeIterator + Send + 'static,
    {
        let params = params.into_iter();
        let total = params.len();
        Self {
            target: Arc::new(target),
            params: Box::new(params),
            total,
        }
    }

    /// Number of inputs the list will produce in total.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Splits the list into vectors of at most `size` inputs.
    #[must_use]
    pub fn chunks(self, size: usize) -> Chunks {
        Chunks {
            inner: self,
            size: size.max(1),
        }
    }
}

impl Iterator for WorkList {
    type Item = ProbeInput;

    fn next(&mut self) -> Option<Self::Item> {
        let param = self.params.next()?;
        Some(ProbeInput::new(Arc::clone(&self.target), param))
    }
}

impl fmt::Debug for WorkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkList")
            .field("target", &self.target)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// Fixed-size chunks of a [`WorkList`].
#[derive(Debug)]
pub struct Chunks {
    inner: WorkList,
    size: usize,
}

impl Iterator for Chunks {
    type Item = Vec<ProbeInput>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<ProbeInput> = self.inner.by_ref().take(self.size).collect();
        (!chunk.is_empty()).then_some(chunk)
    }
}
