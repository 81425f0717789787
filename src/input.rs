//! Provides a means to read, parse and hold configuration options for runs.
use crate::error::{EngineError, ValidationError};
use crate::profile::{ConcurrencyProfile, ScanMode, Speed};
use crate::worklist::DEFAULT_CHUNK_SIZE;
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const LOWEST_PORT_NUMBER: u16 = 1;
const TOP_PORT_NUMBER: u16 = 65535;

/// Ports probed by `--top`: the usual remote-access, mail, database and web
/// suspects plus the 8081-8099 block of alternate web ports.
pub const COMMON_PORTS: [u16; 40] = [
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 1433, 3306, 3389, 5432, 5900,
    8080, 8443, 8081, 8082, 8083, 8084, 8085, 8086, 8087, 8088, 8089, 8090, 8091, 8092, 8093, 8094,
    8095, 8096, 8097, 8098, 8099,
];

/// Represents the strategy in which the port probing will run.
///   - Serial will run in the order the ranges were given, for example 1 to 1_000.
///   - Random will randomize the order in which ports will be probed.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Serial,
    Random,
}

/// Validated, inclusive port ranges in the order they were given.
///
/// Ranges may overlap; expansion skips ports already produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRanges(pub Vec<(u16, u16)>);

impl PortRanges {
    /// The whole non-zero 16-bit port space.
    #[must_use]
    pub fn full() -> Self {
        Self(vec![(LOWEST_PORT_NUMBER, TOP_PORT_NUMBER)])
    }

    /// Turns a list of single ports into one-port ranges.
    #[must_use]
    pub fn from_ports(ports: &[u16]) -> Self {
        Self(ports.iter().map(|&p| (p, p)).collect())
    }

    /// Expands the ranges into distinct ports, keeping first-seen order.
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        crate::port_strategy::RangeIterator::new_serial(&self.0).collect()
    }
}

/// Parses a port specification such as `"21,22,80-90"`.
///
/// Comma-separated single ports and inclusive `start-end` ranges, whitespace
/// around items is ignored. Every port must lie in `1..=65535`.
pub fn parse_port_ranges(input: &str) -> Result<PortRanges, ValidationError> {
    let mut ranges = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if part.contains('-') {
            ranges.push(parse_port_range(part)?);
        } else {
            let port = parse_single_port(part)?;
            ranges.push((port, port));
        }
    }

    if ranges.is_empty() {
        return Err(ValidationError::NoPorts);
    }

    Ok(PortRanges(ranges))
}

fn parse_port_range(range_str: &str) -> Result<(u16, u16), ValidationError> {
    let Some((start, end)) = range_str.split_once('-') else {
        return Err(ValidationError::InvalidRangeFormat(range_str.to_owned()));
    };
    if end.contains('-') {
        return Err(ValidationError::InvalidRangeFormat(range_str.to_owned()));
    }

    let start_port: u16 =
        start
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidRangeStart {
                port: start.to_owned(),
                range: range_str.to_owned(),
            })?;
    let end_port: u16 = end
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidRangeEnd {
            port: end.to_owned(),
            range: range_str.to_owned(),
        })?;

    if start_port > end_port {
        return Err(ValidationError::ReversedRange {
            start: start_port,
            end: end_port,
            range: range_str.to_owned(),
        });
    }

    if start_port < LOWEST_PORT_NUMBER {
        return Err(ValidationError::PortOutOfRange(start_port));
    }

    Ok((start_port, end_port))
}

fn parse_single_port(port_str: &str) -> Result<u16, ValidationError> {
    let port: u16 = port_str
        .parse()
        .map_err(|_| ValidationError::InvalidPort(port_str.to_owned()))?;

    if port < LOWEST_PORT_NUMBER {
        return Err(ValidationError::PortOutOfRange(port));
    }

    Ok(port)
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "reconprobe",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Concurrent reconnaissance prober: ports, banners, subdomains and web paths.
/// WARNING Only probe systems you are authorised to test. High speed levels
/// open thousands of connections at once.
pub struct Opts {
    /// Host, IP, domain or URL to probe, depending on the mode.
    pub target: String,

    /// What to probe.
    #[arg(short, long, value_enum, ignore_case = true, default_value = "ports")]
    pub mode: ScanMode,

    /// Ports and/or port ranges to probe. Examples: 80,443,8080 or 1-1000 or 1-1000,8080
    #[arg(short, long, alias = "range", value_parser = parse_port_ranges, conflicts_with = "top")]
    pub ports: Option<PortRanges>,

    /// Probe a short list of commonly exposed ports.
    #[arg(long)]
    pub top: bool,

    /// Newline-delimited wordlist of subdomain prefixes or paths.
    #[arg(short, long, value_parser)]
    pub wordlist: Option<PathBuf>,

    /// Speed level, selects the concurrency preset for the mode.
    #[arg(short, long, value_enum, ignore_case = true, default_value = "fast")]
    pub speed: Speed,

    /// Overrides the preset cap on simultaneous in-flight probes.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Overrides the preset per-probe timeout, in milliseconds.
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// How long to wait for a service greeting after connecting, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub banner_timeout: u64,

    /// A comma-delimited list or file of DNS resolvers.
    #[arg(long)]
    pub resolver: Option<String>,

    /// Number of probe inputs materialised at once.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// The order of port probing. "serial" follows the given ranges, "random"
    /// shuffles them.
    #[arg(long, value_enum, ignore_case = true, default_value = "serial")]
    pub scan_order: ScanOrder,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// Greppable mode. Only output the findings, one line.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print the full run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges values found within the user configuration file.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            mode,
            speed,
            greppable,
            accessible,
            banner_timeout,
            chunk_size,
            scan_order
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        if !self.top && self.ports.is_none() {
            if let Some(ports) = &config.ports {
                self.ports = Some(PortRanges::from_ports(ports));
            }
        }

        merge_optional!(wordlist, concurrency, timeout, resolver, ulimit);
    }

    /// Port ranges the user asked for, falling back to the full port space.
    #[must_use]
    pub fn port_ranges(&self) -> PortRanges {
        if self.top {
            return PortRanges::from_ports(&COMMON_PORTS);
        }
        self.ports.clone().unwrap_or_else(PortRanges::full)
    }

    /// The concurrency profile for this run: the mode/speed preset with any
    /// explicit overrides applied.
    #[must_use]
    pub fn profile(&self) -> ConcurrencyProfile {
        let mut profile = ConcurrencyProfile::preset(self.mode, self.speed);
        if let Some(cap) = self.concurrency {
            profile = profile.with_cap(cap);
        }
        if let Some(timeout) = self.timeout {
            profile = profile.with_timeout(Duration::from_millis(timeout));
        }
        profile
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            target: String::new(),
            mode: ScanMode::Ports,
            ports: None,
            top: false,
            wordlist: None,
            speed: Speed::Fast,
            concurrency: None,
            timeout: None,
            banner_timeout: 1000,
            resolver: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            scan_order: ScanOrder::Serial,
            ulimit: None,
            greppable: true,
            accessible: false,
            json: false,
            no_config: true,
            config_path: None,
            no_banner: false,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    mode: Option<ScanMode>,
    ports: Option<Vec<u16>>,
    wordlist: Option<PathBuf>,
    speed: Option<Speed>,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    banner_timeout: Option<u64>,
    resolver: Option<String>,
    chunk_size: Option<usize>,
    scan_order: Option<ScanOrder>,
    ulimit: Option<u64>,
    greppable: Option<bool>,
    accessible: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing or unreadable file yields an empty config.
    ///
    /// # Format
    ///
    /// mode = "Subdomains"
    /// speed = "Insane"
    /// ports = [80, 443, 8080]
    /// wordlist = "/usr/share/wordlists/subdomains.txt"
    /// resolver = "1.1.1.1,8.8.8.8"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let Some(config_path) = custom_config_path.or_else(default_config_path) else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(config_path).unwrap_or_default();

        Ok(toml::from_str(&content)?)
    }
}

/// Constructs default path to config toml
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".reconprobe.toml");
    Some(config_path)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use parameterized::parameterized;
    use std::time::Duration;

    use super::{parse_port_ranges, Config, Opts, PortRanges, ScanOrder, COMMON_PORTS};
    use crate::error::ValidationError;
    use crate::profile::{ScanMode, Speed};

    impl Config {
        fn sample() -> Self {
            Self {
                mode: Some(ScanMode::Subdomains),
                ports: None,
                wordlist: None,
                speed: Some(Speed::Insane),
                concurrency: None,
                timeout: Some(2_000),
                banner_timeout: None,
                resolver: None,
                chunk_size: Some(1_000),
                scan_order: Some(ScanOrder::Random),
                ulimit: None,
                greppable: Some(false),
                accessible: Some(true),
            }
        }
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[parameterized(input = {
        vec!["reconprobe", "example.com"],
        vec!["reconprobe", "-m", "subdomains", "example.com"],
        vec!["reconprobe", "--mode", "DIRS", "http://example.com"],
        vec!["reconprobe", "--mode", "banners", "-p", "21-25", "10.0.0.1"],
    }, mode = {
        ScanMode::Ports,
        ScanMode::Subdomains,
        ScanMode::Dirs,
        ScanMode::Banners,
    })]
    fn parse_mode_and_target(input: Vec<&str>, mode: ScanMode) {
        let opts = Opts::parse_from(input.clone());

        assert_eq!(opts.mode, mode);
        assert_eq!(&opts.target, input.last().unwrap());
    }

    #[test]
    fn cli_rejects_bad_port_spec() {
        assert!(Opts::try_parse_from(["reconprobe", "-p", "10-5", "host"]).is_err());
        assert!(Opts::try_parse_from(["reconprobe", "-p", "70000", "host"]).is_err());
    }

    #[test]
    fn cli_top_conflicts_with_ports() {
        assert!(Opts::try_parse_from(["reconprobe", "--top", "-p", "80", "host"]).is_err());
    }

    #[test]
    fn opts_no_merge_when_config_is_ignored() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge(&config);

        assert_eq!(opts.mode, ScanMode::Ports);
        assert_eq!(opts.speed, Speed::Fast);
        assert!(opts.greppable);
        assert_eq!(opts.timeout, None);
        assert_eq!(opts.scan_order, ScanOrder::Serial);
    }

    #[test]
    fn opts_merge_required_arguments() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge_required(&config);

        assert_eq!(opts.mode, config.mode.unwrap());
        assert_eq!(opts.speed, config.speed.unwrap());
        assert_eq!(opts.greppable, config.greppable.unwrap());
        assert_eq!(opts.accessible, config.accessible.unwrap());
        assert_eq!(opts.chunk_size, config.chunk_size.unwrap());
        assert_eq!(opts.scan_order, config.scan_order.unwrap());
        assert_eq!(opts.banner_timeout, 1000);
    }

    #[test]
    fn opts_merge_optional_arguments() {
        let mut opts = Opts::default();
        let mut config = Config::sample();
        config.ports = Some(vec![22, 80]);
        config.ulimit = Some(1_000);
        config.resolver = Some("1.1.1.1".to_owned());

        opts.merge_optional(&config);

        assert_eq!(opts.ports, Some(PortRanges(vec![(22, 22), (80, 80)])));
        assert_eq!(opts.ulimit, config.ulimit);
        assert_eq!(opts.resolver, config.resolver);
        assert_eq!(opts.timeout, Some(2_000));
    }

    #[test]
    fn cli_ports_win_over_config_ports() {
        let mut opts = Opts {
            ports: Some(PortRanges(vec![(443, 443)])),
            no_config: false,
            ..Opts::default()
        };
        let mut config = Config::sample();
        config.ports = Some(vec![22]);

        opts.merge(&config);

        assert_eq!(opts.port_ranges().ports(), vec![443]);
    }

    #[test]
    fn top_uses_common_ports() {
        let opts = Opts {
            top: true,
            ..Opts::default()
        };
        assert_eq!(opts.port_ranges().ports(), COMMON_PORTS.to_vec());
    }

    #[test]
    fn profile_applies_overrides() {
        let opts = Opts {
            mode: ScanMode::Dirs,
            speed: Speed::Normal,
            concurrency: Some(7),
            timeout: Some(250),
            ..Opts::default()
        };
        let profile = opts.profile();

        assert_eq!(profile.cap(), 7);
        assert_eq!(profile.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn config_parses_toml() {
        let config: Config = toml::from_str(
            "mode = \"Banners\"\nspeed = \"Normal\"\nports = [21, 22]\nchunk_size = 10\n",
        )
        .unwrap();

        assert_eq!(config.mode, Some(ScanMode::Banners));
        assert_eq!(config.speed, Some(Speed::Normal));
        assert_eq!(config.ports, Some(vec![21, 22]));
        assert_eq!(config.chunk_size, Some(10));
    }

    #[test]
    fn parse_listed_ports_and_ranges() {
        let result = parse_port_ranges("21,22,80-82").unwrap();
        assert_eq!(result.ports(), vec![21, 22, 80, 81, 82]);
    }

    #[test]
    fn parse_overlapping_ranges_deduplicates() {
        let result = parse_port_ranges("80-82,81").unwrap();
        assert_eq!(result.ports(), vec![80, 81, 82]);
    }

    #[test]
    fn parse_with_spaces() {
        let result = parse_port_ranges("80, 443, 1-3, 8080").unwrap();
        assert_eq!(result.ports(), vec![80, 443, 1, 2, 3, 8080]);
    }

    #[test]
    fn parse_full_range() {
        let result = parse_port_ranges("1-65535").unwrap();
        assert_eq!(result.ports().len(), 65535);
    }

    #[test]
    fn parse_empty_input() {
        assert_eq!(parse_port_ranges(""), Err(ValidationError::NoPorts));
        assert_eq!(parse_port_ranges(" , ,"), Err(ValidationError::NoPorts));
    }

    #[test]
    fn parse_out_of_bounds_port() {
        let err = parse_port_ranges("70000").unwrap_err();
        assert_eq!(err, ValidationError::InvalidPort("70000".to_owned()));
        assert!(err.to_string().contains("Invalid port number '70000'"));
    }

    #[test]
    fn parse_reversed_range() {
        let err = parse_port_ranges("10-5").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ReversedRange { start: 10, end: 5, .. }
        ));
        assert!(err
            .to_string()
            .contains("Start port 10 is greater than end port 5 in range '10-5'"));
    }

    #[test]
    fn parse_invalid_range_end() {
        let err = parse_port_ranges("80,1-abc,443").unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid end port 'abc' in range '1-abc'"));
    }

    #[test]
    fn parse_out_of_bounds_range() {
        let err = parse_port_ranges("80,1-70000,443").unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid end port '70000' in range '1-70000'"));
    }

    #[test]
    fn parse_invalid_range_format() {
        let err = parse_port_ranges("80,1-2-3,443").unwrap_err();
        assert_eq!(err, ValidationError::InvalidRangeFormat("1-2-3".to_owned()));
    }

    #[test]
    fn parse_zero_port() {
        let err = parse_port_ranges("80,0,443").unwrap_err();
        assert!(err.to_string().contains("Port 0 must be between 1 and 65535"));
        assert!(parse_port_ranges("0-10").is_err());
    }
}
