//! Provides a means to hold configuration options specifically for port probing.
mod range_iterator;
use crate::input::{PortRanges, ScanOrder};
use rand::seq::SliceRandom;
use range_iterator::distinct_port_count;
pub use range_iterator::RangeIterator;

/// Represents options of port probing.
///
/// Ranges are expanded lazily; only a `Manual` list of ports is held in
/// memory as given.
#[derive(Debug, Clone)]
pub enum PortStrategy {
    Manual(Vec<u16>),
    Serial(SerialRange),
    Random(RandomRange),
}

impl PortStrategy {
    /// Explicit `ports` win over `ranges`; with neither, the full port space
    /// is used.
    #[must_use]
    pub fn pick(ranges: Option<PortRanges>, ports: Option<Vec<u16>>, order: ScanOrder) -> Self {
        match (ports, order) {
            (Some(ports), ScanOrder::Serial) => PortStrategy::Manual(ports),
            (Some(mut ports), ScanOrder::Random) => {
                ports.shuffle(&mut rand::rng());
                PortStrategy::Manual(ports)
            }
            (None, order) => {
                let range = ranges.unwrap_or_else(PortRanges::full).0;
                match order {
                    ScanOrder::Serial => PortStrategy::Serial(SerialRange { range }),
                    ScanOrder::Random => PortStrategy::Random(RandomRange { range }),
                }
            }
        }
    }

    /// Number of ports the strategy will produce.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            PortStrategy::Manual(ports) => ports.len(),
            PortStrategy::Serial(SerialRange { range })
            | PortStrategy::Random(RandomRange { range }) => distinct_port_count(range),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the strategy into a lazy port sequence.
    #[must_use]
    pub fn into_ports(self) -> Box<dyn Iterator<Item = u16> + Send> {
        match self {
            PortStrategy::Manual(ports) => Box::new(ports.into_iter()),
            PortStrategy::Serial(range) => Box::new(range.generate()),
            PortStrategy::Random(range) => Box::new(range.generate()),
        }
    }
}

/// Trait associated with a port strategy. Each range strategy must be able
/// to generate an order for future port probing.
trait RangeOrder {
    fn generate(&self) -> RangeIterator;
}

/// As the name implies SerialRange will always generate ports in the order
/// the ranges were given.
#[derive(Debug, Clone)]
pub struct SerialRange {
    range: Vec<(u16, u16)>,
}

impl RangeOrder for SerialRange {
    fn generate(&self) -> RangeIterator {
        RangeIterator::new_serial(&self.range)
    }
}

/// As the name implies RandomRange will always generate ports in a random
/// order, without materialising the whole list to shuffle it.
#[derive(Debug, Clone)]
pub struct RandomRange {
    range: Vec<(u16, u16)>,
}

impl RangeOrder for RandomRange {
    fn generate(&self) -> RangeIterator {
        RangeIterator::new_random(&self.range)
    }
}
