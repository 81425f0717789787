use bit_set::BitSet;
use gcd::Gcd;
use rand::Rng;
use std::iter::FlatMap;
use std::ops::RangeInclusive;
use std::vec;

type SerialPorts = FlatMap<vec::IntoIter<(u16, u16)>, RangeInclusive<u16>, fn((u16, u16)) -> RangeInclusive<u16>>;

/// Yields every distinct port of a collection of (possibly overlapping)
/// inclusive `u16` ranges, either in input order or in a random permutation.
///
/// **Serial** (`RangeIterator::new_serial`): walks the ranges as given and
/// yields each port the first time it is seen. Duplicates are skipped with a
/// 65_536-bit `BitSet`.
///
/// **Random** (`RangeIterator::new_random`): merges the ranges, then walks the
/// indices `0..N` with the additive step `x_{i+1} = (x_i + step) % N` where
/// `gcd(step, N) == 1`, which visits every index exactly once. Indices are
/// mapped back onto the merged ranges through a prefix-sum table.
pub struct RangeIterator {
    order: Order,
}

enum Order {
    Serial { ports: SerialPorts, seen: BitSet },
    Random(Permutation),
}

struct Permutation {
    active: bool,
    total: u32,
    first: u32,
    pick: u32,
    step: u32,
    ranges: Vec<(u32, u32)>,
    prefix: Vec<u32>,
}

fn expand((start, end): (u16, u16)) -> RangeInclusive<u16> {
    start..=end
}

impl RangeIterator {
    /// Ports in input order, duplicates skipped.
    #[must_use]
    pub fn new_serial(input: &[(u16, u16)]) -> Self {
        let ports = input
            .to_vec()
            .into_iter()
            .flat_map(expand as fn((u16, u16)) -> RangeInclusive<u16>);

        Self {
            order: Order::Serial {
                ports,
                seen: BitSet::with_capacity(usize::from(u16::MAX) + 1),
            },
        }
    }

    /// Ports in a random full-cycle permutation.
    #[must_use]
    pub fn new_random(input: &[(u16, u16)]) -> Self {
        let ranges = merge_ranges(input);
        let prefix = ranges.iter().fold(vec![0u32], |mut acc, (_, len)| {
            let last = acc.last().copied().unwrap_or(0);
            acc.push(last + len);
            acc
        });
        let total = prefix.last().copied().unwrap_or(0);

        let (first, step) = if total == 0 {
            (0, 0)
        } else {
            (rand::rng().random_range(0..total), pick_random_coprime(total))
        };

        Self {
            order: Order::Random(Permutation {
                active: total > 0,
                total,
                first,
                pick: first,
                step,
                ranges,
                prefix,
            }),
        }
    }
}

impl Iterator for RangeIterator {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.order {
            Order::Serial { ports, seen } => ports.find(|&p| seen.insert(usize::from(p))),
            Order::Random(permutation) => permutation.next(),
        }
    }
}

impl Permutation {
    fn next(&mut self) -> Option<u16> {
        if !self.active {
            return None;
        }

        let cur = self.pick;
        let next = (cur + self.step) % self.total;
        if next == self.first {
            self.active = false;
        }
        self.pick = next;

        // index of the merged range holding `cur`: prefix[idx] <= cur < prefix[idx + 1]
        let idx = self.prefix.partition_point(|&p| p <= cur) - 1;
        let (start, _) = self.ranges[idx];
        u16::try_from(start + (cur - self.prefix[idx])).ok()
    }
}

/// Sorts and merges overlapping or adjacent inclusive ranges into
/// `(start, len)` pairs.
pub(crate) fn merge_ranges(input: &[(u16, u16)]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = input
        .iter()
        .map(|&(s, e)| (u32::from(s), u32::from(e) + 1))
        .collect();
    ranges.sort_unstable_by_key(|&(s, _)| s);

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
    let mut iter = ranges.into_iter();
    let Some((mut cur_start, mut cur_end)) = iter.next() else {
        return merged;
    };
    for (start, end_excl) in iter {
        if start <= cur_end {
            cur_end = cur_end.max(end_excl);
        } else {
            merged.push((cur_start, cur_end - cur_start));
            cur_start = start;
            cur_end = end_excl;
        }
    }
    merged.push((cur_start, cur_end - cur_start));
    merged
}

/// Number of distinct ports covered by the ranges.
pub(crate) fn distinct_port_count(input: &[(u16, u16)]) -> usize {
    merge_ranges(input)
        .iter()
        .map(|&(_, len)| len as usize)
        .sum()
}

/// Picks a step coprime with `end` from the middle half of `0..end`, which
/// spreads consecutive picks apart. Falls back to `end - 1`, always coprime,
/// after ten unlucky draws.
fn pick_random_coprime(end: u32) -> u32 {
    let range_boundary = end / 4;
    let lower_range = range_boundary;
    let upper_range = end - range_boundary;
    let mut rng = rand::rng();

    for _ in 0..10 {
        let candidate = rng.random_range(lower_range..upper_range);
        if end.gcd(candidate) == 1 {
            return candidate;
        }
    }

    end - 1
}
