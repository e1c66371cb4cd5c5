//! Compact sets of core identifiers.
//!
//! A [`ProcSet`] represents the cores of a socket (or a slice of them) as a
//! sorted list of closed intervals. Allocation carves cores out of a host's
//! free set and retirement merges them back, so the operations that matter
//! are difference, union, subset/disjointness checks and taking the first
//! `n` cores in identifier order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A sorted, deduplicated set of core identifiers stored as closed intervals.
///
/// Iteration order is always ascending by core id, which keeps every scan
/// over a set deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcSet {
    /// Closed intervals `[lo, hi]`, sorted, non-overlapping, non-adjacent.
    intervals: Vec<(u32, u32)>,
}

impl ProcSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set covering `lo..hi` (half-open, like a range).
    pub fn from_range(lo: u32, hi: u32) -> Self {
        if lo >= hi {
            Self::new()
        } else {
            Self {
                intervals: vec![(lo, hi - 1)],
            }
        }
    }

    /// Number of cores in the set.
    pub fn len(&self) -> u32 {
        self.intervals.iter().map(|(lo, hi)| hi - lo + 1).sum()
    }

    /// Whether the set contains no cores.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether `core` is a member of the set.
    pub fn contains(&self, core: u32) -> bool {
        self.intervals
            .iter()
            .any(|&(lo, hi)| lo <= core && core <= hi)
    }

    /// The closed intervals backing the set.
    pub fn intervals(&self) -> &[(u32, u32)] {
        &self.intervals
    }

    /// Iterate over core ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.iter().flat_map(|&(lo, hi)| lo..=hi)
    }

    /// Take the first `n` cores in identifier order.
    ///
    /// Returns the whole set if it holds fewer than `n` cores.
    pub fn take_first(&self, n: u32) -> ProcSet {
        let mut remaining = n;
        let mut intervals = Vec::new();
        for &(lo, hi) in &self.intervals {
            if remaining == 0 {
                break;
            }
            let span = hi - lo + 1;
            if span <= remaining {
                intervals.push((lo, hi));
                remaining -= span;
            } else {
                intervals.push((lo, lo + remaining - 1));
                remaining = 0;
            }
        }
        ProcSet { intervals }
    }

    /// Whether the two sets share no core.
    pub fn is_disjoint(&self, other: &ProcSet) -> bool {
        let mut a = self.intervals.iter().peekable();
        let mut b = other.intervals.iter().peekable();
        while let (Some(&&(alo, ahi)), Some(&&(blo, bhi))) = (a.peek(), b.peek()) {
            if ahi < blo {
                a.next();
            } else if bhi < alo {
                b.next();
            } else {
                return false;
            }
        }
        true
    }

    /// Whether every core of `self` is contained in `other`.
    pub fn is_subset(&self, other: &ProcSet) -> bool {
        self.iter().all(|core| other.contains(core))
    }

    /// Merge the cores of `other` into `self`.
    pub fn merge(&mut self, other: &ProcSet) {
        if other.is_empty() {
            return;
        }
        let mut all: Vec<(u32, u32)> = self
            .intervals
            .iter()
            .chain(other.intervals.iter())
            .copied()
            .collect();
        all.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(all.len());
        for (lo, hi) in all {
            match merged.last_mut() {
                // Adjacent or overlapping intervals collapse into one.
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        self.intervals = merged;
    }

    /// Remove the cores of `other` from `self`.
    pub fn subtract(&mut self, other: &ProcSet) {
        if other.is_empty() || self.is_empty() {
            return;
        }
        let mut result = Vec::with_capacity(self.intervals.len());
        for &(lo, hi) in &self.intervals {
            let mut pieces = vec![(lo, hi)];
            for &(blo, bhi) in &other.intervals {
                let mut next = Vec::with_capacity(pieces.len());
                for (plo, phi) in pieces {
                    if bhi < plo || phi < blo {
                        next.push((plo, phi));
                        continue;
                    }
                    if plo < blo {
                        next.push((plo, blo - 1));
                    }
                    if bhi < phi {
                        next.push((bhi + 1, phi));
                    }
                }
                pieces = next;
            }
            result.extend(pieces);
        }
        self.intervals = result;
    }

    /// Union of two sets.
    pub fn union(&self, other: &ProcSet) -> ProcSet {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}

impl FromIterator<u32> for ProcSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut cores: Vec<u32> = iter.into_iter().collect();
        cores.sort_unstable();
        cores.dedup();
        let mut set = ProcSet::new();
        for core in cores {
            let single = ProcSet {
                intervals: vec![(core, core)],
            };
            set.merge(&single);
        }
        set
    }
}

impl fmt::Display for ProcSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for &(lo, hi) in &self.intervals {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}
