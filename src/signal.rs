//! Signal identities, signal sets, and the aggregation function.
//!
//! A [`SignalSet`] maps a signal identity (kind + name + quality) to an
//! integer count. [`aggregate`] folds any number of sets into one by
//! arithmetic summation: absence counts as zero, identical identities are
//! summed and never overwritten, and the result is independent of input
//! order. Counts accumulate in `i64`; clamping to the host's native signal
//! range is the host's concern when it writes a connector.

use std::collections::{hash_map, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SignalKind {
    Item,
    Fluid,
    Virtual,
}

/// Identity of one signal: kind, prototype name, optional quality tier.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId {
    pub kind: SignalKind,
    pub name: String,
    pub quality: Option<String>,
}

impl SignalId {
    pub fn item(name: &str) -> Self {
        Self {
            kind: SignalKind::Item,
            name: name.to_string(),
            quality: None,
        }
    }

    pub fn fluid(name: &str) -> Self {
        Self {
            kind: SignalKind::Fluid,
            name: name.to_string(),
            quality: None,
        }
    }

    pub fn virtual_signal(name: &str) -> Self {
        Self {
            kind: SignalKind::Virtual,
            name: name.to_string(),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: &str) -> Self {
        self.quality = Some(quality.to_string());
        self
    }
}

/// Mapping from signal identity to count. Never stores a zero count.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct SignalSet {
    counts: HashMap<SignalId, i64>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Count for an identity; absent means zero.
    pub fn get(&self, id: &SignalId) -> i64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Overwrites the count for an identity. A zero drops the entry.
    pub fn set(&mut self, id: SignalId, count: i64) {
        if count == 0 {
            self.counts.remove(&id);
        } else {
            self.counts.insert(id, count);
        }
    }

    /// Adds to the count for an identity. A sum of zero drops the entry.
    pub fn add(&mut self, id: SignalId, count: i64) {
        match self.counts.entry(id) {
            hash_map::Entry::Occupied(mut occupied) => {
                let sum = occupied.get().wrapping_add(count);
                if sum == 0 {
                    occupied.remove();
                } else {
                    *occupied.get_mut() = sum;
                }
            }
            hash_map::Entry::Vacant(vacant) => {
                if count != 0 {
                    vacant.insert(count);
                }
            }
        }
    }

    /// Sums every entry of `other` into `self`.
    pub fn merge(&mut self, other: &SignalSet) {
        for (id, count) in other.iter() {
            self.add(id.clone(), count);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalId, i64)> {
        self.counts.iter().map(|(id, count)| (id, *count))
    }
}

impl FromIterator<(SignalId, i64)> for SignalSet {
    fn from_iter<I: IntoIterator<Item = (SignalId, i64)>>(iter: I) -> Self {
        let mut set = SignalSet::new();
        for (id, count) in iter {
            set.add(id, count);
        }
        set
    }
}

/// Sums any number of signal sets into one. Pure; an empty input yields an
/// empty set.
pub fn aggregate<'a, I>(sets: I) -> SignalSet
where
    I: IntoIterator<Item = &'a SignalSet>,
{
    let mut out = SignalSet::new();
    for set in sets {
        out.merge(set);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: &[(&str, i64)]) -> SignalSet {
        entries
            .iter()
            .map(|(name, count)| (SignalId::item(name), *count))
            .collect()
    }

    #[test]
    fn empty_input_yields_empty_set() {
        let out = aggregate([]);
        assert!(out.is_empty());
    }

    #[test]
    fn disjoint_sets_union() {
        let a = set(&[("iron-plate", 10)]);
        let b = set(&[("copper-plate", 20)]);
        let c = set(&[("steel-plate", 5)]);

        let out = aggregate([&a, &b, &c]);

        assert_eq!(out.len(), 3);
        assert_eq!(out.get(&SignalId::item("iron-plate")), 10);
        assert_eq!(out.get(&SignalId::item("copper-plate")), 20);
        assert_eq!(out.get(&SignalId::item("steel-plate")), 5);
    }

    #[test]
    fn overlapping_identities_sum() {
        let a = set(&[("iron-plate", 5)]);
        let b = set(&[("iron-plate", 7)]);
        let c = set(&[("iron-plate", 0)]);

        let out = aggregate([&a, &b, &c]);

        assert_eq!(out.get(&SignalId::item("iron-plate")), 12);
    }

    #[test]
    fn zero_sum_drops_entry() {
        let a = set(&[("iron-plate", 5)]);
        let b = set(&[("iron-plate", -5)]);

        let out = aggregate([&a, &b]);

        assert!(out.is_empty());
    }

    #[test]
    fn quality_is_part_of_identity() {
        let mut a = SignalSet::new();
        a.add(SignalId::item("iron-plate"), 3);
        a.add(SignalId::item("iron-plate").with_quality("legendary"), 4);

        assert_eq!(a.len(), 2);
        assert_eq!(a.get(&SignalId::item("iron-plate")), 3);
        assert_eq!(
            a.get(&SignalId::item("iron-plate").with_quality("legendary")),
            4
        );
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut sets = Vec::new();
        for i in 0..16i64 {
            let mut s = SignalSet::new();
            s.add(SignalId::item("iron-plate"), i);
            s.add(SignalId::fluid("water"), i * 3 - 20);
            s.add(SignalId::virtual_signal("signal-A"), -i);
            sets.push(s);
        }

        let baseline = aggregate(sets.iter());

        for _ in 0..32 {
            fastrand::shuffle(&mut sets);
            let shuffled = aggregate(sets.iter());
            assert_eq!(baseline, shuffled);
        }
    }
}
