//! Multi-version ordered table for one column family.

use crate::types::SequenceNumber;
use std::collections::BTreeMap;

/// One committed version of a key. `value == None` is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Version {
    pub(crate) sequence: SequenceNumber,
    pub(crate) value: Option<Vec<u8>>,
}

/// Ordered map from key to its versions, oldest first.
///
/// # Invariants
///
/// - versions of a key are strictly ascending by sequence
/// - the newest version of a key is never pruned, tombstones included,
///   so commit validation always sees the last sequence that touched it
#[derive(Debug, Default)]
pub(crate) struct VersionedTable {
    entries: BTreeMap<Vec<u8>, Vec<Version>>,
}

impl VersionedTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Value visible at `at`: the newest version with `sequence <= at`.
    pub(crate) fn get(&self, key: &[u8], at: SequenceNumber) -> Option<&[u8]> {
        self.entries
            .get(key)?
            .iter()
            .rev()
            .find(|version| version.sequence <= at)?
            .value
            .as_deref()
    }

    /// Sequence of the newest committed version of `key`.
    pub(crate) fn latest_sequence(&self, key: &[u8]) -> Option<SequenceNumber> {
        self.entries
            .get(key)
            .and_then(|versions| versions.last())
            .map(|version| version.sequence)
    }

    /// Appends a version. A second write at the newest version's sequence
    /// (the same batch) replaces it; older sequences are ignored.
    pub(crate) fn apply(&mut self, key: &[u8], sequence: SequenceNumber, value: Option<Vec<u8>>) {
        let versions = self.entries.entry(key.to_vec()).or_default();
        match versions.last_mut() {
            Some(last) if last.sequence > sequence => {}
            Some(last) if last.sequence == sequence => last.value = value,
            _ => versions.push(Version { sequence, value }),
        }
    }

    /// Drops versions of `key` no reader at or above `horizon` can see.
    pub(crate) fn prune_key(&mut self, key: &[u8], horizon: SequenceNumber) {
        if let Some(versions) = self.entries.get_mut(key) {
            prune_versions(versions, horizon);
        }
    }

    /// Prunes every key. Returns the number of versions dropped.
    pub(crate) fn prune(&mut self, horizon: SequenceNumber) -> usize {
        self.entries
            .values_mut()
            .map(|versions| prune_versions(versions, horizon))
            .sum()
    }

    /// Latest live value of every key, in key order.
    pub(crate) fn latest_values(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().filter_map(|(key, versions)| {
            versions
                .last()
                .and_then(|version| version.value.as_deref())
                .map(|value| (key.as_slice(), value))
        })
    }

    /// Number of keys with at least one version, tombstones included.
    #[cfg(test)]
    pub(crate) fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of stored versions.
    #[cfg(test)]
    pub(crate) fn version_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Keeps every version newer than `horizon` plus the newest one at or
/// below it.
fn prune_versions(versions: &mut Vec<Version>, horizon: SequenceNumber) -> usize {
    let visible_at_horizon = versions
        .iter()
        .rposition(|version| version.sequence <= horizon);
    match visible_at_horizon {
        Some(index) if index > 0 => {
            versions.drain(..index);
            index
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    #[test]
    fn get_reads_newest_visible_version() {
        let mut table = VersionedTable::new();
        table.apply(b"k", seq(1), Some(b"1".to_vec()));
        table.apply(b"k", seq(3), Some(b"3".to_vec()));

        assert_eq!(table.get(b"k", seq(0)), None);
        assert_eq!(table.get(b"k", seq(1)), Some(&b"1"[..]));
        assert_eq!(table.get(b"k", seq(2)), Some(&b"1"[..]));
        assert_eq!(table.get(b"k", seq(9)), Some(&b"3"[..]));
    }

    #[test]
    fn tombstone_hides_older_versions() {
        let mut table = VersionedTable::new();
        table.apply(b"k", seq(1), Some(b"1".to_vec()));
        table.apply(b"k", seq(2), None);

        assert_eq!(table.get(b"k", seq(1)), Some(&b"1"[..]));
        assert_eq!(table.get(b"k", seq(2)), None);
        assert_eq!(table.latest_sequence(b"k"), Some(seq(2)));
    }

    #[test]
    fn stale_apply_is_ignored() {
        let mut table = VersionedTable::new();
        table.apply(b"k", seq(5), Some(b"new".to_vec()));
        table.apply(b"k", seq(4), Some(b"old".to_vec()));
        assert_eq!(table.version_count(), 1);
        assert_eq!(table.get(b"k", seq(9)), Some(&b"new"[..]));
    }

    #[test]
    fn same_sequence_write_replaces_value() {
        let mut table = VersionedTable::new();
        table.apply(b"k", seq(1), Some(b"old".to_vec()));
        table.apply(b"k", seq(2), Some(b"first".to_vec()));
        table.apply(b"k", seq(2), None);

        assert_eq!(table.version_count(), 2);
        assert_eq!(table.get(b"k", seq(2)), None);
        assert_eq!(table.get(b"k", seq(1)), Some(&b"old"[..]));
        assert_eq!(table.latest_sequence(b"k"), Some(seq(2)));
    }

    #[test]
    fn prune_keeps_version_visible_at_horizon() {
        let mut table = VersionedTable::new();
        for n in 1..=4 {
            table.apply(b"k", seq(n), Some(n.to_string().into_bytes()));
        }

        assert_eq!(table.prune(seq(2)), 1);
        assert_eq!(table.get(b"k", seq(2)), Some(&b"2"[..]));
        assert_eq!(table.get(b"k", seq(4)), Some(&b"4"[..]));
        assert_eq!(table.version_count(), 3);
    }

    #[test]
    fn prune_keeps_latest_tombstone() {
        let mut table = VersionedTable::new();
        table.apply(b"k", seq(1), Some(b"1".to_vec()));
        table.apply(b"k", seq(2), None);
        table.prune_key(b"k", seq(10));

        assert_eq!(table.version_count(), 1);
        assert_eq!(table.latest_sequence(b"k"), Some(seq(2)));
        assert_eq!(table.latest_values().count(), 0);
        assert_eq!(table.key_count(), 1);
    }

    #[test]
    fn latest_values_in_key_order() {
        let mut table = VersionedTable::new();
        table.apply(b"b", seq(1), Some(b"2".to_vec()));
        table.apply(b"a", seq(2), Some(b"1".to_vec()));
        let values: Vec<_> = table.latest_values().collect();
        assert_eq!(values, vec![(&b"a"[..], &b"1"[..]), (&b"b"[..], &b"2"[..])]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn op() -> impl Strategy<Value = (u8, Option<u8>)> {
            (0u8..4, prop::option::of(any::<u8>()))
        }

        proptest! {
            #[test]
            fn pruning_preserves_reads_at_or_above_horizon(
                ops in prop::collection::vec(op(), 1..40),
                horizon in 0u64..40,
            ) {
                let mut pruned = VersionedTable::new();
                let mut full = VersionedTable::new();
                for (i, (key, value)) in ops.iter().enumerate() {
                    let sequence = seq(i as u64 + 1);
                    let value = value.map(|v| vec![v]);
                    pruned.apply(&[*key], sequence, value.clone());
                    full.apply(&[*key], sequence, value);
                }
                pruned.prune(seq(horizon));

                let last = ops.len() as u64;
                for key in 0u8..4 {
                    prop_assert_eq!(
                        pruned.latest_sequence(&[key]),
                        full.latest_sequence(&[key])
                    );
                    for at in horizon..=last {
                        prop_assert_eq!(pruned.get(&[key], seq(at)), full.get(&[key], seq(at)));
                    }
                }
            }
        }
    }
}
