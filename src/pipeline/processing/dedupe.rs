use std::collections::HashMap;

use tracing::warn;

/// Outcome of observing one raw record's identity key, exposing the
/// tie-break rule directly: duplicates are ranked by arrival sequence
/// number and only rank 1 is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Position of this record in run arrival order, starting at 1.
    pub arrival_seq: u64,
    /// 1 for the first record carrying this key, 2 for the second, and so on.
    pub rank: u64,
    /// True iff `rank == 1`.
    pub retained: bool,
}

/// First-arrival-wins deduplication over identity keys. State lives for one
/// run and is discarded with the value; feeding multiple batches through the
/// same `Deduplicator` gives cross-batch uniqueness, which per-batch
/// deduplication alone would not.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashMap<i64, u64>,
    next_seq: u64,
    duplicates_discarded: u64,
    unkeyed_admitted: u64,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes one identity key in arrival order and decides whether the
    /// record carrying it is retained. A record with no identity key is
    /// treated as unique and never merged with any other; this mirrors the
    /// upstream source behavior and is surfaced as a warning because it can
    /// mask true duplicates.
    pub fn observe(&mut self, key: Option<i64>) -> Admission {
        self.next_seq += 1;
        let arrival_seq = self.next_seq;

        let rank = match key {
            Some(id) => {
                let count = self.seen.entry(id).or_insert(0);
                *count += 1;
                *count
            }
            None => {
                self.unkeyed_admitted += 1;
                warn!(
                    arrival_seq,
                    "record without identity key admitted as unique"
                );
                1
            }
        };

        let retained = rank == 1;
        if !retained {
            self.duplicates_discarded += 1;
        }

        Admission {
            arrival_seq,
            rank,
            retained,
        }
    }

    /// Records discarded so far because an earlier arrival held their key.
    pub fn duplicates_discarded(&self) -> u64 {
        self.duplicates_discarded
    }

    /// Records admitted without an identity key.
    pub fn unkeyed_admitted(&self) -> u64 {
        self.unkeyed_admitted
    }

    /// Distinct identity keys observed so far.
    pub fn distinct_keys(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_arrival_wins() {
        let mut dedup = Deduplicator::new();

        let first = dedup.observe(Some(7));
        let second = dedup.observe(Some(7));
        let third = dedup.observe(Some(7));

        assert!(first.retained);
        assert_eq!(first.rank, 1);
        assert!(!second.retained);
        assert_eq!(second.rank, 2);
        assert!(!third.retained);
        assert_eq!(third.rank, 3);
        assert_eq!(dedup.duplicates_discarded(), 2);
    }

    #[test]
    fn arrival_sequence_is_monotonic_across_keys() {
        let mut dedup = Deduplicator::new();

        assert_eq!(dedup.observe(Some(1)).arrival_seq, 1);
        assert_eq!(dedup.observe(Some(2)).arrival_seq, 2);
        assert_eq!(dedup.observe(Some(1)).arrival_seq, 3);
    }

    #[test]
    fn missing_keys_never_merge() {
        let mut dedup = Deduplicator::new();

        assert!(dedup.observe(None).retained);
        assert!(dedup.observe(None).retained);
        assert!(dedup.observe(None).retained);
        assert_eq!(dedup.duplicates_discarded(), 0);
        assert_eq!(dedup.unkeyed_admitted(), 3);
    }

    #[test]
    fn state_spans_batches_within_a_run() {
        let mut dedup = Deduplicator::new();

        // batch one
        assert!(dedup.observe(Some(42)).retained);
        // batch two carries the same key
        assert!(!dedup.observe(Some(42)).retained);
        assert_eq!(dedup.distinct_keys(), 1);
    }
}
