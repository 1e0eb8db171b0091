//! Counter consistency verification.
//!
//! The aggregate counters of a poll are maintained incrementally inside the
//! vote transaction. This module recomputes them from the vote records of
//! the current epoch and compares:
//!
//! ```text
//! counters.total == sum(counters.counts_by_option)
//! counters.counts_by_option[i] == |votes of current epoch with option i|
//! ```
//!
//! A mismatch produces a [`CounterAnomaly`]. Counters stamped with an
//! older epoch are read as zero, exactly like every other reader does.

use std::collections::{BTreeMap, BTreeSet};

use pulse_types::{AggregateCounters, Epoch, Poll, PollId, VoteRecord};

/// Result of a consistency check for one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterCheck {
    /// Counters agree with the vote records.
    Consistent,
    /// Counters and vote records disagree.
    Anomaly(CounterAnomaly),
}

/// Description of a counter mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterAnomaly {
    /// The poll checked.
    pub poll_id: PollId,
    /// The epoch checked.
    pub epoch: Epoch,
    /// Per option: `(counted, tallied from vote records)` where they differ.
    pub mismatches: BTreeMap<usize, (u64, u64)>,
    /// The stored `total` field.
    pub recorded_total: u64,
    /// Number of vote records in the epoch.
    pub tallied_total: u64,
    /// Human-readable summary.
    pub message: String,
}

/// Compare `counters` against `votes` for the poll's current epoch.
///
/// Votes of other epochs are ignored.
pub fn verify_counters(
    poll: &Poll,
    counters: &AggregateCounters,
    votes: &[VoteRecord],
) -> CounterCheck {
    let epoch = poll.reset_epoch;
    let effective = if counters.epoch == epoch {
        counters.clone()
    } else {
        AggregateCounters::zeroed(epoch)
    };

    let mut tallied: BTreeMap<usize, u64> = BTreeMap::new();
    let mut tallied_total: u64 = 0;
    for vote in votes.iter().filter(|v| v.epoch == epoch) {
        let n = tallied.entry(vote.option_index).or_insert(0);
        *n = n.saturating_add(1);
        tallied_total = tallied_total.saturating_add(1);
    }

    let options: BTreeSet<usize> = effective
        .counts_by_option
        .keys()
        .chain(tallied.keys())
        .copied()
        .collect();

    let mut mismatches = BTreeMap::new();
    for option in options {
        let counted = effective.count(option);
        let actual = tallied.get(&option).copied().unwrap_or(0);
        if counted != actual {
            mismatches.insert(option, (counted, actual));
        }
    }

    let sum_matches = effective.option_sum() == Some(effective.total);
    if mismatches.is_empty() && sum_matches && effective.total == tallied_total {
        return CounterCheck::Consistent;
    }

    let message = if sum_matches {
        format!(
            "counter anomaly on poll {}: {} option(s) disagree with vote records (total {} vs {} votes)",
            poll.id,
            mismatches.len(),
            effective.total,
            tallied_total,
        )
    } else {
        format!(
            "counter anomaly on poll {}: total {} does not equal the sum of option counts",
            poll.id, effective.total,
        )
    };
    CounterCheck::Anomaly(CounterAnomaly {
        poll_id: poll.id,
        epoch,
        mismatches,
        recorded_total: effective.total,
        tallied_total,
        message,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pulse_types::{ClassroomId, ParticipantId, PollStatus};

    use super::*;

    fn poll(epoch: u64) -> Poll {
        Poll {
            id: PollId::new(),
            classroom_id: ClassroomId::new(),
            prompt: "Q".to_owned(),
            options: vec!["A".to_owned(), "B".to_owned()],
            status: PollStatus::Active,
            created_at: Utc::now(),
            reset_epoch: Epoch(epoch),
        }
    }

    fn vote(option_index: usize, epoch: u64) -> VoteRecord {
        VoteRecord {
            participant_id: ParticipantId::new(),
            option_index,
            epoch: Epoch(epoch),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn matching_counters_are_consistent() {
        let poll = poll(2);
        let mut counters = AggregateCounters::zeroed(Epoch(2));
        let _ = counters.increment(0);
        let _ = counters.increment(1);
        let votes = vec![vote(0, 2), vote(1, 2), vote(1, 1)];
        assert_eq!(verify_counters(&poll, &counters, &votes), CounterCheck::Consistent);
    }

    #[test]
    fn missing_increment_is_reported() {
        let poll = poll(2);
        let mut counters = AggregateCounters::zeroed(Epoch(2));
        let _ = counters.increment(0);
        let votes = vec![vote(0, 2), vote(1, 2)];
        let anomaly = match verify_counters(&poll, &counters, &votes) {
            CounterCheck::Anomaly(anomaly) => Some(anomaly),
            CounterCheck::Consistent => None,
        };
        assert_eq!(
            anomaly.as_ref().and_then(|a| a.mismatches.get(&1)),
            Some(&(0, 1))
        );
        assert_eq!(anomaly.map(|a| a.tallied_total), Some(2));
    }

    #[test]
    fn broken_total_is_reported() {
        let poll = poll(2);
        let mut counters = AggregateCounters::zeroed(Epoch(2));
        let _ = counters.increment(0);
        counters.total = 5;
        let votes = vec![vote(0, 2)];
        assert!(matches!(
            verify_counters(&poll, &counters, &votes),
            CounterCheck::Anomaly(_)
        ));
    }

    #[test]
    fn stale_counters_read_as_zero() {
        let poll = poll(3);
        let mut counters = AggregateCounters::zeroed(Epoch(2));
        let _ = counters.increment(0);
        assert_eq!(verify_counters(&poll, &counters, &[]), CounterCheck::Consistent);
    }
}
