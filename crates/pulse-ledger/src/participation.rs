//! Participation analytics.
//!
//! An attendee's participation rate is the share of launched polls they
//! voted in, as an exact percentage capped at 100:
//!
//! ```text
//! rate = min(vote_count / total_polls_count * 100, 100)
//! ```
//!
//! A classroom with no launched polls reports 0 for everyone.

use rust_decimal::Decimal;
use serde::Serialize;

use pulse_types::{Attendee, ClassroomId, ParticipantId};

/// One attendee's participation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipationRow {
    /// The attendee.
    pub participant_id: ParticipantId,
    /// Their display name.
    pub display_name: String,
    /// Votes counted across the classroom's polls.
    pub vote_count: u64,
    /// Spotlights received.
    pub spotlight_count: u64,
    /// Participation percentage, two decimal places.
    pub rate: Decimal,
}

/// Participation of every attendee of a classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipationReport {
    /// The classroom.
    pub classroom_id: ClassroomId,
    /// Poll launches so far.
    pub total_polls: u64,
    /// One row per attendee, highest rate first.
    pub attendees: Vec<ParticipationRow>,
    /// Mean rate across attendees (0 with no attendees).
    pub average_rate: Decimal,
}

/// Participation percentage for `vote_count` out of `total_polls`.
pub fn participation_rate(vote_count: u64, total_polls: u64) -> Decimal {
    if total_polls == 0 {
        return Decimal::ZERO;
    }
    let hundred = Decimal::ONE_HUNDRED;
    Decimal::from(vote_count)
        .checked_mul(hundred)
        .and_then(|scaled| scaled.checked_div(Decimal::from(total_polls)))
        .map_or(hundred, |rate| rate.min(hundred))
        .round_dp(2)
}

/// Build the report for `attendees` of `classroom_id`.
pub fn build_report(
    classroom_id: ClassroomId,
    total_polls: u64,
    attendees: Vec<Attendee>,
) -> ParticipationReport {
    let mut rows: Vec<ParticipationRow> = attendees
        .into_iter()
        .map(|a| ParticipationRow {
            rate: participation_rate(a.vote_count, total_polls),
            participant_id: a.participant_id,
            display_name: a.display_name,
            vote_count: a.vote_count,
            spotlight_count: a.spotlight_count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.rate
            .cmp(&a.rate)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });

    let sum = rows
        .iter()
        .try_fold(Decimal::ZERO, |acc, row| acc.checked_add(row.rate));
    let average_rate = sum
        .and_then(|sum| sum.checked_div(Decimal::from(rows.len())))
        .unwrap_or(Decimal::ZERO)
        .round_dp(2);

    ParticipationReport {
        classroom_id,
        total_polls,
        attendees: rows,
        average_rate,
    }
}
