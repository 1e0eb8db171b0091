//! Integration tests for the vote ledger against the in-process store.
//!
//! Concurrency tests run on a multi-threaded runtime and submit votes from
//! independently spawned tasks, so transactions genuinely race.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use pulse_ledger::{
    CounterCheck, LedgerError, LedgerOptions, PollAction, VoteLedger, VoteOutcome,
};
use pulse_store::{MemoryStore, StoreError, paths};
use pulse_types::{AggregateCounters, ParticipantId, Poll, PollStatus};
use rust_decimal::Decimal;

fn ledger_with(options: LedgerOptions) -> VoteLedger {
    VoteLedger::new(MemoryStore::with_max_attempts(1_000), options)
}

fn ledger() -> VoteLedger {
    ledger_with(LedgerOptions::default())
}

fn options(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| (*t).to_owned()).collect()
}

async fn live_poll(ledger: &VoteLedger, texts: &[&str]) -> Poll {
    let classroom = ledger.create_classroom("Biology 101").unwrap();
    let poll = ledger
        .create_poll(classroom.id, "Pick one", &options(texts))
        .await
        .unwrap();
    ledger.launch_poll(poll.id).await.unwrap()
}

// =============================================================================
// Vote accounting
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_votes_count_once() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["Red", "Blue"]).await;
    let participant = ParticipantId::new();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.submit_vote(poll.id, participant, 1).await
        }));
    }
    let mut counted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            VoteOutcome::Counted { .. } => counted += 1,
            VoteOutcome::AlreadyVoted { .. } => duplicates += 1,
        }
    }
    assert_eq!(counted, 1);
    assert_eq!(duplicates, 31);

    let counters = ledger.counters(poll.id).unwrap();
    assert_eq!(counters.total, 1);
    assert_eq!(counters.count(1), 1);
    assert_eq!(ledger.votes(poll.id).unwrap().len(), 1);
    assert_eq!(ledger.publisher().events(poll.id).unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_voters_keep_counters_consistent() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B", "C"]).await;

    let mut handles = Vec::new();
    for n in 0..60_usize {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.submit_vote(poll.id, ParticipantId::new(), n % 3).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_counted());
    }

    let counters = ledger.counters(poll.id).unwrap();
    assert_eq!(counters.total, 60);
    assert_eq!(counters.option_sum(), Some(counters.total));
    assert_eq!(counters.count(0), 20);
    assert_eq!(ledger.verify_counters(poll.id).unwrap(), CounterCheck::Consistent);
}

#[tokio::test]
async fn scenario_red_blue_counts() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["Red", "Blue"]).await;
    for option in [0, 0, 1] {
        let outcome = ledger
            .submit_vote(poll.id, ParticipantId::new(), option)
            .await
            .unwrap();
        assert!(outcome.is_counted());
    }
    let counters = ledger.counters(poll.id).unwrap();
    assert_eq!(counters.count(0), 2);
    assert_eq!(counters.count(1), 1);
    assert_eq!(counters.total, 3);

    let events = ledger.publisher().events(poll.id).unwrap();
    assert_eq!(events.iter().filter(|e| e.option_index == 0).count(), 2);
    assert_eq!(events.iter().filter(|e| e.option_index == 1).count(), 1);
}

#[tokio::test]
async fn rejected_votes_write_nothing() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["Red", "Blue"]).await;
    let voter = ParticipantId::new();

    assert!(matches!(
        ledger.submit_vote(poll.id, voter, 2).await,
        Err(LedgerError::OptionOutOfRange { index: 2, options: 2 })
    ));

    ledger.lock_poll(poll.id).await.unwrap();
    assert!(matches!(
        ledger.submit_vote(poll.id, voter, 0).await,
        Err(LedgerError::PollNotAccepting { status: PollStatus::Locked, .. })
    ));
    ledger.resume_poll(poll.id).await.unwrap();

    ledger.set_classroom_active(poll.classroom_id, false).await.unwrap();
    assert!(matches!(
        ledger.submit_vote(poll.id, voter, 0).await,
        Err(LedgerError::ClassroomInactive(_))
    ));

    assert!(matches!(
        ledger.submit_vote(pulse_types::PollId::new(), voter, 0).await,
        Err(LedgerError::PollNotFound(_))
    ));
    assert_eq!(ledger.counters(poll.id).unwrap().total, 0);
    assert!(ledger.votes(poll.id).unwrap().is_empty());
}

#[tokio::test]
async fn vote_survives_injected_conflicts() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B"]).await;
    ledger.store().inject_conflicts(5).unwrap();
    let outcome = ledger
        .submit_vote(poll.id, ParticipantId::new(), 0)
        .await
        .unwrap();
    assert!(outcome.is_counted());
    assert_eq!(ledger.counters(poll.id).unwrap().total, 1);
}

#[tokio::test]
async fn unavailable_store_surfaces_transient_error() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B"]).await;
    ledger.store().inject_failures(1).unwrap();
    let result = ledger.submit_vote(poll.id, ParticipantId::new(), 0).await;
    assert!(result.as_ref().is_err_and(LedgerError::is_transient));
    assert!(matches!(result, Err(LedgerError::Store(StoreError::Unavailable(_)))));
    assert_eq!(ledger.counters(poll.id).unwrap().total, 0);
}

#[tokio::test]
async fn failed_stream_append_keeps_vote_counted() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B"]).await;
    ledger.store().inject_prefix_failures("streams/", 1).unwrap();

    let outcome = ledger
        .submit_vote(poll.id, ParticipantId::new(), 0)
        .await
        .unwrap();
    assert!(matches!(outcome, VoteOutcome::Counted { event: None, .. }));
    assert_eq!(ledger.counters(poll.id).unwrap().total, 1);
    assert!(ledger.publisher().events(poll.id).unwrap().is_empty());
}

#[tokio::test]
async fn attendee_vote_count_tracks_counted_votes() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B"]).await;
    let voter = ParticipantId::new();
    ledger
        .join_classroom(poll.classroom_id, voter, "Ada")
        .await
        .unwrap();

    ledger.submit_vote(poll.id, voter, 0).await.unwrap();
    ledger.submit_vote(poll.id, voter, 1).await.unwrap();

    let attendees = ledger.attendees(poll.classroom_id).unwrap();
    assert_eq!(attendees.len(), 1);
    assert_eq!(attendees[0].vote_count, 1);
}

// =============================================================================
// Reset and epochs
// =============================================================================

#[tokio::test]
async fn revote_after_reset_keeps_both_records() {
    let ledger = ledger_with(LedgerOptions {
        purge_on_reset: false,
    });
    let poll = live_poll(&ledger, &["Red", "Blue"]).await;
    let voter = ParticipantId::new();

    let first = ledger.submit_vote(poll.id, voter, 0).await.unwrap();
    let report = ledger.reset_poll(poll.id).await.unwrap();
    assert!(report.epoch > report.previous_epoch);
    let second = ledger.submit_vote(poll.id, voter, 1).await.unwrap();

    assert!(first.is_counted());
    assert!(second.is_counted());

    let all = ledger.all_votes(poll.id).unwrap();
    assert_eq!(all.len(), 2);
    assert_ne!(all[0].epoch, all[1].epoch);

    let counters = ledger.counters(poll.id).unwrap();
    assert_eq!(counters.epoch, report.epoch);
    assert_eq!(counters.count(0), 0);
    assert_eq!(counters.count(1), 1);
    assert_eq!(counters.total, 1);
}

#[tokio::test]
async fn reset_purges_older_epochs_by_default() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["Red", "Blue"]).await;
    for _ in 0..3 {
        ledger.submit_vote(poll.id, ParticipantId::new(), 0).await.unwrap();
    }
    let report = ledger.reset_poll(poll.id).await.unwrap();
    assert_eq!(report.votes.deleted, 3);
    assert_eq!(report.events.deleted, 3);
    assert_eq!(report.votes.failed, 0);
    assert!(ledger.all_votes(poll.id).unwrap().is_empty());
    assert!(ledger.publisher().events(poll.id).unwrap().is_empty());
}

#[tokio::test]
async fn failed_purge_is_reported_not_raised() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["Red", "Blue"]).await;
    for _ in 0..2 {
        ledger.submit_vote(poll.id, ParticipantId::new(), 1).await.unwrap();
    }
    ledger.store().inject_delete_failures(1).unwrap();
    let report = ledger.reset_poll(poll.id).await.unwrap();
    assert_eq!(report.votes.merged(report.events).failed, 1);

    // The leftover belongs to an older epoch and is invisible to readers.
    assert_eq!(ledger.counters(poll.id).unwrap().total, 0);
    assert!(ledger.votes(poll.id).unwrap().is_empty());
    assert_eq!(ledger.verify_counters(poll.id).unwrap(), CounterCheck::Consistent);
}

#[tokio::test]
async fn reset_twice_matches_reset_once() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B"]).await;
    ledger.submit_vote(poll.id, ParticipantId::new(), 0).await.unwrap();

    let once = ledger.reset_poll(poll.id).await.unwrap();
    let twice = ledger.reset_poll(poll.id).await.unwrap();
    assert!(twice.epoch > once.epoch);

    let counters = ledger.counters(poll.id).unwrap();
    assert_eq!(counters, AggregateCounters::zeroed(twice.epoch));
    assert!(ledger.all_votes(poll.id).unwrap().is_empty());
    assert_eq!(ledger.poll(poll.id).unwrap().status, PollStatus::Active);
}

#[tokio::test]
async fn stale_counters_are_replaced_on_next_vote() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["A", "B"]).await;
    ledger.submit_vote(poll.id, ParticipantId::new(), 0).await.unwrap();

    // Simulate a partially applied reset: epoch moved, counters did not.
    let mut moved = ledger.poll(poll.id).unwrap();
    moved.reset_epoch = pulse_types::Epoch(moved.reset_epoch.as_millis() + 10);
    ledger.store().set_json(&paths::poll(poll.id), &moved).unwrap();

    assert_eq!(ledger.counters(poll.id).unwrap().total, 0);
    ledger.submit_vote(poll.id, ParticipantId::new(), 1).await.unwrap();
    let counters = ledger.counters(poll.id).unwrap();
    assert_eq!(counters.epoch, moved.reset_epoch);
    assert_eq!(counters.total, 1);
    assert_eq!(counters.count(0), 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let ledger = ledger();
    let classroom = ledger.create_classroom("Physics").unwrap();
    let poll = ledger
        .create_poll(classroom.id, "Q", &options(&["x", "y"]))
        .await
        .unwrap();

    assert!(matches!(
        ledger.lock_poll(poll.id).await,
        Err(LedgerError::InvalidTransition { from: PollStatus::Draft, action: PollAction::Lock, .. })
    ));
    assert!(matches!(
        ledger.reset_poll(poll.id).await,
        Err(LedgerError::InvalidTransition { action: PollAction::Reset, .. })
    ));

    ledger.launch_poll(poll.id).await.unwrap();
    assert_eq!(ledger.toggle_lock(poll.id).await.unwrap().status, PollStatus::Locked);
    assert_eq!(ledger.toggle_lock(poll.id).await.unwrap().status, PollStatus::Active);
    assert_eq!(ledger.end_poll(poll.id).await.unwrap().status, PollStatus::Ended);

    assert!(matches!(
        ledger.resume_poll(poll.id).await,
        Err(LedgerError::InvalidTransition { from: PollStatus::Ended, .. })
    ));
    assert!(matches!(
        ledger.launch_poll(poll.id).await,
        Err(LedgerError::InvalidTransition { from: PollStatus::Ended, .. })
    ));
}

#[tokio::test]
async fn edit_only_in_draft() {
    let ledger = ledger();
    let classroom = ledger.create_classroom("Chemistry").unwrap();
    let poll = ledger
        .create_poll(classroom.id, "Q", &options(&["x", "y"]))
        .await
        .unwrap();
    let edited = ledger
        .edit_poll(poll.id, "New Q", &options(&["x", "y", "z"]))
        .await
        .unwrap();
    assert_eq!(edited.options.len(), 3);

    ledger.launch_poll(poll.id).await.unwrap();
    assert!(matches!(
        ledger.edit_poll(poll.id, "Again", &options(&["a", "b"])).await,
        Err(LedgerError::NotEditable { status: PollStatus::Active, .. })
    ));
}

#[tokio::test]
async fn launch_counts_each_new_poll_once() {
    let ledger = ledger();
    let classroom = ledger.create_classroom("History").unwrap();
    let first = ledger
        .create_poll(classroom.id, "One", &options(&["a", "b"]))
        .await
        .unwrap();
    let second = ledger
        .create_poll(classroom.id, "Two", &options(&["a", "b"]))
        .await
        .unwrap();

    ledger.launch_poll(first.id).await.unwrap();
    ledger.launch_poll(first.id).await.unwrap();
    assert_eq!(ledger.classroom(classroom.id).unwrap().total_polls_count, 1);

    ledger.launch_poll(second.id).await.unwrap();
    let room = ledger.classroom(classroom.id).unwrap();
    assert_eq!(room.total_polls_count, 2);
    assert_eq!(room.active_poll_id, Some(second.id));

    let room = ledger.return_to_chat(classroom.id).await.unwrap();
    assert_eq!(room.active_poll_id, None);
}

#[tokio::test]
async fn launching_another_poll_closes_voting_on_the_previous_one() {
    let ledger = ledger();
    let first = live_poll(&ledger, &["a", "b"]).await;
    let second = ledger
        .create_poll(first.classroom_id, "Next", &options(&["c", "d"]))
        .await
        .unwrap();
    ledger.launch_poll(second.id).await.unwrap();

    assert!(matches!(
        ledger.submit_vote(first.id, ParticipantId::new(), 0).await,
        Err(LedgerError::PollNotPresented(id)) if id == first.id
    ));
    assert_eq!(ledger.counters(first.id).unwrap().total, 0);
    assert!(ledger.publisher().events(first.id).unwrap().is_empty());
    assert!(
        ledger
            .submit_vote(second.id, ParticipantId::new(), 1)
            .await
            .unwrap()
            .is_counted()
    );

    // Bringing the first poll back re-opens it.
    ledger.launch_poll(first.id).await.unwrap();
    assert!(
        ledger
            .submit_vote(first.id, ParticipantId::new(), 0)
            .await
            .unwrap()
            .is_counted()
    );
}

#[tokio::test]
async fn return_to_chat_closes_voting() {
    let ledger = ledger();
    let poll = live_poll(&ledger, &["a", "b"]).await;
    ledger.return_to_chat(poll.classroom_id).await.unwrap();

    assert!(matches!(
        ledger.submit_vote(poll.id, ParticipantId::new(), 0).await,
        Err(LedgerError::PollNotPresented(_))
    ));
    assert_eq!(ledger.counters(poll.id).unwrap().total, 0);
    assert!(ledger.votes(poll.id).unwrap().is_empty());
}

#[tokio::test]
async fn create_poll_requires_classroom_and_valid_options() {
    let ledger = ledger();
    assert!(matches!(
        ledger
            .create_poll(pulse_types::ClassroomId::new(), "Q", &options(&["a", "b"]))
            .await,
        Err(LedgerError::ClassroomNotFound(_))
    ));
    let classroom = ledger.create_classroom("Art").unwrap();
    assert!(matches!(
        ledger.create_poll(classroom.id, "Q", &options(&["only"])).await,
        Err(LedgerError::InvalidInput(_))
    ));
    let poll = ledger
        .create_poll(classroom.id, "Q", &options(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(poll.status, PollStatus::Draft);
    assert_eq!(
        ledger.counters(poll.id).unwrap(),
        AggregateCounters::zeroed(poll.reset_epoch)
    );
}

#[tokio::test]
async fn polls_are_listed_per_classroom_newest_first() {
    let ledger = ledger();
    let classroom = ledger.create_classroom("Art").unwrap();
    let other = ledger.create_classroom("Music").unwrap();
    let older = ledger
        .create_poll(classroom.id, "First", &options(&["a", "b"]))
        .await
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = ledger
        .create_poll(classroom.id, "Second", &options(&["a", "b"]))
        .await
        .unwrap();
    ledger
        .create_poll(other.id, "Elsewhere", &options(&["a", "b"]))
        .await
        .unwrap();
    // Vote records under the poll must not be listed as polls.
    ledger.launch_poll(newer.id).await.unwrap();
    ledger.submit_vote(newer.id, ParticipantId::new(), 0).await.unwrap();

    let listed: Vec<_> = ledger
        .polls(classroom.id)
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![newer.id, older.id]);

    assert!(matches!(
        ledger.polls(pulse_types::ClassroomId::new()),
        Err(LedgerError::ClassroomNotFound(_))
    ));
}

// =============================================================================
// Classrooms and participation
// =============================================================================

#[tokio::test]
async fn join_is_idempotent_and_classroom_toggles() {
    let ledger = ledger();
    let classroom = ledger.create_classroom("Music").unwrap();
    let who = ParticipantId::new();
    let first = ledger.join_classroom(classroom.id, who, "Ada").await.unwrap();
    let again = ledger.join_classroom(classroom.id, who, "Renamed").await.unwrap();
    assert_eq!(first, again);
    assert_eq!(ledger.attendees(classroom.id).unwrap().len(), 1);

    assert!(!ledger.toggle_classroom_active(classroom.id).await.unwrap().is_active);
    assert!(ledger.toggle_classroom_active(classroom.id).await.unwrap().is_active);
}

#[tokio::test]
async fn participation_reflects_votes_per_launch() {
    let ledger = ledger();
    let classroom = ledger.create_classroom("Maths").unwrap();
    let ada = ParticipantId::new();
    let bo = ParticipantId::new();
    ledger.join_classroom(classroom.id, ada, "Ada").await.unwrap();
    ledger.join_classroom(classroom.id, bo, "Bo").await.unwrap();

    for prompt in ["One", "Two"] {
        let poll = ledger
            .create_poll(classroom.id, prompt, &options(&["a", "b"]))
            .await
            .unwrap();
        ledger.launch_poll(poll.id).await.unwrap();
        ledger.submit_vote(poll.id, ada, 0).await.unwrap();
        if prompt == "One" {
            ledger.submit_vote(poll.id, bo, 1).await.unwrap();
        }
    }

    let report = ledger.participation(classroom.id).unwrap();
    assert_eq!(report.total_polls, 2);
    let rates: Vec<(&str, Decimal)> = report
        .attendees
        .iter()
        .map(|r| (r.display_name.as_str(), r.rate))
        .collect();
    assert_eq!(
        rates,
        vec![("Ada", Decimal::ONE_HUNDRED), ("Bo", Decimal::new(50, 0))]
    );
}
