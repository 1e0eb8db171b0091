//! The vote ledger: classrooms, polls, votes and counters.
//!
//! [`VoteLedger`] is the only writer of polls, vote records and aggregate
//! counters. Every mutation that depends on current state goes through the
//! store's optimistic transaction primitive, so concurrent submissions
//! never double count.
//!
//! # Vote accounting
//!
//! - One vote record per (poll, epoch, participant), keyed by participant.
//! - The vote record, the counter increment and the attendee's
//!   `vote_count` are committed in one transaction.
//! - A second submission in the same epoch finds the record and writes
//!   nothing.
//! - The stream event is appended after the commit. A failed append is
//!   logged and never un-counts the vote.

use std::slice;

use chrono::Utc;
use pulse_events::{PurgeCount, StreamPublisher};
use pulse_store::{MemoryStore, StoreError, TxOutcome, WriteSet, paths};
use pulse_types::{
    AggregateCounters, Attendee, Classroom, ClassroomId, Epoch, ParticipantId, Poll, PollId,
    PollStatus, StreamEvent, VoteRecord,
};
use tracing::{debug, info, warn};

use crate::LedgerError;
use crate::consistency::{self, CounterCheck};
use crate::lifecycle::{PollAction, toggle_lock_action, transition};
use crate::participation::{self, ParticipationReport};

/// Fewest options a poll may have.
pub const MIN_OPTIONS: usize = 2;

/// Most options a poll may have.
pub const MAX_OPTIONS: usize = 6;

/// Ledger behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Delete vote records and stream events of older epochs after a reset.
    pub purge_on_reset: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            purge_on_reset: true,
        }
    }
}

/// Result of a vote submission that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was counted.
    Counted {
        /// The epoch it was counted in.
        epoch: Epoch,
        /// The published stream event, or `None` if the append failed.
        event: Option<StreamEvent>,
    },
    /// The participant already voted in this epoch. Nothing was written.
    AlreadyVoted {
        /// The epoch of the existing vote.
        epoch: Epoch,
    },
}

impl VoteOutcome {
    /// Whether this submission was counted.
    pub const fn is_counted(&self) -> bool {
        matches!(self, Self::Counted { .. })
    }
}

/// What a poll reset did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    /// The poll reset.
    pub poll_id: PollId,
    /// The epoch before the reset.
    pub previous_epoch: Epoch,
    /// The new epoch.
    pub epoch: Epoch,
    /// Vote records purged from older epochs.
    pub votes: PurgeCount,
    /// Stream events purged from older epochs.
    pub events: PurgeCount,
}

/// Decision of one vote transaction attempt.
enum VoteAttempt {
    EpochMoved,
    Rejected(LedgerError),
    AlreadyVoted,
    Counted,
}

/// Writer for classrooms, polls, votes and counters.
#[derive(Debug, Clone)]
pub struct VoteLedger {
    store: MemoryStore,
    publisher: StreamPublisher,
    options: LedgerOptions,
}

impl VoteLedger {
    /// Create a ledger over `store`.
    pub fn new(store: MemoryStore, options: LedgerOptions) -> Self {
        let publisher = StreamPublisher::new(store.clone());
        Self {
            store,
            publisher,
            options,
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// The stream publisher used for counted votes.
    pub const fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    /// The configured options.
    pub const fn options(&self) -> LedgerOptions {
        self.options
    }

    // =========================================================================
    // Classrooms
    // =========================================================================

    /// Create an active classroom named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] for a blank name.
    pub fn create_classroom(&self, name: &str) -> Result<Classroom, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("classroom name is empty".to_owned()));
        }
        let classroom = Classroom::new(name.to_owned());
        self.store
            .set_json(&paths::classroom(classroom.id), &classroom)?;
        info!(classroom = %classroom.id, name = %classroom.name, "classroom created");
        Ok(classroom)
    }

    /// Read a classroom.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ClassroomNotFound`] if it does not exist.
    pub fn classroom(&self, id: ClassroomId) -> Result<Classroom, LedgerError> {
        self.store
            .get_json(&paths::classroom(id))?
            .ok_or(LedgerError::ClassroomNotFound(id))
    }

    /// Open or close a classroom to participant interaction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ClassroomNotFound`] if it does not exist.
    pub async fn set_classroom_active(
        &self,
        id: ClassroomId,
        active: bool,
    ) -> Result<Classroom, LedgerError> {
        let classroom = self
            .update_classroom(id, |c| c.is_active = active)
            .await?;
        info!(classroom = %id, active, "classroom activity changed");
        Ok(classroom)
    }

    /// Flip a classroom's `is_active` flag.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ClassroomNotFound`] if it does not exist.
    pub async fn toggle_classroom_active(&self, id: ClassroomId) -> Result<Classroom, LedgerError> {
        let classroom = self
            .update_classroom(id, |c| c.is_active = !c.is_active)
            .await?;
        info!(classroom = %id, active = classroom.is_active, "classroom activity toggled");
        Ok(classroom)
    }

    /// Clear the classroom's active poll so participants return to chat.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ClassroomNotFound`] if it does not exist.
    pub async fn return_to_chat(&self, id: ClassroomId) -> Result<Classroom, LedgerError> {
        let classroom = self
            .update_classroom(id, |c| c.active_poll_id = None)
            .await?;
        info!(classroom = %id, "returned to chat");
        Ok(classroom)
    }

    /// Register `participant_id` in a classroom. Joining twice returns the
    /// existing attendee unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] for a blank name or
    /// [`LedgerError::ClassroomNotFound`] if the classroom does not exist.
    pub async fn join_classroom(
        &self,
        classroom_id: ClassroomId,
        participant_id: ParticipantId,
        display_name: &str,
    ) -> Result<Attendee, LedgerError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(LedgerError::InvalidInput("display name is empty".to_owned()));
        }
        let classroom_path = paths::classroom(classroom_id);
        let attendee_path = paths::attendee(classroom_id, participant_id);

        let attendee = self
            .store
            .transact(&[classroom_path.clone(), attendee_path.clone()], |snap| {
                if !snap.exists(&classroom_path) {
                    return Ok(TxOutcome::read_only(None));
                }
                if let Some(existing) = snap.get_json::<Attendee>(&attendee_path)? {
                    return Ok(TxOutcome::read_only(Some(existing)));
                }
                let attendee = Attendee {
                    participant_id,
                    display_name: display_name.to_owned(),
                    vote_count: 0,
                    spotlight_count: 0,
                    joined_at: Utc::now(),
                };
                let mut writes = WriteSet::new();
                writes.set_json(attendee_path.clone(), &attendee)?;
                Ok(TxOutcome::commit(writes, Some(attendee)))
            })
            .await?
            .ok_or(LedgerError::ClassroomNotFound(classroom_id))?;

        debug!(classroom = %classroom_id, participant = %participant_id, "attendee joined");
        Ok(attendee)
    }

    /// Every attendee of a classroom.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] if listing fails.
    pub fn attendees(&self, classroom_id: ClassroomId) -> Result<Vec<Attendee>, LedgerError> {
        Ok(self.store.list_json(&paths::attendees(classroom_id))?)
    }

    /// Participation rates of every attendee of a classroom.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ClassroomNotFound`] if it does not exist.
    pub fn participation(
        &self,
        classroom_id: ClassroomId,
    ) -> Result<ParticipationReport, LedgerError> {
        let classroom = self.classroom(classroom_id)?;
        let attendees = self.attendees(classroom_id)?;
        Ok(participation::build_report(
            classroom_id,
            classroom.total_polls_count,
            attendees,
        ))
    }

    async fn update_classroom<F>(&self, id: ClassroomId, mut f: F) -> Result<Classroom, LedgerError>
    where
        F: FnMut(&mut Classroom) + Send,
    {
        let path = paths::classroom(id);
        self.store
            .transact(slice::from_ref(&path), |snap| {
                let Some(mut classroom) = snap.get_json::<Classroom>(&path)? else {
                    return Ok(TxOutcome::read_only(None));
                };
                f(&mut classroom);
                let mut writes = WriteSet::new();
                writes.set_json(path.clone(), &classroom)?;
                Ok(TxOutcome::commit(writes, Some(classroom)))
            })
            .await?
            .ok_or(LedgerError::ClassroomNotFound(id))
    }

    // =========================================================================
    // Polls
    // =========================================================================

    /// Create a draft poll in a classroom, with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] if the prompt is blank or the
    /// options are not 2 to 6 non-blank texts, and
    /// [`LedgerError::ClassroomNotFound`] if the classroom does not exist.
    pub async fn create_poll(
        &self,
        classroom_id: ClassroomId,
        prompt: &str,
        options: &[String],
    ) -> Result<Poll, LedgerError> {
        let (prompt, options) = validate_content(prompt, options)?;
        let created_at = Utc::now();
        let poll = Poll {
            id: PollId::new(),
            classroom_id,
            prompt,
            options,
            status: PollStatus::Draft,
            created_at,
            reset_epoch: Epoch::starting_at(created_at),
        };
        let classroom_path = paths::classroom(classroom_id);

        let created = self
            .store
            .transact(slice::from_ref(&classroom_path), |snap| {
                if !snap.exists(&classroom_path) {
                    return Ok(TxOutcome::read_only(false));
                }
                let mut writes = WriteSet::new();
                writes.set_json(paths::poll(poll.id), &poll)?;
                writes.set_json(
                    paths::stats(poll.id),
                    &AggregateCounters::zeroed(poll.reset_epoch),
                )?;
                Ok(TxOutcome::commit(writes, true))
            })
            .await?;
        if !created {
            return Err(LedgerError::ClassroomNotFound(classroom_id));
        }

        info!(
            classroom = %classroom_id,
            poll = %poll.id,
            options = poll.options.len(),
            epoch = %poll.reset_epoch,
            "poll created"
        );
        Ok(poll)
    }

    /// Replace the prompt and options of a draft poll.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`] for invalid content,
    /// [`LedgerError::PollNotFound`], or [`LedgerError::NotEditable`] once
    /// the poll left draft.
    pub async fn edit_poll(
        &self,
        poll_id: PollId,
        prompt: &str,
        options: &[String],
    ) -> Result<Poll, LedgerError> {
        let (prompt, options) = validate_content(prompt, options)?;
        let path = paths::poll(poll_id);

        let poll = self
            .store
            .transact(slice::from_ref(&path), |snap| {
                let Some(mut poll) = snap.get_json::<Poll>(&path)? else {
                    return Ok(TxOutcome::read_only(Err(LedgerError::PollNotFound(poll_id))));
                };
                if poll.status != PollStatus::Draft {
                    return Ok(TxOutcome::read_only(Err(LedgerError::NotEditable {
                        poll: poll_id,
                        status: poll.status,
                    })));
                }
                poll.prompt.clone_from(&prompt);
                poll.options.clone_from(&options);
                let mut writes = WriteSet::new();
                writes.set_json(path.clone(), &poll)?;
                Ok(TxOutcome::commit(writes, Ok(poll)))
            })
            .await??;

        debug!(poll = %poll_id, "poll edited");
        Ok(poll)
    }

    /// Read a poll.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`] if it does not exist.
    pub fn poll(&self, id: PollId) -> Result<Poll, LedgerError> {
        self.store
            .get_json(&paths::poll(id))?
            .ok_or(LedgerError::PollNotFound(id))
    }

    /// Every poll of a classroom, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ClassroomNotFound`] if the classroom does not
    /// exist.
    pub fn polls(&self, classroom_id: ClassroomId) -> Result<Vec<Poll>, LedgerError> {
        self.classroom(classroom_id)?;
        let mut polls: Vec<Poll> = self
            .store
            .list_json::<Poll>(paths::POLLS)?
            .into_iter()
            .filter(|p| p.classroom_id == classroom_id)
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(polls)
    }

    /// Launch a poll: draft becomes active and the poll becomes the
    /// classroom's active poll.
    ///
    /// `total_polls_count` grows only when the classroom pointer moves to
    /// a different poll. Launching the poll that is already live and
    /// pointed to writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`],
    /// [`LedgerError::ClassroomNotFound`], or
    /// [`LedgerError::InvalidTransition`] for an ended poll.
    pub async fn launch_poll(&self, poll_id: PollId) -> Result<Poll, LedgerError> {
        let classroom_id = self.poll(poll_id)?.classroom_id;
        let poll_path = paths::poll(poll_id);
        let classroom_path = paths::classroom(classroom_id);

        let poll = self
            .store
            .transact(&[poll_path.clone(), classroom_path.clone()], |snap| {
                let Some(mut poll) = snap.get_json::<Poll>(&poll_path)? else {
                    return Ok(TxOutcome::read_only(Err(LedgerError::PollNotFound(poll_id))));
                };
                let Some(mut classroom) = snap.get_json::<Classroom>(&classroom_path)? else {
                    return Ok(TxOutcome::read_only(Err(LedgerError::ClassroomNotFound(
                        classroom_id,
                    ))));
                };
                let pointed = classroom.active_poll_id == Some(poll_id);
                if poll.status.is_live() && pointed {
                    return Ok(TxOutcome::read_only(Ok(poll)));
                }
                if !poll.status.is_live() {
                    let Some(next) = transition(poll.status, PollAction::Launch) else {
                        return Ok(TxOutcome::read_only(Err(LedgerError::InvalidTransition {
                            poll: poll_id,
                            from: poll.status,
                            action: PollAction::Launch,
                        })));
                    };
                    poll.status = next;
                }

                let mut writes = WriteSet::new();
                if !pointed {
                    let Some(total) = classroom.total_polls_count.checked_add(1) else {
                        return Ok(TxOutcome::read_only(Err(LedgerError::CounterOverflow(
                            poll_id,
                        ))));
                    };
                    classroom.active_poll_id = Some(poll_id);
                    classroom.total_polls_count = total;
                    writes.set_json(classroom_path.clone(), &classroom)?;
                }
                writes.set_json(poll_path.clone(), &poll)?;
                Ok(TxOutcome::commit(writes, Ok(poll)))
            })
            .await??;

        info!(classroom = %classroom_id, poll = %poll_id, status = %poll.status, "poll launched");
        Ok(poll)
    }

    /// Stop accepting votes.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] unless the poll is active.
    pub async fn lock_poll(&self, poll_id: PollId) -> Result<Poll, LedgerError> {
        self.apply_action(poll_id, PollAction::Lock).await
    }

    /// Accept votes again.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] unless the poll is locked.
    pub async fn resume_poll(&self, poll_id: PollId) -> Result<Poll, LedgerError> {
        self.apply_action(poll_id, PollAction::Resume).await
    }

    /// Close the poll for good.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] unless the poll is live.
    pub async fn end_poll(&self, poll_id: PollId) -> Result<Poll, LedgerError> {
        self.apply_action(poll_id, PollAction::End).await
    }

    /// Lock an active poll or resume a locked one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] unless the poll is live.
    pub async fn toggle_lock(&self, poll_id: PollId) -> Result<Poll, LedgerError> {
        let status = self.poll(poll_id)?.status;
        self.apply_action(poll_id, toggle_lock_action(status)).await
    }

    async fn apply_action(&self, poll_id: PollId, action: PollAction) -> Result<Poll, LedgerError> {
        let path = paths::poll(poll_id);
        let poll = self
            .store
            .transact(slice::from_ref(&path), |snap| {
                let Some(mut poll) = snap.get_json::<Poll>(&path)? else {
                    return Ok(TxOutcome::read_only(Err(LedgerError::PollNotFound(poll_id))));
                };
                let Some(next) = transition(poll.status, action) else {
                    return Ok(TxOutcome::read_only(Err(LedgerError::InvalidTransition {
                        poll: poll_id,
                        from: poll.status,
                        action,
                    })));
                };
                poll.status = next;
                let mut writes = WriteSet::new();
                writes.set_json(path.clone(), &poll)?;
                Ok(TxOutcome::commit(writes, Ok(poll)))
            })
            .await??;

        info!(poll = %poll_id, %action, status = %poll.status, "poll status changed");
        Ok(poll)
    }

    /// Reset a live poll: advance its epoch and zero its counters in one
    /// transaction, then purge older vote records and stream events if
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`] or
    /// [`LedgerError::InvalidTransition`] unless the poll is live. Purge
    /// failures are reported in the [`ResetReport`], never as errors.
    pub async fn reset_poll(&self, poll_id: PollId) -> Result<ResetReport, LedgerError> {
        let poll_path = paths::poll(poll_id);
        let stats_path = paths::stats(poll_id);

        let (previous_epoch, epoch) = self
            .store
            .transact(&[poll_path.clone(), stats_path.clone()], |snap| {
                let Some(mut poll) = snap.get_json::<Poll>(&poll_path)? else {
                    return Ok(TxOutcome::read_only(Err(LedgerError::PollNotFound(poll_id))));
                };
                if transition(poll.status, PollAction::Reset).is_none() {
                    return Ok(TxOutcome::read_only(Err(LedgerError::InvalidTransition {
                        poll: poll_id,
                        from: poll.status,
                        action: PollAction::Reset,
                    })));
                }
                let previous = poll.reset_epoch;
                poll.reset_epoch = previous.advance(Utc::now());
                let mut writes = WriteSet::new();
                writes.set_json(poll_path.clone(), &poll)?;
                writes.set_json(
                    stats_path.clone(),
                    &AggregateCounters::zeroed(poll.reset_epoch),
                )?;
                Ok(TxOutcome::commit(writes, Ok((previous, poll.reset_epoch))))
            })
            .await??;

        let (votes, events) = if self.options.purge_on_reset {
            (self.purge_votes(poll_id, epoch), self.purge_events(poll_id, epoch))
        } else {
            (PurgeCount::default(), PurgeCount::default())
        };

        info!(
            poll = %poll_id,
            %previous_epoch,
            %epoch,
            votes_purged = votes.deleted,
            events_purged = events.deleted,
            failed_deletes = votes.merged(events).failed,
            "poll reset"
        );
        Ok(ResetReport {
            poll_id,
            previous_epoch,
            epoch,
            votes,
            events,
        })
    }

    fn purge_votes(&self, poll_id: PollId, current: Epoch) -> PurgeCount {
        let mut count = PurgeCount::default();
        let listed = match self.store.list_prefix(&paths::all_votes(poll_id)) {
            Ok(listed) => listed,
            Err(e) => {
                warn!(poll = %poll_id, error = %e, "could not list votes to purge");
                return count;
            }
        };
        for (path, data) in listed {
            let stale = serde_json::from_value::<VoteRecord>(data)
                .map(|vote| vote.epoch < current)
                .unwrap_or(false);
            if !stale {
                continue;
            }
            match self.store.delete(&path) {
                Ok(()) => count.record_deleted(),
                Err(e) => {
                    warn!(poll = %poll_id, %path, error = %e, "failed to purge stale vote");
                    count.record_failed();
                }
            }
        }
        count
    }

    fn purge_events(&self, poll_id: PollId, current: Epoch) -> PurgeCount {
        self.publisher
            .purge_before(poll_id, current)
            .unwrap_or_else(|e| {
                warn!(poll = %poll_id, error = %e, "could not list stream events to purge");
                PurgeCount::default()
            })
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Submit a vote for `option_index` on behalf of `participant_id`.
    ///
    /// At most one vote per participant is counted in each epoch, however
    /// many submissions race. A repeated submission returns
    /// [`VoteOutcome::AlreadyVoted`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`],
    /// [`LedgerError::ClassroomNotFound`],
    /// [`LedgerError::ClassroomInactive`],
    /// [`LedgerError::PollNotPresented`],
    /// [`LedgerError::PollNotAccepting`] or
    /// [`LedgerError::OptionOutOfRange`] when the vote is not allowed, and
    /// [`LedgerError::Store`] when the store fails or stays contended.
    pub async fn submit_vote(
        &self,
        poll_id: PollId,
        participant_id: ParticipantId,
        option_index: usize,
    ) -> Result<VoteOutcome, LedgerError> {
        let poll_path = paths::poll(poll_id);
        let stats_path = paths::stats(poll_id);
        let attempts = self.store.max_attempts();

        for _ in 0..attempts {
            let current = self.poll(poll_id)?;
            let epoch = current.reset_epoch;
            let classroom_path = paths::classroom(current.classroom_id);
            let attendee_path = paths::attendee(current.classroom_id, participant_id);
            let vote_path = paths::vote(poll_id, epoch, participant_id);
            let read_set = [
                poll_path.clone(),
                classroom_path.clone(),
                vote_path.clone(),
                stats_path.clone(),
                attendee_path.clone(),
            ];

            let attempt = self
                .store
                .transact(&read_set, |snap| {
                    let Some(poll) = snap.get_json::<Poll>(&poll_path)? else {
                        return Ok(TxOutcome::read_only(VoteAttempt::Rejected(
                            LedgerError::PollNotFound(poll_id),
                        )));
                    };
                    if poll.reset_epoch != epoch {
                        return Ok(TxOutcome::read_only(VoteAttempt::EpochMoved));
                    }
                    if let Err(e) = check_vote_allowed(snap.get_json(&classroom_path)?, &poll, option_index) {
                        return Ok(TxOutcome::read_only(VoteAttempt::Rejected(e)));
                    }
                    if snap.exists(&vote_path) {
                        return Ok(TxOutcome::read_only(VoteAttempt::AlreadyVoted));
                    }

                    // Counters left from an older epoch start over.
                    let mut counters = snap
                        .get_json::<AggregateCounters>(&stats_path)?
                        .filter(|c| c.epoch == epoch)
                        .unwrap_or_else(|| AggregateCounters::zeroed(epoch));
                    if counters.increment(option_index).is_none() {
                        return Ok(TxOutcome::read_only(VoteAttempt::Rejected(
                            LedgerError::CounterOverflow(poll_id),
                        )));
                    }

                    let vote = VoteRecord {
                        participant_id,
                        option_index,
                        epoch,
                        submitted_at: Utc::now(),
                    };
                    let mut writes = WriteSet::new();
                    writes.set_json(vote_path.clone(), &vote)?;
                    writes.set_json(stats_path.clone(), &counters)?;
                    if let Some(mut attendee) = snap.get_json::<Attendee>(&attendee_path)? {
                        attendee.vote_count = attendee.vote_count.saturating_add(1);
                        writes.set_json(attendee_path.clone(), &attendee)?;
                    }
                    Ok(TxOutcome::commit(writes, VoteAttempt::Counted))
                })
                .await?;

            match attempt {
                VoteAttempt::EpochMoved => {
                    debug!(poll = %poll_id, participant = %participant_id, "poll epoch moved, retrying vote");
                }
                VoteAttempt::Rejected(e) => {
                    debug!(poll = %poll_id, participant = %participant_id, error = %e, "vote rejected");
                    return Err(e);
                }
                VoteAttempt::AlreadyVoted => {
                    debug!(poll = %poll_id, participant = %participant_id, %epoch, "duplicate vote ignored");
                    return Ok(VoteOutcome::AlreadyVoted { epoch });
                }
                VoteAttempt::Counted => {
                    info!(poll = %poll_id, participant = %participant_id, option_index, %epoch, "vote counted");
                    let event = match self.publisher.publish(poll_id, option_index, epoch) {
                        Ok(event) => Some(event),
                        Err(e) => {
                            warn!(poll = %poll_id, option_index, error = %e, "stream event append failed, vote stays counted");
                            None
                        }
                    };
                    return Ok(VoteOutcome::Counted { epoch, event });
                }
            }
        }

        Err(LedgerError::Store(StoreError::Contention { attempts }))
    }

    /// The counters of the poll's current epoch. Counters stamped with an
    /// older epoch read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`] if the poll does not exist.
    pub fn counters(&self, poll_id: PollId) -> Result<AggregateCounters, LedgerError> {
        let epoch = self.poll(poll_id)?.reset_epoch;
        Ok(self
            .store
            .get_json::<AggregateCounters>(&paths::stats(poll_id))?
            .filter(|c| c.epoch == epoch)
            .unwrap_or_else(|| AggregateCounters::zeroed(epoch)))
    }

    /// The vote records of the poll's current epoch.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`] if the poll does not exist.
    pub fn votes(&self, poll_id: PollId) -> Result<Vec<VoteRecord>, LedgerError> {
        let epoch = self.poll(poll_id)?.reset_epoch;
        Ok(self.store.list_json(&paths::votes(poll_id, epoch))?)
    }

    /// Every stored vote record of the poll, across all epochs.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] if listing or decoding fails.
    pub fn all_votes(&self, poll_id: PollId) -> Result<Vec<VoteRecord>, LedgerError> {
        self.store
            .list_prefix(&paths::all_votes(poll_id))?
            .into_iter()
            .map(|(_, data)| {
                serde_json::from_value(data).map_err(|e| LedgerError::Store(StoreError::from(e)))
            })
            .collect()
    }

    /// Recount the current epoch from its vote records and compare with
    /// the stored counters.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PollNotFound`] if the poll does not exist.
    pub fn verify_counters(&self, poll_id: PollId) -> Result<CounterCheck, LedgerError> {
        let poll = self.poll(poll_id)?;
        let counters = self
            .store
            .get_json::<AggregateCounters>(&paths::stats(poll_id))?
            .unwrap_or_else(|| AggregateCounters::zeroed(poll.reset_epoch));
        let votes = self.votes(poll_id)?;
        let check = consistency::verify_counters(&poll, &counters, &votes);
        if let CounterCheck::Anomaly(anomaly) = &check {
            warn!(poll = %poll_id, message = %anomaly.message, "counter anomaly detected");
        }
        Ok(check)
    }
}

/// Validate and normalize poll content.
fn validate_content(prompt: &str, options: &[String]) -> Result<(String, Vec<String>), LedgerError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(LedgerError::InvalidInput("poll prompt is empty".to_owned()));
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(LedgerError::InvalidInput(format!(
            "a poll needs {MIN_OPTIONS} to {MAX_OPTIONS} options, got {}",
            options.len()
        )));
    }
    let options: Vec<String> = options.iter().map(|o| o.trim().to_owned()).collect();
    if let Some(blank) = options.iter().position(String::is_empty) {
        return Err(LedgerError::InvalidInput(format!("option {blank} is empty")));
    }
    Ok((prompt.to_owned(), options))
}

/// Check the vote preconditions that depend on the classroom and poll.
fn check_vote_allowed(
    classroom: Option<Classroom>,
    poll: &Poll,
    option_index: usize,
) -> Result<(), LedgerError> {
    let classroom = classroom.ok_or(LedgerError::ClassroomNotFound(poll.classroom_id))?;
    if !classroom.is_active {
        return Err(LedgerError::ClassroomInactive(classroom.id));
    }
    if classroom.active_poll_id != Some(poll.id) {
        return Err(LedgerError::PollNotPresented(poll.id));
    }
    if !poll.status.accepts_votes() {
        return Err(LedgerError::PollNotAccepting {
            poll: poll.id,
            status: poll.status,
        });
    }
    if poll.option(option_index).is_none() {
        return Err(LedgerError::OptionOutOfRange {
            index: option_index,
            options: poll.options.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn opts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn content_validation() {
        assert!(validate_content("Q", &opts(&["a", "b"])).is_ok());
        assert!(validate_content("  ", &opts(&["a", "b"])).is_err());
        assert!(validate_content("Q", &opts(&["a"])).is_err());
        assert!(validate_content("Q", &opts(&["a", "b", "c", "d", "e", "f", "g"])).is_err());
        assert!(validate_content("Q", &opts(&["a", " "])).is_err());
        let normalized = validate_content(" Q ", &opts(&[" a ", "b"])).ok();
        assert_eq!(
            normalized,
            Some(("Q".to_owned(), vec!["a".to_owned(), "b".to_owned()]))
        );
    }

    #[tokio::test]
    async fn vote_on_unlaunched_draft_is_rejected() {
        let ledger = VoteLedger::new(MemoryStore::new(), LedgerOptions::default());
        let classroom = ledger.create_classroom("Bio").unwrap();
        let poll = ledger
            .create_poll(classroom.id, "Q", &opts(&["a", "b"]))
            .await
            .unwrap();
        let result = ledger.submit_vote(poll.id, ParticipantId::new(), 0).await;
        assert!(matches!(
            result,
            Err(LedgerError::PollNotPresented(id)) if id == poll.id
        ));
    }
}
