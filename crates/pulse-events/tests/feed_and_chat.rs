//! Integration tests for the stream feed and chat against a live
//! in-process store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use chrono::Utc;
use pulse_events::{ChatError, ChatRoom, ChatSettings, FeedMessage, StreamFeed, StreamPublisher};
use pulse_store::{MemoryStore, paths};
use pulse_types::{
    Attendee, Classroom, ClassroomId, Epoch, ParticipantId, Poll, PollId, PollStatus,
};

fn seed_poll(store: &MemoryStore, epoch: u64) -> Poll {
    let poll = Poll {
        id: PollId::new(),
        classroom_id: ClassroomId::new(),
        prompt: "Favourite colour?".to_owned(),
        options: vec!["Red".to_owned(), "Blue".to_owned()],
        status: PollStatus::Active,
        created_at: Utc::now(),
        reset_epoch: Epoch(epoch),
    };
    store.set_json(&paths::poll(poll.id), &poll).unwrap();
    poll
}

fn seed_classroom(store: &MemoryStore, active: bool) -> Classroom {
    let mut classroom = Classroom::new("Biology".to_owned());
    classroom.is_active = active;
    store
        .set_json(&paths::classroom(classroom.id), &classroom)
        .unwrap();
    classroom
}

fn join(store: &MemoryStore, classroom: ClassroomId, name: &str) -> ParticipantId {
    let attendee = Attendee {
        participant_id: ParticipantId::new(),
        display_name: name.to_owned(),
        vote_count: 0,
        spotlight_count: 0,
        joined_at: Utc::now(),
    };
    store
        .set_json(&paths::attendee(classroom, attendee.participant_id), &attendee)
        .unwrap();
    attendee.participant_id
}

fn drain(feed: &mut StreamFeed) -> Vec<FeedMessage> {
    std::iter::from_fn(|| feed.try_next()).collect()
}

#[tokio::test]
async fn feed_spawns_only_current_epoch_events() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, 100);
    let publisher = StreamPublisher::new(store.clone());
    publisher.publish(poll.id, 0, Epoch(50)).unwrap();
    publisher.publish(poll.id, 1, Epoch(100)).unwrap();

    let mut feed = StreamFeed::open(&store, poll.id).unwrap();
    let messages = drain(&mut feed);
    let spawns: Vec<usize> = messages
        .iter()
        .filter_map(|m| match m {
            FeedMessage::Spawn(e) => Some(e.option_index),
            _ => None,
        })
        .collect();
    assert_eq!(spawns, vec![1]);
    assert!(matches!(messages.first(), Some(FeedMessage::PollChanged(_))));
}

#[tokio::test]
async fn event_arriving_before_its_reset_is_deferred() {
    let store = MemoryStore::new();
    let mut poll = seed_poll(&store, 100);
    let publisher = StreamPublisher::new(store.clone());
    let mut feed = StreamFeed::open(&store, poll.id).unwrap();
    let _ = drain(&mut feed);

    // The new-epoch event lands before the poll document announcing it.
    let early = publisher.publish(poll.id, 1, Epoch(200)).unwrap();
    assert!(drain(&mut feed).is_empty());

    poll.reset_epoch = Epoch(200);
    store.set_json(&paths::poll(poll.id), &poll).unwrap();

    let messages = drain(&mut feed);
    assert!(matches!(messages.first(), Some(FeedMessage::PollChanged(_))));
    assert_eq!(messages.get(1), Some(&FeedMessage::Reset { epoch: Epoch(200) }));
    assert_eq!(messages.get(2), Some(&FeedMessage::Spawn(early)));
    assert_eq!(feed.epoch(), Epoch(200));
}

#[tokio::test]
async fn feed_next_waits_for_new_events() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, 7);
    let mut feed = StreamFeed::open(&store, poll.id).unwrap();
    assert!(matches!(feed.next().await, Some(FeedMessage::PollChanged(_))));

    let publisher = StreamPublisher::new(store.clone());
    let handle = tokio::spawn(async move {
        tokio::task::yield_now().await;
        publisher.publish(poll.id, 0, Epoch(7)).unwrap()
    });
    let message = feed.next().await;
    let published = handle.await.unwrap();
    assert_eq!(message, Some(FeedMessage::Spawn(published)));

    feed.close();
    assert_eq!(store.listener_count().unwrap(), 0);
}

#[tokio::test]
async fn opening_feed_for_missing_poll_fails() {
    let store = MemoryStore::new();
    assert!(StreamFeed::open(&store, PollId::new()).is_err());
}

#[tokio::test]
async fn chat_is_gated_validated_and_capped() {
    let store = MemoryStore::new();
    let chat = ChatRoom::new(
        store.clone(),
        ChatSettings {
            history_limit: 3,
            max_message_len: 10,
        },
    );
    let classroom = seed_classroom(&store, true);
    let ada = join(&store, classroom.id, "Ada");

    assert!(matches!(
        chat.send(classroom.id, ada, "   ").await,
        Err(ChatError::EmptyMessage)
    ));
    assert!(matches!(
        chat.send(classroom.id, ada, "this is far too long").await,
        Err(ChatError::MessageTooLong { len: 20, max: 10 })
    ));
    assert!(matches!(
        chat.send(classroom.id, ParticipantId::new(), "hi").await,
        Err(ChatError::NotJoined { .. })
    ));

    for n in 0..5 {
        let sent = chat.send(classroom.id, ada, &format!(" msg {n} ")).await.unwrap();
        assert_eq!(sent.text, format!("msg {n}"));
        assert_eq!(sent.sender_name, "Ada");
    }
    let recent = chat.recent(classroom.id).unwrap();
    let texts: Vec<&str> = recent.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["msg 2", "msg 3", "msg 4"]);

    let mut closed = classroom;
    closed.is_active = false;
    store.set_json(&paths::classroom(closed.id), &closed).unwrap();
    assert!(matches!(
        chat.send(closed.id, ada, "hello").await,
        Err(ChatError::ClassroomInactive(_))
    ));
}

#[tokio::test]
async fn chat_feed_tracks_recent_window() {
    let store = MemoryStore::new();
    let chat = ChatRoom::new(
        store.clone(),
        ChatSettings {
            history_limit: 2,
            max_message_len: 500,
        },
    );
    let classroom = seed_classroom(&store, true);
    let ada = join(&store, classroom.id, "Ada");
    chat.send(classroom.id, ada, "first").await.unwrap();

    let mut feed = chat.feed(classroom.id).unwrap();
    assert_eq!(feed.messages().len(), 1);

    chat.send(classroom.id, ada, "second").await.unwrap();
    chat.send(classroom.id, ada, "third").await.unwrap();
    assert!(feed.changed().await);
    let texts: Vec<&str> = feed.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["second", "third"]);
}

#[tokio::test]
async fn spotlight_bumps_sender_count() {
    let store = MemoryStore::new();
    let chat = ChatRoom::new(store.clone(), ChatSettings::default());
    let classroom = seed_classroom(&store, true);
    let ada = join(&store, classroom.id, "Ada");
    let message = chat.send(classroom.id, ada, "question").await.unwrap();

    let first = chat.spotlight(classroom.id, message.id).await.unwrap();
    let second = chat.spotlight(classroom.id, message.id).await.unwrap();
    assert_eq!(first.spotlight_count, 1);
    assert_eq!(second.spotlight_count, 2);

    assert!(matches!(
        chat.spotlight(classroom.id, pulse_types::MessageId::new()).await,
        Err(ChatError::MessageNotFound(_))
    ));
}
