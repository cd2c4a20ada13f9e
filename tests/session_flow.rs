use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chat_feed::auth::{IdentityProvider, StaticIdentity};
use chat_feed::feed::ErrorSink;
use chat_feed::session::{self, CHANNEL_CAPACITY, ChatSession, SessionHandle};
use chat_feed::storage::{DocumentStore, MemoryStore, SqliteStore, StoreError};
use chat_feed::{ChatCommand, ChatEvent};
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn next_matching<F>(events: &mut mpsc::Receiver<ChatEvent>, mut predicate: F) -> ChatEvent
where
    F: FnMut(&ChatEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("session ended early");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn ana() -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity::signed_in("uid-ana", "ana@example.com"))
}

#[tokio::test]
async fn sent_message_is_confirmed_and_appears_in_the_feed() {
    let store = Arc::new(MemoryStore::new());
    let SessionHandle {
        commands,
        mut events,
        task,
    } = session::spawn(store.clone(), ana(), "messages");

    let initial = next_matching(&mut events, |e| matches!(e, ChatEvent::ChatsUpdated(_))).await;
    assert_eq!(initial, ChatEvent::ChatsUpdated(Vec::new()));

    commands
        .send(ChatCommand::Send("hello".into()))
        .await
        .expect("send command");

    let confirmed =
        next_matching(&mut events, |e| matches!(e, ChatEvent::SubmitConfirmed { .. })).await;
    let ChatEvent::SubmitConfirmed { identifier, .. } = confirmed else {
        unreachable!()
    };

    let updated = next_matching(
        &mut events,
        |e| matches!(e, ChatEvent::ChatsUpdated(chats) if !chats.is_empty()),
    )
    .await;
    let ChatEvent::ChatsUpdated(chats) = updated else {
        unreachable!()
    };
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].sender, "ana@example.com");
    assert_eq!(chats[0].body, "hello");
    assert_eq!(chats[0].identifier.as_deref(), Some(identifier.as_str()));
    assert!(chats[0].is_own("ana@example.com"));

    commands.send(ChatCommand::Logout).await.expect("logout");
    next_matching(&mut events, |e| *e == ChatEvent::SignedOut).await;
    task.await.expect("join").expect("session result");
}

#[tokio::test]
async fn failed_write_hands_the_body_back() {
    let store = Arc::new(MemoryStore::new());
    store.set_offline(true);
    let SessionHandle {
        commands,
        mut events,
        task,
    } = session::spawn(store.clone(), ana(), "messages");

    commands
        .send(ChatCommand::Send("lost?".into()))
        .await
        .expect("send command");

    let failed = next_matching(&mut events, |e| matches!(e, ChatEvent::SubmitFailed { .. })).await;
    assert!(matches!(failed, ChatEvent::SubmitFailed { body, .. } if body == "lost?"));
    assert!(store.snapshot("messages").expect("snapshot").is_empty());

    drop(commands);
    task.await.expect("join").expect("session result");
}

#[tokio::test]
async fn signed_out_user_cannot_submit() {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(StaticIdentity::signed_out());
    let SessionHandle {
        commands,
        mut events,
        task,
    } = session::spawn(store.clone(), identity, "messages");

    commands
        .send(ChatCommand::Send("hi".into()))
        .await
        .expect("send command");

    let failed = next_matching(&mut events, |e| matches!(e, ChatEvent::SubmitFailed { .. })).await;
    assert!(
        matches!(failed, ChatEvent::SubmitFailed { reason, .. } if reason == "no user is signed in")
    );

    drop(commands);
    task.await.expect("join").expect("session result");
}

struct CountingSink(Arc<AtomicUsize>);

impl ErrorSink for CountingSink {
    fn report(&mut self, _error: &StoreError) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn feed_errors_are_reported_without_clearing_the_feed() {
    let store = Arc::new(MemoryStore::new());
    let reported = Arc::new(AtomicUsize::new(0));
    let (commands, command_receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_sender, mut events) = mpsc::channel(CHANNEL_CAPACITY);
    let session = ChatSession::new(store.clone(), ana(), "messages", event_sender, command_receiver)
        .with_error_sink(Box::new(CountingSink(reported.clone())));
    let task = tokio::spawn(session.run());

    commands
        .send(ChatCommand::Send("kept".into()))
        .await
        .expect("send command");
    next_matching(
        &mut events,
        |e| matches!(e, ChatEvent::ChatsUpdated(chats) if chats.len() == 1),
    )
    .await;

    store.broadcast_error("messages", "network lost");
    let error = next_matching(&mut events, |e| matches!(e, ChatEvent::FeedError(_))).await;
    assert_eq!(
        error,
        ChatEvent::FeedError("store unavailable: network lost".into())
    );
    assert_eq!(reported.load(Ordering::SeqCst), 1);

    drop(commands);
    task.await.expect("join").expect("session result");
}

#[tokio::test]
async fn overlapping_redelivery_is_deduplicated() {
    let store = Arc::new(MemoryStore::new());
    let SessionHandle {
        commands,
        mut events,
        task,
    } = session::spawn(store.clone(), ana(), "messages");

    commands
        .send(ChatCommand::Send("once".into()))
        .await
        .expect("send command");
    next_matching(
        &mut events,
        |e| matches!(e, ChatEvent::ChatsUpdated(chats) if chats.len() == 1),
    )
    .await;

    let stored = store.snapshot("messages").expect("snapshot");
    let doubled: Vec<_> = stored.iter().chain(stored.iter()).cloned().collect();
    store.deliver_raw("messages", doubled);

    let redelivered =
        next_matching(&mut events, |e| matches!(e, ChatEvent::ChatsUpdated(_))).await;
    let ChatEvent::ChatsUpdated(chats) = redelivered else {
        unreachable!()
    };
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].body, "once");

    drop(commands);
    task.await.expect("join").expect("session result");
}

#[tokio::test]
async fn logout_signs_out_and_tears_down_the_subscription() {
    let store = Arc::new(MemoryStore::new());
    let identity = ana();
    let SessionHandle {
        commands,
        mut events,
        task,
    } = session::spawn(store.clone(), identity.clone(), "messages");

    next_matching(&mut events, |e| matches!(e, ChatEvent::ChatsUpdated(_))).await;
    assert_eq!(store.listener_count("messages"), 1);

    commands.send(ChatCommand::Logout).await.expect("logout");
    next_matching(&mut events, |e| *e == ChatEvent::SignedOut).await;
    task.await.expect("join").expect("session result");

    assert!(!identity.is_signed_in());
    assert_eq!(store.listener_count("messages"), 0);

    // A write after teardown reaches nobody and must not panic.
    store
        .submit("messages", serde_json::Map::new())
        .expect("submit after logout");
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn two_sessions_share_a_sqlite_collection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(SqliteStore::with_path(dir.path().join("chat.db")).expect("open store"));

    let mut ana_session = session::spawn(store.clone(), ana(), "messages");
    let mut bob_session = session::spawn(
        store.clone(),
        Arc::new(StaticIdentity::signed_in("uid-bob", "bob@example.com")),
        "messages",
    );

    ana_session
        .commands
        .send(ChatCommand::Send("hi bob".into()))
        .await
        .expect("send command");
    next_matching(&mut ana_session.events, |e| {
        matches!(e, ChatEvent::SubmitConfirmed { .. })
    })
    .await;
    // distinct timestamps keep the expected order independent of document ids
    tokio::time::sleep(Duration::from_millis(5)).await;

    bob_session
        .commands
        .send(ChatCommand::Send("hi ana".into()))
        .await
        .expect("send command");

    let seen_by_ana = next_matching(
        &mut ana_session.events,
        |e| matches!(e, ChatEvent::ChatsUpdated(chats) if chats.len() == 2),
    )
    .await;
    let ChatEvent::ChatsUpdated(chats) = seen_by_ana else {
        unreachable!()
    };
    let bodies: Vec<_> = chats.iter().map(|chat| chat.body.as_str()).collect();
    assert_eq!(bodies, vec!["hi bob", "hi ana"]);

    for handle in [ana_session, bob_session] {
        handle
            .commands
            .send(ChatCommand::Logout)
            .await
            .expect("logout");
        handle.task.await.expect("join").expect("session result");
    }
}
