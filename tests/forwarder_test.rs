//! Integration tests for PM forwarding.

mod common;

use std::sync::Arc;

use a858_stats_bot::forwarder::forward_messages;
use a858_stats_bot::reddit::InboxMessage;
use common::{message, test_config, FakeSource, Harness, Shared};
use tempfile::TempDir;

fn harness() -> Harness {
    Harness::new(FakeSource::failing())
}

#[tokio::test]
async fn test_ignored_sender_is_marked_without_mail() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("cache"), "ignore_from AutoModerator spammer");
    let h = harness();
    let platform = Shared(Arc::clone(&h.platform));
    let relay = Shared(Arc::clone(&h.relay));

    let messages = vec![message("t4_a", "automoderator", "rules")];
    let report = forward_messages(&config, &platform, &relay, &messages).await;

    assert_eq!(report.ignored, 1);
    assert_eq!(report.forwarded, 0);
    assert!(h.relay.sent.lock().unwrap().is_empty());
    assert_eq!(h.events(), vec!["mark:t4_a"]);
}

#[tokio::test]
async fn test_message_is_marked_after_relay() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("cache"), "");
    let h = harness();
    let platform = Shared(Arc::clone(&h.platform));
    let relay = Shared(Arc::clone(&h.relay));

    let messages = vec![message("t4_a", "friend", "hello")];
    let report = forward_messages(&config, &platform, &relay, &messages).await;

    assert_eq!(report.forwarded, 1);
    assert_eq!(h.events(), vec!["send:PM from friend: hello", "mark:t4_a"]);

    let sent = h.relay.sent.lock().unwrap().clone();
    assert_eq!(sent[0].from, "bot@example.com");
    assert_eq!(sent[0].to, "owner@example.com");
    assert_eq!(sent[0].body, "body of t4_a");
}

#[tokio::test]
async fn test_relay_failure_is_contained_per_message() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("cache"), "");
    let h = harness();
    *h.relay.fail.lock().unwrap() = true;
    let platform = Shared(Arc::clone(&h.platform));
    let relay = Shared(Arc::clone(&h.relay));

    let messages = vec![
        message("t4_a", "friend", "one"),
        message("t4_b", "other", "two"),
    ];
    let report = forward_messages(&config, &platform, &relay, &messages).await;

    assert_eq!(report.relay_failed, 2);
    assert_eq!(report.forwarded, 0);
    // Exactly one attempt per message, each marked read once, after its attempt.
    assert_eq!(
        h.events(),
        vec![
            "send:PM from friend: one",
            "mark:t4_a",
            "send:PM from other: two",
            "mark:t4_b",
        ]
    );
}

#[tokio::test]
async fn test_deleted_author_is_forwarded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("cache"), "ignore_from someone");
    let h = harness();
    let platform = Shared(Arc::clone(&h.platform));
    let relay = Shared(Arc::clone(&h.relay));

    let messages = vec![InboxMessage {
        fullname: "t4_z".to_string(),
        author: None,
        subject: "orphan".to_string(),
        body: "who sent this".to_string(),
    }];
    let report = forward_messages(&config, &platform, &relay, &messages).await;

    assert_eq!(report.forwarded, 1);
    assert_eq!(h.events(), vec!["send:PM from [deleted]: orphan", "mark:t4_z"]);
}
