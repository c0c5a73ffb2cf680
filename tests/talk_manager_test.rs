// ABOUTME: End-to-end tests for the talk orchestrator
// ABOUTME: Covers session creation, inbox listing, flags, drafts, and unread clearing

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{create_test_engine, open_single_talk, text_message};
use confab_engine::constants::events;
use confab_engine::errors::ErrorCode;
use confab_engine::models::TalkMode;
use confab_engine::notifications::PushScope;

#[tokio::test]
async fn test_create_session_converges_on_one_talk() {
    let engine = create_test_engine().await;

    let mine = engine
        .talks
        .create_session(1, 2, TalkMode::Single)
        .await
        .expect("Failed to open talk");
    let theirs = engine
        .talks
        .create_session(2, 1, TalkMode::Single)
        .await
        .expect("Failed to open counterpart talk");

    assert_eq!(mine.talk_id, theirs.talk_id);
    assert_eq!(mine.to_from_id, 2);
    assert_eq!(theirs.to_from_id, 1);

    // Each row snapshots the counterpart's profile
    assert_eq!(mine.name, "User 2");
    assert!(mine.avatar.contains("/avatars/2.png"));
    assert_eq!(theirs.name, "User 1");
}

#[tokio::test]
async fn test_create_session_rejects_self_and_unknown_user() {
    let engine = create_test_engine().await;

    let err = engine
        .talks
        .create_session(1, 1, TalkMode::Single)
        .await
        .expect_err("Self talk should fail");
    assert_eq!(err.code, ErrorCode::InvalidInput);

    let err = engine
        .talks
        .create_session(1, 99, TalkMode::Single)
        .await
        .expect_err("Unknown counterpart should fail");
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_create_session_group_defaults() {
    let engine = create_test_engine().await;

    let session = engine
        .talks
        .create_session(1, 100, TalkMode::Group)
        .await
        .expect("Failed to open group talk");

    assert_eq!(session.talk_mode, TalkMode::Group);
    assert_eq!(session.to_from_id, 100);
    assert!(session.name.is_empty());
    assert!(!session.is_robot);
}

#[tokio::test]
async fn test_create_session_pushes_talk_create_to_counterpart() {
    let mut engine = create_test_engine().await;

    engine
        .talks
        .create_session(1, 2, TalkMode::Single)
        .await
        .expect("Failed to open talk");

    let pushed = engine.drain_events();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].event, events::IM_TALK_CREATE);
    match &pushed[0].scope {
        PushScope::User { user_id, ack_id } => {
            assert_eq!(*user_id, 2);
            assert!(ack_id.is_none());
        }
        PushScope::Talk { .. } => panic!("expected user scope"),
    }
    assert_eq!(pushed[0].payload["from_id"], 1);

    // Group opens are silent; membership fan-out is not the engine's job
    engine
        .talks
        .create_session(1, 100, TalkMode::Group)
        .await
        .expect("Failed to open group talk");
    assert!(engine.drain_events().is_empty());
}

#[tokio::test]
async fn test_session_list_ordering() {
    let engine = create_test_engine().await;
    for counterpart in [2, 3, 4] {
        engine
            .talks
            .create_session(1, counterpart, TalkMode::Single)
            .await
            .expect("Failed to open talk");
    }

    engine
        .talks
        .set_session_top(1, 3, TalkMode::Single, true)
        .await
        .expect("Failed to pin");
    engine
        .talks
        .set_session_draft(1, 4, TalkMode::Single, "half-typed reply")
        .await
        .expect("Failed to set draft");

    let sessions = engine
        .talks
        .get_session_list(1)
        .await
        .expect("Failed to list sessions");
    let order: Vec<i64> = sessions.iter().map(|s| s.to_from_id).collect();
    // Pinned first, then latest activity
    assert_eq!(order, vec![3, 4, 2]);
    assert!(sessions[0].is_top);
}

#[tokio::test]
async fn test_session_flags_require_live_row() {
    let engine = create_test_engine().await;
    open_single_talk(&engine, 1, 2).await;

    let err = engine
        .talks
        .set_session_top(1, 9, TalkMode::Single, true)
        .await
        .expect_err("Pinning a missing session should fail");
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    let err = engine
        .talks
        .set_session_disturb(1, 9, TalkMode::Single, true)
        .await
        .expect_err("Muting a missing session should fail");
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    engine
        .talks
        .set_session_top(1, 2, TalkMode::Single, true)
        .await
        .expect("Failed to pin");
    engine
        .talks
        .set_session_disturb(1, 2, TalkMode::Single, true)
        .await
        .expect("Failed to mute");

    let session = engine
        .database
        .get_session_by_target(1, 2, TalkMode::Single)
        .await
        .expect("Failed to get session")
        .expect("Session not found");
    assert!(session.is_top);
    assert!(session.is_disturb);
}

#[tokio::test]
async fn test_delete_session_is_soft_and_revivable() {
    let engine = create_test_engine().await;
    open_single_talk(&engine, 1, 2).await;
    engine
        .talks
        .set_session_top(1, 2, TalkMode::Single, true)
        .await
        .expect("Failed to pin");
    engine
        .talks
        .set_session_draft(1, 2, TalkMode::Single, "unsent words")
        .await
        .expect("Failed to set draft");

    engine
        .talks
        .delete_session(1, 2, TalkMode::Single)
        .await
        .expect("Failed to delete session");
    let sessions = engine
        .talks
        .get_session_list(1)
        .await
        .expect("Failed to list sessions");
    assert!(sessions.is_empty());

    let err = engine
        .talks
        .delete_session(1, 2, TalkMode::Single)
        .await
        .expect_err("Deleting twice should fail");
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    // Re-opening revives the same row with its state intact
    let revived = engine
        .talks
        .create_session(1, 2, TalkMode::Single)
        .await
        .expect("Failed to re-open talk");
    assert!(revived.deleted_at.is_none());
    assert!(revived.is_top);
    assert_eq!(revived.draft_text, "unsent words");
}

#[tokio::test]
async fn test_clear_session_unread_acks_and_writes_receipts() {
    let engine = create_test_engine().await;
    let talk_id = open_single_talk(&engine, 1, 2).await;
    engine
        .messages
        .send_message(&text_message("m1", 1, 2))
        .await
        .expect("Failed to send");
    engine
        .messages
        .send_message(&text_message("m2", 1, 2))
        .await
        .expect("Failed to send");

    engine
        .talks
        .clear_session_unread(2, talk_id)
        .await
        .expect("Failed to clear unread");

    let session = engine
        .database
        .get_session(2, talk_id)
        .await
        .expect("Failed to get session")
        .expect("Session not found");
    assert_eq!(session.unread_num, 0);
    assert_eq!(session.last_ack_seq, 2);

    // Acknowledging the talk receipts every counterpart message
    for msg_id in ["m1", "m2"] {
        let read_at = engine
            .database
            .get_read_time(msg_id, 2)
            .await
            .expect("Failed to get read time");
        assert!(read_at.is_some(), "missing receipt for {msg_id}");
    }

    let err = engine
        .talks
        .clear_session_unread(3, talk_id)
        .await
        .expect_err("Clearing without a session should fail");
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_clear_session_unread_rolls_back_badge_with_receipts() {
    let engine = create_test_engine().await;
    let talk_id = open_single_talk(&engine, 1, 2).await;
    engine
        .messages
        .send_message(&text_message("m1", 1, 2))
        .await
        .expect("Failed to send");
    engine
        .messages
        .send_message(&text_message("m2", 1, 2))
        .await
        .expect("Failed to send");

    // Freeze the receipts table so the bulk read inside the clear fails
    sqlx::query(
        "CREATE TRIGGER freeze_receipts BEFORE INSERT ON message_reads
         BEGIN SELECT RAISE(ABORT, 'receipts are frozen'); END",
    )
    .execute(engine.database.pool())
    .await
    .expect("Failed to create trigger");

    engine
        .talks
        .clear_session_unread(2, talk_id)
        .await
        .expect_err("Clear should fail while receipts are frozen");

    // The badge rolled back with the receipts: nothing was acknowledged
    let session = engine
        .database
        .get_session(2, talk_id)
        .await
        .expect("Failed to get session")
        .expect("Session not found");
    assert_eq!(session.unread_num, 2);
    assert_eq!(session.last_ack_seq, 0);
    assert!(engine
        .database
        .get_read_time("m1", 2)
        .await
        .expect("Failed to get read time")
        .is_none());

    // Unfrozen, the same call lands whole
    sqlx::query("DROP TRIGGER freeze_receipts")
        .execute(engine.database.pool())
        .await
        .expect("Failed to drop trigger");
    engine
        .talks
        .clear_session_unread(2, talk_id)
        .await
        .expect("Failed to clear unread");
    let session = engine
        .database
        .get_session(2, talk_id)
        .await
        .expect("Failed to get session")
        .expect("Session not found");
    assert_eq!(session.unread_num, 0);
    assert_eq!(session.last_ack_seq, 2);
}

#[tokio::test]
async fn test_set_session_draft_round_trip() {
    let engine = create_test_engine().await;
    open_single_talk(&engine, 1, 2).await;

    engine
        .talks
        .set_session_draft(1, 2, TalkMode::Single, "see you at")
        .await
        .expect("Failed to set draft");
    let session = engine
        .database
        .get_session_by_target(1, 2, TalkMode::Single)
        .await
        .expect("Failed to get session")
        .expect("Session not found");
    assert_eq!(session.draft_text, "see you at");

    engine
        .talks
        .set_session_draft(1, 2, TalkMode::Single, "")
        .await
        .expect("Failed to clear draft");
    let session = engine
        .database
        .get_session_by_target(1, 2, TalkMode::Single)
        .await
        .expect("Failed to get session")
        .expect("Session not found");
    assert!(session.draft_text.is_empty());
}
