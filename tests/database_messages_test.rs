// ABOUTME: Integration tests for the message log and its side tables
// ABOUTME: Tests idempotent appends, filtered listings, revoke CAS, receipts, and purge

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::Utc;
use common::create_test_database;
use confab_engine::database::Database;
use confab_engine::models::{
    Message, MessageForwardRef, MessageStatus, MessageType, RevokeStatus, TalkMode,
};
use sqlx::Row;

const TALK_ID: i64 = 1;
const ALICE: i64 = 1;
const BOB: i64 = 2;

fn text_row(talk_id: i64, sequence: i64, msg_id: &str, sender_id: i64, receiver_id: i64) -> Message {
    let now = Utc::now();
    Message {
        id: msg_id.to_owned(),
        talk_id,
        sequence,
        talk_mode: TalkMode::Single,
        msg_type: MessageType::Text,
        sender_id,
        receiver_id,
        content: format!("body of {msg_id}"),
        extra: None,
        quote_msg_id: None,
        is_revoked: RevokeStatus::Normal,
        revoke_by: None,
        revoke_time: None,
        status: MessageStatus::Sent,
        created_at: now,
        updated_at: now,
    }
}

/// Append a committed text message, allocating its sequence
async fn append_text(db: &Database, talk_id: i64, msg_id: &str, sender_id: i64) -> Message {
    let receiver_id = if sender_id == ALICE { BOB } else { ALICE };
    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let sequence = db
        .next_sequence(guard.executor().expect("executor"), talk_id)
        .await
        .expect("Failed to allocate sequence");
    let message = text_row(talk_id, sequence, msg_id, sender_id, receiver_id);
    let inserted = db
        .create_message(guard.executor().expect("executor"), &message)
        .await
        .expect("Failed to create message");
    assert!(inserted, "message id {msg_id} already existed");
    guard.commit().await.expect("Failed to commit");
    message
}

async fn count_rows(db: &Database, table: &str) -> i64 {
    let row = sqlx::query(&format!("SELECT COUNT(*) as count FROM {table}"))
        .fetch_one(db.pool())
        .await
        .expect("Failed to count rows");
    row.get("count")
}

#[tokio::test]
async fn test_create_message_is_idempotent_on_id() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let sequence = db
        .next_sequence(guard.executor().expect("executor"), TALK_ID)
        .await
        .expect("Failed to allocate");
    let retry = text_row(TALK_ID, sequence, "m1", ALICE, BOB);
    let inserted = db
        .create_message(guard.executor().expect("executor"), &retry)
        .await
        .expect("Insert should not error");
    guard.rollback().await.expect("Failed to roll back");

    assert!(!inserted);

    let stored = db
        .get_message("m1")
        .await
        .expect("Failed to get message")
        .expect("Message not found");
    assert_eq!(stored.sequence, 1);
}

#[tokio::test]
async fn test_duplicate_talk_sequence_is_rejected() {
    let db = create_test_database().await;
    let first = append_text(&db, TALK_ID, "m1", ALICE).await;

    // Same slot under a different id violates the order-key index
    let clash = text_row(TALK_ID, first.sequence, "m2", ALICE, BOB);
    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let result = db
        .create_message(guard.executor().expect("executor"), &clash)
        .await;
    guard.rollback().await.expect("Failed to roll back");

    assert!(result.is_err());
}

#[tokio::test]
async fn test_batch_get_preserves_only_known_ids() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", BOB).await;

    let found = db
        .get_messages_by_ids(&["m1".to_owned(), "m2".to_owned(), "ghost".to_owned()])
        .await
        .expect("Failed to batch get");
    assert_eq!(found.len(), 2);

    let empty = db.get_messages_by_ids(&[]).await.expect("Failed on empty");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_user_scoped_get_hides_tombstoned_rows() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", ALICE).await;

    db.mark_message_deleted_for_user("m1", BOB)
        .await
        .expect("Failed to tombstone");

    let bob_view = db
        .get_messages_by_ids_for_user(&["m1".to_owned(), "m2".to_owned()], BOB)
        .await
        .expect("Failed to get for user");
    assert_eq!(bob_view.len(), 1);
    assert_eq!(bob_view[0].id, "m2");

    // The tombstone is Bob's alone
    let alice_view = db
        .get_messages_by_ids_for_user(&["m1".to_owned(), "m2".to_owned()], ALICE)
        .await
        .expect("Failed to get for user");
    assert_eq!(alice_view.len(), 2);
}

#[tokio::test]
async fn test_list_recent_pagination_walk() {
    let db = create_test_database().await;
    for i in 1..=5 {
        append_text(&db, TALK_ID, &format!("m{i}"), ALICE).await;
    }

    let page1 = db
        .list_recent_messages(TALK_ID, 0, 2, BOB, None)
        .await
        .expect("Failed to list");
    let seqs: Vec<i64> = page1.iter().map(|m| m.sequence).collect();
    assert_eq!(seqs, vec![5, 4]);

    let page2 = db
        .list_recent_messages(TALK_ID, 4, 2, BOB, None)
        .await
        .expect("Failed to list");
    let seqs: Vec<i64> = page2.iter().map(|m| m.sequence).collect();
    assert_eq!(seqs, vec![3, 2]);

    let page3 = db
        .list_recent_messages(TALK_ID, 2, 2, BOB, None)
        .await
        .expect("Failed to list");
    let seqs: Vec<i64> = page3.iter().map(|m| m.sequence).collect();
    assert_eq!(seqs, vec![1]);
}

#[tokio::test]
async fn test_list_recent_hides_revoked_and_tombstoned() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", ALICE).await;
    append_text(&db, TALK_ID, "m3", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let revoked = db
        .revoke_message(guard.executor().expect("executor"), "m2", ALICE)
        .await
        .expect("Failed to revoke");
    guard.commit().await.expect("Failed to commit");
    assert!(revoked);

    db.mark_message_deleted_for_user("m1", BOB)
        .await
        .expect("Failed to tombstone");

    let bob_view = db
        .list_recent_messages(TALK_ID, 0, 10, BOB, None)
        .await
        .expect("Failed to list");
    let ids: Vec<&str> = bob_view.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m3"]);

    // Alice still sees m1; the revoked m2 is hidden for everyone
    let alice_view = db
        .list_recent_messages(TALK_ID, 0, 10, ALICE, None)
        .await
        .expect("Failed to list");
    let ids: Vec<&str> = alice_view.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m3", "m1"]);
}

#[tokio::test]
async fn test_list_recent_filters_by_kind() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let sequence = db
        .next_sequence(guard.executor().expect("executor"), TALK_ID)
        .await
        .expect("Failed to allocate");
    let mut image = text_row(TALK_ID, sequence, "m2", ALICE, BOB);
    image.msg_type = MessageType::Image;
    db.create_message(guard.executor().expect("executor"), &image)
        .await
        .expect("Failed to create image message");
    guard.commit().await.expect("Failed to commit");

    let images = db
        .list_recent_messages(TALK_ID, 0, 10, BOB, Some(MessageType::Image))
        .await
        .expect("Failed to list");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, "m2");
}

#[tokio::test]
async fn test_list_after_carries_revoked_rows_for_sync() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", ALICE).await;
    append_text(&db, TALK_ID, "m3", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    db.revoke_message(guard.executor().expect("executor"), "m2", ALICE)
        .await
        .expect("Failed to revoke");
    guard.commit().await.expect("Failed to commit");

    let delta = db
        .list_messages_after(TALK_ID, 1, 10)
        .await
        .expect("Failed to list after");
    let seqs: Vec<i64> = delta.iter().map(|m| m.sequence).collect();
    assert_eq!(seqs, vec![2, 3]);
    assert!(delta[0].is_revoked.is_revoked());
}

#[tokio::test]
async fn test_revoke_is_compare_and_set() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let first = db
        .revoke_message(guard.executor().expect("executor"), "m1", ALICE)
        .await
        .expect("Failed to revoke");
    let second = db
        .revoke_message(guard.executor().expect("executor"), "m1", BOB)
        .await
        .expect("Failed on second revoke");
    guard.commit().await.expect("Failed to commit");

    assert!(first);
    assert!(!second);

    let stored = db
        .get_message("m1")
        .await
        .expect("Failed to get")
        .expect("Message not found");
    assert!(stored.is_revoked.is_revoked());
    // The losing caller never overwrote the winner's revoke_by
    assert_eq!(stored.revoke_by, Some(ALICE));
    assert!(stored.revoke_time.is_some());
}

#[tokio::test]
async fn test_set_message_status_transitions() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    db.set_message_status(guard.executor().expect("executor"), "m1", MessageStatus::Failed)
        .await
        .expect("Failed to set status");
    guard.commit().await.expect("Failed to commit");

    let stored = db
        .get_message("m1")
        .await
        .expect("Failed to get")
        .expect("Message not found");
    assert_eq!(stored.status, MessageStatus::Failed);
}

#[tokio::test]
async fn test_mentions_round_trip_in_batch() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    db.add_message_mentions(guard.executor().expect("executor"), "m1", &[BOB, 5])
        .await
        .expect("Failed to add mentions");
    // Re-adding the same pair is a no-op
    db.add_message_mentions(guard.executor().expect("executor"), "m1", &[BOB])
        .await
        .expect("Failed to re-add mention");
    guard.commit().await.expect("Failed to commit");

    let mentions = db
        .get_mentions_for_messages(&["m1".to_owned(), "m2".to_owned()])
        .await
        .expect("Failed to get mentions");
    assert_eq!(mentions.get("m1"), Some(&vec![BOB, 5]));
    assert!(!mentions.contains_key("m2"));
}

#[tokio::test]
async fn test_forward_refs_round_trip() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "src-1", ALICE).await;
    append_text(&db, TALK_ID, "src-2", BOB).await;
    let bundle = append_text(&db, TALK_ID, "fwd-1", ALICE).await;

    let refs = vec![
        MessageForwardRef {
            forward_msg_id: bundle.id.clone(),
            src_msg_id: "src-1".to_owned(),
            src_talk_id: TALK_ID,
            src_sender_id: ALICE,
        },
        MessageForwardRef {
            forward_msg_id: bundle.id.clone(),
            src_msg_id: "src-2".to_owned(),
            src_talk_id: TALK_ID,
            src_sender_id: BOB,
        },
    ];

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    db.add_forward_refs(guard.executor().expect("executor"), &refs)
        .await
        .expect("Failed to add forward refs");
    guard.commit().await.expect("Failed to commit");

    let stored = db
        .get_forward_refs("fwd-1")
        .await
        .expect("Failed to get forward refs");
    assert_eq!(stored, refs);
}

#[tokio::test]
async fn test_read_receipts_keep_first_timestamp() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;

    db.mark_message_read("m1", BOB)
        .await
        .expect("Failed to mark read");
    let first = db
        .get_read_time("m1", BOB)
        .await
        .expect("Failed to get read time")
        .expect("Receipt not found");

    db.mark_message_read("m1", BOB)
        .await
        .expect("Failed to re-mark read");
    let second = db
        .get_read_time("m1", BOB)
        .await
        .expect("Failed to get read time")
        .expect("Receipt not found");

    assert_eq!(first, second);
    assert!(db
        .get_read_time("m1", ALICE)
        .await
        .expect("Failed to get read time")
        .is_none());
}

#[tokio::test]
async fn test_mark_talk_read_skips_own_messages() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", BOB).await;
    append_text(&db, TALK_ID, "m3", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let receipts = db
        .mark_talk_read(guard.executor().expect("executor"), TALK_ID, BOB)
        .await
        .expect("Failed to mark talk read");
    guard.commit().await.expect("Failed to commit");
    assert_eq!(receipts, 2);

    // Re-running writes nothing new
    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let again = db
        .mark_talk_read(guard.executor().expect("executor"), TALK_ID, BOB)
        .await
        .expect("Failed to re-mark talk read");
    guard.commit().await.expect("Failed to commit");
    assert_eq!(again, 0);

    assert!(db
        .get_read_time("m2", BOB)
        .await
        .expect("Failed to get read time")
        .is_none());
}

#[tokio::test]
async fn test_mark_messages_read_batch_skips_own() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", BOB).await;
    append_text(&db, TALK_ID, "m3", ALICE).await;

    let batch = vec!["m1".to_owned(), "m2".to_owned(), "m3".to_owned()];
    let receipts = db
        .mark_messages_read(&batch, BOB)
        .await
        .expect("Failed to mark messages read");
    assert_eq!(receipts, 2);

    // Bob never receipts his own m2
    assert!(db
        .get_read_time("m2", BOB)
        .await
        .expect("Failed to get read time")
        .is_none());
    assert!(db
        .get_read_time("m1", BOB)
        .await
        .expect("Failed to get read time")
        .is_some());

    // Re-running writes nothing new; the empty batch is a no-op
    let again = db
        .mark_messages_read(&batch, BOB)
        .await
        .expect("Failed to re-mark messages read");
    assert_eq!(again, 0);
    let empty = db
        .mark_messages_read(&[], BOB)
        .await
        .expect("Failed on empty batch");
    assert_eq!(empty, 0);
}

#[tokio::test]
async fn test_mark_talk_deleted_hides_everything_for_user() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", BOB).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let hidden = db
        .mark_talk_deleted_for_user(guard.executor().expect("executor"), TALK_ID, BOB)
        .await
        .expect("Failed to clear talk");
    guard.commit().await.expect("Failed to commit");
    assert_eq!(hidden, 2);

    let bob_view = db
        .list_recent_messages(TALK_ID, 0, 10, BOB, None)
        .await
        .expect("Failed to list");
    assert!(bob_view.is_empty());

    let alice_view = db
        .list_recent_messages(TALK_ID, 0, 10, ALICE, None)
        .await
        .expect("Failed to list");
    assert_eq!(alice_view.len(), 2);
}

#[tokio::test]
async fn test_talk_receipts_and_tombstones_roll_back_with_transaction() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let receipts = db
        .mark_talk_read(guard.executor().expect("executor"), TALK_ID, BOB)
        .await
        .expect("Failed to mark talk read");
    assert_eq!(receipts, 1);
    let hidden = db
        .mark_talk_deleted_for_user(guard.executor().expect("executor"), TALK_ID, BOB)
        .await
        .expect("Failed to clear talk");
    assert_eq!(hidden, 1);
    guard.rollback().await.expect("Failed to roll back");

    // Neither the receipt nor the tombstone survived the rollback
    assert!(db
        .get_read_time("m1", BOB)
        .await
        .expect("Failed to get read time")
        .is_none());
    let bob_view = db
        .list_recent_messages(TALK_ID, 0, 10, BOB, None)
        .await
        .expect("Failed to list");
    assert_eq!(bob_view.len(), 1);
}

#[tokio::test]
async fn test_count_messages_in_talk_checks_membership() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, 2, "other-talk", ALICE).await;

    let count = db
        .count_messages_in_talk(TALK_ID, &["m1".to_owned(), "other-talk".to_owned()])
        .await
        .expect("Failed to count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_purge_drops_log_and_side_tables_but_keeps_sequences() {
    let db = create_test_database().await;
    append_text(&db, TALK_ID, "m1", ALICE).await;
    append_text(&db, TALK_ID, "m2", ALICE).await;
    append_text(&db, 2, "keep", ALICE).await;

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    db.add_message_mentions(guard.executor().expect("executor"), "m1", &[BOB])
        .await
        .expect("Failed to add mentions");
    guard.commit().await.expect("Failed to commit");
    db.mark_message_read("m2", BOB)
        .await
        .expect("Failed to mark read");
    db.mark_message_deleted_for_user("m1", BOB)
        .await
        .expect("Failed to tombstone");

    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let purged = db
        .purge_talk_messages(guard.executor().expect("executor"), TALK_ID)
        .await
        .expect("Failed to purge");
    guard.commit().await.expect("Failed to commit");
    assert_eq!(purged, 2);

    // The other talk's row survives; side tables hold nothing for the purged one
    assert_eq!(count_rows(&db, "messages").await, 1);
    assert_eq!(count_rows(&db, "message_mentions").await, 0);
    assert_eq!(count_rows(&db, "message_reads").await, 0);
    assert_eq!(count_rows(&db, "message_user_deletes").await, 0);

    // Ordering continuity: the allocator was not reset
    assert_eq!(db.current_sequence(TALK_ID).await.expect("Failed"), 2);
    let mut guard = db.begin_guard().await.expect("Failed to begin");
    let next = db
        .next_sequence(guard.executor().expect("executor"), TALK_ID)
        .await
        .expect("Failed to allocate");
    guard.commit().await.expect("Failed to commit");
    assert_eq!(next, 3);
}
