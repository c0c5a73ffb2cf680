// ABOUTME: Criterion benchmarks for the Confab engine hot paths
// ABOUTME: Measures send throughput and history pagination against SQLite
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! Criterion benchmarks for the engine hot paths.
//!
//! Measures the transactional send path and history pagination using the
//! `SQLite` backend.

#![allow(
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    missing_docs
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use confab_engine::config::{DatabaseConfig, EngineConfig, Environment, LogLevel, PushConfig};
use confab_engine::database::Database;
use confab_engine::messages::MessageManager;
use confab_engine::models::{MessageType, SendMessageParams, TalkMode};
use confab_engine::notifications::NullNotifier;
use confab_engine::profiles::{StaticDirectory, UserProfile};
use confab_engine::talks::TalkManager;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tokio::runtime::Runtime;

/// Counter for unique client message ids across benchmark iterations
static MSG_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn bench_config() -> EngineConfig {
    EngineConfig {
        log_level: LogLevel::Error,
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
            max_connections: 1,
            busy_timeout_ms: 5_000,
            auto_migrate: true,
        },
        push: PushConfig {
            enabled: false,
            timeout_ms: 500,
        },
    }
}

struct BenchEngine {
    messages: MessageManager,
    talks: TalkManager,
}

/// Create an in-memory engine with two profiled users
async fn create_bench_engine() -> BenchEngine {
    let config = bench_config();
    let database = Database::new(&config.database).await.unwrap();

    let notifier = Arc::new(NullNotifier);
    let directory = Arc::new(StaticDirectory::new());
    for user_id in 1..=2 {
        directory
            .insert(
                user_id,
                UserProfile {
                    nickname: format!("Bench User {user_id}"),
                    avatar: String::new(),
                    motto: String::new(),
                    is_bot: false,
                },
            )
            .unwrap();
    }

    let messages = MessageManager::new(
        database.clone(),
        notifier.clone(),
        directory.clone(),
        &config,
    );
    let talks = TalkManager::new(database, notifier, directory, &config);

    BenchEngine { messages, talks }
}

/// Generate unique text send parameters from user 1 to user 2
fn generate_text_params() -> SendMessageParams {
    let counter = MSG_COUNTER.fetch_add(1, Ordering::SeqCst);
    SendMessageParams {
        client_msg_id: format!("bench-msg-{counter}"),
        talk_mode: TalkMode::Single,
        msg_type: MessageType::Text,
        sender_id: 1,
        receiver_id: 2,
        content: format!("benchmark message body number {counter}"),
        extra: None,
        quote_msg_id: None,
        mention_uids: Vec::new(),
        forward_msg_ids: Vec::new(),
    }
}

/// Benchmark the transactional send path
fn bench_send_message(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("engine_send");

    let engine = rt.block_on(async {
        let engine = create_bench_engine().await;
        engine
            .talks
            .create_session(1, 2, TalkMode::Single)
            .await
            .unwrap();
        engine
            .talks
            .create_session(2, 1, TalkMode::Single)
            .await
            .unwrap();
        engine
    });

    group.bench_function("text_1to1", |b| {
        b.iter(|| {
            let params = generate_text_params();
            rt.block_on(async { engine.messages.send_message(black_box(&params)).await })
        });
    });

    group.finish();
}

/// Benchmark history pagination over a seeded talk
fn bench_load_records(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("engine_history");

    let (engine, talk_id) = rt.block_on(async {
        let engine = create_bench_engine().await;
        let session = engine
            .talks
            .create_session(1, 2, TalkMode::Single)
            .await
            .unwrap();
        engine
            .talks
            .create_session(2, 1, TalkMode::Single)
            .await
            .unwrap();

        for _ in 0..500 {
            let params = generate_text_params();
            engine.messages.send_message(&params).await.unwrap();
        }
        (engine, session.talk_id)
    });

    group.throughput(Throughput::Elements(30));
    group.bench_function("page_of_30", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine
                    .messages
                    .load_records(black_box(2), talk_id, 0, 30)
                    .await
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_send_message, bench_load_records);
criterion_main!(benches);
