mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::sync::broadcast;

use taskqueue_core::config::SchedulerEntryConfig;
use taskqueue_core::{Payload, TaskOptions};
use taskqueue_dispatcher::{CronTaskScheduler, Forwarder, HistoryRetention};

use common::{FlakyStore, TestContext};

fn every_minute(id: &str) -> SchedulerEntryConfig {
    let mut payload = Payload::new();
    payload.insert("bucket".to_string(), json!("tmp"));
    SchedulerEntryConfig {
        id: Some(id.to_string()),
        spec: "0 * * * * *".to_string(),
        task_type: "cleanup".to_string(),
        payload,
        options: TaskOptions {
            max_retry: Some(2),
            delay_seconds: None,
        },
    }
}

#[tokio::test]
async fn test_register_computes_next_fire_time() {
    let ctx = TestContext::new();
    let mut scheduler = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();

    let id = scheduler.register(&every_minute("cleanup"), now).unwrap();
    assert_eq!(id, "cleanup");

    let entries = scheduler.entries();
    assert_eq!(entries[0].next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap());
    assert_eq!(entries[0].prev, None);

    let mut anonymous = every_minute("x");
    anonymous.id = None;
    let generated = scheduler.register(&anonymous, now).unwrap();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());

    let mut invalid = every_minute("bad");
    invalid.spec = "every minute".to_string();
    assert!(scheduler.register(&invalid, now).is_err());
}

#[tokio::test]
async fn test_tick_enqueues_due_entries_once() {
    let ctx = TestContext::new();
    let mut scheduler = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    scheduler.register(&every_minute("cleanup"), start).unwrap();

    assert_eq!(scheduler.tick(start).await.unwrap(), 0);

    let fire_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap();
    assert_eq!(scheduler.tick(fire_at).await.unwrap(), 1);
    assert_eq!(scheduler.tick(fire_at).await.unwrap(), 0);

    let task = ctx.broker.dequeue().await.unwrap();
    assert_eq!(task.task_type, "cleanup");
    assert_eq!(task.retry_max, 2);
    assert_eq!(task.payload["bucket"], json!("tmp"));

    let events = ctx.registry.list_enqueue_events("cleanup").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].task_id, task.id);
    assert_eq!(events[0].enqueued_at, fire_at);

    let published = ctx.registry.list_entries().await.unwrap();
    assert_eq!(published[0].prev, Some(fire_at));
    assert_eq!(
        published[0].next,
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 2, 0).unwrap()
    );
}

#[tokio::test]
async fn test_delayed_entry_is_scheduled() {
    let ctx = TestContext::new();
    let mut scheduler = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    let mut config = every_minute("delayed");
    config.options.delay_seconds = Some(120);
    scheduler.register(&config, start).unwrap();

    let fire_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap();
    scheduler.tick(fire_at).await.unwrap();

    assert!(ctx.inspector.list_enqueued().await.unwrap().is_empty());
    let scheduled = ctx.inspector.list_scheduled().await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(
        scheduled[0].process_at,
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 3, 0).unwrap()
    );
}

#[tokio::test]
async fn test_failed_enqueue_records_nothing_and_retries() {
    let store = Arc::new(FlakyStore::default());
    let ctx = TestContext::with_store(store.clone(), HistoryRetention::default());
    let mut scheduler = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    scheduler.register(&every_minute("cleanup"), start).unwrap();

    let fire_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap();
    store.set_fail_writes(true);
    assert_eq!(scheduler.tick(fire_at).await.unwrap(), 0);
    store.set_fail_writes(false);

    assert!(ctx.registry.list_enqueue_events("cleanup").await.unwrap().is_empty());
    assert_eq!(scheduler.entries()[0].next, fire_at);

    let later = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 5).unwrap();
    assert_eq!(scheduler.tick(later).await.unwrap(), 1);
    assert_eq!(ctx.registry.list_enqueue_events("cleanup").await.unwrap().len(), 1);
    assert_eq!(ctx.inspector.list_enqueued().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_history_write_refires_on_next_tick() {
    let store = Arc::new(FlakyStore::default());
    let ctx = TestContext::with_store(store.clone(), HistoryRetention::default());
    let mut scheduler = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    scheduler.register(&every_minute("cleanup"), start).unwrap();

    let fire_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap();
    store.set_fail_history_writes(true);
    assert_eq!(scheduler.tick(fire_at).await.unwrap(), 0);
    store.set_fail_history_writes(false);

    assert_eq!(scheduler.entries()[0].next, fire_at);
    assert_eq!(scheduler.entries()[0].prev, None);
    assert!(ctx.registry.list_enqueue_events("cleanup").await.unwrap().is_empty());

    let later = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 5).unwrap();
    assert_eq!(scheduler.tick(later).await.unwrap(), 1);

    let events = ctx.registry.list_enqueue_events("cleanup").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].enqueued_at, later);
    assert_eq!(scheduler.entries()[0].prev, Some(later));

    // 第一次触发的任务已经入队，重新触发会多出一个任务
    let enqueued = ctx.inspector.list_enqueued().await.unwrap();
    assert_eq!(enqueued.len(), 2);
    assert!(enqueued.iter().any(|t| t.id == events[0].task_id));
}

#[tokio::test]
async fn test_shutdown_keeps_other_schedulers_entries() {
    let ctx = TestContext::new();
    let now = Utc::now();

    let mut first = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    first.register(&every_minute("from-first"), now).unwrap();
    let mut second = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    second.register(&every_minute("from-second"), now).unwrap();
    assert_ne!(first.id(), second.id());

    second.publish().await.unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(first.run(Duration::from_millis(10), shutdown_rx));

    let mut published = Vec::new();
    for _ in 0..50 {
        published = ctx.registry.list_entries().await.unwrap();
        if published.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(published.len(), 2);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    let remaining = ctx.registry.list_entries().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "from-second");
}

#[tokio::test]
async fn test_run_publishes_and_clears_entries_on_shutdown() {
    let ctx = TestContext::new();
    let mut scheduler = CronTaskScheduler::new(ctx.broker.clone(), ctx.registry.clone());
    scheduler.register(&every_minute("cleanup"), Utc::now()).unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(scheduler.run(Duration::from_millis(10), shutdown_rx));

    let mut published = Vec::new();
    for _ in 0..50 {
        published = ctx.registry.list_entries().await.unwrap();
        if !published.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(published.len(), 1);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(ctx.registry.list_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forwarder_moves_due_tasks() {
    let ctx = TestContext::new();
    let forwarder = Forwarder::new(ctx.broker.clone());
    let past = Utc::now() - chrono::Duration::seconds(5);

    let task = taskqueue_core::TaskMessage::new("cleanup", Payload::new());
    ctx.broker.schedule(&task, past).await.unwrap();

    assert_eq!(forwarder.forward_once(Utc::now()).await.unwrap(), 1);
    assert_eq!(ctx.broker.dequeue().await.unwrap().id, task.id);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(forwarder.run(Duration::from_millis(10), shutdown_rx));
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
