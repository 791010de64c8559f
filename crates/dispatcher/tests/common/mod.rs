#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use taskqueue_core::{KeyRef, QueueError, QueueKeys, QueueStore, Result};
use taskqueue_dispatcher::{Broker, HistoryRetention, Inspector, SchedulerRegistry};
use taskqueue_infrastructure::InMemoryQueueStore;

/// 可以按需让读或写失败的存储，用于测试错误路径
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryQueueStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_history_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 只让带裁剪的有序集合写入（入队历史）失败
    pub fn set_fail_history_writes(&self, fail: bool) {
        self.fail_history_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(QueueError::Store("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(QueueError::Store("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn push_back(&self, list: &str, member: &str) -> Result<()> {
        self.check_write()?;
        self.inner.push_back(list, member).await
    }

    async fn move_front_to_back(&self, src: &str, dst: &str) -> Result<Option<String>> {
        self.check_write()?;
        self.inner.move_front_to_back(src, dst).await
    }

    async fn remove_from_list(&self, list: &str, member: &str) -> Result<bool> {
        self.check_write()?;
        self.inner.remove_from_list(list, member).await
    }

    async fn remove_from_list_then_add_to_set(
        &self,
        src: &str,
        member: &str,
        dst: &str,
        new_member: &str,
        score: f64,
    ) -> Result<bool> {
        self.check_write()?;
        self.inner
            .remove_from_list_then_add_to_set(src, member, dst, new_member, score)
            .await
    }

    async fn add_to_set(&self, set: &str, member: &str, score: f64) -> Result<()> {
        self.check_write()?;
        self.inner.add_to_set(set, member, score).await
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<bool> {
        self.check_write()?;
        self.inner.remove_from_set(set, member).await
    }

    async fn remove_from_set_then_push(&self, src: &str, member: &str, dst: &str) -> Result<bool> {
        self.check_write()?;
        self.inner.remove_from_set_then_push(src, member, dst).await
    }

    async fn move_due_to_list(&self, src: &str, dst: &str, max_score: f64) -> Result<Vec<String>> {
        self.check_write()?;
        self.inner.move_due_to_list(src, dst, max_score).await
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        self.check_read()?;
        self.inner.list_range(list).await
    }

    async fn set_range_with_scores(&self, set: &str) -> Result<Vec<(String, f64)>> {
        self.check_read()?;
        self.inner.set_range_with_scores(set).await
    }

    async fn lengths(&self, keys: &[KeyRef<'_>]) -> Result<Vec<u64>> {
        self.check_read()?;
        self.inner.lengths(keys).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_write()?;
        self.inner.delete(key).await
    }

    async fn add_to_capped_set(
        &self,
        set: &str,
        member: &str,
        score: f64,
        max_len: usize,
        min_score: Option<f64>,
    ) -> Result<()> {
        self.check_write()?;
        if self.fail_history_writes.load(Ordering::SeqCst) {
            return Err(QueueError::Store("connection reset".to_string()));
        }
        self.inner
            .add_to_capped_set(set, member, score, max_len, min_score)
            .await
    }

    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.check_write()?;
        self.inner.hash_replace(key, fields).await
    }

    async fn hash_values(&self, key: &str) -> Result<Vec<String>> {
        self.check_read()?;
        self.inner.hash_values(key).await
    }
}

pub struct TestContext {
    pub store: Arc<dyn QueueStore>,
    pub keys: QueueKeys,
    pub broker: Arc<Broker>,
    pub inspector: Inspector,
    pub registry: Arc<SchedulerRegistry>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryQueueStore::new()), HistoryRetention::default())
    }

    pub fn with_store(store: Arc<dyn QueueStore>, retention: HistoryRetention) -> Self {
        let keys = QueueKeys::new("test");
        Self {
            broker: Arc::new(Broker::new(store.clone(), keys.clone())),
            inspector: Inspector::new(store.clone(), keys.clone()),
            registry: Arc::new(SchedulerRegistry::new(store.clone(), keys.clone(), retention)),
            store,
            keys,
        }
    }

    /// 每个任务ID最多出现在一个状态中
    pub async fn assert_mutually_exclusive(&self) {
        let mut ids = Vec::new();
        ids.extend(self.inspector.list_enqueued().await.unwrap().into_iter().map(|t| t.id));
        ids.extend(self.inspector.list_in_progress().await.unwrap().into_iter().map(|t| t.id));
        ids.extend(self.inspector.list_scheduled().await.unwrap().into_iter().map(|t| t.id));
        ids.extend(self.inspector.list_retry().await.unwrap().into_iter().map(|t| t.id));
        ids.extend(self.inspector.list_dead().await.unwrap().into_iter().map(|t| t.id));

        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total, "task id found in more than one state");
    }
}
