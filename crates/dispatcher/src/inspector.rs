use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::warn;

use taskqueue_core::{
    DeadTask, EnqueuedTask, InProgressTask, KeyRef, QueueKeys, QueueState, QueueStore, Result,
    RetryTask, ScheduledTask, Stats, TaskMessage,
};

/// 队列只读查询
///
/// 所有列表操作对无法解码的记录采用同一策略：记录告警并跳过，
/// 单条损坏的记录不会让整个列表不可用。
pub struct Inspector {
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
}

impl Inspector {
    pub fn new(store: Arc<dyn QueueStore>, keys: QueueKeys) -> Self {
        Self { store, keys }
    }

    /// 各状态的任务数，在一次原子批量读取中获得
    pub async fn current_stats(&self) -> Result<Stats> {
        let keys = [
            KeyRef::List(self.keys.enqueued()),
            KeyRef::List(self.keys.in_progress()),
            KeyRef::SortedSet(self.keys.scheduled()),
            KeyRef::SortedSet(self.keys.retry()),
            KeyRef::SortedSet(self.keys.dead()),
        ];
        let counts = self.store.lengths(&keys).await?;
        let count = |i: usize| counts.get(i).copied().unwrap_or(0);

        Ok(Stats {
            enqueued: count(0),
            in_progress: count(1),
            scheduled: count(2),
            retry: count(3),
            dead: count(4),
            timestamp: Utc::now(),
        })
    }

    pub async fn list_enqueued(&self) -> Result<Vec<EnqueuedTask>> {
        let members = self.store.list_range(self.keys.enqueued()).await?;
        Ok(decode_list(QueueState::Enqueued, members)
            .map(EnqueuedTask::from)
            .collect())
    }

    pub async fn list_in_progress(&self) -> Result<Vec<InProgressTask>> {
        let members = self.store.list_range(self.keys.in_progress()).await?;
        Ok(decode_list(QueueState::InProgress, members)
            .map(InProgressTask::from)
            .collect())
    }

    pub async fn list_scheduled(&self) -> Result<Vec<ScheduledTask>> {
        let members = self.store.set_range_with_scores(self.keys.scheduled()).await?;
        Ok(decode_set(QueueState::Scheduled, members)
            .map(|(msg, score)| ScheduledTask::from_message(msg, score))
            .collect())
    }

    pub async fn list_retry(&self) -> Result<Vec<RetryTask>> {
        let members = self.store.set_range_with_scores(self.keys.retry()).await?;
        Ok(decode_set(QueueState::Retry, members)
            .map(|(msg, score)| RetryTask::from_message(msg, score))
            .collect())
    }

    pub async fn list_dead(&self) -> Result<Vec<DeadTask>> {
        let members = self.store.set_range_with_scores(self.keys.dead()).await?;
        Ok(decode_set(QueueState::Dead, members)
            .map(|(msg, score)| DeadTask::from_message(msg, score))
            .collect())
    }
}

fn decode_or_skip(state: QueueState, raw: &str) -> Option<TaskMessage> {
    match TaskMessage::decode(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            counter!("taskqueue_corrupt_records_total", "state" => state.as_str()).increment(1);
            warn!("跳过无法解码的{}任务记录: {}", state, e);
            None
        }
    }
}

fn decode_list(state: QueueState, members: Vec<String>) -> impl Iterator<Item = TaskMessage> {
    members
        .into_iter()
        .filter_map(move |raw| decode_or_skip(state, &raw))
}

fn decode_set(
    state: QueueState,
    members: Vec<(String, f64)>,
) -> impl Iterator<Item = (TaskMessage, f64)> {
    members
        .into_iter()
        .filter_map(move |(raw, score)| decode_or_skip(state, &raw).map(|msg| (msg, score)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskqueue_infrastructure::InMemoryQueueStore;

    #[tokio::test]
    async fn test_empty_stats() {
        let inspector = Inspector::new(Arc::new(InMemoryQueueStore::new()), QueueKeys::default());
        let stats = inspector.current_stats().await.unwrap();
        assert_eq!(stats.total(), 0);
        assert!(inspector.list_enqueued().await.unwrap().is_empty());
        assert!(inspector.list_dead().await.unwrap().is_empty());
    }
}
