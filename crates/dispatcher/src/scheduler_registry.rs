use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, warn};

use taskqueue_core::models::inspect::time_to_score;
use taskqueue_core::{
    QueueError, QueueKeys, QueueStore, Result, SchedulerEnqueueEvent, SchedulerEntry,
};

use crate::history_retention::HistoryRetention;

/// 调度条目及其入队历史的存储
pub struct SchedulerRegistry {
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
    retention: HistoryRetention,
}

impl SchedulerRegistry {
    pub fn new(store: Arc<dyn QueueStore>, keys: QueueKeys, retention: HistoryRetention) -> Self {
        Self {
            store,
            keys,
            retention,
        }
    }

    /// 用给定条目整体替换某个调度器已发布的条目，不影响其他调度器
    pub async fn write_entries(&self, scheduler_id: &str, entries: &[SchedulerEntry]) -> Result<()> {
        let fields = entries
            .iter()
            .map(|entry| Ok((entry.id.clone(), entry.encode()?)))
            .collect::<Result<Vec<_>>>()?;

        self.store
            .hash_replace(&self.keys.scheduler_entries(scheduler_id), &fields)
            .await?;
        self.store
            .add_to_set(self.keys.schedulers(), scheduler_id, time_to_score(Utc::now()))
            .await?;
        debug!("调度器 {} 已发布 {} 个条目", scheduler_id, entries.len());
        Ok(())
    }

    /// 所有调度器已发布的条目，不保证顺序
    pub async fn list_entries(&self) -> Result<Vec<SchedulerEntry>> {
        let schedulers = self.store.set_range_with_scores(self.keys.schedulers()).await?;

        let mut entries = Vec::new();
        for (scheduler_id, _) in &schedulers {
            let values = self
                .store
                .hash_values(&self.keys.scheduler_entries(scheduler_id))
                .await?;
            entries.extend(values.iter().filter_map(|raw| match SchedulerEntry::decode(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    counter!("taskqueue_corrupt_records_total", "state" => "scheduler_entry")
                        .increment(1);
                    warn!("跳过调度器 {} 中无法解码的调度条目: {}", scheduler_id, e);
                    None
                }
            }));
        }
        Ok(entries)
    }

    /// 某个条目的入队历史，按入队时间升序
    ///
    /// 没有历史时返回空列表，读取存储失败时返回 `QueueError::EntryNotFound`。
    pub async fn list_enqueue_events(&self, entry_id: &str) -> Result<Vec<SchedulerEnqueueEvent>> {
        let members = self
            .store
            .set_range_with_scores(&self.keys.scheduler_history(entry_id))
            .await
            .map_err(|e| QueueError::EntryNotFound {
                entry_id: entry_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(members
            .iter()
            .filter_map(|(raw, _)| match SchedulerEnqueueEvent::decode(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    counter!("taskqueue_corrupt_records_total", "state" => "scheduler_history")
                        .increment(1);
                    warn!("跳过条目 {} 中无法解码的入队记录: {}", entry_id, e);
                    None
                }
            })
            .collect())
    }

    /// 追加一条入队记录，并在同一原子操作中按保留策略裁剪历史
    pub async fn record_enqueue_event(
        &self,
        entry_id: &str,
        event: &SchedulerEnqueueEvent,
    ) -> Result<()> {
        self.store
            .add_to_capped_set(
                &self.keys.scheduler_history(entry_id),
                &event.encode()?,
                time_to_score(event.enqueued_at),
                self.retention.max_events,
                self.retention.min_score(event.enqueued_at),
            )
            .await?;

        counter!("taskqueue_scheduler_events_recorded_total").increment(1);
        debug!("条目 {} 记录入队任务 {}", entry_id, event.task_id);
        Ok(())
    }

    /// 删除某个调度器发布的条目
    pub async fn clear_entries(&self, scheduler_id: &str) -> Result<()> {
        self.store
            .remove_from_set(self.keys.schedulers(), scheduler_id)
            .await?;
        self.store
            .delete(&self.keys.scheduler_entries(scheduler_id))
            .await?;
        debug!("已清除调度器 {} 的条目", scheduler_id);
        Ok(())
    }
}
