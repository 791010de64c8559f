use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskqueue_core::models::inspect::time_to_score;
use taskqueue_core::{QueueError, QueueKeys, QueueState, QueueStore, Result, TaskMessage};

use crate::retry_policy::RetryPolicy;

/// 失败任务的去向
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// 进入重试集合，在 `process_at` 之后重新入队
    Retry {
        task: TaskMessage,
        process_at: DateTime<Utc>,
    },
    /// 重试次数耗尽，进入死信集合
    Dead { task: TaskMessage },
}

impl RetryOutcome {
    pub fn task(&self) -> &TaskMessage {
        match self {
            RetryOutcome::Retry { task, .. } | RetryOutcome::Dead { task } => task,
        }
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, RetryOutcome::Dead { .. })
    }
}

/// 任务状态引擎
///
/// 负责任务在 enqueued / in_progress / scheduled / retry / dead 五个状态之间的转换。
/// 每个转换只调用一次 `QueueStore` 的原子操作，任务不会在转换中途丢失，
/// 也不会同时出现在两个状态中。多个进程可以共享同一个存储并发调用。
pub struct Broker {
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
    retry_policy: RetryPolicy,
}

impl Broker {
    pub fn new(store: Arc<dyn QueueStore>, keys: QueueKeys) -> Self {
        Self::with_retry_policy(store, keys, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        store: Arc<dyn QueueStore>,
        keys: QueueKeys,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            keys,
            retry_policy,
        }
    }

    /// 追加到待处理队列尾部
    pub async fn enqueue(&self, task: &TaskMessage) -> Result<()> {
        let encoded = task.encode()?;
        self.store.push_back(self.keys.enqueued(), &encoded).await?;

        counter!("taskqueue_tasks_enqueued_total", "type" => task.task_type.clone()).increment(1);
        debug!("任务 {} ({}) 已入队", task.id, task.task_type);
        Ok(())
    }

    /// 认领队首任务并移入进行中列表
    ///
    /// 不阻塞，队列为空时立即返回 `QueueError::EmptyQueue`。
    /// 无法解码的记录会从进行中列表删除并记录日志，然后继续尝试下一条。
    pub async fn dequeue(&self) -> Result<TaskMessage> {
        loop {
            let raw = self
                .store
                .move_front_to_back(self.keys.enqueued(), self.keys.in_progress())
                .await?
                .ok_or(QueueError::EmptyQueue)?;

            match TaskMessage::decode(&raw) {
                Ok(task) => {
                    counter!("taskqueue_tasks_dequeued_total").increment(1);
                    debug!("任务 {} ({}) 已被认领", task.id, task.task_type);
                    return Ok(task);
                }
                Err(e) => {
                    self.store
                        .remove_from_list(self.keys.in_progress(), &raw)
                        .await?;
                    counter!("taskqueue_corrupt_records_total", "state" => "in_progress")
                        .increment(1);
                    warn!("丢弃无法解码的任务记录: {}", e);
                }
            }
        }
    }

    /// 任务处理成功，从进行中列表删除
    pub async fn done(&self, task: &TaskMessage) -> Result<()> {
        let encoded = task.encode()?;
        let removed = self
            .store
            .remove_from_list(self.keys.in_progress(), &encoded)
            .await?;
        if !removed {
            return Err(QueueError::TaskNotFound {
                id: task.id,
                state: QueueState::InProgress,
            });
        }

        counter!("taskqueue_tasks_completed_total").increment(1);
        debug!("任务 {} 处理完成", task.id);
        Ok(())
    }

    /// 任务处理失败
    ///
    /// 重试次数累加一次并记录错误信息。如果这是最后一次允许的尝试，
    /// 任务进入死信集合（分数为失败时间），否则进入重试集合（分数为当前时间加 `delay`）。
    /// 删除和插入在同一个原子操作中完成。
    pub async fn retry(
        &self,
        task: &TaskMessage,
        err: &str,
        delay: Duration,
    ) -> Result<RetryOutcome> {
        let now = Utc::now();
        let original = task.encode()?;

        let mut updated = task.clone();
        updated.retry_count = task.retry_count.saturating_add(1);
        updated.error_msg = err.to_string();

        let (dst, score, outcome) = if task.is_final_attempt() {
            updated.last_failed_at = Some(now.timestamp());
            (
                QueueState::Dead,
                time_to_score(now),
                RetryOutcome::Dead {
                    task: updated.clone(),
                },
            )
        } else {
            let process_at = now
                + chrono::Duration::from_std(delay).map_err(|e| {
                    QueueError::Internal(format!("重试延迟超出范围: {e}"))
                })?;
            (
                QueueState::Retry,
                time_to_score(process_at),
                RetryOutcome::Retry {
                    task: updated.clone(),
                    process_at,
                },
            )
        };

        let moved = self
            .store
            .remove_from_list_then_add_to_set(
                self.keys.in_progress(),
                &original,
                self.keys.for_state(dst),
                &updated.encode()?,
                score,
            )
            .await?;
        if !moved {
            return Err(QueueError::TaskNotFound {
                id: task.id,
                state: QueueState::InProgress,
            });
        }

        match &outcome {
            RetryOutcome::Retry { process_at, .. } => {
                counter!("taskqueue_tasks_retried_total").increment(1);
                info!(
                    "任务 {} 第 {} 次失败，将在 {} 重试: {}",
                    task.id,
                    updated.retry_count,
                    process_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    err
                );
            }
            RetryOutcome::Dead { .. } => {
                counter!("taskqueue_tasks_killed_total", "reason" => "retry_exhausted")
                    .increment(1);
                warn!(
                    "任务 {} 已达到最大重试次数 {}，进入死信队列: {}",
                    task.id, task.retry_max, err
                );
            }
        }
        Ok(outcome)
    }

    /// 按重试策略计算延迟后调用 [`Broker::retry`]
    pub async fn retry_with_backoff(&self, task: &TaskMessage, err: &str) -> Result<RetryOutcome> {
        let delay = self.retry_policy.delay_for(task.retry_count);
        self.retry(task, err, delay).await
    }

    /// 不再重试，直接把任务从进行中移入死信集合
    pub async fn kill(&self, task: &TaskMessage, err: &str) -> Result<()> {
        let now = Utc::now();
        let original = task.encode()?;

        let mut updated = task.clone();
        updated.error_msg = err.to_string();
        updated.last_failed_at = Some(now.timestamp());

        let moved = self
            .store
            .remove_from_list_then_add_to_set(
                self.keys.in_progress(),
                &original,
                self.keys.dead(),
                &updated.encode()?,
                time_to_score(now),
            )
            .await?;
        if !moved {
            return Err(QueueError::TaskNotFound {
                id: task.id,
                state: QueueState::InProgress,
            });
        }

        counter!("taskqueue_tasks_killed_total", "reason" => "killed").increment(1);
        warn!("任务 {} 被终止并进入死信队列: {}", task.id, err);
        Ok(())
    }

    /// 计划在 `process_at` 处理
    pub async fn schedule(&self, task: &TaskMessage, process_at: DateTime<Utc>) -> Result<()> {
        let encoded = task.encode()?;
        self.store
            .add_to_set(self.keys.scheduled(), &encoded, time_to_score(process_at))
            .await?;

        counter!("taskqueue_tasks_scheduled_total").increment(1);
        debug!(
            "任务 {} 计划在 {} 处理",
            task.id,
            process_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(())
    }

    pub async fn forward_scheduled(&self) -> Result<usize> {
        self.forward_due(QueueState::Scheduled, Utc::now()).await
    }

    pub async fn forward_retry(&self) -> Result<usize> {
        self.forward_due(QueueState::Retry, Utc::now()).await
    }

    /// 把 scheduled 或 retry 集合中到期（分数不大于 `now`）的任务移入待处理队列
    ///
    /// 取出与删除在同一个原子操作中完成，多个进程同时调用也不会重复入队。
    /// 返回成功转发的任务数。
    pub async fn forward_due(&self, state: QueueState, now: DateTime<Utc>) -> Result<usize> {
        if !matches!(state, QueueState::Scheduled | QueueState::Retry) {
            return Err(QueueError::Configuration(format!(
                "只能转发scheduled或retry状态的任务: {state}"
            )));
        }

        let moved = self
            .store
            .move_due_to_list(
                self.keys.for_state(state),
                self.keys.enqueued(),
                time_to_score(now),
            )
            .await?;

        let mut forwarded = 0;
        for raw in &moved {
            if let Err(e) = TaskMessage::decode(raw) {
                self.store.remove_from_list(self.keys.enqueued(), raw).await?;
                counter!("taskqueue_corrupt_records_total", "state" => state.as_str())
                    .increment(1);
                warn!("转发时丢弃无法解码的{}任务记录: {}", state, e);
                continue;
            }
            forwarded += 1;
        }

        if forwarded > 0 {
            counter!("taskqueue_tasks_forwarded_total", "from" => state.as_str())
                .increment(forwarded as u64);
            info!("已将 {} 个到期的{}任务转入待处理队列", forwarded, state);
        }
        Ok(forwarded)
    }

    /// 立即把 scheduled / retry / dead 中的任务移回待处理队列
    pub async fn requeue(&self, state: QueueState, id: Uuid) -> Result<()> {
        let member = self.find_set_member(state, id).await?;
        let moved = self
            .store
            .remove_from_set_then_push(self.keys.for_state(state), &member, self.keys.enqueued())
            .await?;
        if !moved {
            return Err(QueueError::TaskNotFound { id, state });
        }

        counter!("taskqueue_tasks_requeued_total", "from" => state.as_str()).increment(1);
        info!("任务 {} 已从{}移回待处理队列", id, state);
        Ok(())
    }

    /// 删除 scheduled / retry / dead 中的单个任务
    pub async fn delete_task(&self, state: QueueState, id: Uuid) -> Result<()> {
        let member = self.find_set_member(state, id).await?;
        let removed = self
            .store
            .remove_from_set(self.keys.for_state(state), &member)
            .await?;
        if !removed {
            return Err(QueueError::TaskNotFound { id, state });
        }

        counter!("taskqueue_tasks_deleted_total", "state" => state.as_str()).increment(1);
        info!("任务 {} 已从{}删除", id, state);
        Ok(())
    }

    /// 清空死信集合，返回删除的任务数
    pub async fn purge_dead(&self) -> Result<u64> {
        let members = self.store.set_range_with_scores(self.keys.dead()).await?;
        let mut purged = 0;
        for (member, _) in &members {
            if self.store.remove_from_set(self.keys.dead(), member).await? {
                purged += 1;
            }
        }

        counter!("taskqueue_tasks_deleted_total", "state" => "dead").increment(purged);
        info!("已清空死信队列，共删除 {} 个任务", purged);
        Ok(purged)
    }

    async fn find_set_member(&self, state: QueueState, id: Uuid) -> Result<String> {
        if !state.is_sorted_set() {
            return Err(QueueError::Configuration(format!(
                "只支持scheduled、retry或dead状态: {state}"
            )));
        }

        let members = self
            .store
            .set_range_with_scores(self.keys.for_state(state))
            .await?;
        members
            .into_iter()
            .map(|(member, _)| member)
            .find(|member| matches!(TaskMessage::decode(member), Ok(task) if task.id == id))
            .ok_or(QueueError::TaskNotFound { id, state })
    }
}
