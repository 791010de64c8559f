use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use taskqueue_core::config::SchedulerEntryConfig;
use taskqueue_core::models::DEFAULT_MAX_RETRY;
use taskqueue_core::{QueueError, Result, SchedulerEnqueueEvent, SchedulerEntry, TaskMessage};

use crate::broker::Broker;
use crate::cron_utils::CronScheduler;
use crate::scheduler_registry::SchedulerRegistry;

struct RegisteredEntry {
    entry: SchedulerEntry,
    cron: CronScheduler,
}

/// 周期任务调度器
///
/// 每次 tick 检查所有条目，`next` 不晚于当前时间的条目会生成一个新任务并入队，
/// 入队和入队记录都成功后才推进 `prev`/`next`。任一步失败时 `next` 保持不变，
/// 下一次 tick 会再次尝试，因此同一次触发可能产生重复任务。
///
/// 每个调度器有自己的ID，只发布和清除自己的条目。
pub struct CronTaskScheduler {
    id: String,
    broker: Arc<Broker>,
    registry: Arc<SchedulerRegistry>,
    entries: Vec<RegisteredEntry>,
    default_max_retry: u32,
}

impl CronTaskScheduler {
    pub fn new(broker: Arc<Broker>, registry: Arc<SchedulerRegistry>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            broker,
            registry,
            entries: Vec::new(),
            default_max_retry: DEFAULT_MAX_RETRY,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn with_default_max_retry(mut self, default_max_retry: u32) -> Self {
        self.default_max_retry = default_max_retry;
        self
    }

    /// 注册一个周期任务，返回条目ID
    ///
    /// 未指定ID时生成一个UUID；同一ID重复注册会替换原条目。
    pub fn register(&mut self, config: &SchedulerEntryConfig, now: DateTime<Utc>) -> Result<String> {
        let cron = CronScheduler::new(&config.spec)?;
        let next = cron
            .next_execution_time(now)
            .ok_or_else(|| QueueError::InvalidCron {
                expr: config.spec.clone(),
                message: "没有后续的执行时间".to_string(),
            })?;

        let id = config
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let entry = SchedulerEntry {
            id: id.clone(),
            spec: config.spec.clone(),
            task_type: config.task_type.clone(),
            payload: config.payload.clone(),
            options: config.options.clone(),
            next,
            prev: None,
        };

        self.entries.retain(|registered| registered.entry.id != id);
        self.entries.push(RegisteredEntry { entry, cron });
        info!(
            "注册周期任务 {} ({}), 下次执行: {}",
            id,
            config.spec,
            next.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(id)
    }

    pub fn entries(&self) -> Vec<SchedulerEntry> {
        self.entries.iter().map(|r| r.entry.clone()).collect()
    }

    /// 发布当前条目
    pub async fn publish(&self) -> Result<()> {
        self.registry.write_entries(&self.id, &self.entries()).await
    }

    /// 执行一次调度检查，返回本次成功入队的任务数
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let mut fired = 0;

        for registered in &mut self.entries {
            if registered.entry.next > now {
                continue;
            }
            let entry = &registered.entry;

            let task = TaskMessage::new(entry.task_type.clone(), entry.payload.clone())
                .with_max_retry(entry.options.max_retry.unwrap_or(self.default_max_retry));

            let enqueued = match entry.options.delay_seconds {
                Some(delay) => {
                    let process_at =
                        now + chrono::Duration::seconds(delay.min(i64::MAX as u64 / 1000) as i64);
                    self.broker.schedule(&task, process_at).await
                }
                None => self.broker.enqueue(&task).await,
            };
            if let Err(e) = enqueued {
                counter!("taskqueue_scheduler_enqueue_failures_total").increment(1);
                error!("周期任务 {} 入队失败，将在下次检查时重试: {}", entry.id, e);
                continue;
            }

            // 入队记录写入失败时本次触发不算数，下次 tick 会重新入队
            let event = SchedulerEnqueueEvent::new(task.id, now);
            if let Err(e) = self.registry.record_enqueue_event(&entry.id, &event).await {
                counter!("taskqueue_scheduler_enqueue_failures_total").increment(1);
                error!(
                    "周期任务 {} 的入队记录写入失败，将在下次检查时重新触发: {}",
                    entry.id, e
                );
                continue;
            }

            let next = registered.cron.next_execution_time(now);
            registered.entry.prev = Some(now);
            match next {
                Some(next) => registered.entry.next = next,
                None => {
                    warn!("周期任务 {} 没有后续的执行时间", registered.entry.id);
                    registered.entry.next = DateTime::<Utc>::MAX_UTC;
                }
            }

            fired += 1;
            debug!(
                "周期任务 {} 已入队任务 {}, 下次执行: {}",
                registered.entry.id,
                task.id,
                registered.entry.next.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }

        if fired > 0 {
            counter!("taskqueue_scheduler_fired_total").increment(fired as u64);
            self.publish().await?;
        }
        Ok(fired)
    }

    /// 按固定间隔执行 tick，直到收到关闭信号
    ///
    /// 单次 tick 失败只记录日志，不会中断循环。退出前删除已发布的条目。
    pub async fn run(mut self, tick_interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        if let Err(e) = self.publish().await {
            error!("发布调度条目失败: {}", e);
        }
        info!(
            "周期任务调度器 {} 已启动，共 {} 个条目",
            self.id,
            self.entries.len()
        );

        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("周期任务调度检查失败: {}", e);
                    }
                }
                _ = shutdown.recv() => {
                    info!("周期任务调度器收到关闭信号");
                    break;
                }
            }
        }

        if let Err(e) = self.registry.clear_entries(&self.id).await {
            warn!("清除调度条目失败: {}", e);
        }
        info!("周期任务调度器已停止");
    }
}
