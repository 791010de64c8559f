use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use taskqueue_core::{QueueState, Result};

use crate::broker::Broker;

/// 定期把到期的 scheduled / retry 任务转入待处理队列
pub struct Forwarder {
    broker: Arc<Broker>,
}

impl Forwarder {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    /// 转发一轮，返回转入待处理队列的任务总数
    pub async fn forward_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let scheduled = self.broker.forward_due(QueueState::Scheduled, now).await?;
        let retry = self.broker.forward_due(QueueState::Retry, now).await?;
        Ok(scheduled + retry)
    }

    pub async fn run(self, forward_interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        info!("转发器已启动，间隔 {:?}", forward_interval);

        let mut ticker = interval(forward_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.forward_once(Utc::now()).await {
                        Ok(0) => {}
                        Ok(count) => debug!("本轮转发 {} 个任务", count),
                        Err(e) => error!("转发到期任务失败: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("转发器收到关闭信号");
                    break;
                }
            }
        }

        info!("转发器已停止");
    }
}
