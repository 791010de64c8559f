use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use taskqueue_core::{QueueError, Result};

/// CRON表达式解析和调度工具
///
/// 表达式包含秒字段，例如 `0 */5 * * * *` 表示每5分钟。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> Result<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| QueueError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule })
    }

    /// 获取 `from` 之后的下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }
}
