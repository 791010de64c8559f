//! 监控用的只读视图
//!
//! 这些类型只用于展示队列内容，由 Inspector 从存储中的任务记录
//! 和有序集合分数投影得到，修改它们不会影响队列状态。

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{Payload, TaskMessage};

/// 某一时刻各队列的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub enqueued: u64,
    pub in_progress: u64,
    pub scheduled: u64,
    pub retry: u64,
    pub dead: u64,
    pub timestamp: DateTime<Utc>,
}

impl Stats {
    /// 所有状态中的任务总数
    pub fn total(&self) -> u64 {
        self.enqueued + self.in_progress + self.scheduled + self.retry + self.dead
    }
}

/// 等待处理的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueuedTask {
    pub id: Uuid,
    pub task_type: String,
    pub payload: Payload,
}

/// 正在处理的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InProgressTask {
    pub id: Uuid,
    pub task_type: String,
    pub payload: Payload,
}

/// 计划在未来处理的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: Uuid,
    pub task_type: String,
    pub payload: Payload,
    pub process_at: DateTime<Utc>,
}

/// 处理失败、等待重试的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryTask {
    pub id: Uuid,
    pub task_type: String,
    pub payload: Payload,
    pub process_at: DateTime<Utc>,
    pub error_msg: String,
    pub retry_count: u32,
    pub retry_max: u32,
}

/// 已耗尽重试次数的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadTask {
    pub id: Uuid,
    pub task_type: String,
    pub payload: Payload,
    pub last_failed_at: DateTime<Utc>,
    pub error_msg: String,
}

/// 把有序集合分数（Unix秒，保留毫秒）转换为时间
pub fn score_to_time(score: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt((score * 1000.0).round() as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// 把时间转换为有序集合分数，精确到毫秒
pub fn time_to_score(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

impl From<TaskMessage> for EnqueuedTask {
    fn from(msg: TaskMessage) -> Self {
        Self {
            id: msg.id,
            task_type: msg.task_type,
            payload: msg.payload,
        }
    }
}

impl From<TaskMessage> for InProgressTask {
    fn from(msg: TaskMessage) -> Self {
        Self {
            id: msg.id,
            task_type: msg.task_type,
            payload: msg.payload,
        }
    }
}

impl ScheduledTask {
    pub fn from_message(msg: TaskMessage, score: f64) -> Self {
        Self {
            id: msg.id,
            task_type: msg.task_type,
            payload: msg.payload,
            process_at: score_to_time(score),
        }
    }
}

impl RetryTask {
    pub fn from_message(msg: TaskMessage, score: f64) -> Self {
        Self {
            id: msg.id,
            task_type: msg.task_type,
            payload: msg.payload,
            process_at: score_to_time(score),
            error_msg: msg.error_msg,
            retry_count: msg.retry_count,
            retry_max: msg.retry_max,
        }
    }
}

impl DeadTask {
    pub fn from_message(msg: TaskMessage, score: f64) -> Self {
        Self {
            id: msg.id,
            task_type: msg.task_type,
            payload: msg.payload,
            last_failed_at: score_to_time(score),
            error_msg: msg.error_msg,
        }
    }
}
