use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Payload;
use crate::{QueueError, Result};

/// 周期任务的入队选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOptions {
    /// 覆盖默认的最大重试次数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u32>,
    /// 触发后延迟若干秒再处理（进入scheduled而不是直接入队）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
}

impl fmt::Display for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(max_retry) = self.max_retry {
            parts.push(format!("MaxRetry({max_retry})"));
        }
        if let Some(delay) = self.delay_seconds {
            parts.push(format!("Delay({delay}s)"));
        }
        f.write_str(&parts.join(", "))
    }
}

/// 调度条目
///
/// 由调度器配置生成的周期任务规则，状态引擎不会修改它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerEntry {
    pub id: String,
    pub spec: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub options: TaskOptions,
    pub next: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<DateTime<Utc>>,
}

impl SchedulerEntry {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            QueueError::Serialization(format!("Failed to serialize scheduler entry {}: {e}", self.id))
        })
    }

    pub fn decode(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| {
            QueueError::Deserialization(format!("Failed to decode scheduler entry: {e}"))
        })
    }
}

/// 调度条目的一次入队记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerEnqueueEvent {
    pub task_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

impl SchedulerEnqueueEvent {
    pub fn new(task_id: Uuid, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            enqueued_at,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            QueueError::Serialization(format!(
                "Failed to serialize enqueue event for task {}: {e}",
                self.task_id
            ))
        })
    }

    pub fn decode(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| {
            QueueError::Deserialization(format!("Failed to decode enqueue event: {e}"))
        })
    }
}
