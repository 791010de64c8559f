use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{QueueError, Result};

/// 新任务的默认最大重试次数
pub const DEFAULT_MAX_RETRY: u32 = 25;

/// 任务负载
///
/// 以字符串为键的动态值映射，对状态引擎不透明。
/// 使用有序映射保证同一任务多次编码得到完全相同的字节，
/// 进行中列表按值删除依赖这一点。
pub type Payload = BTreeMap<String, serde_json::Value>;

/// 任务所处的队列状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Enqueued,
    InProgress,
    Scheduled,
    Retry,
    Dead,
}

impl QueueState {
    pub const ALL: [QueueState; 5] = [
        QueueState::Enqueued,
        QueueState::InProgress,
        QueueState::Scheduled,
        QueueState::Retry,
        QueueState::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Enqueued => "enqueued",
            QueueState::InProgress => "in_progress",
            QueueState::Scheduled => "scheduled",
            QueueState::Retry => "retry",
            QueueState::Dead => "dead",
        }
    }

    /// 是否为按时间排序的有序集合状态
    pub fn is_sorted_set(&self) -> bool {
        matches!(
            self,
            QueueState::Scheduled | QueueState::Retry | QueueState::Dead
        )
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "enqueued" => Ok(QueueState::Enqueued),
            "in_progress" | "inprogress" => Ok(QueueState::InProgress),
            "scheduled" => Ok(QueueState::Scheduled),
            "retry" => Ok(QueueState::Retry),
            "dead" => Ok(QueueState::Dead),
            _ => Err(QueueError::Configuration(format!("未知的队列状态: {s}"))),
        }
    }
}

/// 任务记录
///
/// 在各队列中以JSON形式保存的工作单元。ID一经分配不可变，
/// 仅状态引擎在状态转换时修改错误信息、重试次数和失败时间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub error_msg: String,
    #[serde(default)]
    pub retry_count: u32,
    pub retry_max: u32,
    /// 最近一次失败的Unix时间戳（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_at: Option<i64>,
}

impl TaskMessage {
    pub fn new(task_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            payload,
            error_msg: String::new(),
            retry_count: 0,
            retry_max: DEFAULT_MAX_RETRY,
            last_failed_at: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_max_retry(mut self, retry_max: u32) -> Self {
        self.retry_max = retry_max;
        self
    }

    /// 再失败一次是否会耗尽重试预算
    pub fn is_final_attempt(&self) -> bool {
        self.retry_count.saturating_add(1) >= self.retry_max
    }

    /// 编码为存储格式
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            QueueError::Serialization(format!("Failed to serialize task {}: {e}", self.id))
        })
    }

    /// 从存储格式解码
    pub fn decode(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| QueueError::Deserialization(format!("Failed to decode task record: {e}")))
    }
}
