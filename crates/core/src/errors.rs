use thiserror::Error;
use uuid::Uuid;

use crate::models::QueueState;

/// 任务队列错误类型定义
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("存储错误: {0}")]
    Store(String),

    #[error("队列为空")]
    EmptyQueue,

    #[error("任务未找到: {id} (期望状态: {state})")]
    TaskNotFound { id: Uuid, state: QueueState },

    #[error("反序列化错误: {0}")]
    Deserialization(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("读取调度条目失败: {entry_id} - {message}")]
    EntryNotFound { entry_id: String, message: String },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl QueueError {
    /// 队列为空是正常状态，调用方应稍后重试
    pub fn is_empty_queue(&self) -> bool {
        matches!(self, QueueError::EmptyQueue)
    }

    /// 调用方是否可以在稍后重试同一操作
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::EmptyQueue | QueueError::Store(_))
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        let err = QueueError::TaskNotFound {
            id,
            state: QueueState::InProgress,
        };
        assert_eq!(
            err.to_string(),
            "任务未找到: 00000000-0000-0000-0000-000000000000 (期望状态: in_progress)"
        );
        assert_eq!(QueueError::EmptyQueue.to_string(), "队列为空");
    }

    #[test]
    fn test_error_classification() {
        assert!(QueueError::EmptyQueue.is_empty_queue());
        assert!(QueueError::EmptyQueue.is_retryable());
        assert!(QueueError::Store("connection reset".to_string()).is_retryable());
        assert!(!QueueError::Deserialization("bad".to_string()).is_retryable());
        assert!(!QueueError::Store("x".to_string()).is_empty_queue());
    }
}
