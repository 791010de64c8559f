use crate::models::QueueState;

/// 存储键布局
///
/// 所有键都位于同一个命名空间下，五个队列状态各占一个键。
/// 每个调度器发布的条目、每个调度条目的入队历史各自单独一个键。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    namespace: String,
    enqueued: String,
    in_progress: String,
    scheduled: String,
    retry: String,
    dead: String,
    schedulers: String,
}

impl QueueKeys {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            enqueued: format!("{namespace}:queues:default"),
            in_progress: format!("{namespace}:in_progress"),
            scheduled: format!("{namespace}:scheduled"),
            retry: format!("{namespace}:retry"),
            dead: format!("{namespace}:dead"),
            schedulers: format!("{namespace}:schedulers"),
        }
    }

    pub fn enqueued(&self) -> &str {
        &self.enqueued
    }

    pub fn in_progress(&self) -> &str {
        &self.in_progress
    }

    pub fn scheduled(&self) -> &str {
        &self.scheduled
    }

    pub fn retry(&self) -> &str {
        &self.retry
    }

    pub fn dead(&self) -> &str {
        &self.dead
    }

    /// 指定状态对应的键
    pub fn for_state(&self, state: QueueState) -> &str {
        match state {
            QueueState::Enqueued => &self.enqueued,
            QueueState::InProgress => &self.in_progress,
            QueueState::Scheduled => &self.scheduled,
            QueueState::Retry => &self.retry,
            QueueState::Dead => &self.dead,
        }
    }

    /// 已发布条目的调度器ID集合，分数为最近一次发布时间
    pub fn schedulers(&self) -> &str {
        &self.schedulers
    }

    /// 某个调度器发布的条目（哈希，条目ID -> 条目）
    pub fn scheduler_entries(&self, scheduler_id: &str) -> String {
        format!("{}:scheduler:entries:{scheduler_id}", self.namespace)
    }

    pub fn scheduler_history(&self, entry_id: &str) -> String {
        format!("{}:scheduler_history:{entry_id}", self.namespace)
    }
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self::new("taskqueue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = QueueKeys::new("tq");
        assert_eq!(keys.enqueued(), "tq:queues:default");
        assert_eq!(keys.for_state(QueueState::InProgress), "tq:in_progress");
        assert_eq!(keys.for_state(QueueState::Dead), "tq:dead");
        assert_eq!(keys.schedulers(), "tq:schedulers");
        assert_eq!(keys.scheduler_entries("s1"), "tq:scheduler:entries:s1");
        assert_eq!(keys.scheduler_history("e1"), "tq:scheduler_history:e1");
    }
}
