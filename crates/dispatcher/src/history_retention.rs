use chrono::{DateTime, Duration, Utc};

use taskqueue_core::config::HistoryConfig;
use taskqueue_core::models::inspect::time_to_score;

/// 调度条目入队历史的保留边界
///
/// 每次追加事件时按此边界裁剪：先删除早于 `max_age` 的事件，
/// 再从最旧的开始删除，直到最多剩下 `max_events` 条。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRetention {
    pub max_events: usize,
    pub max_age: Option<Duration>,
}

impl Default for HistoryRetention {
    fn default() -> Self {
        Self::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for HistoryRetention {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            max_events: config.max_events.max(1),
            max_age: config
                .max_age_seconds
                .map(|secs| Duration::seconds(secs.min(i64::MAX as u64 / 1000) as i64)),
        }
    }
}

impl HistoryRetention {
    pub fn new(max_events: usize, max_age: Option<Duration>) -> Self {
        Self {
            max_events: max_events.max(1),
            max_age,
        }
    }

    /// 低于该分数的事件已过期
    ///
    /// 以最新事件的时间为基准，而不是调用方的时钟。
    pub fn min_score(&self, newest: DateTime<Utc>) -> Option<f64> {
        let max_age = self.max_age?;
        newest.checked_sub_signed(max_age).map(time_to_score)
    }
}
