use serde::{Deserialize, Serialize};

/// 调度条目入队历史的保留策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// 每个条目最多保留的事件数
    pub max_events: usize,
    /// 事件最长保留时间（秒），为空时只按数量裁剪
    pub max_age_seconds: Option<u64>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_events: 1000,
            max_age_seconds: Some(7 * 24 * 3600),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_events == 0 {
            return Err(anyhow::anyhow!("history.max_events必须大于0"));
        }
        if self.max_age_seconds == Some(0) {
            return Err(anyhow::anyhow!("history.max_age_seconds必须大于0"));
        }
        Ok(())
    }
}
