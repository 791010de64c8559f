use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Payload, TaskOptions};

/// 定时/重试任务转发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 5,
        }
    }
}

impl ForwarderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_seconds == 0 {
            return Err(anyhow::anyhow!("forwarder.interval_seconds必须大于0"));
        }
        Ok(())
    }
}

/// 单个周期任务的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerEntryConfig {
    /// 条目ID，未设置时启动时生成
    #[serde(default)]
    pub id: Option<String>,
    /// CRON表达式（含秒字段）
    pub spec: String,
    pub task_type: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub options: TaskOptions,
}

impl SchedulerEntryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.task_type.is_empty() {
            return Err(anyhow::anyhow!("调度条目的task_type不能为空"));
        }
        if matches!(&self.id, Some(id) if id.is_empty()) {
            return Err(anyhow::anyhow!("调度条目的id不能为空字符串"));
        }
        cron::Schedule::from_str(&self.spec)
            .map_err(|e| anyhow::anyhow!("无效的CRON表达式: {} - {e}", self.spec))?;
        Ok(())
    }
}

/// 周期调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_seconds: u64,
    pub entries: Vec<SchedulerEntryConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: 1,
            entries: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_seconds == 0 {
            return Err(anyhow::anyhow!("scheduler.tick_interval_seconds必须大于0"));
        }
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            entry.validate()?;
            if let Some(id) = &entry.id {
                if !seen.insert(id.as_str()) {
                    return Err(anyhow::anyhow!("重复的调度条目ID: {id}"));
                }
            }
        }
        Ok(())
    }
}
