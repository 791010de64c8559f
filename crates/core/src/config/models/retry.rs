use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_MAX_RETRY;

/// 重试策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 基础重试间隔（秒）
    pub base_interval_seconds: u64,
    /// 最大重试间隔（秒）
    pub max_interval_seconds: u64,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
    /// 新任务的默认最大重试次数
    pub default_max_retry: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_interval_seconds: 15,
            max_interval_seconds: 3600, // 1小时
            backoff_multiplier: 2.0,
            jitter_factor: 0.1, // 10%的随机抖动
            default_max_retry: DEFAULT_MAX_RETRY,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_interval_seconds == 0 {
            return Err(anyhow::anyhow!("retry.base_interval_seconds必须大于0"));
        }
        if self.max_interval_seconds < self.base_interval_seconds {
            return Err(anyhow::anyhow!(
                "retry.max_interval_seconds不能小于base_interval_seconds"
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("retry.backoff_multiplier不能小于1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!(
                "retry.jitter_factor必须在0.0到1.0之间: {}",
                self.jitter_factor
            ));
        }
        Ok(())
    }
}
