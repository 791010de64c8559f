use std::time::Duration;

use taskqueue_core::config::RetryConfig;

/// 指数退避重试策略
///
/// 第 n 次重试的间隔为 `base * multiplier^n`，不超过 `max_interval`，
/// 并加上 ±`jitter_factor` 比例的随机抖动以避免大量任务同时重试。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 不含抖动的退避间隔（秒）
    pub fn base_delay_seconds(&self, retry_count: u32) -> f64 {
        let base_interval = self.config.base_interval_seconds as f64;
        let max_interval = self.config.max_interval_seconds as f64;
        let exponent = retry_count.min(i32::MAX as u32) as i32;

        (base_interval * self.config.backoff_multiplier.powi(exponent)).min(max_interval)
    }

    /// 计算下一次重试前的等待时间
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let capped_interval = self.base_delay_seconds(retry_count);

        // 添加随机抖动以避免雷群效应
        let jitter =
            capped_interval * self.config.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        let final_interval = (capped_interval + jitter)
            .max(self.config.base_interval_seconds as f64)
            .min(self.config.max_interval_seconds as f64);

        Duration::from_secs_f64(final_interval)
    }
}
