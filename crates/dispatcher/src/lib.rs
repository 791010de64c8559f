//! 任务状态引擎与周期调度
//!
//! - [`Broker`]: 任务在五个队列状态之间的原子转换
//! - [`Inspector`]: 队列内容与统计的只读查询
//! - [`SchedulerRegistry`]: 调度条目与入队历史
//! - [`CronTaskScheduler`] / [`Forwarder`]: 周期入队与到期转发的后台循环

pub mod broker;
pub mod cron_scheduler;
pub mod cron_utils;
pub mod forwarder;
pub mod history_retention;
pub mod inspector;
pub mod retry_policy;
pub mod scheduler_registry;

pub use broker::{Broker, RetryOutcome};
pub use cron_scheduler::CronTaskScheduler;
pub use cron_utils::CronScheduler;
pub use forwarder::Forwarder;
pub use history_retention::HistoryRetention;
pub use inspector::Inspector;
pub use retry_policy::RetryPolicy;
pub use scheduler_registry::SchedulerRegistry;
