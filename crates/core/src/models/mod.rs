//! # 数据模型
//!
//! 任务队列状态引擎使用的核心数据结构。
//!
//! ## 核心模型
//!
//! ### TaskMessage - 任务记录
//! 在五个队列状态之间流转的工作单元，以JSON形式保存在存储中。
//!
//! ### 监控视图
//! `EnqueuedTask`、`InProgressTask`、`ScheduledTask`、`RetryTask`、`DeadTask`
//! 以及 `Stats`，只读，供 Inspector 返回。
//!
//! ### SchedulerEntry / SchedulerEnqueueEvent - 周期调度
//! 周期任务规则和每次触发产生的入队记录。
//!
//! ## 使用示例
//!
//! ```rust
//! use taskqueue_core::models::{Payload, TaskMessage};
//!
//! let mut payload = Payload::new();
//! payload.insert("to".to_string(), serde_json::json!("user@example.com"));
//!
//! let task = TaskMessage::new("email", payload).with_max_retry(3);
//! let raw = task.encode().unwrap();
//! assert_eq!(TaskMessage::decode(&raw).unwrap(), task);
//! ```

pub mod inspect;
pub mod scheduler_entry;
pub mod task;

pub use inspect::*;
pub use scheduler_entry::*;
pub use task::*;
