//! 配置管理
//!
//! `AppConfig` 汇总存储、重试、历史保留、转发器、周期调度器和日志配置，
//! 支持 默认值、TOML 配置文件、环境变量 三级来源。
//!
//! ```rust
//! use taskqueue_core::config::AppConfig;
//!
//! let config = AppConfig::from_toml(r#"
//!     [store]
//!     type = "in_memory"
//!     namespace = "demo"
//! "#).unwrap();
//! assert_eq!(config.store.namespace, "demo");
//! ```

pub mod models;

pub use models::*;
