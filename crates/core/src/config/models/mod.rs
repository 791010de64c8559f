pub mod app_config;
pub mod history;
pub mod observability;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use app_config::*;
pub use history::*;
pub use observability::*;
pub use retry::*;
pub use scheduler::*;
pub use store::*;
