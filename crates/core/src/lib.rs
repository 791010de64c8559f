pub mod config;
pub mod errors;
pub mod keys;
pub mod models;
pub mod traits;

pub use errors::*;
pub use keys::QueueKeys;
pub use models::{
    DeadTask, EnqueuedTask, InProgressTask, Payload, QueueState, RetryTask, ScheduledTask,
    SchedulerEnqueueEvent, SchedulerEntry, Stats, TaskMessage, TaskOptions,
};
pub use traits::{KeyRef, QueueStore};
