pub mod in_memory_store;
pub mod redis_store;
pub mod store_factory;

pub use in_memory_store::InMemoryQueueStore;
pub use redis_store::RedisQueueStore;
pub use store_factory::QueueStoreFactory;
