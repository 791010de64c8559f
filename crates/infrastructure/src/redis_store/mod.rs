mod scripts;

use async_trait::async_trait;
use metrics::{counter, histogram};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use taskqueue_core::config::RedisConfig;
use taskqueue_core::{KeyRef, QueueError, QueueStore, Result};

use scripts::RedisScripts;

/// 基于Redis的共享存储实现
///
/// 多步操作以Lua脚本执行，批量读取使用 MULTI/EXEC 管道，
/// 因此每个 `QueueStore` 方法在服务端都是原子的。
/// 连接由 `ConnectionManager` 复用并在断开时自动重连，克隆开销很小，
/// 可以在多个任务间安全共享。
///
/// # 使用示例
///
/// ```rust,no_run
/// use taskqueue_core::config::RedisConfig;
/// use taskqueue_core::QueueStore;
/// use taskqueue_infrastructure::RedisQueueStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = RedisQueueStore::new(RedisConfig::default()).await?;
///     store.push_back("taskqueue:queues:default", "{}").await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RedisQueueStore {
    conn: ConnectionManager,
    scripts: std::sync::Arc<RedisScripts>,
}

impl RedisQueueStore {
    /// 建立到Redis的连接
    ///
    /// 连接在 `connection_timeout_seconds` 内未建立时返回 `QueueError::Store`。
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let redis_url = config.build_connection_url();
        let client = Client::open(redis_url.as_str())
            .map_err(|e| QueueError::Store(format!("Failed to create Redis client: {e}")))?;

        let start = Instant::now();
        let conn = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_seconds),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            QueueError::Store(format!(
                "Connection timeout after {} seconds",
                config.connection_timeout_seconds
            ))
        })?
        .map_err(|e| QueueError::Store(format!("Failed to connect to Redis: {e}")))?;

        histogram!("taskqueue_store_connect_duration_ms")
            .record(start.elapsed().as_millis() as f64);
        info!(
            "Connected to Redis at {}:{} (db {}) in {:?}",
            config.host,
            config.port,
            config.database,
            start.elapsed()
        );

        Ok(Self {
            conn,
            scripts: std::sync::Arc::new(RedisScripts::new()),
        })
    }

    /// 检查Redis连接健康状态
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("ping", e))?;
        if response != "PONG" {
            return Err(QueueError::Store(format!(
                "Unexpected PING response: {response}"
            )));
        }
        Ok(())
    }
}

fn store_error(op: &'static str, e: RedisError) -> QueueError {
    counter!("taskqueue_store_errors_total", "op" => op).increment(1);
    QueueError::Store(format!("Redis {op} failed: {e}"))
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push_back(&self, list: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .rpush(list, member)
            .await
            .map_err(|e| store_error("push_back", e))?;
        Ok(())
    }

    async fn move_front_to_back(&self, src: &str, dst: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.move_front_to_back.prepare_invoke();
        invocation.key(src).key(dst);
        let moved: Option<String> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("move_front_to_back", e))?;
        Ok(moved)
    }

    async fn remove_from_list(&self, list: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .lrem(list, 1, member)
            .await
            .map_err(|e| store_error("remove_from_list", e))?;
        Ok(removed > 0)
    }

    async fn remove_from_list_then_add_to_set(
        &self,
        src: &str,
        member: &str,
        dst: &str,
        new_member: &str,
        score: f64,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.remove_from_list_then_add_to_set.prepare_invoke();
        invocation
            .key(src)
            .key(dst)
            .arg(member)
            .arg(new_member)
            .arg(score);
        let moved: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("remove_from_list_then_add_to_set", e))?;
        Ok(moved == 1)
    }

    async fn add_to_set(&self, set: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zadd(set, member, score)
            .await
            .map_err(|e| store_error("add_to_set", e))?;
        Ok(())
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .zrem(set, member)
            .await
            .map_err(|e| store_error("remove_from_set", e))?;
        Ok(removed > 0)
    }

    async fn remove_from_set_then_push(
        &self,
        src: &str,
        member: &str,
        dst: &str,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.remove_from_set_then_push.prepare_invoke();
        invocation.key(src).key(dst).arg(member);
        let moved: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("remove_from_set_then_push", e))?;
        Ok(moved == 1)
    }

    async fn move_due_to_list(
        &self,
        src: &str,
        dst: &str,
        max_score: f64,
    ) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.move_due_to_list.prepare_invoke();
        invocation.key(src).key(dst).arg(max_score);
        let moved: Vec<String> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("move_due_to_list", e))?;
        if !moved.is_empty() {
            debug!("Moved {} due members from {} to {}", moved.len(), src, dst);
        }
        Ok(moved)
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .lrange(list, 0, -1)
            .await
            .map_err(|e| store_error("list_range", e))?;
        Ok(members)
    }

    async fn set_range_with_scores(&self, set: &str) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = conn
            .zrange_withscores(set, 0, -1)
            .await
            .map_err(|e| store_error("set_range_with_scores", e))?;
        Ok(members)
    }

    async fn lengths(&self, keys: &[KeyRef<'_>]) -> Result<Vec<u64>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            match key {
                KeyRef::List(name) => {
                    pipe.llen(*name);
                }
                KeyRef::SortedSet(name) => {
                    pipe.zcard(*name);
                }
            }
        }

        let mut conn = self.conn.clone();
        let counts: Vec<u64> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("lengths", e))?;
        Ok(counts)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(|e| store_error("delete", e))?;
        Ok(deleted > 0)
    }

    async fn add_to_capped_set(
        &self,
        set: &str,
        member: &str,
        score: f64,
        max_len: usize,
        min_score: Option<f64>,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.add_to_capped_set.prepare_invoke();
        invocation
            .key(set)
            .arg(member)
            .arg(score)
            .arg(max_len)
            .arg(min_score.map(|s| s.to_string()).unwrap_or_default());
        let _: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("add_to_capped_set", e))?;
        Ok(())
    }

    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("hash_replace", e))?;
        Ok(())
    }

    async fn hash_values(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn
            .hvals(key)
            .await
            .map_err(|e| store_error("hash_values", e))?;
        Ok(values)
    }
}
