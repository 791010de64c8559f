use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Redis,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 完整的连接URL，设置后优先于 host/port/database/password
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
    pub connection_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout_seconds: 30,
        }
    }
}

impl RedisConfig {
    /// 构建Redis连接URL
    pub fn build_connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        if let Some(password) = &self.password {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            )
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(raw) = &self.url {
            let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("无效的Redis URL: {e}"))?;
            if url.scheme() != "redis" && url.scheme() != "rediss" {
                return Err(anyhow::anyhow!(
                    "Redis URL必须以redis://或rediss://开头: {raw}"
                ));
            }
            return Ok(());
        }

        if self.host.is_empty() {
            return Err(anyhow::anyhow!("redis.host不能为空"));
        }
        if self.port == 0 {
            return Err(anyhow::anyhow!("redis.port必须大于0"));
        }
        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("redis.connection_timeout_seconds必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub r#type: StoreType,
    /// 所有键的命名空间前缀
    pub namespace: String,
    pub redis: RedisConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            r#type: StoreType::Redis,
            namespace: "taskqueue".to_string(),
            redis: RedisConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.is_empty() {
            return Err(anyhow::anyhow!("store.namespace不能为空"));
        }
        if self.namespace.contains(char::is_whitespace) {
            return Err(anyhow::anyhow!(
                "store.namespace不能包含空白字符: {:?}",
                self.namespace
            ));
        }
        if self.r#type == StoreType::Redis {
            self.redis.validate()?;
        }
        Ok(())
    }
}
