use async_trait::async_trait;

use crate::Result;

/// 批量长度查询中的键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
    /// 列表，返回 LLEN
    List(&'a str),
    /// 有序集合，返回 ZCARD
    SortedSet(&'a str),
}

/// 共享存储抽象接口
///
/// 提供列表、有序集合和哈希的基础操作。每个方法在后端上都是一个原子单元，
/// 多步方法（先删除再插入）不会出现只执行一半的情况，状态引擎依赖这一点
/// 保证任务不会在状态转换中丢失或重复。
///
/// 有序集合按分数升序返回，分数为Unix时间戳（秒）。
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// 追加到列表尾部
    async fn push_back(&self, list: &str, member: &str) -> Result<()>;

    /// 弹出 `src` 头部并追加到 `dst` 尾部，`src` 为空时返回 `None`
    async fn move_front_to_back(&self, src: &str, dst: &str) -> Result<Option<String>>;

    /// 按值删除列表中的第一个匹配项
    async fn remove_from_list(&self, list: &str, member: &str) -> Result<bool>;

    /// 从列表 `src` 删除 `member`，成功时把 `new_member` 以 `score` 加入有序集合 `dst`
    async fn remove_from_list_then_add_to_set(
        &self,
        src: &str,
        member: &str,
        dst: &str,
        new_member: &str,
        score: f64,
    ) -> Result<bool>;

    /// 加入有序集合（已存在时更新分数）
    async fn add_to_set(&self, set: &str, member: &str, score: f64) -> Result<()>;

    /// 从有序集合删除
    async fn remove_from_set(&self, set: &str, member: &str) -> Result<bool>;

    /// 从有序集合 `src` 删除 `member`，成功时追加到列表 `dst` 尾部
    async fn remove_from_set_then_push(&self, src: &str, member: &str, dst: &str)
        -> Result<bool>;

    /// 把分数不大于 `max_score` 的全部成员移到列表 `dst`，返回被移动的成员
    async fn move_due_to_list(&self, src: &str, dst: &str, max_score: f64)
        -> Result<Vec<String>>;

    /// 列表全部内容
    async fn list_range(&self, list: &str) -> Result<Vec<String>>;

    /// 有序集合全部成员及分数，按分数升序
    async fn set_range_with_scores(&self, set: &str) -> Result<Vec<(String, f64)>>;

    /// 在一次原子批量读取中返回各键的长度
    async fn lengths(&self, keys: &[KeyRef<'_>]) -> Result<Vec<u64>>;

    /// 删除整个键
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 加入有序集合后裁剪：删除分数低于 `min_score` 的成员，
    /// 并只保留分数最高的 `max_len` 个成员
    async fn add_to_capped_set(
        &self,
        set: &str,
        member: &str,
        score: f64,
        max_len: usize,
        min_score: Option<f64>,
    ) -> Result<()>;

    /// 原子地替换整个哈希
    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// 哈希中的全部值
    async fn hash_values(&self, key: &str) -> Result<Vec<String>>;
}
