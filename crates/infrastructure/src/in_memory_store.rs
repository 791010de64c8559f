use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use taskqueue_core::{KeyRef, QueueStore, Result};

/// 内存存储实现
///
/// 与Redis后端具有相同原子语义的进程内实现：每个方法都在同一把锁的
/// 临界区内完成，适用于测试和单进程嵌入式部署。
/// 克隆得到的实例共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashMap<String, f64>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

impl StoreState {
    /// 按分数升序排列，分数相同时按成员字典序，与Redis一致
    fn sorted_members(&self, set: &str) -> Vec<(String, f64)> {
        let mut members: Vec<(String, f64)> = self
            .sets
            .get(set)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        members
    }

    fn list_remove_first(&mut self, list: &str, member: &str) -> bool {
        let Some(items) = self.lists.get_mut(list) else {
            return false;
        };
        let Some(pos) = items.iter().position(|m| m == member) else {
            return false;
        };
        items.remove(pos);
        if items.is_empty() {
            self.lists.remove(list);
        }
        true
    }

    fn set_remove(&mut self, set: &str, member: &str) -> bool {
        let Some(members) = self.sets.get_mut(set) else {
            return false;
        };
        let removed = members.remove(member).is_some();
        if members.is_empty() {
            self.sets.remove(set);
        }
        removed
    }

    fn push_back(&mut self, list: &str, member: String) {
        self.lists.entry(list.to_string()).or_default().push_back(member);
    }

    fn set_add(&mut self, set: &str, member: &str, score: f64) {
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string(), score);
    }
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn push_back(&self, list: &str, member: &str) -> Result<()> {
        self.state.lock().await.push_back(list, member.to_string());
        Ok(())
    }

    async fn move_front_to_back(&self, src: &str, dst: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        let popped = match state.lists.get_mut(src) {
            Some(items) => items.pop_front(),
            None => None,
        };
        if state.lists.get(src).is_some_and(|items| items.is_empty()) {
            state.lists.remove(src);
        }
        if let Some(member) = &popped {
            state.push_back(dst, member.clone());
        }
        Ok(popped)
    }

    async fn remove_from_list(&self, list: &str, member: &str) -> Result<bool> {
        Ok(self.state.lock().await.list_remove_first(list, member))
    }

    async fn remove_from_list_then_add_to_set(
        &self,
        src: &str,
        member: &str,
        dst: &str,
        new_member: &str,
        score: f64,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.list_remove_first(src, member) {
            return Ok(false);
        }
        state.set_add(dst, new_member, score);
        Ok(true)
    }

    async fn add_to_set(&self, set: &str, member: &str, score: f64) -> Result<()> {
        self.state.lock().await.set_add(set, member, score);
        Ok(())
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<bool> {
        Ok(self.state.lock().await.set_remove(set, member))
    }

    async fn remove_from_set_then_push(
        &self,
        src: &str,
        member: &str,
        dst: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.set_remove(src, member) {
            return Ok(false);
        }
        state.push_back(dst, member.to_string());
        Ok(true)
    }

    async fn move_due_to_list(
        &self,
        src: &str,
        dst: &str,
        max_score: f64,
    ) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        let due: Vec<String> = state
            .sorted_members(src)
            .into_iter()
            .take_while(|(_, score)| *score <= max_score)
            .map(|(member, _)| member)
            .collect();

        for member in &due {
            state.set_remove(src, member);
            state.push_back(dst, member.clone());
        }
        if !due.is_empty() {
            debug!("Moved {} due members from {} to {}", due.len(), src, dst);
        }
        Ok(due)
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .lists
            .get(list)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_range_with_scores(&self, set: &str) -> Result<Vec<(String, f64)>> {
        Ok(self.state.lock().await.sorted_members(set))
    }

    async fn lengths(&self, keys: &[KeyRef<'_>]) -> Result<Vec<u64>> {
        let state = self.state.lock().await;
        Ok(keys
            .iter()
            .map(|key| match key {
                KeyRef::List(name) => state.lists.get(*name).map_or(0, |l| l.len() as u64),
                KeyRef::SortedSet(name) => state.sets.get(*name).map_or(0, |s| s.len() as u64),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let removed_list = state.lists.remove(key).is_some();
        let removed_set = state.sets.remove(key).is_some();
        let removed_hash = state.hashes.remove(key).is_some();
        Ok(removed_list || removed_set || removed_hash)
    }

    async fn add_to_capped_set(
        &self,
        set: &str,
        member: &str,
        score: f64,
        max_len: usize,
        min_score: Option<f64>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.set_add(set, member, score);

        let members = state.sorted_members(set);
        let mut expired: Vec<String> = members
            .iter()
            .filter(|(_, s)| min_score.is_some_and(|min| *s < min))
            .map(|(m, _)| m.clone())
            .collect();

        let kept = members.len() - expired.len();
        if kept > max_len {
            let overflow = kept - max_len;
            expired.extend(
                members
                    .iter()
                    .filter(|(_, s)| !min_score.is_some_and(|min| *s < min))
                    .take(overflow)
                    .map(|(m, _)| m.clone()),
            );
        }

        for member in &expired {
            state.set_remove(set, member);
        }
        Ok(())
    }

    async fn hash_replace(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut state = self.state.lock().await;
        if fields.is_empty() {
            state.hashes.remove(key);
            return Ok(());
        }
        state
            .hashes
            .insert(key.to_string(), fields.iter().cloned().collect());
        Ok(())
    }

    async fn hash_values(&self, key: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .hashes
            .get(key)
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }
}
