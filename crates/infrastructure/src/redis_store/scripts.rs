//! 多步原子操作的Lua脚本
//!
//! Redis 单线程执行脚本，脚本内的多个命令要么全部生效要么都不生效。

use redis::Script;

/// KEYS[1] 源列表, KEYS[2] 目标列表
const MOVE_FRONT_TO_BACK: &str = r#"
local msg = redis.call("LPOP", KEYS[1])
if msg then
    redis.call("RPUSH", KEYS[2], msg)
end
return msg
"#;

/// KEYS[1] 源列表, KEYS[2] 目标有序集合
/// ARGV[1] 原成员, ARGV[2] 新成员, ARGV[3] 分数
const REMOVE_FROM_LIST_THEN_ADD_TO_SET: &str = r#"
if redis.call("LREM", KEYS[1], 1, ARGV[1]) == 0 then
    return 0
end
redis.call("ZADD", KEYS[2], ARGV[3], ARGV[2])
return 1
"#;

/// KEYS[1] 源有序集合, KEYS[2] 目标列表, ARGV[1] 成员
const REMOVE_FROM_SET_THEN_PUSH: &str = r#"
if redis.call("ZREM", KEYS[1], ARGV[1]) == 0 then
    return 0
end
redis.call("RPUSH", KEYS[2], ARGV[1])
return 1
"#;

/// KEYS[1] 源有序集合, KEYS[2] 目标列表, ARGV[1] 最大分数
const MOVE_DUE_TO_LIST: &str = r#"
local msgs = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1])
for _, msg in ipairs(msgs) do
    redis.call("ZREM", KEYS[1], msg)
    redis.call("RPUSH", KEYS[2], msg)
end
return msgs
"#;

/// KEYS[1] 有序集合
/// ARGV[1] 成员, ARGV[2] 分数, ARGV[3] 最大长度, ARGV[4] 最小分数（空字符串表示不限）
const ADD_TO_CAPPED_SET: &str = r#"
redis.call("ZADD", KEYS[1], ARGV[2], ARGV[1])
if ARGV[4] ~= "" then
    redis.call("ZREMRANGEBYSCORE", KEYS[1], "-inf", "(" .. ARGV[4])
end
redis.call("ZREMRANGEBYRANK", KEYS[1], 0, -(tonumber(ARGV[3]) + 1))
return 1
"#;

pub(crate) struct RedisScripts {
    pub move_front_to_back: Script,
    pub remove_from_list_then_add_to_set: Script,
    pub remove_from_set_then_push: Script,
    pub move_due_to_list: Script,
    pub add_to_capped_set: Script,
}

impl RedisScripts {
    pub fn new() -> Self {
        Self {
            move_front_to_back: Script::new(MOVE_FRONT_TO_BACK),
            remove_from_list_then_add_to_set: Script::new(REMOVE_FROM_LIST_THEN_ADD_TO_SET),
            remove_from_set_then_push: Script::new(REMOVE_FROM_SET_THEN_PUSH),
            move_due_to_list: Script::new(MOVE_DUE_TO_LIST),
            add_to_capped_set: Script::new(ADD_TO_CAPPED_SET),
        }
    }
}
