//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了加载器内部的键值缓存。

use ahash::AHashMap;
use std::hash::Hash;

/// 加载器内部缓存
///
/// 键到最近一次成功结果的映射。`None`值表示回源确认不存在的键，
/// 与存在的值同样会被缓存。条目不会自动过期，仅能显式删除。
///
/// 本结构自身不做并发控制，所有读写都必须在加载器的锁内进行。
#[derive(Debug)]
pub struct KeyCache<K, V> {
    entries: AHashMap<K, Option<V>>,
}

impl<K: Eq + Hash, V> KeyCache<K, V> {
    /// 创建空缓存（首次写入前不分配内存）
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// 查询缓存条目
    pub fn get(&self, key: &K) -> Option<&Option<V>> {
        self.entries.get(key)
    }

    /// 写入缓存条目，覆盖已有值
    pub fn set(&mut self, key: K, value: Option<V>) {
        self.entries.insert(key, value);
    }

    /// 删除缓存条目，键不存在时为空操作
    pub fn delete(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// 判断键是否已缓存
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// 当前缓存条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for KeyCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
