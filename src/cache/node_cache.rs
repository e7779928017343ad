//! 原始节点缓存（lru crate）

use alloc::vec::Vec;
use bitflags::bitflags;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 默认缓存节点数量
pub const DEFAULT_CACHE_SIZE: usize = 256;

bitflags! {
    /// 缓存项标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// 节点校验和已验证
        const VERIFIED = 0x01;
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 驱逐次数
    pub evictions: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

struct CachedNode {
    data: Vec<u8>,
    flags: NodeFlags,
}

/// 原始节点缓存
pub struct NodeCache {
    cache: LruCache<u64, CachedNode>,
    stats: CacheStats,
}

impl NodeCache {
    /// 创建缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量（节点数量），0 按 1 处理
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            stats: CacheStats::default(),
        }
    }

    /// 查找节点，命中时更新 LRU 顺序
    pub fn get(&mut self, bytenr: u64) -> Option<(&[u8], NodeFlags)> {
        self.stats.total_accesses += 1;
        match self.cache.get(&bytenr) {
            Some(node) => {
                self.stats.hits += 1;
                log::trace!("[CACHE] node {:#x} HIT", bytenr);
                Some((node.data.as_slice(), node.flags))
            }
            None => {
                self.stats.misses += 1;
                log::trace!("[CACHE] node {:#x} MISS", bytenr);
                None
            }
        }
    }

    /// 放入节点，满时驱逐最久未使用的节点
    pub fn insert(&mut self, bytenr: u64, data: Vec<u8>, flags: NodeFlags) {
        if let Some((evicted, _)) = self.cache.push(bytenr, CachedNode { data, flags }) {
            if evicted != bytenr {
                self.stats.evictions += 1;
                log::trace!("[CACHE] evict node {:#x}", evicted);
            }
        }
    }

    /// 是否已缓存（不更新 LRU 顺序）
    pub fn contains(&self, bytenr: u64) -> bool {
        self.cache.contains(&bytenr)
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// 获取缓存容量
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// 获取当前缓存节点数量
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// 检查缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// 清空缓存
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl core::fmt::Debug for NodeCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("stats", &self.stats)
            .finish()
    }
}
