//! 节点缓存模块
//!
//! 树节点在解码前以原始字节形式缓存，按逻辑地址索引，使用 `lru` crate 驱逐。
//!
//! # 主要组件
//!
//! - [`NodeCache`] - 原始节点缓存
//! - [`NodeFlags`] - 缓存项状态标志
//! - [`CacheStats`] - 缓存统计信息
//!
//! 同一次运行中解析路径、枚举 extent、查找校验和会反复经过相同的上层节点，
//! 缓存只保存已经通过校验的节点，命中时不再重复计算节点校验和。

mod node_cache;

pub use node_cache::{CacheStats, NodeCache, NodeFlags, DEFAULT_CACHE_SIZE};
