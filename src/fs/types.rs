//! 文件系统层的公共类型

use crate::{cache::DEFAULT_CACHE_SIZE, types::TreeRoot};
use alloc::vec::Vec;
use core::fmt;

/// 文件系统配置
#[derive(Clone)]
pub struct FsConfig {
    /// 原始节点缓存容量（节点数）
    pub node_cache_size: usize,
    /// 读取时验证 superblock 与树节点校验和
    pub verify_metadata: bool,
    /// HMAC 校验和文件系统的认证密钥
    pub auth_key: Option<Vec<u8>>,
    /// 输出详细诊断（hex dump 与跟踪行）
    pub verbose: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            node_cache_size: DEFAULT_CACHE_SIZE,
            verify_metadata: true,
            auth_key: None,
            verbose: false,
        }
    }
}

impl fmt::Debug for FsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsConfig")
            .field("node_cache_size", &self.node_cache_size)
            .field("verify_metadata", &self.verify_metadata)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// 路径解析的结果
///
/// 创建后不可修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTarget {
    subvolume_root_id: u64,
    inode_number: u64,
    byte_size: u64,
}

impl FileTarget {
    /// 创建
    pub const fn new(subvolume_root_id: u64, inode_number: u64, byte_size: u64) -> Self {
        Self {
            subvolume_root_id,
            inode_number,
            byte_size,
        }
    }

    /// 所属子卷的树 id
    pub const fn subvolume_root_id(&self) -> u64 {
        self.subvolume_root_id
    }

    /// inode 号
    pub const fn inode_number(&self) -> u64 {
        self.inode_number
    }

    /// 文件大小（字节）
    pub const fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

/// 流水线需要的 superblock 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsLayout {
    /// root tree 根
    pub root_tree: TreeRoot,
    /// 校验和树根
    pub csum_root: TreeRoot,
    /// 数据扇区大小
    pub sector_size: u32,
    /// 每个扇区的摘要长度
    pub csum_size: usize,
    /// 默认子卷
    pub default_subvol: u64,
}
