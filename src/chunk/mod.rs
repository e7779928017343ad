//! 逻辑地址到物理地址的映射（chunk 映射）
//!
//! 树节点和数据 extent 中记录的都是逻辑地址。引导时先从 superblock 的
//! sys_chunk_array 得到 SYSTEM chunk，足以读取 chunk 树；再把 chunk 树中
//! 所有 CHUNK_ITEM 加入映射。
//!
//! 只支持非条带化的 profile（SINGLE / DUP / RAID1 系列），这些 profile 下
//! 每个 stripe 都保存完整数据。映射选用位于已打开设备上的 stripe；
//! 没有 stripe 在该设备上的 chunk 无法读取。

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    types::{ChunkItem, RawReader},
};
use alloc::collections::BTreeMap;

/// 一段连续映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMapping {
    /// 逻辑起始地址
    pub logical: u64,
    /// 长度
    pub length: u64,
    /// 物理起始地址（已打开设备上的 stripe）
    pub physical: u64,
    /// chunk 类型位
    pub chunk_type: u64,
}

/// chunk 映射表
#[derive(Debug, Clone)]
pub struct ChunkMap {
    devid: u64,
    chunks: BTreeMap<u64, ChunkMapping>,
}

impl ChunkMap {
    /// 为设备 `devid` 创建空映射
    pub fn new(devid: u64) -> Self {
        Self {
            devid,
            chunks: BTreeMap::new(),
        }
    }

    /// 映射针对的设备
    pub fn devid(&self) -> u64 {
        self.devid
    }

    /// 从 superblock 的 sys_chunk_array 引导
    ///
    /// 数组由 `(disk_key, chunk_item)` 对紧密排列组成。
    pub fn from_sys_chunk_array(array: &[u8], devid: u64) -> Result<Self> {
        let mut map = Self::new(devid);
        let r = RawReader::new(array, "sys_chunk_array");
        let mut off = 0;

        while off < array.len() {
            let key = r.key(off)?;
            off += BTRFS_DISK_KEY_SIZE;
            if key.item_type != BTRFS_CHUNK_ITEM_KEY {
                log::error!("[CHUNK] unexpected key {:?} in sys_chunk_array", key);
                return Err(Error::new(ErrorKind::InvalidData, "sys_chunk_array holds a non-chunk key"));
            }
            let (chunk, used) = ChunkItem::decode(&array[off..])?;
            map.insert(key.offset, &chunk)?;
            off += used;
        }

        if map.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "sys_chunk_array is empty"));
        }
        Ok(map)
    }

    /// 加入一个 chunk
    pub fn insert(&mut self, logical: u64, chunk: &ChunkItem) -> Result<()> {
        if chunk.chunk_type & BTRFS_BLOCK_GROUP_STRIPED != 0 {
            log::error!(
                "[CHUNK] chunk {:#x} uses a striped profile (type {:#x})",
                logical,
                chunk.chunk_type
            );
            return Err(Error::new(ErrorKind::Unsupported, "striped chunk profiles are not supported"));
        }
        if chunk.length == 0 {
            return Err(Error::new(ErrorKind::InvalidData, "zero-length chunk"));
        }

        let stripe = chunk.stripe_on(self.devid).ok_or_else(|| {
            log::error!(
                "[CHUNK] chunk {:#x} has no stripe on devid {} (stripes {:?})",
                logical,
                self.devid,
                chunk.stripes
            );
            Error::new(ErrorKind::Unsupported, "chunk has no stripe on the opened device")
        })?;

        log::debug!(
            "[CHUNK] map logical {:#x}+{:#x} -> devid {} physical {:#x}",
            logical,
            chunk.length,
            stripe.devid,
            stripe.offset
        );
        self.chunks.insert(
            logical,
            ChunkMapping {
                logical,
                length: chunk.length,
                physical: stripe.offset,
                chunk_type: chunk.chunk_type,
            },
        );
        Ok(())
    }

    /// 查找覆盖 `logical` 的映射
    pub fn lookup(&self, logical: u64) -> Option<&ChunkMapping> {
        self.chunks
            .range(..=logical)
            .next_back()
            .map(|(_, m)| m)
            .filter(|m| logical - m.logical < m.length)
    }

    /// 把逻辑范围映射为物理地址
    ///
    /// 范围必须完整落在同一个 chunk 中。
    pub fn map(&self, logical: u64, len: u64) -> Result<u64> {
        let m = self.lookup(logical).ok_or_else(|| {
            log::error!("[CHUNK] no chunk maps logical {:#x}", logical);
            Error::new(ErrorKind::InvalidData, "logical address not covered by any chunk")
        })?;

        let rel = logical - m.logical;
        if len > m.length - rel {
            log::error!(
                "[CHUNK] range {:#x}+{:#x} crosses chunk end {:#x}",
                logical,
                len,
                m.logical + m.length
            );
            return Err(Error::new(ErrorKind::InvalidData, "logical range crosses a chunk boundary"));
        }
        Ok(m.physical + rel)
    }

    /// 映射数量
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
