//! 树节点解码
//!
//! 节点布局：
//!
//! ```text
//! +--------------------+  0
//! | header (101 字节)   |  csum / fsid / bytenr / flags / uuid / generation / owner / nritems / level
//! +--------------------+  101
//! | 叶子: item[nritems] |  key + data_offset + data_size（25 字节）
//! | 内部: ptr[nritems]  |  key + blockptr + generation（33 字节）
//! +--------------------+
//! |        ...         |
//! | 叶子 item 数据      |  从节点尾部向前排列，offset 相对 header 末尾
//! +--------------------+  nodesize
//! ```

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    types::{Key, RawReader},
};
use alloc::vec::Vec;

/// 节点头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHeader {
    /// 节点校验和（按文件系统算法，只使用前 csum_size 字节）
    pub csum: [u8; BTRFS_CSUM_SIZE],
    /// 文件系统 uuid
    pub fsid: [u8; BTRFS_UUID_SIZE],
    /// 节点自身的逻辑地址
    pub bytenr: u64,
    /// 标志
    pub flags: u64,
    /// 生成号
    pub generation: u64,
    /// 所属树
    pub owner: u64,
    /// item / 指针数量
    pub nritems: u32,
    /// 层级（0 为叶子）
    pub level: u8,
}

impl NodeHeader {
    /// 解码节点头
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let r = RawReader::new(buf, "node header");
        let mut csum = [0u8; BTRFS_CSUM_SIZE];
        csum.copy_from_slice(r.bytes(0, BTRFS_CSUM_SIZE)?);
        let mut fsid = [0u8; BTRFS_UUID_SIZE];
        fsid.copy_from_slice(r.bytes(0x20, BTRFS_UUID_SIZE)?);

        Ok(Self {
            csum,
            fsid,
            bytenr: r.u64(0x30)?,
            flags: r.u64(0x38)?,
            generation: r.u64(0x50)?,
            owner: r.u64(0x58)?,
            nritems: r.u32(0x60)?,
            level: r.u8(0x64)?,
        })
    }
}

/// 叶子 item（key + 数据副本）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// key
    pub key: Key,
    /// item 数据
    pub data: Vec<u8>,
}

/// 内部节点的 key 指针
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPtr {
    /// 子树最小 key
    pub key: Key,
    /// 子节点逻辑地址
    pub blockptr: u64,
    /// 子节点生成号
    pub generation: u64,
}

/// 节点内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    /// 叶子节点
    Leaf(Vec<Item>),
    /// 内部节点
    Internal(Vec<KeyPtr>),
}

/// 已解码的树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// 节点头
    pub header: NodeHeader,
    /// 节点内容
    pub body: NodeBody,
}

impl Node {
    /// 解码并校验一个节点
    ///
    /// # 参数
    ///
    /// * `buf` - 完整节点数据（nodesize 字节）
    /// * `bytenr` - 读取时使用的逻辑地址，必须与节点头一致
    pub fn decode(buf: &[u8], bytenr: u64) -> Result<Self> {
        let header = NodeHeader::decode(buf)?;

        if header.bytenr != bytenr {
            log::error!(
                "[TREE] node bytenr mismatch: expected={:#x} found={:#x}",
                bytenr,
                header.bytenr
            );
            return Err(Error::new(ErrorKind::InvalidData, "tree node bytenr mismatch"));
        }
        if header.level >= BTRFS_MAX_LEVEL {
            return Err(Error::new(ErrorKind::InvalidData, "tree node level out of range"));
        }

        let nritems = header.nritems as usize;
        let r = RawReader::new(buf, "tree node");

        let body = if header.level == 0 {
            let max = (buf.len() - BTRFS_HEADER_SIZE) / BTRFS_ITEM_SIZE;
            if nritems > max {
                return Err(Error::new(ErrorKind::InvalidData, "leaf nritems exceeds capacity"));
            }

            let mut items = Vec::with_capacity(nritems);
            for i in 0..nritems {
                let off = BTRFS_HEADER_SIZE + i * BTRFS_ITEM_SIZE;
                let key = r.key(off)?;
                let data_off = r.u32(off + 17)? as usize;
                let data_size = r.u32(off + 21)? as usize;
                let data = r.bytes(BTRFS_HEADER_SIZE + data_off, data_size)?.to_vec();

                if let Some(prev) = items.last().map(|it: &Item| it.key) {
                    if prev >= key {
                        log::error!("[TREE] leaf {:#x} keys out of order at slot {}", bytenr, i);
                        return Err(Error::new(ErrorKind::InvalidData, "leaf keys out of order"));
                    }
                }
                items.push(Item { key, data });
            }
            NodeBody::Leaf(items)
        } else {
            let max = (buf.len() - BTRFS_HEADER_SIZE) / BTRFS_KEY_PTR_SIZE;
            if nritems == 0 || nritems > max {
                return Err(Error::new(ErrorKind::InvalidData, "internal node nritems invalid"));
            }

            let mut ptrs = Vec::with_capacity(nritems);
            for i in 0..nritems {
                let off = BTRFS_HEADER_SIZE + i * BTRFS_KEY_PTR_SIZE;
                let ptr = KeyPtr {
                    key: r.key(off)?,
                    blockptr: r.u64(off + 17)?,
                    generation: r.u64(off + 25)?,
                };
                if let Some(prev) = ptrs.last().map(|p: &KeyPtr| p.key) {
                    if prev >= ptr.key {
                        log::error!("[TREE] node {:#x} keys out of order at slot {}", bytenr, i);
                        return Err(Error::new(ErrorKind::InvalidData, "node keys out of order"));
                    }
                }
                ptrs.push(ptr);
            }
            NodeBody::Internal(ptrs)
        };

        Ok(Self { header, body })
    }

    /// 是否叶子
    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf(_))
    }

    /// 层级
    pub fn level(&self) -> u8 {
        self.header.level
    }

    /// item / 指针数量
    pub fn nritems(&self) -> usize {
        match &self.body {
            NodeBody::Leaf(items) => items.len(),
            NodeBody::Internal(ptrs) => ptrs.len(),
        }
    }

    /// 槽位上的 key
    pub fn key_at(&self, slot: usize) -> Option<Key> {
        match &self.body {
            NodeBody::Leaf(items) => items.get(slot).map(|it| it.key),
            NodeBody::Internal(ptrs) => ptrs.get(slot).map(|p| p.key),
        }
    }

    /// 叶子槽位上的 item
    pub fn item_at(&self, slot: usize) -> Option<&Item> {
        match &self.body {
            NodeBody::Leaf(items) => items.get(slot),
            NodeBody::Internal(_) => None,
        }
    }

    /// 内部节点槽位上的子节点地址
    pub fn child_at(&self, slot: usize) -> Option<u64> {
        match &self.body {
            NodeBody::Leaf(_) => None,
            NodeBody::Internal(ptrs) => ptrs.get(slot).map(|p| p.blockptr),
        }
    }

    /// 节点内的 floor 查找：返回 key ≤ `key` 的最大槽位
    ///
    /// 精确命中返回该槽位；落在两条记录之间时回退一格，返回前一条；
    /// 所有 key 都大于 `key` 时返回 `None`。
    pub fn floor_slot(&self, key: &Key) -> Option<usize> {
        let result = match &self.body {
            NodeBody::Leaf(items) => items.binary_search_by(|it| it.key.cmp(key)),
            NodeBody::Internal(ptrs) => ptrs.binary_search_by(|p| p.key.cmp(key)),
        };
        match result {
            Ok(slot) => Some(slot),
            Err(0) => None,
            Err(slot) => Some(slot - 1),
        }
    }
}
