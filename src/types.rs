//! btrfs 数据结构定义
//!
//! 这个模块包含了直接对应磁盘格式的数据结构。
//!
//! ## 设计原则
//!
//! 1. **显式解码** - 不把字节缓冲区直接转换成结构体，
//!    每个字段都经过长度检查后用 `byteorder` 读出
//! 2. **损坏可检测** - 越界或长度不符统一返回 `ErrorKind::InvalidData`
//! 3. **只读** - 本 crate 不写任何磁盘结构

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};
use core::fmt;

//=============================================================================
// 带边界检查的字节读取器
//=============================================================================

/// 在字节切片上按偏移读取小端字段，越界返回 `InvalidData`
#[derive(Clone, Copy)]
pub(crate) struct RawReader<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> RawReader<'a> {
    pub(crate) fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, what }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn bytes(&self, off: usize, len: usize) -> Result<&'a [u8]> {
        match off.checked_add(len) {
            Some(end) if end <= self.buf.len() => Ok(&self.buf[off..end]),
            _ => {
                log::error!(
                    "[DECODE] {} truncated: need {} bytes at {}, have {}",
                    self.what,
                    len,
                    off,
                    self.buf.len()
                );
                Err(Error::new(ErrorKind::InvalidData, "on-disk record truncated"))
            }
        }
    }

    pub(crate) fn u8(&self, off: usize) -> Result<u8> {
        Ok(self.bytes(off, 1)?[0])
    }

    pub(crate) fn u16(&self, off: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes(off, 2)?))
    }

    pub(crate) fn u32(&self, off: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(off, 4)?))
    }

    pub(crate) fn u64(&self, off: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.bytes(off, 8)?))
    }

    pub(crate) fn key(&self, off: usize) -> Result<Key> {
        Key::decode(self.bytes(off, BTRFS_DISK_KEY_SIZE)?)
    }
}

//=============================================================================
// Key
//=============================================================================

/// 树 key
///
/// 排序顺序为 (objectid, item_type, offset)，与磁盘上的排序一致。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Key {
    /// 对象 id（inode 号、树 id 等）
    pub objectid: u64,
    /// item 类型
    pub item_type: u8,
    /// 与类型相关的偏移
    pub offset: u64,
}

impl Key {
    /// 创建 key
    pub const fn new(objectid: u64, item_type: u8, offset: u64) -> Self {
        Self {
            objectid,
            item_type,
            offset,
        }
    }

    /// 从 17 字节磁盘格式解码
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < BTRFS_DISK_KEY_SIZE {
            return Err(Error::new(ErrorKind::InvalidData, "disk key truncated"));
        }
        Ok(Self {
            objectid: LittleEndian::read_u64(&buf[0..8]),
            item_type: buf[8],
            offset: LittleEndian::read_u64(&buf[9..17]),
        })
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.objectid, self.item_type, self.offset)
    }
}

//=============================================================================
// Inode item
//=============================================================================

/// inode 元数据中本工具关心的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeItem {
    /// 生成号
    pub generation: u64,
    /// 文件大小（字节）
    pub size: u64,
    /// 实际占用字节
    pub nbytes: u64,
    /// 模式（类型 + 权限）
    pub mode: u32,
    /// inode 标志
    pub flags: u64,
}

impl InodeItem {
    const S_IFMT: u32 = 0o170000;
    const S_IFDIR: u32 = 0o040000;
    const S_IFREG: u32 = 0o100000;

    /// 从 item 数据解码
    pub fn decode(data: &[u8]) -> Result<Self> {
        let r = RawReader::new(data, "inode item");
        if r.len() < BTRFS_INODE_ITEM_SIZE {
            return Err(Error::new(ErrorKind::InvalidData, "inode item too short"));
        }
        Ok(Self {
            generation: r.u64(0)?,
            size: r.u64(16)?,
            nbytes: r.u64(24)?,
            mode: r.u32(52)?,
            flags: r.u64(64)?,
        })
    }

    /// 是否目录
    pub fn is_dir(&self) -> bool {
        self.mode & Self::S_IFMT == Self::S_IFDIR
    }

    /// 是否普通文件
    pub fn is_regular(&self) -> bool {
        self.mode & Self::S_IFMT == Self::S_IFREG
    }
}

//=============================================================================
// Root item
//=============================================================================

/// 树根位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRoot {
    /// 根节点逻辑地址
    pub bytenr: u64,
    /// 根节点层级（0 表示根即叶子）
    pub level: u8,
}

/// root item（子卷或内部树的根描述）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootItem {
    /// 生成号
    pub generation: u64,
    /// 子卷根目录 inode
    pub root_dirid: u64,
    /// 根节点
    pub root: TreeRoot,
}

impl RootItem {
    /// 从 item 数据解码
    pub fn decode(data: &[u8]) -> Result<Self> {
        let r = RawReader::new(data, "root item");
        let level = r.u8(BTRFS_ROOT_ITEM_LEVEL_OFFSET)?;
        if level >= BTRFS_MAX_LEVEL {
            return Err(Error::new(ErrorKind::InvalidData, "root item level out of range"));
        }
        Ok(Self {
            generation: r.u64(BTRFS_INODE_ITEM_SIZE)?,
            root_dirid: r.u64(BTRFS_INODE_ITEM_SIZE + 8)?,
            root: TreeRoot {
                bytenr: r.u64(BTRFS_ROOT_ITEM_BYTENR_OFFSET)?,
                level,
            },
        })
    }
}

//=============================================================================
// File extent item
//=============================================================================

/// file extent 的存储形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileExtentKind {
    /// 内联在 item 内，没有磁盘位置
    Inline,
    /// 普通 extent
    Regular,
    /// 预分配
    Prealloc,
}

/// EXTENT_DATA item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileExtentItem {
    /// 生成号
    pub generation: u64,
    /// 解压后的字节数
    pub ram_bytes: u64,
    /// 压缩算法（0 表示未压缩）
    pub compression: u8,
    /// 存储形式
    pub kind: FileExtentKind,
    /// 磁盘 extent 起始逻辑地址（0 表示空洞）
    pub disk_bytenr: u64,
    /// 磁盘 extent 长度
    pub disk_num_bytes: u64,
    /// 文件引用在磁盘 extent 中的起始偏移
    pub offset: u64,
    /// 文件引用的字节数
    pub num_bytes: u64,
}

impl FileExtentItem {
    /// 从 item 数据解码
    pub fn decode(data: &[u8]) -> Result<Self> {
        let r = RawReader::new(data, "file extent item");
        let generation = r.u64(0)?;
        let ram_bytes = r.u64(8)?;
        let compression = r.u8(16)?;
        let kind = match r.u8(20)? {
            BTRFS_FILE_EXTENT_INLINE => FileExtentKind::Inline,
            BTRFS_FILE_EXTENT_REG => FileExtentKind::Regular,
            BTRFS_FILE_EXTENT_PREALLOC => FileExtentKind::Prealloc,
            other => {
                log::error!("[DECODE] unknown file extent type {}", other);
                return Err(Error::new(ErrorKind::InvalidData, "unknown file extent type"));
            }
        };

        if kind == FileExtentKind::Inline {
            return Ok(Self {
                generation,
                ram_bytes,
                compression,
                kind,
                disk_bytenr: 0,
                disk_num_bytes: 0,
                offset: 0,
                num_bytes: ram_bytes,
            });
        }

        if r.len() < BTRFS_FILE_EXTENT_ITEM_SIZE {
            return Err(Error::new(ErrorKind::InvalidData, "file extent item too short"));
        }

        Ok(Self {
            generation,
            ram_bytes,
            compression,
            kind,
            disk_bytenr: r.u64(21)?,
            disk_num_bytes: r.u64(29)?,
            offset: r.u64(37)?,
            num_bytes: r.u64(45)?,
        })
    }

    /// 是否空洞（没有分配磁盘空间）
    pub fn is_hole(&self) -> bool {
        self.kind != FileExtentKind::Inline && self.disk_bytenr == 0
    }

    /// 校验和覆盖的物理范围 `(起始地址, 长度)`
    ///
    /// 校验和按磁盘 extent 的地址（disk_bytenr）计算。未压缩时取文件实际引用的那一段，
    /// 压缩时校验和覆盖整段压缩后的磁盘数据。
    pub fn checksummed_range(&self) -> Option<(u64, u64)> {
        if self.kind != FileExtentKind::Regular || self.is_hole() {
            return None;
        }
        if self.compression != 0 {
            Some((self.disk_bytenr, self.disk_num_bytes))
        } else {
            Some((self.disk_bytenr + self.offset, self.num_bytes))
        }
    }
}

//=============================================================================
// Dir item
//=============================================================================

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 指向的位置：INODE_ITEM（同一子卷）或 ROOT_ITEM（另一个子卷）
    pub location: Key,
    /// 文件类型
    pub file_type: u8,
    /// 名字
    pub name: Vec<u8>,
}

impl DirEntry {
    /// 解码一个 DIR_ITEM 中打包的所有目录项（哈希冲突时会有多个）
    pub fn decode_all(data: &[u8]) -> Result<Vec<Self>> {
        let r = RawReader::new(data, "dir item");
        let mut entries = Vec::new();
        let mut off = 0;

        while off < r.len() {
            let location = r.key(off)?;
            let data_len = r.u16(off + 25)? as usize;
            let name_len = r.u16(off + 27)? as usize;
            let file_type = r.u8(off + 29)?;
            let name_off = off + BTRFS_DIR_ITEM_HEADER_SIZE;
            let name = r.bytes(name_off, name_len)?.to_vec();
            // data 部分（xattr 值）只跳过
            r.bytes(name_off + name_len, data_len)?;

            entries.push(Self {
                location,
                file_type,
                name,
            });
            off = name_off + name_len + data_len;
        }

        Ok(entries)
    }
}

//=============================================================================
// Chunk item
//=============================================================================

/// chunk 的一个 stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stripe {
    /// 所在设备
    pub devid: u64,
    /// 设备上的物理偏移
    pub offset: u64,
}

/// chunk 属性及其全部 stripe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkItem {
    /// chunk 覆盖的逻辑长度
    pub length: u64,
    /// 类型位（DATA/METADATA/SYSTEM + RAID profile）
    pub chunk_type: u64,
    /// stripe 列表（至少一个）
    pub stripes: Vec<Stripe>,
}

impl ChunkItem {
    /// 解码 chunk item，返回 `(item, 占用字节数)`
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let r = RawReader::new(data, "chunk item");
        let length = r.u64(0)?;
        let chunk_type = r.u64(24)?;
        let num_stripes = r.u16(44)? as usize;
        if num_stripes == 0 {
            return Err(Error::new(ErrorKind::InvalidData, "chunk item without stripes"));
        }
        let total = BTRFS_CHUNK_ITEM_SIZE + num_stripes * BTRFS_STRIPE_SIZE;
        r.bytes(0, total)?;

        let stripes = (0..num_stripes)
            .map(|i| {
                let at = BTRFS_CHUNK_ITEM_SIZE + i * BTRFS_STRIPE_SIZE;
                Ok(Stripe {
                    devid: r.u64(at)?,
                    offset: r.u64(at + 8)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((
            Self {
                length,
                chunk_type,
                stripes,
            },
            total,
        ))
    }

    /// 位于设备 `devid` 上的第一个 stripe
    pub fn stripe_on(&self, devid: u64) -> Option<&Stripe> {
        self.stripes.iter().find(|s| s.devid == devid)
    }
}
