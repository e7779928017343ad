//! Superblock 读取和验证

use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    crypto::ChecksumAlgorithm,
    error::{Error, ErrorKind, Result},
    types::{RawReader, TreeRoot},
};
use alloc::{vec, vec::Vec};

/// 从块设备读取原始 superblock（4096 字节，偏移 64 KiB）
///
/// # 参数
///
/// * `bdev` - 块设备引用
///
/// # 返回
///
/// 成功返回 superblock 原始字节
pub fn read_superblock<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<Vec<u8>> {
    let mut sb_buf = vec![0u8; BTRFS_SUPER_INFO_SIZE];
    bdev.read_bytes(BTRFS_SUPER_INFO_OFFSET, &mut sb_buf)
        .map_err(|e| {
            log::error!("[SB] cannot read superblock: {}", e);
            Error::new(ErrorKind::InvalidInput, "device too small for a btrfs superblock")
        })?;
    Ok(sb_buf)
}

/// 已解码的 superblock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// 存储的校验和（按 csum_type 只使用前若干字节）
    pub csum: [u8; BTRFS_CSUM_SIZE],
    /// 文件系统 uuid
    pub fsid: [u8; BTRFS_UUID_SIZE],
    /// superblock 自身的字节偏移
    pub bytenr: u64,
    /// 生成号
    pub generation: u64,
    /// root tree 根
    pub root: TreeRoot,
    /// chunk tree 根
    pub chunk_root: TreeRoot,
    /// 文件系统总字节数
    pub total_bytes: u64,
    /// 保存 "default" 目录项的目录 objectid
    pub root_dir_objectid: u64,
    /// 设备数
    pub num_devices: u64,
    /// 本设备的 devid（dev_item 的第一个字段）
    pub devid: u64,
    /// 数据扇区大小
    pub sectorsize: u32,
    /// 树节点大小
    pub nodesize: u32,
    /// 条带大小
    pub stripesize: u32,
    /// chunk tree 生成号
    pub chunk_root_generation: u64,
    /// 不兼容特性位
    pub incompat_flags: u64,
    /// 校验和类型
    pub csum_type: u16,
    /// 卷标
    pub label: Vec<u8>,
    /// 引导用的 SYSTEM chunk 数组
    pub sys_chunk_array: Vec<u8>,
}

impl Superblock {
    /// 解码并校验几何参数
    ///
    /// 魔数错误或几何参数非法都返回 `InvalidInput`：这不是一个可用的 btrfs 设备。
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let r = RawReader::new(buf, "superblock");

        let magic = r.u64(0x40)?;
        if magic != BTRFS_MAGIC {
            log::error!("[SB] bad magic {:#018x}", magic);
            return Err(Error::new(ErrorKind::InvalidInput, "invalid btrfs superblock magic"));
        }

        let mut csum = [0u8; BTRFS_CSUM_SIZE];
        csum.copy_from_slice(r.bytes(0, BTRFS_CSUM_SIZE)?);
        let mut fsid = [0u8; BTRFS_UUID_SIZE];
        fsid.copy_from_slice(r.bytes(0x20, BTRFS_UUID_SIZE)?);

        let sys_size = r.u32(0xa0)? as usize;
        if sys_size > BTRFS_SYSTEM_CHUNK_ARRAY_SIZE {
            log::error!("[SB] sys_chunk_array_size {} too large", sys_size);
            return Err(Error::new(ErrorKind::InvalidInput, "sys_chunk_array_size too large"));
        }

        let label = r.bytes(0x12b, 256)?;
        let label_len = label.iter().position(|&b| b == 0).unwrap_or(label.len());

        let sb = Self {
            csum,
            fsid,
            bytenr: r.u64(0x30)?,
            generation: r.u64(0x48)?,
            root: TreeRoot {
                bytenr: r.u64(0x50)?,
                level: r.u8(0xc6)?,
            },
            chunk_root: TreeRoot {
                bytenr: r.u64(0x58)?,
                level: r.u8(0xc7)?,
            },
            total_bytes: r.u64(0x70)?,
            root_dir_objectid: r.u64(0x80)?,
            num_devices: r.u64(0x88)?,
            devid: r.u64(BTRFS_SUPER_DEV_ITEM_OFFSET)?,
            sectorsize: r.u32(0x90)?,
            nodesize: r.u32(0x94)?,
            stripesize: r.u32(0x9c)?,
            chunk_root_generation: r.u64(0xa4)?,
            incompat_flags: r.u64(0xbc)?,
            csum_type: r.u16(0xc4)?,
            label: label[..label_len].to_vec(),
            sys_chunk_array: r
                .bytes(BTRFS_SUPER_SYS_CHUNK_ARRAY_OFFSET, sys_size)?
                .to_vec(),
        };

        sb.check_geometry()?;
        Ok(sb)
    }

    /// 从块设备加载 superblock
    pub fn load<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<(Self, Vec<u8>)> {
        let raw = read_superblock(bdev)?;
        let sb = Self::decode(&raw)?;
        log::info!(
            "[SB] generation={} sectorsize={} nodesize={} csum_type={} devices={}",
            sb.generation,
            sb.sectorsize,
            sb.nodesize,
            sb.csum_type,
            sb.num_devices
        );
        Ok((sb, raw))
    }

    fn check_geometry(&self) -> Result<()> {
        let sector = self.sectorsize;
        let node = self.nodesize;

        if !sector.is_power_of_two()
            || !(BTRFS_MIN_SECTORSIZE..=BTRFS_MAX_METADATA_BLOCKSIZE).contains(&sector)
        {
            log::error!("[SB] invalid sectorsize {}", sector);
            return Err(Error::new(ErrorKind::InvalidInput, "invalid sectorsize"));
        }
        if !node.is_power_of_two() || node < sector || node > BTRFS_MAX_METADATA_BLOCKSIZE {
            log::error!("[SB] invalid nodesize {} (sectorsize {})", node, sector);
            return Err(Error::new(ErrorKind::InvalidInput, "invalid nodesize"));
        }
        if self.bytenr != BTRFS_SUPER_INFO_OFFSET {
            log::error!("[SB] superblock bytenr {:#x} is not the primary copy", self.bytenr);
            return Err(Error::new(ErrorKind::InvalidInput, "superblock bytenr mismatch"));
        }
        if self.root.level >= BTRFS_MAX_LEVEL || self.chunk_root.level >= BTRFS_MAX_LEVEL {
            return Err(Error::new(ErrorKind::InvalidInput, "tree root level out of range"));
        }
        if self.num_devices == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "superblock reports zero devices"));
        }
        Ok(())
    }

    /// 校验和算法
    pub fn algorithm(&self) -> Result<ChecksumAlgorithm> {
        ChecksumAlgorithm::from_disk(self.csum_type)
    }

    /// 每个扇区的摘要长度
    pub fn csum_size(&self) -> Result<usize> {
        Ok(self.algorithm()?.digest_size())
    }

    /// 卷标（非 UTF-8 字节按替换字符显示）
    pub fn label(&self) -> alloc::string::String {
        alloc::string::String::from_utf8_lossy(&self.label).into_owned()
    }
}
