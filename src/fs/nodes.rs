//! 设备上的节点来源
//!
//! 把逻辑地址经 chunk 映射换算为物理地址后从块设备读取，
//! 按需验证节点校验和，并用 LRU 缓存原始节点。

use crate::{
    block::{BlockDev, BlockDevice},
    cache::{CacheStats, NodeCache, NodeFlags},
    chunk::ChunkMap,
    consts::*,
    crypto::{Checksummer, CryptoProvider, DefaultProvider},
    error::{Error, ErrorKind, Result},
    tree::NodeSource,
};
use alloc::{vec, vec::Vec};

/// 块设备上的树节点来源
pub struct DeviceNodes<D: BlockDevice, P: CryptoProvider = DefaultProvider> {
    bdev: BlockDev<D>,
    chunks: ChunkMap,
    cache: NodeCache,
    nodesize: u32,
    fsid: [u8; BTRFS_UUID_SIZE],
    summer: Checksummer<P>,
    verify: bool,
}

impl<D: BlockDevice, P: CryptoProvider> DeviceNodes<D, P> {
    /// 创建
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备
    /// * `chunks` - 引导阶段得到的 chunk 映射（之后可继续扩充）
    /// * `nodesize` - 节点大小
    /// * `fsid` - 节点头中必须出现的文件系统 uuid
    /// * `summer` - 节点校验和算法
    /// * `verify` - 是否验证节点校验和
    /// * `cache_size` - 缓存容量（节点数）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bdev: BlockDev<D>,
        chunks: ChunkMap,
        nodesize: u32,
        fsid: [u8; BTRFS_UUID_SIZE],
        summer: Checksummer<P>,
        verify: bool,
        cache_size: usize,
    ) -> Self {
        Self {
            bdev,
            chunks,
            cache: NodeCache::new(cache_size),
            nodesize,
            fsid,
            summer,
            verify,
        }
    }

    /// 块设备
    pub fn block_device(&self) -> &BlockDev<D> {
        &self.bdev
    }

    /// chunk 映射
    pub fn chunks(&self) -> &ChunkMap {
        &self.chunks
    }

    /// 可变 chunk 映射（引导时加入 chunk 树中的 chunk）
    pub fn chunks_mut(&mut self) -> &mut ChunkMap {
        &mut self.chunks
    }

    /// 节点缓存统计
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 按逻辑地址读取字节
    pub fn read_logical(&mut self, logical: u64, buf: &mut [u8]) -> Result<()> {
        let physical = self.chunks.map(logical, buf.len() as u64)?;
        self.bdev.read_bytes(physical, buf)?;
        Ok(())
    }

    fn verify_node(&self, bytenr: u64, buf: &[u8]) -> Result<()> {
        let size = self.summer.digest_size();
        let computed = self.summer.compute(&buf[BTRFS_CSUM_SIZE..])?;
        if buf[..size] != computed[..] {
            log::error!(
                "[NODE] checksum mismatch at {:#x}: stored={} computed={}",
                bytenr,
                hex::encode(&buf[..size]),
                hex::encode(&computed)
            );
            return Err(Error::new(ErrorKind::InvalidData, "tree node checksum mismatch"));
        }
        if buf[0x20..0x20 + BTRFS_UUID_SIZE] != self.fsid {
            log::error!("[NODE] node {:#x} belongs to another filesystem", bytenr);
            return Err(Error::new(ErrorKind::InvalidData, "tree node fsid mismatch"));
        }
        Ok(())
    }
}

impl<D: BlockDevice, P: CryptoProvider> NodeSource for DeviceNodes<D, P> {
    fn read_node(&mut self, bytenr: u64) -> Result<Vec<u8>> {
        if let Some((data, _)) = self.cache.get(bytenr) {
            return Ok(data.to_vec());
        }

        let mut buf = vec![0u8; self.nodesize as usize];
        self.read_logical(bytenr, &mut buf)?;

        let mut flags = NodeFlags::empty();
        if self.verify {
            self.verify_node(bytenr, &buf)?;
            flags |= NodeFlags::VERIFIED;
        }

        log::trace!("[NODE] loaded {:#x} ({:?})", bytenr, flags);
        self.cache.insert(bytenr, buf.clone(), flags);
        Ok(buf)
    }
}
