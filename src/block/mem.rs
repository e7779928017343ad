//! 内存块设备

use super::BlockDevice;
use crate::{
    consts::BTRFS_DEFAULT_DEVICE_SECTOR,
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;

/// 以内存缓冲区为后端的只读设备
///
/// 镜像长度不足一个扇区的尾部按零填充处理。
#[derive(Debug, Clone)]
pub struct MemDevice {
    data: Vec<u8>,
    sector_size: u32,
}

impl MemDevice {
    /// 使用默认扇区大小（512）创建
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_sector_size(data, BTRFS_DEFAULT_DEVICE_SECTOR)
    }

    /// 使用指定扇区大小创建
    pub fn with_sector_size(mut data: Vec<u8>, sector_size: u32) -> Self {
        let rem = data.len() % sector_size as usize;
        if rem != 0 {
            data.resize(data.len() + sector_size as usize - rem, 0);
        }
        Self { data, sector_size }
    }

    /// 底层数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemDevice {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn total_sectors(&self) -> u64 {
        (self.data.len() / self.sector_size as usize) as u64
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let sector = self.sector_size as usize;
        let start = lba as usize * sector;
        let len = count as usize * sector;

        if buf.len() < len {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer too small for sectors"));
        }
        if start + len > self.data.len() {
            return Err(Error::new(ErrorKind::Io, "sector range beyond memory device"));
        }

        buf[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(len)
    }
}
