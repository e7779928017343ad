//! 块 I/O 操作实现

use super::{BlockDev, BlockDevice};
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;

impl<D: BlockDevice> BlockDev<D> {
    /// 读取字节
    ///
    /// 从任意字节偏移读取，自动处理扇区对齐。
    ///
    /// # 参数
    ///
    /// * `offset` - 设备上的字节偏移量
    /// * `buf` - 目标缓冲区
    ///
    /// # 返回
    ///
    /// 成功返回读取的字节数
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let mut buf = vec![0u8; 4096];
    /// block_dev.read_bytes(0x10000, &mut buf)?;
    /// ```
    pub fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len();
        if len == 0 {
            return Ok(0);
        }

        let end = offset
            .checked_add(len as u64)
            .ok_or(Error::new(ErrorKind::InvalidInput, "read range overflows"))?;
        if end > self.total_bytes() {
            log::error!(
                "[BLOCK] read beyond device end: offset={:#x} len={} device_size={}",
                offset,
                len,
                self.total_bytes()
            );
            return Err(Error::new(ErrorKind::Io, "read beyond end of device"));
        }

        let sector_size = self.sector_size() as u64;

        // 计算起始扇区和扇区内偏移
        let start_sector = offset / sector_size;
        let sector_offset = (offset % sector_size) as usize;

        // 计算需要读取的扇区数
        let total_size = sector_offset as u64 + len as u64;
        let sector_count = total_size.div_ceil(sector_size);
        let sector_count = u32::try_from(sector_count)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "read too large"))?;

        self.inc_read_count(len);

        if sector_offset == 0 && len as u64 % sector_size == 0 {
            // 已对齐，直接读入用户缓冲区
            self.inc_physical_read_count();
            self.device_mut().read_blocks(start_sector, sector_count, buf)?;
            return Ok(len);
        }

        // 分配临时缓冲区
        let mut temp = vec![0u8; sector_count as usize * sector_size as usize];
        self.inc_physical_read_count();
        self.device_mut().read_blocks(start_sector, sector_count, &mut temp)?;

        // 复制所需字节
        buf.copy_from_slice(&temp[sector_offset..sector_offset + len]);

        Ok(len)
    }
}
