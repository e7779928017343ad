//! 块设备核心类型

use crate::error::{Error, ErrorKind, Result};

/// 块设备接口
///
/// 实现此 trait 以提供底层设备（镜像文件、块设备、内存）的只读访问。
///
/// # 示例
///
/// ```rust,ignore
/// use btrfs_csum::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_sectors(&self) -> u64 {
///         1 << 21
///     }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现扇区读取
///         Ok(count as usize * self.sector_size() as usize)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 设备扇区大小（通常 512）
    fn sector_size(&self) -> u32;

    /// 设备总扇区数
    fn total_sectors(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始扇区号
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 打开设备
    ///
    /// 在 [`BlockDev::new`] 中调用一次。默认实现什么都不做。
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// 关闭设备
    ///
    /// 在 [`BlockDev`] 被丢弃时调用，无论流程是成功还是出错。
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 块设备包装器
///
/// 提供字节粒度的读取和统计信息，并负责设备的打开与关闭：
/// 设备在 `new` 时打开，在包装器被丢弃时关闭，所有退出路径都会关闭设备。
pub struct BlockDev<D: BlockDevice> {
    /// 底层设备
    device: D,
    /// 逻辑读取次数（read_bytes 调用）
    read_count: u64,
    /// 物理读取次数（实际设备操作）
    physical_read_count: u64,
    /// 累计读取字节数
    bytes_read: u64,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 打开设备并创建包装器
    pub fn new(mut device: D) -> Result<Self> {
        let sector_size = device.sector_size();
        if sector_size == 0 || !sector_size.is_power_of_two() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Device sector size must be a power of two",
            ));
        }

        device.open().map_err(|e| {
            log::error!("[BLOCK] device open failed: {}", e);
            e.recategorize(ErrorKind::Resource)
        })?;

        Ok(Self {
            device,
            read_count: 0,
            physical_read_count: 0,
            bytes_read: 0,
        })
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取设备扇区大小
    pub fn sector_size(&self) -> u32 {
        self.device.sector_size()
    }

    /// 设备总字节数
    pub fn total_bytes(&self) -> u64 {
        self.device.total_sectors() * self.device.sector_size() as u64
    }

    /// 获取逻辑读取次数
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 获取物理读取次数（实际设备操作）
    pub fn physical_read_count(&self) -> u64 {
        self.physical_read_count
    }

    /// 累计读取字节数
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub(super) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub(super) fn inc_read_count(&mut self, bytes: usize) {
        self.read_count += 1;
        self.bytes_read += bytes as u64;
    }

    pub(super) fn inc_physical_read_count(&mut self) {
        self.physical_read_count += 1;
    }
}

impl<D: BlockDevice> Drop for BlockDev<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.close() {
            log::warn!("[BLOCK] device close failed: {}", e);
        }
    }
}
